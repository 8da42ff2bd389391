//! Core aggregate and domain event traits.

use common::AggregateId;
use event_store::Version;
use serde::{Serialize, de::DeserializeOwned};

/// A fact that happened to an aggregate. Named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Name stored alongside the payload, used for lookups by event type.
    fn event_type(&self) -> &'static str;
}

/// An event-sourced entity.
///
/// Aggregates are rebuilt by replaying their events. Commands are plain
/// methods that inspect the current state and return new events; `apply`
/// folds an event into the state and must not fail.
pub trait Aggregate: Default + Send + Sync + Sized {
    type Event: DomainEvent;

    type Error: std::error::Error + Send + Sync;

    /// Stream kind in the event store.
    fn aggregate_type() -> &'static str;

    /// `None` until the creating event has been applied.
    fn id(&self) -> Option<AggregateId>;

    fn version(&self) -> Version;

    fn set_version(&mut self, version: Version);

    fn apply(&mut self, event: Self::Event);

    fn apply_events(&mut self, events: impl IntoIterator<Item = Self::Event>) {
        for event in events {
            self.apply(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    enum ShelfEvent {
        Opened { id: AggregateId },
        Stocked { units: u32 },
    }

    impl DomainEvent for ShelfEvent {
        fn event_type(&self) -> &'static str {
            match self {
                ShelfEvent::Opened { .. } => "ShelfOpened",
                ShelfEvent::Stocked { .. } => "ShelfStocked",
            }
        }
    }

    #[derive(Debug, Default)]
    struct Shelf {
        id: Option<AggregateId>,
        units: u32,
        version: Version,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("shelf error")]
    struct ShelfError;

    impl Aggregate for Shelf {
        type Event = ShelfEvent;
        type Error = ShelfError;

        fn aggregate_type() -> &'static str {
            "Shelf"
        }

        fn id(&self) -> Option<AggregateId> {
            self.id
        }

        fn version(&self) -> Version {
            self.version
        }

        fn set_version(&mut self, version: Version) {
            self.version = version;
        }

        fn apply(&mut self, event: Self::Event) {
            match event {
                ShelfEvent::Opened { id } => self.id = Some(id),
                ShelfEvent::Stocked { units } => self.units += units,
            }
        }
    }

    #[test]
    fn apply_events_folds_in_order() {
        let id = AggregateId::new();
        let mut shelf = Shelf::default();
        shelf.apply_events(vec![
            ShelfEvent::Opened { id },
            ShelfEvent::Stocked { units: 3 },
            ShelfEvent::Stocked { units: 2 },
        ]);

        assert_eq!(shelf.id(), Some(id));
        assert_eq!(shelf.units, 5);
    }

    #[test]
    fn event_type_names() {
        assert_eq!(ShelfEvent::Stocked { units: 1 }.event_type(), "ShelfStocked");
    }
}
