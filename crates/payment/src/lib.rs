//! Payment gate for the bookstore checkout.
//!
//! [`PaymentGate`] creates payment records and processes each one exactly
//! once through an [`Authorizer`]. Terminal outcomes are kept in an
//! [`IdempotencyStore`] for a configured time so duplicate process calls are
//! answered from the record instead of charging twice.

pub mod authorizer;
pub mod error;
pub mod gate;
pub mod idempotency;
pub mod record;

pub use authorizer::{Authorization, Authorizer, SimulatedAuthorizer};
pub use error::{PaymentError, Result};
pub use gate::{PaymentGate, PaymentGateConfig};
pub use idempotency::IdempotencyStore;
pub use record::{CardDetails, PaymentOutcome, PaymentRecord, PaymentStatus};
