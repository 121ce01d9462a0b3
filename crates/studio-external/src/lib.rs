//! External API facade for out-of-process consumers.
//!
//! Exposes a reduced, versioned subset of the internal services over the
//! same envelope shape the windows use. Each allowed method carries a cost
//! classification; calls are recorded in a per-second ledger (bookkeeping
//! only, no enforcement) and delegated verbatim to the internal dispatcher.

mod api;
mod ledger;
mod surface;

pub use api::ExternalApi;
pub use ledger::CostLedger;
pub use surface::{ApiVersion, CostClass, MethodSurface};
