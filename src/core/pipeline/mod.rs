//! Pipeline orchestration
//!
//! [`BackfillCoordinator`] owns the collaborators for one run and turns a
//! [`crate::core::calendar::DateRange`] into a [`RunSummary`].

pub mod coordinator;
pub mod shutdown;
pub mod summary;

pub use coordinator::BackfillCoordinator;
pub use shutdown::ShutdownSignal;
pub use summary::{DateOutcome, DateStage, RunSummary};
