//! Application services of the ledger gateway.

pub mod admin;
pub mod events;
pub mod submitter;
pub mod subsidy;

pub use admin::ContractAdminService;
pub use events::{aggregate, merge_events, EventQuery, DEFAULT_EVENTS_LIMIT};
pub use submitter::{ConfirmationPolicy, TransactionSubmitter};
pub use subsidy::SubsidyService;
