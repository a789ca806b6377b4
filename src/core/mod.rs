pub mod ability;
pub mod allocator;
pub mod fields;
pub mod ingest;
pub mod ledger;
pub mod maintenance;
pub mod partition;
pub mod store;

pub use crate::domain::model::{Participant, Program, RosterRow};
pub use crate::domain::ports::{RowSource, Storage};
pub use crate::utils::error::Result;
