//! sheet-sync: export realtime-database records to spreadsheets as grids.

pub mod a1;
pub mod config;
pub mod events;
pub mod format;
pub mod jobs;
pub mod sender;
pub mod store;
pub mod sync;
pub mod types;

pub use a1::{column_letter, column_number, CellRef};
pub use config::SyncConfig;
pub use events::{EventBus, SyncEvent};
pub use format::{DataFormatter, RecordShape};
pub use jobs::{
    interval_from_minutes, JobHandle, JobId, JobRegistry, JobSnapshot, JobState, OverlapPolicy,
};
pub use sender::{is_empty_record, HttpTransport, SheetsSender, SheetsTransport};
pub use store::{MemoryStore, RealtimeDbStore, RecordStore};
pub use sync::SyncOrchestrator;
pub use types::*;
