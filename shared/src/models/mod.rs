//! Auxiliary entity models: device authorization, printing, offline sync

pub mod device;
pub mod print;
pub mod sync;

pub use device::{
    DeviceAuthInitiate, DeviceAuthSnapshot, DeviceCodeGrant, DeviceCodeStatus, PollOutcome,
};
pub use print::{
    PrintJobCreate, PrintJobKind, PrintJobSnapshot, PrintJobStatus, PrintOutcome,
    PrintQueueSnapshot, QueuedJob,
};
pub use sync::{
    ConflictResolution, ConflictStrategy, OfflineSyncSnapshot, SyncAction, SyncOperation,
    SyncOperationInput, SyncOperationStatus, SyncReport,
};
