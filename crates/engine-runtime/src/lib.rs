pub mod error;
pub mod execution;
pub mod logging;
pub mod status;

pub use error::{AbortReason, RunError};
pub use execution::{
    load::{LoadExecutor, load},
    unload::{UnloadExecutor, unload},
    writer::RecordWriter,
};
pub use status::{RunStatus, RunSummary};
