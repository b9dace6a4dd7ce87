pub mod assembler;
pub mod coordinator;
pub mod error;
pub mod mapper;
pub mod quarantine;
pub mod reader;
pub mod reporter;
pub mod retry;
pub mod sink;

pub use error::{ExecutionError, MappingError, MapperSetupError, QuarantineError};
