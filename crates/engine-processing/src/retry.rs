use engine_core::{error::StoreError, retry::RetryDisposition};

pub fn classify_store_error(err: &StoreError) -> RetryDisposition {
    match err {
        StoreError::Timeout(_)
        | StoreError::WriteTimeout(_)
        | StoreError::Overloaded(_)
        | StoreError::Unavailable(_) => RetryDisposition::Retry,
        StoreError::InvalidQuery(_) => RetryDisposition::Stop,
        StoreError::TypeMismatch { .. } => RetryDisposition::Stop,
        StoreError::Unauthorized(_) => RetryDisposition::Stop,
        StoreError::UnknownTable(_) => RetryDisposition::Stop,
        // Reconnecting is the driver's job; a lost session ends the run.
        StoreError::ConnectionLost(_) => RetryDisposition::Stop,
    }
}
