use crate::error::{AbortReason, RunError};
use engine_core::metrics::MetricsSnapshot;
use std::{fmt, path::PathBuf};

/// Final state of a run, observable through the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Ok,
    CompletedWithErrors,
    AbortedTooManyErrors,
    AbortedFatalError,
    Interrupted,
}

impl RunStatus {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Ok => 0,
            RunStatus::CompletedWithErrors => 1,
            RunStatus::AbortedTooManyErrors => 2,
            RunStatus::AbortedFatalError => 3,
            RunStatus::Interrupted => 4,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(
            self,
            RunStatus::AbortedTooManyErrors | RunStatus::AbortedFatalError | RunStatus::Interrupted
        )
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Ok => "completed successfully",
            RunStatus::CompletedWithErrors => "completed with errors",
            RunStatus::AbortedTooManyErrors => "aborted: too many errors",
            RunStatus::AbortedFatalError => "aborted: fatal error",
            RunStatus::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub operation_id: String,
    pub status: RunStatus,
    pub abort_reason: Option<AbortReason>,
    pub metrics: MetricsSnapshot,
    /// Where the quarantine files of this run live.
    pub operation_dir: PathBuf,
}

impl RunSummary {
    pub fn exit_code(&self) -> i32 {
        self.status.exit_code()
    }

    /// Turns an aborted run into [`RunError::Aborted`].
    pub fn into_result(self) -> Result<RunSummary, RunError> {
        match self.abort_reason {
            Some(reason) => Err(RunError::Aborted(reason)),
            None => Ok(self),
        }
    }
}

/// Decides the final status from how the run ended.
pub(crate) fn resolve(
    interrupted: bool,
    fatal: Option<&str>,
    too_many_errors: Option<(u64, u64)>,
    failed: u64,
) -> (RunStatus, Option<AbortReason>) {
    if interrupted {
        return (RunStatus::Interrupted, Some(AbortReason::Interrupted));
    }
    if let Some(message) = fatal {
        return (
            RunStatus::AbortedFatalError,
            Some(AbortReason::Fatal(message.to_string())),
        );
    }
    if let Some((max_errors, failed)) = too_many_errors {
        return (
            RunStatus::AbortedTooManyErrors,
            Some(AbortReason::TooManyErrors { max_errors, failed }),
        );
    }
    if failed > 0 {
        (RunStatus::CompletedWithErrors, None)
    } else {
        (RunStatus::Ok, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_distinct() {
        let codes: Vec<_> = [
            RunStatus::Ok,
            RunStatus::CompletedWithErrors,
            RunStatus::AbortedTooManyErrors,
            RunStatus::AbortedFatalError,
            RunStatus::Interrupted,
        ]
        .iter()
        .map(RunStatus::exit_code)
        .collect();
        assert_eq!(codes, [0, 1, 2, 3, 4]);
    }

    #[test]
    fn interruption_wins_over_other_conditions() {
        let (status, reason) = resolve(true, Some("lost"), Some((2, 3)), 3);
        assert_eq!(status, RunStatus::Interrupted);
        assert_eq!(reason, Some(AbortReason::Interrupted));
    }

    #[test]
    fn errors_below_threshold_complete_with_errors() {
        assert_eq!(resolve(false, None, None, 3).0, RunStatus::CompletedWithErrors);
        assert_eq!(resolve(false, None, None, 0).0, RunStatus::Ok);
        assert_eq!(
            resolve(false, None, Some((2, 3)), 3),
            (
                RunStatus::AbortedTooManyErrors,
                Some(AbortReason::TooManyErrors {
                    max_errors: 2,
                    failed: 3
                })
            )
        );
    }
}
