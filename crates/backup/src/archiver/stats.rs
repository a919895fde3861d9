//! Aggregation of frame results over a whole job

use std::collections::HashMap;

use super::error::{FatalDeveloperError, FrameError};
use super::result::{FrameResult, SkipReason};

/// Counts and errors for one export or import job
#[derive(Debug, Clone, Default)]
pub struct BackupJobStats {
    pub successes: usize,
    pub partials: usize,
    pub failures: usize,
    pub skips: usize,
    pub errors: Vec<FrameError>,
    pub skip_reasons: HashMap<SkipReason, usize>,
}

impl BackupJobStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Account for one frame result and hand back its value
    ///
    /// Returns `Err` on the first fatal error; the job must stop. The
    /// fatal error is also kept in `errors`.
    pub fn record<T>(&mut self, result: FrameResult<T>) -> Result<Option<T>, FatalDeveloperError> {
        if let Some(fatal) = result.fatal_error() {
            log::error!("[JOB] Fatal developer error: {}", fatal);
            let fatal = fatal.clone();
            self.failures += 1;
            self.errors.extend(result.errors().iter().cloned());
            return Err(FatalDeveloperError(fatal));
        }

        match result {
            FrameResult::Success(value) => {
                self.successes += 1;
                Ok(Some(value))
            }
            FrameResult::Partial(value, errors) => {
                self.partials += 1;
                self.log_errors(&errors);
                self.errors.extend(errors);
                Ok(Some(value))
            }
            FrameResult::Failure(errors) => {
                self.failures += 1;
                self.log_errors(&errors);
                self.errors.extend(errors);
                Ok(None)
            }
            FrameResult::Skipped(reason) => {
                log::debug!("[JOB] Skipped: {}", reason);
                self.skips += 1;
                *self.skip_reasons.entry(reason).or_insert(0) += 1;
                Ok(None)
            }
        }
    }

    fn log_errors(&self, errors: &[FrameError]) {
        for error in errors {
            log::warn!("[JOB] {}", error);
        }
    }

    pub fn total(&self) -> usize {
        self.successes + self.partials + self.failures + self.skips
    }

    pub fn merge(&mut self, other: BackupJobStats) {
        self.successes += other.successes;
        self.partials += other.partials;
        self.failures += other.failures;
        self.skips += other.skips;
        self.errors.extend(other.errors);
        for (reason, count) in other.skip_reasons {
            *self.skip_reasons.entry(reason).or_insert(0) += count;
        }
    }
}
