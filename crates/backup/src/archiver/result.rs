//! Outcome type shared by every archiver and restorer

use std::fmt;
use std::ops::ControlFlow;

use super::error::FrameError;

/// Why a record was intentionally not archived or restored
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Legacy local kind that has no wire representation
    LegacyKindNotArchived(&'static str),
    /// Decryption placeholder whose resend window is still open
    RecoveryWindowOpen,
    /// Recognized on the wire, not yet supported locally
    ReleaseChannelDonationRequest,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::LegacyKindNotArchived(kind) => write!(f, "legacy {} is not archived", kind),
            SkipReason::RecoveryWindowOpen => write!(f, "decryption may still be recovered"),
            SkipReason::ReleaseChannelDonationRequest => {
                write!(f, "release channel donation requests are not restored")
            }
        }
    }
}

/// Result of archiving or restoring one record
///
/// `Partial` carries a usable value; for restores it means the row was
/// inserted but some sub-objects failed.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameResult<T, E = FrameError> {
    Success(T),
    Partial(T, Vec<E>),
    Failure(Vec<E>),
    Skipped(SkipReason),
}

/// Export outcome: the wire payload or errors
pub type ArchiveResult<T> = FrameResult<T>;

/// Import outcome; the value is usually `()`
pub type RestoreResult<T = ()> = FrameResult<T>;

impl<T, E> FrameResult<T, E> {
    pub fn success(value: T) -> Self {
        FrameResult::Success(value)
    }

    /// `Success` when `errors` is empty
    pub fn partial_failure(value: T, errors: Vec<E>) -> Self {
        if errors.is_empty() {
            FrameResult::Success(value)
        } else {
            FrameResult::Partial(value, errors)
        }
    }

    pub fn partial_restore(value: T, errors: Vec<E>) -> Self {
        Self::partial_failure(value, errors)
    }

    pub fn complete_failure(errors: Vec<E>) -> Self {
        FrameResult::Failure(errors)
    }

    pub fn message_failure(errors: Vec<E>) -> Self {
        FrameResult::Failure(errors)
    }

    pub fn skippable(reason: SkipReason) -> Self {
        FrameResult::Skipped(reason)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FrameResult::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, FrameResult::Failure(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, FrameResult::Skipped(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            FrameResult::Success(value) | FrameResult::Partial(value, _) => Some(value),
            FrameResult::Failure(_) | FrameResult::Skipped(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            FrameResult::Success(value) | FrameResult::Partial(value, _) => Some(value),
            FrameResult::Failure(_) | FrameResult::Skipped(_) => None,
        }
    }

    pub fn errors(&self) -> &[E] {
        match self {
            FrameResult::Partial(_, errors) | FrameResult::Failure(errors) => errors,
            FrameResult::Success(_) | FrameResult::Skipped(_) => &[],
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FrameResult<U, E> {
        match self {
            FrameResult::Success(value) => FrameResult::Success(f(value)),
            FrameResult::Partial(value, errors) => FrameResult::Partial(f(value), errors),
            FrameResult::Failure(errors) => FrameResult::Failure(errors),
            FrameResult::Skipped(reason) => FrameResult::Skipped(reason),
        }
    }

    /// Fold this result into an ongoing error list
    ///
    /// Continues with the value for `Success`/`Partial` (errors appended).
    /// Breaks with a `Failure` carrying every error gathered so far, or
    /// with the `Skipped` reason.
    pub fn bubble_up<U>(self, errors: &mut Vec<E>) -> ControlFlow<FrameResult<U, E>, T> {
        match self {
            FrameResult::Success(value) => ControlFlow::Continue(value),
            FrameResult::Partial(value, more) => {
                errors.extend(more);
                ControlFlow::Continue(value)
            }
            FrameResult::Failure(more) => {
                errors.extend(more);
                ControlFlow::Break(FrameResult::Failure(std::mem::take(errors)))
            }
            FrameResult::Skipped(reason) => ControlFlow::Break(FrameResult::Skipped(reason)),
        }
    }
}

impl<T> FrameResult<T, FrameError> {
    /// First fatal error, if any
    pub fn fatal_error(&self) -> Option<&FrameError> {
        self.errors().iter().find(|e| e.is_fatal())
    }
}

/// Unwrap a [`FrameResult`] into its value or return early from the
/// enclosing function with the accumulated failure
macro_rules! bubble_up {
    ($result:expr, $errors:expr) => {
        match $result.bubble_up(&mut $errors) {
            ::std::ops::ControlFlow::Continue(value) => value,
            ::std::ops::ControlFlow::Break(early) => return early,
        }
    };
}

pub(crate) use bubble_up;
