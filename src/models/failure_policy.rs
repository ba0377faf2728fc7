use std::fmt;

/// How a pipeline stage reacts when the generation backend lets it down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Any invocation or parse failure aborts the whole run.
    FailHard,
    /// Failures are logged and skipped; the affected items stay unprocessed.
    FailSoft,
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FailHard => write!(f, "fail-hard"),
            Self::FailSoft => write!(f, "fail-soft"),
        }
    }
}
