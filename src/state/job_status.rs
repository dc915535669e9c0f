/// Job status definitions and the allowed lifecycle transitions
use std::fmt;

/// Represents the lifecycle state of a crawl job
///
/// Transitions are one-directional:
/// `Pending -> Processing -> {Completed | Failed | Cancelled}`.
/// A pending job may also fail or be cancelled before it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    /// Job has been submitted but traversal has not started
    Pending,

    /// Traversal is running
    Processing,

    /// Root traversal returned normally
    Completed,

    /// An unrecovered error escaped the traversal
    Failed,

    /// The job's cancellation token fired
    Cancelled,
}

impl JobStatus {
    /// Returns true if no further transition is possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Checks whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (Self::Pending, Self::Processing) => true,
            (Self::Pending, Self::Failed | Self::Cancelled) => true,
            (Self::Processing, Self::Completed | Self::Failed | Self::Cancelled) => true,
            _ => false,
        }
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
