/// Page status definitions
use std::fmt;

/// Represents the recorded outcome of a visited URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageStatus {
    /// Page was fetched and recorded; not (yet) analyzed
    Discovered,

    /// Page was analyzed and its content handed to the indexer
    Analyzed,

    /// Fetch, render, extraction, or robots check failed
    Failed,
}

impl PageStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Discovered => "discovered",
            Self::Analyzed => "analyzed",
            Self::Failed => "failed",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "discovered" => Some(Self::Discovered),
            "analyzed" => Some(Self::Analyzed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
