// =============================================================================
// Shared types used across the coin-socket service
// =============================================================================

use serde::{Deserialize, Serialize};

/// Ordering applied to the quote list before it is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOption {
    /// Ascending by symbol.
    Name,
    /// Descending by last price.
    Price,
    /// Descending by 24h change percent.
    Change,
}

impl Default for SortOption {
    fn default() -> Self {
        Self::Name
    }
}

impl std::fmt::Display for SortOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::Price => write!(f, "price"),
            Self::Change => write!(f, "change"),
        }
    }
}

impl std::str::FromStr for SortOption {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" | "symbol" => Ok(Self::Name),
            "price" => Ok(Self::Price),
            "change" => Ok(Self::Change),
            other => anyhow::bail!("unknown sort option '{other}'"),
        }
    }
}

/// Lifecycle of a single ingestion session.
///
/// There is no reconnecting state. A failed session stays failed
/// until a caller starts a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FeedStatus {
    Idle,
    Connecting,
    Streaming,
    Failed,
    Cancelled,
}

impl Default for FeedStatus {
    fn default() -> Self {
        Self::Idle
    }
}

impl std::fmt::Display for FeedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Streaming => write!(f, "Streaming"),
            Self::Failed => write!(f, "Failed"),
            Self::Cancelled => write!(f, "Cancelled"),
        }
    }
}
