//! Scheduling classes and their precedence table.

use serde::{Deserialize, Serialize};

/// Scheduling class of a job. Precedence comes from [`JobPriority::ORDER`], not from
/// declaration order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobPriority {
    /// Page the user is looking at right now.
    Top,
    /// Pages adjacent to the current one.
    Hi,
    #[default]
    Default,
    PageThumbnail,
    BookThumbnail,
    FolderThumbnail,
    Low,
}

impl JobPriority {
    /// Number of priority levels.
    pub const COUNT: usize = 7;

    /// Dequeue precedence, highest first. Index in this table is the level's rank.
    pub const ORDER: [JobPriority; JobPriority::COUNT] = [
        JobPriority::Top,
        JobPriority::Hi,
        JobPriority::Default,
        JobPriority::PageThumbnail,
        JobPriority::BookThumbnail,
        JobPriority::FolderThumbnail,
        JobPriority::Low,
    ];

    /// Position in [`Self::ORDER`]; 0 is dequeued first.
    pub const fn rank(self) -> usize {
        match self {
            JobPriority::Top => 0,
            JobPriority::Hi => 1,
            JobPriority::Default => 2,
            JobPriority::PageThumbnail => 3,
            JobPriority::BookThumbnail => 4,
            JobPriority::FolderThumbnail => 5,
            JobPriority::Low => 6,
        }
    }

    /// True when `self` is dequeued before `other`.
    pub fn precedes(self, other: JobPriority) -> bool {
        self.rank() < other.rank()
    }
}

impl std::str::FromStr for JobPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        JobPriority::ORDER
            .iter()
            .copied()
            .find(|p| format!("{p:?}").to_ascii_lowercase() == lower.replace('-', ""))
            .ok_or_else(|| format!("unknown priority '{s}'"))
    }
}
