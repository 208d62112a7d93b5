use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

/// Git commit information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub hash: String,
    pub author: Author,
    /// Full message with surrounding whitespace trimmed
    pub message: String,
    pub timestamp: Timestamp,
}

impl Commit {
    pub fn short_hash(&self) -> &str {
        self.hash.get(..7).unwrap_or(&self.hash)
    }

    /// First line of the message
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }
}

/// Commit author information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub email: String,
}

impl Author {
    /// Case-insensitive substring match against `Name <email>`, as `git log --author` does.
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        format!("{} <{}>", self.name, self.email)
            .to_lowercase()
            .contains(needle)
    }
}

/// Authored time (Unix timestamp with timezone offset in minutes)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub offset_minutes: i32,
}

impl Timestamp {
    pub fn new(seconds: i64, offset_minutes: i32) -> Self {
        Self {
            seconds,
            offset_minutes,
        }
    }

    pub fn to_datetime(&self) -> Option<DateTime<FixedOffset>> {
        let offset = FixedOffset::east_opt(self.offset_minutes * 60)?;
        DateTime::from_timestamp(self.seconds, 0).map(|utc| utc.with_timezone(&offset))
    }

    /// ISO-8601 in the author's own offset, e.g. `2024-05-01T12:30:00+02:00`
    pub fn to_rfc3339(&self) -> String {
        self.to_datetime()
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| self.seconds.to_string())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M")),
            None => write!(f, "{}", self.seconds),
        }
    }
}
