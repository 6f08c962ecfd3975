//! Sort orders and the per-hit sort values they produce.

use std::cmp::Ordering;
use std::fmt;

/// Result ordering requested by (and reported back to) the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortBy {
    None,
    DateAsc,
    #[default]
    DateDesc,
    SubjectAsc,
    SubjectDesc,
    /// Sender name (messages), full name (contacts).
    NameAsc,
    NameDesc,
    /// Relevance, highest first.
    ScoreDesc,
}

impl SortBy {
    /// Parse a wire sort name (case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "dateasc" => Some(Self::DateAsc),
            "datedesc" => Some(Self::DateDesc),
            "subjasc" => Some(Self::SubjectAsc),
            "subjdesc" => Some(Self::SubjectDesc),
            "nameasc" => Some(Self::NameAsc),
            "namedesc" => Some(Self::NameDesc),
            "score" | "scoredesc" => Some(Self::ScoreDesc),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::DateAsc => "dateAsc",
            Self::DateDesc => "dateDesc",
            Self::SubjectAsc => "subjAsc",
            Self::SubjectDesc => "subjDesc",
            Self::NameAsc => "nameAsc",
            Self::NameDesc => "nameDesc",
            Self::ScoreDesc => "score",
        }
    }

    pub const fn is_descending(self) -> bool {
        matches!(self, Self::DateDesc | Self::SubjectDesc | Self::NameDesc | Self::ScoreDesc)
    }

    /// Order two sort values the way results are emitted under this sort.
    pub fn compare(self, a: &SortKey, b: &SortKey) -> Ordering {
        let natural = a.natural_cmp(b);
        if self.is_descending() {
            natural.reverse()
        } else {
            natural
        }
    }

    /// Parse a sort value previously rendered with [`SortKey`]'s `Display`,
    /// as carried by a pagination cursor.
    pub fn parse_value(self, raw: &str) -> Option<SortKey> {
        match self {
            Self::None => Some(SortKey::None),
            Self::DateAsc | Self::DateDesc => raw.trim().parse().ok().map(SortKey::Date),
            Self::SubjectAsc | Self::SubjectDesc | Self::NameAsc | Self::NameDesc => {
                Some(SortKey::Text(raw.to_lowercase()))
            }
            Self::ScoreDesc => raw.trim().parse().ok().map(SortKey::Score),
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The sortable value of one hit under a given [`SortBy`].
#[derive(Debug, Clone, PartialEq)]
pub enum SortKey {
    None,
    /// Milliseconds since the Unix epoch.
    Date(i64),
    /// Lowercased subject or name.
    Text(String),
    Score(f32),
}

impl SortKey {
    /// Ascending comparison. Keys of different kinds order by kind so the
    /// ordering stays total when a result mixes them.
    fn natural_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Date(a), Self::Date(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            (Self::Score(a), Self::Score(b)) => a.total_cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::None => 0,
            Self::Date(_) => 1,
            Self::Text(_) => 2,
            Self::Score(_) => 3,
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => Ok(()),
            Self::Date(ms) => write!(f, "{ms}"),
            Self::Text(s) => f.write_str(s),
            Self::Score(s) => write!(f, "{s}"),
        }
    }
}
