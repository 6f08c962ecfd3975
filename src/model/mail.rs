//! Identifiers, messages and conversations.

use chrono::{DateTime, Utc};

use super::address::EmailAddress;
use super::attachment::MimePart;

/// Mailbox-local item identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct ItemId(pub u32);

/// Mailbox-local tag identifier. Queries bind to these, never to names.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct TagId(pub u32);

/// Mailbox-local folder identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct FolderId(pub u32);

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Summary metadata for a single message.
///
/// The body is not part of this record; it is loaded on demand through
/// the mailbox when a hit is inline-expanded.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Message {
    pub id: ItemId,

    /// Conversation this message belongs to.
    pub conversation_id: ItemId,

    pub folder: FolderId,

    #[serde(default)]
    pub tags: Vec<TagId>,

    /// Parsed `Date:` header.
    pub date: DateTime<Utc>,

    /// Total size in bytes.
    pub size: u64,

    /// First `From:` address.
    pub sender: EmailAddress,

    #[serde(default)]
    pub to: Vec<EmailAddress>,

    #[serde(default)]
    pub cc: Vec<EmailAddress>,

    #[serde(default)]
    pub subject: String,

    /// Short plain-text excerpt of the body.
    #[serde(default)]
    pub fragment: String,

    #[serde(default)]
    pub unread: bool,

    #[serde(default)]
    pub flagged: bool,

    /// Non-body MIME parts (attachments).
    #[serde(default)]
    pub parts: Vec<MimePart>,
}

impl Message {
    /// Whether the message carries at least one attachment.
    pub fn has_attachments(&self) -> bool {
        !self.parts.is_empty()
    }
}

/// Full body of a message, loaded on demand.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct MessageBody {
    /// Plain-text body (from the `text/plain` part).
    #[serde(default)]
    pub text: Option<String>,

    /// HTML body (from the `text/html` part, if present).
    #[serde(default)]
    pub html: Option<String>,
}

/// A conversation as seen by search: derived from its member messages.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Conversation {
    pub id: ItemId,
    /// Normalized subject (leading `Re:`/`Fwd:` removed).
    pub subject: String,
    pub message_count: usize,
    pub unread_count: usize,
    /// Distinct senders, in order of first appearance.
    pub senders: Vec<EmailAddress>,
    pub date: DateTime<Utc>,
}

/// Strip reply/forward prefixes so conversation subjects group.
pub fn normalize_subject(subject: &str) -> String {
    let mut s = subject.trim();
    loop {
        let lower = s.to_ascii_lowercase();
        let stripped = ["re:", "fwd:", "fw:", "aw:"]
            .iter()
            .find(|p| lower.starts_with(*p))
            .map(|p| s[p.len()..].trim_start());
        match stripped {
            Some(rest) => s = rest,
            None => return s.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_subject() {
        assert_eq!(normalize_subject("Re: RE: Fwd: Budget"), "Budget");
        assert_eq!(normalize_subject("  Budget  "), "Budget");
        assert_eq!(normalize_subject("Regarding the budget"), "Regarding the budget");
    }
}
