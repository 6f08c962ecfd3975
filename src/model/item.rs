//! Non-message mailbox items, tags, folders and the item-type vocabulary.

use chrono::{DateTime, Utc};

use super::mail::{FolderId, ItemId, Message, TagId};

/// A user tag.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub name: String,
}

/// A mail folder.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Folder {
    pub id: FolderId,
    pub name: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Contact {
    pub id: ItemId,
    pub folder: FolderId,
    #[serde(default)]
    pub tags: Vec<TagId>,
    pub full_name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Note {
    pub id: ItemId,
    pub folder: FolderId,
    #[serde(default)]
    pub tags: Vec<TagId>,
    pub content: String,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Appointment {
    pub id: ItemId,
    pub folder: FolderId,
    #[serde(default)]
    pub tags: Vec<TagId>,
    pub subject: String,
    #[serde(default)]
    pub location: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Kind of a stored document. Kinds this crate does not know are kept
/// verbatim so they can be reported instead of silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Document,
    Wiki,
    #[serde(untagged)]
    Other(String),
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Document {
    pub id: ItemId,
    pub folder: FolderId,
    #[serde(default)]
    pub tags: Vec<TagId>,
    pub kind: DocumentKind,
    pub name: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default = "first_version")]
    pub version: u32,
    pub size: u64,
    pub date: DateTime<Utc>,
}

fn first_version() -> u32 {
    1
}

/// Any searchable item in a mailbox.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MailItem {
    Message(Message),
    Contact(Contact),
    Note(Note),
    Appointment(Appointment),
    Document(Document),
}

impl MailItem {
    pub fn id(&self) -> ItemId {
        match self {
            Self::Message(m) => m.id,
            Self::Contact(c) => c.id,
            Self::Note(n) => n.id,
            Self::Appointment(a) => a.id,
            Self::Document(d) => d.id,
        }
    }

    pub fn folder(&self) -> FolderId {
        match self {
            Self::Message(m) => m.folder,
            Self::Contact(c) => c.folder,
            Self::Note(n) => n.folder,
            Self::Appointment(a) => a.folder,
            Self::Document(d) => d.folder,
        }
    }

    pub fn tags(&self) -> &[TagId] {
        match self {
            Self::Message(m) => &m.tags,
            Self::Contact(c) => &c.tags,
            Self::Note(n) => &n.tags,
            Self::Appointment(a) => &a.tags,
            Self::Document(d) => &d.tags,
        }
    }

    /// Date used for date constraints and date sorting.
    /// Appointments use their start time.
    pub fn date(&self) -> DateTime<Utc> {
        match self {
            Self::Message(m) => m.date,
            Self::Contact(c) => c.date,
            Self::Note(n) => n.date,
            Self::Appointment(a) => a.start,
            Self::Document(d) => d.date,
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Self::Message(m) => m.size,
            Self::Document(d) => d.size,
            Self::Note(n) => n.content.len() as u64,
            Self::Contact(_) | Self::Appointment(_) => 0,
        }
    }

    /// The result type this item is reported under.
    pub fn item_type(&self) -> ItemType {
        match self {
            Self::Message(_) => ItemType::Message,
            Self::Contact(_) => ItemType::Contact,
            Self::Note(_) => ItemType::Note,
            Self::Appointment(_) => ItemType::Appointment,
            Self::Document(d) if d.kind == DocumentKind::Wiki => ItemType::Wiki,
            Self::Document(_) => ItemType::Document,
        }
    }

    /// Value used for subject sorting.
    pub fn subject(&self) -> &str {
        match self {
            Self::Message(m) => &m.subject,
            Self::Contact(c) => &c.full_name,
            Self::Note(n) => &n.content,
            Self::Appointment(a) => &a.subject,
            Self::Document(d) => &d.name,
        }
    }
}

/// Result types a search can be asked to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ItemType {
    Conversation,
    Message,
    /// Individual matched MIME parts.
    Part,
    Contact,
    Appointment,
    Document,
    Wiki,
    Note,
}

impl ItemType {
    /// Parse a request type name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "conversation" => Some(Self::Conversation),
            "message" => Some(Self::Message),
            "part" => Some(Self::Part),
            "contact" => Some(Self::Contact),
            "appointment" => Some(Self::Appointment),
            "document" => Some(Self::Document),
            "wiki" => Some(Self::Wiki),
            "note" => Some(Self::Note),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Conversation => "conversation",
            Self::Message => "message",
            Self::Part => "part",
            Self::Contact => "contact",
            Self::Appointment => "appointment",
            Self::Document => "document",
            Self::Wiki => "wiki",
            Self::Note => "note",
        }
    }
}
