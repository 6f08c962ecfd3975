//! Search hits: one matched result item, typed by content kind.
//!
//! [`Hit`] is a closed sum type. The dispatcher matches on it exhaustively,
//! so a new kind cannot be added without teaching every consumer about it.

use crate::model::attachment::MimePart;
use crate::model::item::{Appointment, Contact, Document, Note};
use crate::model::mail::{Conversation, Message};
use crate::model::ItemId;

use super::sort::{SortBy, SortKey};

#[derive(Debug, Clone)]
pub struct MessageHit {
    pub message: Message,
    /// Relevance; 0 means unscored.
    pub score: f32,
    /// MIME parts whose metadata matched the query.
    pub matched_parts: Vec<MessagePartHit>,
}

#[derive(Debug, Clone)]
pub struct MessagePartHit {
    /// The message the part belongs to.
    pub message: Message,
    pub part: MimePart,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct ConversationHit {
    pub conversation: Conversation,
    /// Matching messages of the conversation, in result order.
    pub message_hits: Vec<MessageHit>,
    pub score: f32,
}

impl ConversationHit {
    pub fn first_message_hit(&self) -> Option<&MessageHit> {
        self.message_hits.first()
    }
}

#[derive(Debug, Clone)]
pub struct ContactHit {
    pub contact: Contact,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct NoteHit {
    pub note: Note,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct AppointmentHit {
    pub appointment: Appointment,
    pub score: f32,
}

#[derive(Debug, Clone)]
pub struct DocumentHit {
    pub document: Document,
    pub score: f32,
}

/// A hit produced by another mailbox, already serialized there.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProxiedHit {
    pub account_id: String,
    pub item_id: ItemId,
    /// Remote sort value, rendered the way [`SortKey`] displays.
    pub sort_value: String,
    /// The remote record, passed through untouched.
    pub element: serde_json::Value,
}

#[derive(Debug, Clone)]
pub enum Hit {
    Message(MessageHit),
    MessagePart(MessagePartHit),
    Conversation(ConversationHit),
    Contact(ContactHit),
    Note(NoteHit),
    Appointment(AppointmentHit),
    Document(DocumentHit),
    Proxied(ProxiedHit),
    /// An item kind the executor knows but this layer cannot render.
    Other { item_id: ItemId, kind: String },
}

impl Hit {
    pub fn item_id(&self) -> ItemId {
        match self {
            Self::Message(h) => h.message.id,
            Self::MessagePart(h) => h.message.id,
            Self::Conversation(h) => h.conversation.id,
            Self::Contact(h) => h.contact.id,
            Self::Note(h) => h.note.id,
            Self::Appointment(h) => h.appointment.id,
            Self::Document(h) => h.document.id,
            Self::Proxied(h) => h.item_id,
            Self::Other { item_id, .. } => *item_id,
        }
    }

    pub fn score(&self) -> f32 {
        match self {
            Self::Message(h) => h.score,
            Self::MessagePart(h) => h.score,
            Self::Conversation(h) => h.score,
            Self::Contact(h) => h.score,
            Self::Note(h) => h.score,
            Self::Appointment(h) => h.score,
            Self::Document(h) => h.score,
            Self::Proxied(_) | Self::Other { .. } => 0.0,
        }
    }

    /// Short kind name for diagnostics.
    pub fn kind_name(&self) -> &str {
        match self {
            Self::Message(_) => "message",
            Self::MessagePart(_) => "part",
            Self::Conversation(_) => "conversation",
            Self::Contact(_) => "contact",
            Self::Note(_) => "note",
            Self::Appointment(_) => "appointment",
            Self::Document(_) => "document",
            Self::Proxied(_) => "proxied",
            Self::Other { kind, .. } => kind,
        }
    }

    /// The value this hit is ordered by under `sort`.
    pub fn sort_key(&self, sort: SortBy) -> SortKey {
        match sort {
            SortBy::None => SortKey::None,
            SortBy::ScoreDesc => SortKey::Score(self.score()),
            SortBy::DateAsc | SortBy::DateDesc => match self.date_millis() {
                Some(ms) => SortKey::Date(ms),
                None => self.proxied_key(sort),
            },
            SortBy::SubjectAsc | SortBy::SubjectDesc => match self.subject() {
                Some(s) => SortKey::Text(s.to_lowercase()),
                None => self.proxied_key(sort),
            },
            SortBy::NameAsc | SortBy::NameDesc => match self.name() {
                Some(s) => SortKey::Text(s.to_lowercase()),
                None => self.proxied_key(sort),
            },
        }
    }

    fn proxied_key(&self, sort: SortBy) -> SortKey {
        match self {
            Self::Proxied(h) => sort
                .parse_value(&h.sort_value)
                .unwrap_or_else(|| SortKey::Text(h.sort_value.clone())),
            _ => SortKey::None,
        }
    }

    fn date_millis(&self) -> Option<i64> {
        let date = match self {
            Self::Message(h) => h.message.date,
            Self::MessagePart(h) => h.message.date,
            Self::Conversation(h) => h.conversation.date,
            Self::Contact(h) => h.contact.date,
            Self::Note(h) => h.note.date,
            Self::Appointment(h) => h.appointment.start,
            Self::Document(h) => h.document.date,
            Self::Proxied(_) | Self::Other { .. } => return None,
        };
        Some(date.timestamp_millis())
    }

    fn subject(&self) -> Option<&str> {
        match self {
            Self::Message(h) => Some(&h.message.subject),
            Self::MessagePart(h) => Some(&h.message.subject),
            Self::Conversation(h) => Some(&h.conversation.subject),
            Self::Contact(h) => Some(&h.contact.full_name),
            Self::Note(h) => Some(&h.note.content),
            Self::Appointment(h) => Some(&h.appointment.subject),
            Self::Document(h) => Some(&h.document.name),
            Self::Proxied(_) | Self::Other { .. } => None,
        }
    }

    fn name(&self) -> Option<&str> {
        match self {
            Self::Message(h) => Some(&h.message.sender.address),
            Self::MessagePart(h) => Some(&h.message.sender.address),
            Self::Conversation(h) => h.conversation.senders.first().map(|a| a.address.as_str()),
            Self::Contact(h) => Some(&h.contact.full_name),
            Self::Proxied(_) | Self::Other { .. } => None,
            // Items without a sender fall back to their title.
            _ => self.subject(),
        }
    }
}
