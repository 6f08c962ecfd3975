//! The search response: an append-only sink of rendered hit records.

use std::num::NonZeroUsize;

use lru::LruCache;
use serde::{Serialize, Serializer};

use crate::index::SortBy;
use crate::model::address::EmailAddress;

/// Everything a search hands back to its caller.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    /// The sort actually applied.
    #[serde(serialize_with = "sort_name")]
    pub sort_by: SortBy,
    /// The requested offset, echoed back.
    pub offset: usize,
    /// Whether another page exists.
    pub more: bool,
    pub hits: Vec<HitRecord>,
}

fn sort_name<S: Serializer>(sort: &SortBy, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(sort.as_str())
}

impl SearchResponse {
    pub fn new(sort_by: SortBy, offset: usize) -> Self {
        Self {
            sort_by,
            offset,
            more: false,
            hits: Vec::new(),
        }
    }

    pub fn push(&mut self, record: HitRecord) {
        self.hits.push(record);
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

/// One rendered hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HitRecord {
    Conversation(ConversationRecord),
    Message(MessageRecord),
    Part(PartRecord),
    Contact(ContactRecord),
    Note(NoteRecord),
    Appointment(AppointmentRecord),
    Document(DocumentRecord),
    Wiki(DocumentRecord),
    /// A remote record, passed through verbatim.
    #[serde(untagged)]
    Proxied(serde_json::Value),
}

impl HitRecord {
    /// Attach the sort field. Proxied records are never touched.
    pub fn set_sort_field(&mut self, value: String) {
        if let Some(common) = self.common_mut() {
            common.sort_field = Some(value);
        }
    }

    /// Replace the record id (used to qualify ids with the account).
    pub fn set_id(&mut self, id: String) {
        if let Some(common) = self.common_mut() {
            common.id = id;
        }
    }

    /// The record id, if this is a locally rendered record.
    pub fn id(&self) -> Option<&str> {
        self.common().map(|c| c.id.as_str())
    }

    pub fn sort_field(&self) -> Option<&str> {
        self.common().and_then(|c| c.sort_field.as_deref())
    }

    fn common(&self) -> Option<&RecordCommon> {
        match self {
            Self::Conversation(r) => Some(&r.common),
            Self::Message(r) => Some(&r.common),
            Self::Part(r) => Some(&r.common),
            Self::Contact(r) => Some(&r.common),
            Self::Note(r) => Some(&r.common),
            Self::Appointment(r) => Some(&r.common),
            Self::Document(r) | Self::Wiki(r) => Some(&r.common),
            Self::Proxied(_) => None,
        }
    }

    fn common_mut(&mut self) -> Option<&mut RecordCommon> {
        match self {
            Self::Conversation(r) => Some(&mut r.common),
            Self::Message(r) => Some(&mut r.common),
            Self::Part(r) => Some(&mut r.common),
            Self::Contact(r) => Some(&mut r.common),
            Self::Note(r) => Some(&mut r.common),
            Self::Appointment(r) => Some(&mut r.common),
            Self::Document(r) | Self::Wiki(r) => Some(&mut r.common),
            Self::Proxied(_) => None,
        }
    }
}

/// Fields every local record carries.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordCommon {
    pub id: String,
    /// Relevance; omitted when zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    /// Value of this hit under the response's sort, for cursors.
    #[serde(rename = "sf", skip_serializing_if = "Option::is_none")]
    pub sort_field: Option<String>,
}

impl RecordCommon {
    pub fn new(id: impl ToString, score: f32) -> Self {
        Self {
            id: id.to_string(),
            score: (score != 0.0).then_some(score),
            sort_field: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressRole {
    From,
    To,
    Cc,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmailRecord {
    pub role: AddressRole,
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BodyRecord {
    pub content_type: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageRecord {
    #[serde(flatten)]
    pub common: RecordCommon,
    pub conversation_id: String,
    pub date: String,
    pub size: u64,
    pub subject: String,
    /// `u` unread, `f` flagged, `a` has attachments.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub flags: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<u32>,
    pub addresses: Vec<EmailRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
    /// Present only when the hit was expanded inline.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<BodyRecord>,
    pub content_matched: bool,
    /// Names of MIME parts that matched the query.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub matched_parts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartRecord {
    #[serde(flatten)]
    pub common: RecordCommon,
    pub message_id: String,
    pub conversation_id: String,
    pub date: String,
    pub size: u64,
    pub part: String,
    pub content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    pub from: EmailRecord,
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConversationRecord {
    #[serde(flatten)]
    pub common: RecordCommon,
    pub subject: String,
    pub date: String,
    pub message_count: usize,
    pub unread_count: usize,
    pub senders: Vec<EmailRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
    /// Ids of the conversation's matching messages.
    pub messages: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactRecord {
    #[serde(flatten)]
    pub common: RecordCommon,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Only in full (inline) form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteRecord {
    #[serde(flatten)]
    pub common: RecordCommon,
    pub date: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppointmentRecord {
    #[serde(flatten)]
    pub common: RecordCommon,
    pub subject: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub location: String,
    pub start: String,
    pub end: String,
    pub content_matched: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRecord {
    #[serde(flatten)]
    pub common: RecordCommon,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub content_type: String,
    pub version: u32,
    pub size: u64,
    pub date: String,
}

/// Memoizes rendered addresses for one response.
///
/// Conversations and their messages repeat the same handful of senders;
/// each distinct address is rendered once per response. Never shared
/// between requests.
pub struct EmailCache {
    cache: LruCache<EmailAddress, (String, Option<String>)>,
    hits: usize,
}

impl EmailCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: LruCache::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
            hits: 0,
        }
    }

    pub fn render(&mut self, address: &EmailAddress, role: AddressRole) -> EmailRecord {
        if let Some((addr, name)) = self.cache.get(address) {
            self.hits += 1;
            return EmailRecord {
                role,
                address: addr.clone(),
                name: name.clone(),
            };
        }
        let rendered = (
            address.address.clone(),
            (!address.display_name.is_empty()).then(|| address.display_name.clone()),
        );
        self.cache.put(address.clone(), rendered.clone());
        EmailRecord {
            role,
            address: rendered.0,
            name: rendered.1,
        }
    }

    /// Lookups served from the cache so far.
    pub fn hits(&self) -> usize {
        self.hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_cache_reuses_entries() {
        let mut cache = EmailCache::new(4);
        let alice = EmailAddress::parse("Alice <alice@example.com>");
        let first = cache.render(&alice, AddressRole::From);
        let second = cache.render(&alice, AddressRole::To);
        assert_eq!(first.address, "alice@example.com");
        assert_eq!(first.name.as_deref(), Some("Alice"));
        assert_eq!(second.role, AddressRole::To);
        assert_eq!(cache.hits(), 1);
    }

    #[test]
    fn test_zero_capacity_cache_still_works() {
        let mut cache = EmailCache::new(0);
        let bob = EmailAddress::parse("bob@example.com");
        assert_eq!(cache.render(&bob, AddressRole::Cc).name, None);
    }

    #[test]
    fn test_sort_field_skips_proxied() {
        let mut record = HitRecord::Note(NoteRecord {
            common: RecordCommon::new(5, 0.0),
            date: "2024-01-01T00:00:00+00:00".to_string(),
            content: "x".to_string(),
        });
        record.set_sort_field("1704067200000".to_string());
        assert_eq!(record.sort_field(), Some("1704067200000"));

        let mut proxied = HitRecord::Proxied(serde_json::json!({"id": "acct-2:7"}));
        proxied.set_sort_field("x".to_string());
        assert_eq!(proxied.sort_field(), None);
        assert_eq!(proxied.id(), None);
    }

    #[test]
    fn test_serialized_shape() {
        let mut response = SearchResponse::new(SortBy::DateDesc, 0);
        let mut note = HitRecord::Note(NoteRecord {
            common: RecordCommon::new(5, 0.0),
            date: "2024-01-01T00:00:00+00:00".to_string(),
            content: "x".to_string(),
        });
        note.set_sort_field("17".to_string());
        response.push(note);
        response.push(HitRecord::Proxied(serde_json::json!({"id": "acct-2:7", "kind": "remote"})));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["sort_by"], "dateDesc");
        assert_eq!(json["more"], false);
        assert_eq!(json["hits"][0]["type"], "note");
        assert_eq!(json["hits"][0]["id"], "5");
        assert_eq!(json["hits"][0]["sf"], "17");
        assert!(json["hits"][0].get("score").is_none());
        assert_eq!(json["hits"][1], serde_json::json!({"id": "acct-2:7", "kind": "remote"}));
    }
}
