//! A mailbox held entirely in memory, optionally backed by a JSON file.
//!
//! File layout:
//!
//! ```json
//! {
//!   "account_id": "acct-1",
//!   "tags":    [{"id": 64, "name": "work"}],
//!   "folders": [{"id": 2, "name": "inbox"}],
//!   "items":   [{"type": "message", "id": 1, ...}],
//!   "bodies":  {"1": {"text": "...", "html": "..."}},
//!   "remote_hits": [{"account_id": "acct-2", "item_id": 7, "sort_value": "...", "element": {...}}]
//! }
//! ```
//!
//! `remote_hits` stand in for results contributed by other mailboxes; they
//! are merged into every search.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SearchError};
use crate::index::hit::{
    AppointmentHit, ContactHit, ConversationHit, DocumentHit, MessageHit, MessagePartHit, NoteHit,
    ProxiedHit,
};
use crate::index::{Hit, QueryOperation, SortBy, SortKey};
use crate::model::item::{DocumentKind, Folder, Tag};
use crate::model::mail::{normalize_subject, Conversation, Message, MessageBody};
use crate::model::{ItemId, ItemType, MailItem};
use crate::query::{Analyzer, StandardAnalyzer};
use crate::search::params::SearchParams;

use super::eval::{self, Candidate};
use super::{HitStream, Mailbox, QueryResults};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MailboxData {
    account_id: String,
    #[serde(default)]
    tags: Vec<Tag>,
    #[serde(default)]
    folders: Vec<Folder>,
    #[serde(default)]
    items: Vec<MailItem>,
    #[serde(default)]
    bodies: BTreeMap<ItemId, MessageBody>,
    #[serde(default)]
    remote_hits: Vec<ProxiedHit>,
}

impl MailboxData {
    fn messages(&self) -> impl Iterator<Item = &Message> {
        self.items.iter().filter_map(|item| match item {
            MailItem::Message(m) => Some(m),
            _ => None,
        })
    }
}

pub struct MemoryMailbox {
    account_id: String,
    analyzer: StandardAnalyzer,
    data: RwLock<MailboxData>,
}

impl std::fmt::Debug for MemoryMailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryMailbox")
            .field("account_id", &self.account_id)
            .finish_non_exhaustive()
    }
}

impl MemoryMailbox {
    pub fn builder(account_id: impl Into<String>) -> MemoryMailboxBuilder {
        MemoryMailboxBuilder {
            data: MailboxData {
                account_id: account_id.into(),
                ..MailboxData::default()
            },
        }
    }

    /// Load a mailbox file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| SearchError::io(path, e))?;
        let data: MailboxData = serde_json::from_str(&contents)?;
        tracing::info!(
            path = %path.display(),
            account = %data.account_id,
            items = data.items.len(),
            "Loaded mailbox"
        );
        Ok(Self::from_data(data))
    }

    /// Write the current state back to `path`, including read-flag changes.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&*self.read())?;
        std::fs::write(path, json).map_err(|e| SearchError::io(path, e))?;
        tracing::info!(path = %path.display(), "Saved mailbox");
        Ok(())
    }

    /// Number of stored items, excluding remote hits.
    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` is an unread message.
    pub fn is_unread(&self, id: ItemId) -> bool {
        self.read().messages().any(|m| m.id == id && m.unread)
    }

    fn from_data(data: MailboxData) -> Self {
        Self {
            account_id: data.account_id.clone(),
            analyzer: StandardAnalyzer,
            data: RwLock::new(data),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, MailboxData> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MailboxData> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct MemoryMailboxBuilder {
    data: MailboxData,
}

impl MemoryMailboxBuilder {
    pub fn tag(mut self, tag: Tag) -> Self {
        self.data.tags.push(tag);
        self
    }

    pub fn folder(mut self, folder: Folder) -> Self {
        self.data.folders.push(folder);
        self
    }

    pub fn item(mut self, item: MailItem) -> Self {
        self.data.items.push(item);
        self
    }

    pub fn body(mut self, id: ItemId, body: MessageBody) -> Self {
        self.data.bodies.insert(id, body);
        self
    }

    pub fn remote_hit(mut self, hit: ProxiedHit) -> Self {
        self.data.remote_hits.push(hit);
        self
    }

    pub fn build(self) -> MemoryMailbox {
        MemoryMailbox::from_data(self.data)
    }
}

impl Mailbox for MemoryMailbox {
    fn account_id(&self) -> &str {
        &self.account_id
    }

    fn analyzer(&self) -> &dyn Analyzer {
        &self.analyzer
    }

    fn tag_by_name(&self, name: &str) -> Result<Tag> {
        self.read()
            .tags
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| SearchError::not_found("tag", name))
    }

    fn folder_by_name(&self, name: &str) -> Result<Folder> {
        self.read()
            .folders
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| SearchError::not_found("folder", name))
    }

    fn mark_read(&self, ids: &[ItemId]) -> Result<()> {
        let mut data = self.write();
        for id in ids {
            let message = data
                .items
                .iter_mut()
                .find_map(|item| match item {
                    MailItem::Message(m) if m.id == *id => Some(m),
                    _ => None,
                })
                .ok_or_else(|| SearchError::not_found("message", id.to_string()))?;
            message.unread = false;
        }
        tracing::debug!(count = ids.len(), "Marked messages read");
        Ok(())
    }

    fn load_body(&self, id: ItemId) -> Result<MessageBody> {
        let data = self.read();
        if !data.messages().any(|m| m.id == id) {
            return Err(SearchError::not_found("message", id.to_string()));
        }
        Ok(data.bodies.get(&id).cloned().unwrap_or_default())
    }

    fn execute(&self, op: &QueryOperation, params: &SearchParams) -> Result<QueryResults> {
        let mut sort_by = params.sort_by();
        if sort_by == SortBy::ScoreDesc && !op.has_text_operation() {
            tracing::debug!("No text clause to score, sorting by date");
            sort_by = SortBy::DateDesc;
        }

        let data = self.read();
        let mut hits = Vec::new();
        let mut conversations: Vec<(ItemId, Vec<MessageHit>)> = Vec::new();
        let mut conversation_slots: HashMap<ItemId, usize> = HashMap::new();

        for item in &data.items {
            let candidate = Candidate {
                item,
                body: data.bodies.get(&item.id()),
            };
            if !eval::matches(op, candidate, &self.analyzer) {
                continue;
            }
            let score = eval::score(op, candidate, &self.analyzer);

            match item {
                MailItem::Message(m) => {
                    let matched = eval::matched_parts(op, m, &self.analyzer);
                    if params.wants(ItemType::Part) {
                        let parts = if matched.is_empty() {
                            m.parts.iter().collect()
                        } else {
                            matched.clone()
                        };
                        hits.extend(parts.into_iter().map(|part| {
                            Hit::MessagePart(MessagePartHit {
                                message: m.clone(),
                                part: part.clone(),
                                score,
                            })
                        }));
                    }

                    let message_hit = MessageHit {
                        message: m.clone(),
                        score,
                        matched_parts: matched
                            .into_iter()
                            .map(|part| MessagePartHit {
                                message: m.clone(),
                                part: part.clone(),
                                score,
                            })
                            .collect(),
                    };
                    if params.wants(ItemType::Conversation) {
                        let slot = *conversation_slots.entry(m.conversation_id).or_insert_with(|| {
                            conversations.push((m.conversation_id, Vec::new()));
                            conversations.len() - 1
                        });
                        conversations[slot].1.push(message_hit);
                    } else if params.wants(ItemType::Message) {
                        hits.push(Hit::Message(message_hit));
                    }
                }
                MailItem::Contact(c) if params.wants(ItemType::Contact) => {
                    hits.push(Hit::Contact(ContactHit {
                        contact: c.clone(),
                        score,
                    }));
                }
                MailItem::Note(n) if params.wants(ItemType::Note) => {
                    hits.push(Hit::Note(NoteHit {
                        note: n.clone(),
                        score,
                    }));
                }
                MailItem::Appointment(a) if params.wants(ItemType::Appointment) => {
                    hits.push(Hit::Appointment(AppointmentHit {
                        appointment: a.clone(),
                        score,
                    }));
                }
                MailItem::Document(d) => match &d.kind {
                    DocumentKind::Document if params.wants(ItemType::Document) => {
                        hits.push(Hit::Document(DocumentHit {
                            document: d.clone(),
                            score,
                        }));
                    }
                    DocumentKind::Wiki if params.wants(ItemType::Wiki) => {
                        hits.push(Hit::Document(DocumentHit {
                            document: d.clone(),
                            score,
                        }));
                    }
                    DocumentKind::Other(kind) if params.wants(ItemType::Document) => {
                        hits.push(Hit::Other {
                            item_id: d.id,
                            kind: kind.clone(),
                        });
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        for (id, mut message_hits) in conversations {
            sort_hits_by(&mut message_hits, sort_by, |h| {
                (Hit::Message(h.clone()).sort_key(sort_by), h.message.id)
            });
            let score = message_hits.iter().map(|h| h.score).fold(0.0, f32::max);
            if let Some(conversation) = summarize_conversation(&data, id, &message_hits) {
                hits.push(Hit::Conversation(ConversationHit {
                    conversation,
                    message_hits,
                    score,
                }));
            }
        }

        hits.extend(data.remote_hits.iter().cloned().map(Hit::Proxied));
        sort_hits_by(&mut hits, sort_by, |h| (h.sort_key(sort_by), h.item_id()));

        tracing::debug!(
            operation = %op,
            sort = %sort_by,
            hits = hits.len(),
            "Executed query"
        );

        Ok(QueryResults {
            sort_by,
            hits: Box::new(VecHitStream::new(hits)),
        })
    }
}

/// Stable sort by `key`, ties broken by item id ascending.
fn sort_hits_by<T>(items: &mut Vec<T>, sort_by: SortBy, key: impl Fn(&T) -> (SortKey, ItemId)) {
    if sort_by == SortBy::None {
        return;
    }
    let mut keyed: Vec<((SortKey, ItemId), T)> = items.drain(..).map(|t| (key(&t), t)).collect();
    keyed.sort_by(|(a, _), (b, _)| sort_by.compare(&a.0, &b.0).then(a.1.cmp(&b.1)));
    items.extend(keyed.into_iter().map(|(_, t)| t));
}

/// Build the conversation record from all of its member messages, not just
/// the matching ones.
fn summarize_conversation(
    data: &MailboxData,
    id: ItemId,
    message_hits: &[MessageHit],
) -> Option<Conversation> {
    let mut members: Vec<&Message> = data.messages().filter(|m| m.conversation_id == id).collect();
    if members.is_empty() {
        members = message_hits.iter().map(|h| &h.message).collect();
    }
    members.sort_by_key(|m| (m.date, m.id));

    let first = members.first()?;
    let last = members.last()?;
    let mut senders = Vec::new();
    for m in &members {
        if !senders.contains(&m.sender) {
            senders.push(m.sender.clone());
        }
    }

    Some(Conversation {
        id,
        subject: normalize_subject(&first.subject),
        message_count: members.len(),
        unread_count: members.iter().filter(|m| m.unread).count(),
        senders,
        date: last.date,
    })
}

/// Hit stream over results computed up front.
struct VecHitStream {
    hits: std::vec::IntoIter<Hit>,
    closed: bool,
}

impl VecHitStream {
    fn new(hits: Vec<Hit>) -> Self {
        Self {
            hits: hits.into_iter(),
            closed: false,
        }
    }
}

impl Iterator for VecHitStream {
    type Item = Result<Hit>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        self.hits.next().map(Ok)
    }
}

impl HitStream for VecHitStream {
    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.hits = Vec::new().into_iter();
            tracing::trace!("Closed hit stream");
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::config::SearchConfig;
    use crate::index::operation::{TextField, TextOperation};
    use crate::index::DbQueryOperation;
    use crate::model::address::EmailAddress;
    use crate::model::attachment::MimePart;
    use crate::model::item::{Contact, Document};
    use crate::model::{FolderId, TagId};
    use crate::search::params::SearchRequest;

    fn message(id: u32, conv: u32, day: u32, subject: &str) -> MailItem {
        MailItem::Message(Message {
            id: ItemId(id),
            conversation_id: ItemId(conv),
            folder: FolderId(2),
            tags: vec![],
            date: Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap(),
            size: 1000 * u64::from(id),
            sender: EmailAddress::parse(&format!("user{id}@example.com")),
            to: vec![],
            cc: vec![],
            subject: subject.to_string(),
            fragment: String::new(),
            unread: true,
            flagged: false,
            parts: vec![],
        })
    }

    fn mailbox() -> MemoryMailbox {
        MemoryMailbox::builder("acct-1")
            .tag(Tag {
                id: TagId(64),
                name: "Work".to_string(),
            })
            .folder(Folder {
                id: FolderId(2),
                name: "Inbox".to_string(),
            })
            .item(message(1, 100, 1, "Budget"))
            .item(message(2, 100, 3, "Re: Budget"))
            .item(message(3, 200, 2, "Lunch"))
            .item(MailItem::Contact(Contact {
                id: ItemId(10),
                folder: FolderId(7),
                tags: vec![],
                full_name: "Budget Office".to_string(),
                email: Some("budget@example.com".to_string()),
                company: None,
                date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            }))
            .build()
    }

    fn params(types: &str, sort: &str) -> SearchParams {
        let request = SearchRequest {
            types: Some(types.to_string()),
            sort_by: Some(sort.to_string()),
            ..SearchRequest::default()
        };
        SearchParams::from_request(&request, &SearchConfig::default()).unwrap()
    }

    fn ids(results: QueryResults) -> Vec<u32> {
        results.hits.map(|h| h.unwrap().item_id().0).collect()
    }

    fn subject(term: &str) -> QueryOperation {
        QueryOperation::Text(TextOperation {
            field: TextField::Any,
            terms: vec![term.to_string()],
            bool: true,
        })
    }

    #[test]
    fn test_names_resolve_case_insensitively() {
        let mbox = mailbox();
        assert_eq!(mbox.tag_by_name("work").unwrap().id, TagId(64));
        assert_eq!(mbox.folder_by_name("INBOX").unwrap().id, FolderId(2));
        assert!(matches!(
            mbox.folder_by_name("trash"),
            Err(SearchError::NotFound { kind: "folder", .. })
        ));
    }

    #[test]
    fn test_message_results_by_date() {
        let results = mailbox()
            .execute(&QueryOperation::AllResults, &params("message", "dateDesc"))
            .unwrap();
        assert_eq!(results.sort_by, SortBy::DateDesc);
        assert_eq!(ids(results), vec![2, 3, 1]);

        let results = mailbox()
            .execute(&QueryOperation::AllResults, &params("message", "dateAsc"))
            .unwrap();
        assert_eq!(ids(results), vec![1, 3, 2]);
    }

    #[test]
    fn test_conversations_group_messages() {
        let results = mailbox()
            .execute(&subject("budget"), &params("conversation", "dateDesc"))
            .unwrap();
        let hits: Vec<Hit> = results.hits.map(|h| h.unwrap()).collect();
        assert_eq!(hits.len(), 1);
        let Hit::Conversation(conv) = &hits[0] else {
            panic!("expected conversation hit");
        };
        assert_eq!(conv.conversation.id, ItemId(100));
        assert_eq!(conv.conversation.subject, "Budget");
        assert_eq!(conv.conversation.message_count, 2);
        assert_eq!(conv.first_message_hit().unwrap().message.id, ItemId(2));
    }

    #[test]
    fn test_types_filter_kinds() {
        let results = mailbox()
            .execute(&subject("budget"), &params("message,contact", "dateAsc"))
            .unwrap();
        assert_eq!(ids(results), vec![10, 1, 2]);
    }

    #[test]
    fn test_score_without_text_falls_back_to_date() {
        let mut db = DbQueryOperation::new();
        db.add_folder(FolderId(2), true);
        let results = mailbox()
            .execute(&QueryOperation::Db(db), &params("message", "score"))
            .unwrap();
        assert_eq!(results.sort_by, SortBy::DateDesc);
    }

    #[test]
    fn test_score_sort_keeps_score_with_text() {
        let results = mailbox()
            .execute(&subject("budget"), &params("message", "score"))
            .unwrap();
        assert_eq!(results.sort_by, SortBy::ScoreDesc);
    }

    #[test]
    fn test_part_hits() {
        let mut with_parts = message(4, 300, 4, "Photos");
        if let MailItem::Message(m) = &mut with_parts {
            m.parts = vec![
                MimePart {
                    part: "2".to_string(),
                    content_type: "image/jpeg".to_string(),
                    filename: Some("beach.jpg".to_string()),
                    size: 10,
                },
                MimePart {
                    part: "3".to_string(),
                    content_type: "image/jpeg".to_string(),
                    filename: Some("city.jpg".to_string()),
                    size: 10,
                },
            ];
        }
        let mbox = MemoryMailbox::builder("acct-1").item(with_parts).build();
        let op = QueryOperation::Text(TextOperation {
            field: TextField::Filename,
            terms: vec!["beach.jpg".to_string()],
            bool: true,
        });
        let hits: Vec<Hit> = mbox
            .execute(&op, &params("part", "dateDesc"))
            .unwrap()
            .hits
            .map(|h| h.unwrap())
            .collect();
        assert_eq!(hits.len(), 1);
        let Hit::MessagePart(part) = &hits[0] else {
            panic!("expected part hit");
        };
        assert_eq!(part.part.part, "2");
    }

    #[test]
    fn test_unknown_document_kind_becomes_other_hit() {
        let mbox = MemoryMailbox::builder("acct-1")
            .item(MailItem::Document(Document {
                id: ItemId(9),
                folder: FolderId(16),
                tags: vec![],
                kind: DocumentKind::Other("spreadsheet".to_string()),
                name: "q.ods".to_string(),
                content_type: String::new(),
                version: 1,
                size: 10,
                date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            }))
            .build();
        let hits: Vec<Hit> = mbox
            .execute(&QueryOperation::AllResults, &params("document", "dateDesc"))
            .unwrap()
            .hits
            .map(|h| h.unwrap())
            .collect();
        assert!(matches!(&hits[0], Hit::Other { kind, .. } if kind == "spreadsheet"));
    }

    #[test]
    fn test_mark_read_and_bodies() {
        let mbox = mailbox();
        assert!(mbox.is_unread(ItemId(1)));
        mbox.mark_read(&[ItemId(1)]).unwrap();
        assert!(!mbox.is_unread(ItemId(1)));
        assert!(mbox.mark_read(&[ItemId(10)]).is_err());

        assert!(mbox.load_body(ItemId(1)).unwrap().text.is_none());
        assert!(mbox.load_body(ItemId(99)).is_err());
    }

    #[test]
    fn test_closed_stream_yields_nothing() {
        let mut results = mailbox()
            .execute(&QueryOperation::AllResults, &params("message", "dateDesc"))
            .unwrap();
        assert!(results.hits.next().is_some());
        results.hits.close();
        results.hits.close();
        assert!(results.hits.next().is_none());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mailbox.json");
        let mbox = mailbox();
        mbox.mark_read(&[ItemId(2)]).unwrap();
        mbox.save(&path).unwrap();

        let loaded = MemoryMailbox::load(&path).unwrap();
        assert_eq!(loaded.account_id(), "acct-1");
        assert_eq!(loaded.len(), 4);
        assert!(!loaded.is_unread(ItemId(2)));
        assert!(loaded.is_unread(ItemId(1)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = MemoryMailbox::load(Path::new("/nonexistent/mailbox.json")).unwrap_err();
        assert!(matches!(err, SearchError::Io { .. }));
    }
}
