//! Turning a page of hits into response records.
//!
//! Hits are dispatched one at a time, in pager order. Each kind has its own
//! renderer; proxied hits are appended untouched. Kinds that cannot be
//! rendered are logged and skipped without failing the request.

use chrono::{DateTime, Utc};

use crate::error::{Result, SearchError};
use crate::index::hit::{
    AppointmentHit, ContactHit, ConversationHit, DocumentHit, MessageHit, MessagePartHit, NoteHit,
};
use crate::index::Hit;
use crate::mailbox::Mailbox;
use crate::model::item::DocumentKind;
use crate::model::mail::Message;

use super::pager::ResultsPager;
use super::params::{ExpandResults, SearchParams};
use super::response::{
    AddressRole, AppointmentRecord, BodyRecord, ContactRecord, ConversationRecord, DocumentRecord,
    EmailCache, EmailRecord, HitRecord, MessageRecord, NoteRecord, PartRecord, RecordCommon,
    SearchResponse,
};

/// Called before each hit with the number dispatched so far; returning
/// `false` cancels the search.
pub type KeepGoing<'a> = &'a dyn Fn(usize) -> bool;

/// Renders hits from one pager into one response.
pub struct HitDispatcher<'a> {
    mailbox: &'a dyn Mailbox,
    params: &'a SearchParams,
    emails: EmailCache,
}

impl<'a> HitDispatcher<'a> {
    pub fn new(mailbox: &'a dyn Mailbox, params: &'a SearchParams, email_cache_size: usize) -> Self {
        Self {
            mailbox,
            params,
            emails: EmailCache::new(email_cache_size),
        }
    }

    /// Drain the pager's page into `response` and record whether more
    /// results exist.
    pub fn put_hits(
        &mut self,
        response: &mut SearchResponse,
        pager: &mut ResultsPager,
        keep_going: Option<KeepGoing<'_>>,
    ) -> Result<()> {
        let limit = self.params.limit();
        let sort_by = pager.sort_by();
        let expand = match self.params.fetch() {
            ExpandResults::Hits => ExpandResults::None,
            other => other,
        };

        tracing::debug!(offset = self.params.offset(), limit, "Dispatching search results");

        let mut dispatched = 0usize;
        loop {
            if let Some(keep_going) = keep_going {
                if !keep_going(dispatched) {
                    tracing::info!(dispatched, "Search cancelled");
                    return Err(SearchError::Cancelled);
                }
            }
            let Some(hit) = pager.next_hit()? else {
                break;
            };
            dispatched += 1;
            if dispatched > limit {
                tracing::debug!(limit, "Search results limited");
                break;
            }

            let inline = (dispatched == 1 && expand == ExpandResults::First)
                || expand == ExpandResults::All;

            let mut record = match &hit {
                Hit::Conversation(h) => self.conversation(h),
                Hit::Message(h) => self.message(h, inline)?,
                Hit::MessagePart(h) => self.part(h),
                Hit::Contact(h) => contact(h, inline),
                Hit::Note(h) => note(h),
                Hit::Appointment(h) => appointment(h),
                Hit::Document(h) => match document(h) {
                    Ok(record) => record,
                    Err(e) => {
                        tracing::warn!(item = %hit.item_id(), error = %e, "Skipping hit");
                        continue;
                    }
                },
                Hit::Proxied(h) => {
                    response.push(HitRecord::Proxied(h.element.clone()));
                    continue;
                }
                Hit::Other { item_id, kind } => {
                    let e = SearchError::UnknownHitType(kind.clone());
                    tracing::error!(item = %item_id, error = %e, "Skipping hit");
                    continue;
                }
            };

            record.set_sort_field(hit.sort_key(sort_by).to_string());
            if self.params.include_mailbox() {
                record.set_id(format!("{}:{}", self.mailbox.account_id(), hit.item_id()));
            }
            response.push(record);
        }

        response.more = pager.has_next()?;
        tracing::debug!(
            hits = response.len(),
            more = response.more,
            cached_addresses = self.emails.hits(),
            "Dispatched search results"
        );
        Ok(())
    }

    fn conversation(&mut self, hit: &ConversationHit) -> HitRecord {
        let conv = &hit.conversation;
        let senders = conv
            .senders
            .iter()
            .map(|a| self.emails.render(a, AddressRole::From))
            .collect();
        HitRecord::Conversation(ConversationRecord {
            common: RecordCommon::new(conv.id, hit.score),
            subject: conv.subject.clone(),
            date: timestamp(conv.date),
            message_count: conv.message_count,
            unread_count: conv.unread_count,
            senders,
            fragment: hit
                .first_message_hit()
                .map(|h| h.message.fragment.clone())
                .filter(|f| !f.is_empty()),
            messages: hit
                .message_hits
                .iter()
                .map(|h| h.message.id.to_string())
                .collect(),
        })
    }

    fn message(&mut self, hit: &MessageHit, inline: bool) -> Result<HitRecord> {
        let mut message = hit.message.clone();

        // The read flag must change before the record is encoded.
        if inline && message.unread && self.params.mark_read() {
            match self.mailbox.mark_read(&[message.id]) {
                Ok(()) => message.unread = false,
                Err(e) => {
                    let e = SearchError::SideEffect(e.to_string());
                    tracing::warn!(
                        item = %message.id,
                        error = %e,
                        "Problem marking message as read (ignored)"
                    );
                }
            }
        }

        let body = if inline {
            let loaded = self
                .mailbox
                .load_body(message.id)
                .map_err(|e| SearchError::Encoding {
                    item_id: message.id.0,
                    reason: e.to_string(),
                })?;
            let (content_type, content) = match (self.params.want_html(), loaded.html, loaded.text) {
                (true, Some(html), _) => ("text/html", html),
                (_, _, Some(text)) => ("text/plain", text),
                (_, Some(html), None) => ("text/html", html),
                (_, None, None) => ("text/plain", String::new()),
            };
            Some(BodyRecord {
                content_type,
                content,
            })
        } else {
            None
        };

        let with_recipients = inline || self.params.want_recipients();
        let addresses = self.addresses(&message, with_recipients);
        let fragment = (!message.fragment.is_empty()).then(|| message.fragment.clone());

        Ok(HitRecord::Message(MessageRecord {
            common: RecordCommon::new(message.id, hit.score),
            conversation_id: message.conversation_id.to_string(),
            date: timestamp(message.date),
            size: message.size,
            subject: message.subject.clone(),
            flags: flags(&message),
            tags: message.tags.iter().map(|t| t.0).collect(),
            addresses,
            fragment,
            body,
            content_matched: true,
            matched_parts: hit
                .matched_parts
                .iter()
                .map(|p| p.part.part.clone())
                .filter(|name| !name.is_empty())
                .collect(),
        }))
    }

    fn part(&mut self, hit: &MessagePartHit) -> HitRecord {
        let message = &hit.message;
        HitRecord::Part(PartRecord {
            common: RecordCommon::new(message.id, hit.score),
            message_id: message.id.to_string(),
            conversation_id: message.conversation_id.to_string(),
            date: timestamp(message.date),
            size: message.size,
            part: hit.part.part.clone(),
            content_type: hit.part.content_type.clone(),
            filename: hit.part.filename.clone(),
            from: self.emails.render(&message.sender, AddressRole::From),
            subject: message.subject.clone(),
        })
    }

    fn addresses(&mut self, message: &Message, with_recipients: bool) -> Vec<EmailRecord> {
        let mut out = vec![self.emails.render(&message.sender, AddressRole::From)];
        if with_recipients {
            for a in &message.to {
                out.push(self.emails.render(a, AddressRole::To));
            }
            for a in &message.cc {
                out.push(self.emails.render(a, AddressRole::Cc));
            }
        }
        out
    }
}

fn contact(hit: &ContactHit, inline: bool) -> HitRecord {
    let c = &hit.contact;
    HitRecord::Contact(ContactRecord {
        common: RecordCommon::new(c.id, hit.score),
        full_name: c.full_name.clone(),
        email: c.email.clone(),
        company: if inline { c.company.clone() } else { None },
    })
}

fn note(hit: &NoteHit) -> HitRecord {
    let n = &hit.note;
    HitRecord::Note(NoteRecord {
        common: RecordCommon::new(n.id, hit.score),
        date: timestamp(n.date),
        content: n.content.clone(),
    })
}

fn appointment(hit: &AppointmentHit) -> HitRecord {
    let a = &hit.appointment;
    HitRecord::Appointment(AppointmentRecord {
        common: RecordCommon::new(a.id, hit.score),
        subject: a.subject.clone(),
        location: a.location.clone(),
        start: timestamp(a.start),
        end: timestamp(a.end),
        content_matched: true,
    })
}

fn document(hit: &DocumentHit) -> Result<HitRecord> {
    let d = &hit.document;
    let record = DocumentRecord {
        common: RecordCommon::new(d.id, hit.score),
        name: d.name.clone(),
        content_type: d.content_type.clone(),
        version: d.version,
        size: d.size,
        date: timestamp(d.date),
    };
    match &d.kind {
        DocumentKind::Document => Ok(HitRecord::Document(record)),
        DocumentKind::Wiki => Ok(HitRecord::Wiki(record)),
        DocumentKind::Other(kind) => Err(SearchError::UnknownHitType(format!(
            "document kind {kind}"
        ))),
    }
}

fn flags(message: &Message) -> String {
    let mut flags = String::new();
    if message.unread {
        flags.push('u');
    }
    if message.flagged {
        flags.push('f');
    }
    if message.has_attachments() {
        flags.push('a');
    }
    flags
}

fn timestamp(date: DateTime<Utc>) -> String {
    date.to_rfc3339()
}
