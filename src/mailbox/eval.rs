//! Evaluation of compiled operation trees against single items.
//!
//! Used by [`super::MemoryMailbox`] in place of a database and a text index:
//! every item is tested against the whole tree. Complexity is O(items ×
//! tree size), which is fine for the mailbox sizes a JSON file holds.

use crate::index::operation::{Constraint, ItemFlag, TextField, TextOperation};
use crate::index::QueryOperation;
use crate::model::attachment::MimePart;
use crate::model::mail::{Message, MessageBody};
use crate::model::MailItem;
use crate::query::analyzer::{term_matches, Analyzer};

/// An item plus the body text the content field reads from.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub item: &'a MailItem,
    pub body: Option<&'a MessageBody>,
}

enum Step<'a> {
    Eval(&'a QueryOperation),
    Combine { all: bool, arity: usize },
}

/// Whether `candidate` satisfies `op`.
pub fn matches(op: &QueryOperation, candidate: Candidate<'_>, analyzer: &dyn Analyzer) -> bool {
    let mut steps = vec![Step::Eval(op)];
    let mut results: Vec<bool> = Vec::new();

    while let Some(step) = steps.pop() {
        match step {
            Step::Eval(QueryOperation::Intersection(ops)) => {
                steps.push(Step::Combine {
                    all: true,
                    arity: ops.len(),
                });
                steps.extend(ops.iter().map(Step::Eval));
            }
            Step::Eval(QueryOperation::Union(ops)) => {
                steps.push(Step::Combine {
                    all: false,
                    arity: ops.len(),
                });
                steps.extend(ops.iter().map(Step::Eval));
            }
            Step::Eval(QueryOperation::AllResults) => results.push(true),
            Step::Eval(QueryOperation::NoResults) => results.push(false),
            Step::Eval(QueryOperation::Db(db)) => results.push(
                db.constraints()
                    .iter()
                    .all(|c| constraint_holds(&c.constraint, candidate.item) == c.bool),
            ),
            Step::Eval(QueryOperation::Text(t)) => {
                results.push(text_holds(t, candidate, analyzer) == t.bool)
            }
            Step::Combine { all, arity } => {
                let children = results.split_off(results.len() - arity);
                results.push(if all {
                    children.iter().all(|b| *b)
                } else {
                    children.iter().any(|b| *b)
                });
            }
        }
    }

    results.pop().unwrap_or(true)
}

/// Relevance of a matching candidate: the number of occurrences of every
/// positive text term anywhere in the tree. Zero when the tree has no text.
pub fn score(op: &QueryOperation, candidate: Candidate<'_>, analyzer: &dyn Analyzer) -> f32 {
    let mut total = 0usize;
    for text in positive_text_operations(op) {
        let Some(content) = field_text(candidate, text.field) else {
            continue;
        };
        let tokens = analyzer.tokenize(&content);
        for term in &text.terms {
            total += tokens
                .iter()
                .filter(|t| term_matches(term, std::slice::from_ref(*t)))
                .count();
        }
    }
    total as f32
}

/// Attachments of `message` whose filename satisfies a positive
/// `filename:` clause of `op`.
pub fn matched_parts<'m>(
    op: &QueryOperation,
    message: &'m Message,
    analyzer: &dyn Analyzer,
) -> Vec<&'m MimePart> {
    let filename_ops: Vec<&TextOperation> = positive_text_operations(op)
        .into_iter()
        .filter(|t| t.field == TextField::Filename)
        .collect();
    if filename_ops.is_empty() {
        return Vec::new();
    }

    message
        .parts
        .iter()
        .filter(|part| {
            let tokens = analyzer.tokenize(part.filename_or_empty());
            filename_ops
                .iter()
                .any(|t| t.terms.iter().all(|term| term_matches(term, &tokens)))
        })
        .collect()
}

fn positive_text_operations(op: &QueryOperation) -> Vec<&TextOperation> {
    let mut found = Vec::new();
    let mut stack = vec![op];
    while let Some(op) = stack.pop() {
        match op {
            QueryOperation::Text(t) if t.bool => found.push(t),
            QueryOperation::Intersection(ops) | QueryOperation::Union(ops) => stack.extend(ops.iter()),
            _ => {}
        }
    }
    found
}

fn constraint_holds(constraint: &Constraint, item: &MailItem) -> bool {
    match constraint {
        Constraint::Tag(id) => item.tags().contains(id),
        Constraint::Folder(id) => item.folder() == *id,
        Constraint::Sender(range) => match item {
            MailItem::Message(m) => range.contains(&m.sender.sort_key()),
            _ => false,
        },
        Constraint::Date(range) => range.contains(&item.date()),
        Constraint::Size(range) => range.contains(&item.size()),
        Constraint::Flag(flag) => match (item, flag) {
            (MailItem::Message(m), ItemFlag::Unread) => m.unread,
            (MailItem::Message(m), ItemFlag::Flagged) => m.flagged,
            _ => false,
        },
        Constraint::Attachment => matches!(item, MailItem::Message(m) if m.has_attachments()),
    }
}

fn text_holds(op: &TextOperation, candidate: Candidate<'_>, analyzer: &dyn Analyzer) -> bool {
    match field_text(candidate, op.field) {
        Some(content) => {
            let tokens = analyzer.tokenize(&content);
            op.terms.iter().all(|term| term_matches(term, &tokens))
        }
        None => false,
    }
}

/// Text of `field` for the candidate, or `None` when the item has no such
/// field.
fn field_text(candidate: Candidate<'_>, field: TextField) -> Option<String> {
    match candidate.item {
        MailItem::Message(m) => message_field(m, candidate.body, field),
        MailItem::Contact(c) => {
            let email = c.email.clone().unwrap_or_default();
            match field {
                TextField::From | TextField::To | TextField::Cc => Some(email),
                TextField::Subject => Some(c.full_name.clone()),
                TextField::Content | TextField::Any => Some(format!(
                    "{} {} {}",
                    c.full_name,
                    c.company.as_deref().unwrap_or(""),
                    email
                )),
                TextField::Filename => None,
            }
        }
        MailItem::Note(n) => match field {
            TextField::Subject | TextField::Content | TextField::Any => Some(n.content.clone()),
            _ => None,
        },
        MailItem::Appointment(a) => match field {
            TextField::Subject => Some(a.subject.clone()),
            TextField::Content | TextField::Any => Some(format!("{} {}", a.subject, a.location)),
            _ => None,
        },
        MailItem::Document(d) => match field {
            TextField::Subject | TextField::Content | TextField::Filename | TextField::Any => {
                Some(d.name.clone())
            }
            _ => None,
        },
    }
}

fn message_field(m: &Message, body: Option<&MessageBody>, field: TextField) -> Option<String> {
    let addresses = |list: &[crate::model::address::EmailAddress]| {
        list.iter().map(|a| a.display()).collect::<Vec<_>>().join(" ")
    };
    let content = || {
        let text = body.and_then(|b| b.text.as_deref()).unwrap_or("");
        format!("{} {}", m.fragment, text)
    };
    let text = match field {
        TextField::From => m.sender.display(),
        TextField::To => addresses(&m.to),
        TextField::Cc => addresses(&m.cc),
        TextField::Subject => m.subject.clone(),
        TextField::Content => content(),
        TextField::Filename => m
            .parts
            .iter()
            .map(MimePart::filename_or_empty)
            .collect::<Vec<_>>()
            .join(" "),
        TextField::Any => format!(
            "{} {} {} {} {}",
            m.subject,
            m.sender.display(),
            addresses(&m.to),
            addresses(&m.cc),
            content()
        ),
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::index::DbQueryOperation;
    use crate::model::address::EmailAddress;
    use crate::model::item::Note;
    use crate::model::{FolderId, ItemId, TagId};
    use crate::query::StandardAnalyzer;

    fn message() -> MailItem {
        MailItem::Message(Message {
            id: ItemId(1),
            conversation_id: ItemId(100),
            folder: FolderId(2),
            tags: vec![TagId(64)],
            date: Utc.with_ymd_and_hms(2024, 3, 5, 10, 0, 0).unwrap(),
            size: 4096,
            sender: EmailAddress::parse("Alice <alice@example.com>"),
            to: vec![EmailAddress::parse("bob@example.com")],
            cc: vec![],
            subject: "Quarterly budget review".to_string(),
            fragment: "Numbers attached".to_string(),
            unread: true,
            flagged: false,
            parts: vec![MimePart {
                part: "2".to_string(),
                content_type: "application/pdf".to_string(),
                filename: Some("budget-2024.pdf".to_string()),
                size: 2048,
            }],
        })
    }

    fn text(field: TextField, terms: &[&str], bool: bool) -> QueryOperation {
        QueryOperation::Text(TextOperation {
            field,
            terms: terms.iter().map(|s| s.to_string()).collect(),
            bool,
        })
    }

    fn check(op: &QueryOperation, item: &MailItem) -> bool {
        matches(op, Candidate { item, body: None }, &StandardAnalyzer)
    }

    #[test]
    fn test_db_constraints() {
        let item = message();
        let mut db = DbQueryOperation::new();
        db.add_tag(TagId(64), true);
        db.add_folder(FolderId(2), true);
        db.add_flag(ItemFlag::Unread, true);
        db.add_attachment(true);
        db.add_size_range(Some(1024), None, true);
        assert!(check(&QueryOperation::Db(db), &item));

        let mut db = DbQueryOperation::new();
        db.add_tag(TagId(64), false);
        assert!(!check(&QueryOperation::Db(db), &item));
    }

    #[test]
    fn test_sender_range() {
        let item = message();
        let mut db = DbQueryOperation::new();
        db.add_sender_range(None, false, Some("alice@example.com"), false, true);
        assert!(!check(&QueryOperation::Db(db), &item));

        let mut db = DbQueryOperation::new();
        db.add_sender_range(None, false, Some("alice@example.com"), true, true);
        assert!(check(&QueryOperation::Db(db), &item));
    }

    #[test]
    fn test_text_fields() {
        let item = message();
        assert!(check(&text(TextField::Subject, &["budget"], true), &item));
        assert!(check(&text(TextField::From, &["alice"], true), &item));
        assert!(check(&text(TextField::Any, &["bob"], true), &item));
        assert!(!check(&text(TextField::Subject, &["alice"], true), &item));
        assert!(check(&text(TextField::Subject, &["alice"], false), &item));
        assert!(check(&text(TextField::Filename, &["budget-2024.pdf"], true), &item));
    }

    #[test]
    fn test_content_reads_body() {
        let item = message();
        let body = MessageBody {
            text: Some("Please approve the forecast".to_string()),
            html: None,
        };
        let op = text(TextField::Content, &["forecast"], true);
        assert!(!check(&op, &item));
        assert!(matches(
            &op,
            Candidate {
                item: &item,
                body: Some(&body)
            },
            &StandardAnalyzer
        ));
    }

    #[test]
    fn test_combinators() {
        let item = message();
        let yes = text(TextField::Subject, &["budget"], true);
        let no = text(TextField::Subject, &["holiday"], true);
        assert!(!check(&QueryOperation::Intersection(vec![yes.clone(), no.clone()]), &item));
        assert!(check(&QueryOperation::Union(vec![yes, no]), &item));
        assert!(!check(&QueryOperation::Union(vec![]), &item));
        assert!(check(&QueryOperation::AllResults, &item));
        assert!(!check(&QueryOperation::NoResults, &item));
    }

    #[test]
    fn test_fields_missing_on_other_items() {
        let note = MailItem::Note(Note {
            id: ItemId(7),
            folder: FolderId(4),
            tags: vec![],
            content: "budget ideas".to_string(),
            date: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        });
        assert!(check(&text(TextField::Content, &["budget"], true), &note));
        assert!(!check(&text(TextField::From, &["budget"], true), &note));
        let mut db = DbQueryOperation::new();
        db.add_attachment(true);
        assert!(!check(&QueryOperation::Db(db), &note));
    }

    #[test]
    fn test_score_and_matched_parts() {
        let item = message();
        let op = QueryOperation::Union(vec![
            text(TextField::Subject, &["budget"], true),
            text(TextField::Filename, &["budget*"], true),
        ]);
        let s = score(&op, Candidate { item: &item, body: None }, &StandardAnalyzer);
        assert!(s >= 2.0);

        let MailItem::Message(m) = &item else {
            unreachable!()
        };
        assert_eq!(matched_parts(&op, m, &StandardAnalyzer).len(), 1);
        assert!(matched_parts(&text(TextField::Subject, &["budget"], true), m, &StandardAnalyzer).is_empty());
    }
}
