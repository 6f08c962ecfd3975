//! Search query AST.
//!
//! A [`Query`] is the syntactic form of a search. [`Query::compile`] binds
//! it to a mailbox (tag and folder names become identifiers) and produces
//! the executable [`QueryOperation`] tree.
//!
//! Every node carries a `bool` flag: `true` for a positive clause, `false`
//! for a negated one. Compilation threads an outer boolean context down the
//! tree and each node's effective polarity is `outer XOR !bool`, so
//! negations compose by exclusive-or across nesting levels.

pub mod analyzer;
pub mod parser;
pub mod range;
pub mod sender;
pub mod text;

use crate::error::Result;
use crate::index::operation::ItemFlag;
use crate::index::{DbQueryOperation, QueryOperation};
use crate::mailbox::Mailbox;

pub use analyzer::{Analyzer, StandardAnalyzer};
pub use parser::parse_query;
pub use range::{DateQuery, SizeQuery};
pub use sender::SenderQuery;
pub use text::TextQuery;

/// How the clauses of a [`QueryKind::Conjunction`] combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConjOp {
    And,
    Or,
}

impl ConjOp {
    fn flip(self) -> Self {
        match self {
            Self::And => Self::Or,
            Self::Or => Self::And,
        }
    }
}

/// `is:` queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagQuery {
    pub flag: ItemFlag,
    /// `false` for `is:read` / `is:unflagged`.
    pub set: bool,
}

impl FlagQuery {
    fn dump(&self, out: &mut String) {
        out.push_str("IS:");
        out.push_str(match (self.flag, self.set) {
            (ItemFlag::Unread, true) => "unread",
            (ItemFlag::Unread, false) => "read",
            (ItemFlag::Flagged, true) => "flagged",
            (ItemFlag::Flagged, false) => "unflagged",
        });
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryKind {
    /// Items carrying the named tag.
    Tag { name: String },
    /// Items in the named folder.
    In { folder: String },
    Sender(SenderQuery),
    Text(TextQuery),
    Date(DateQuery),
    Size(SizeQuery),
    Flag(FlagQuery),
    Attachment,
    Conjunction { op: ConjOp, clauses: Vec<Query> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    bool: bool,
    kind: QueryKind,
}

enum Frame<'a> {
    Enter(&'a Query, bool),
    Exit { op: ConjOp, arity: usize },
}

impl Query {
    /// A positive query of the given kind.
    pub fn new(kind: QueryKind) -> Self {
        Self { bool: true, kind }
    }

    /// Query by tag; `bool == false` matches items NOT carrying it.
    pub fn tag(name: impl Into<String>, bool: bool) -> Self {
        Self {
            bool,
            kind: QueryKind::Tag { name: name.into() },
        }
    }

    pub fn conjunction(op: ConjOp, clauses: Vec<Query>) -> Self {
        Self::new(QueryKind::Conjunction { op, clauses })
    }

    /// Flip this node's own negation flag.
    pub fn negate(mut self) -> Self {
        self.bool = !self.bool;
        self
    }

    pub fn is_positive(&self) -> bool {
        self.bool
    }

    pub fn kind(&self) -> &QueryKind {
        &self.kind
    }

    /// Effective polarity of this node under the outer context `bool`.
    pub fn eval_bool(&self, bool: bool) -> bool {
        bool ^ !self.bool
    }

    /// Whether any clause needs the text index.
    pub fn has_text_operation(&self) -> bool {
        let mut stack = vec![self];
        while let Some(q) = stack.pop() {
            match &q.kind {
                QueryKind::Text(_) => return true,
                QueryKind::Conjunction { clauses, .. } => stack.extend(clauses.iter()),
                _ => {}
            }
        }
        false
    }

    /// Compile against `mailbox` under the outer boolean context `bool`
    /// (pass `true` at the top level).
    ///
    /// Fails with `NotFound` when a referenced tag or folder does not exist.
    /// Uses an explicit stack, so nesting depth is bounded by memory only.
    pub fn compile(&self, mailbox: &dyn Mailbox, bool: bool) -> Result<QueryOperation> {
        let mut frames = vec![Frame::Enter(self, bool)];
        let mut done: Vec<QueryOperation> = Vec::new();

        while let Some(frame) = frames.pop() {
            match frame {
                Frame::Enter(query, outer) => {
                    let b = query.eval_bool(outer);
                    match &query.kind {
                        QueryKind::Conjunction { op, clauses } => {
                            // A negated group is compiled through De Morgan:
                            // its children inherit the negation and the
                            // combinator flips.
                            let op = if b { *op } else { op.flip() };
                            frames.push(Frame::Exit {
                                op,
                                arity: clauses.len(),
                            });
                            frames.extend(clauses.iter().rev().map(|c| Frame::Enter(c, b)));
                        }
                        QueryKind::Tag { name } => {
                            let tag = mailbox.tag_by_name(name)?;
                            done.push(db_op(|op| op.add_tag(tag.id, b)));
                        }
                        QueryKind::In { folder } => {
                            let folder = mailbox.folder_by_name(folder)?;
                            done.push(db_op(|op| op.add_folder(folder.id, b)));
                        }
                        QueryKind::Sender(s) => done.push(s.compile(b)),
                        QueryKind::Text(t) => done.push(t.compile(b)),
                        QueryKind::Date(d) => done.push(d.compile(b)),
                        QueryKind::Size(s) => done.push(s.compile(b)),
                        QueryKind::Flag(f) => done.push(db_op(|op| op.add_flag(f.flag, b == f.set))),
                        QueryKind::Attachment => done.push(db_op(|op| op.add_attachment(b))),
                    }
                }
                Frame::Exit { op, arity } => {
                    let children = done.split_off(done.len() - arity);
                    done.push(match op {
                        ConjOp::And => QueryOperation::Intersection(children),
                        ConjOp::Or => QueryOperation::Union(children),
                    });
                }
            }
        }

        let op = done.pop().unwrap_or(QueryOperation::AllResults).optimize();
        tracing::debug!(query = %self.dump(), operation = %op, "Compiled query");
        Ok(op)
    }

    /// Canonical text form, re-parseable by [`parse_query`].
    pub fn dump(&self) -> String {
        enum Piece<'a> {
            Node(&'a Query),
            Lit(&'static str),
        }

        let mut out = String::new();
        let mut stack = vec![Piece::Node(self)];
        while let Some(piece) = stack.pop() {
            let query = match piece {
                Piece::Lit(s) => {
                    out.push_str(s);
                    continue;
                }
                Piece::Node(q) => q,
            };
            if !query.bool {
                out.push('-');
            }
            match &query.kind {
                QueryKind::Tag { name } => {
                    out.push_str("TAG:");
                    push_value(&mut out, name);
                }
                QueryKind::In { folder } => {
                    out.push_str("IN:");
                    push_value(&mut out, folder);
                }
                QueryKind::Sender(s) => s.dump(&mut out),
                QueryKind::Text(t) => t.dump(&mut out),
                QueryKind::Date(d) => d.dump(&mut out),
                QueryKind::Size(s) => s.dump(&mut out),
                QueryKind::Flag(f) => f.dump(&mut out),
                QueryKind::Attachment => out.push_str("HAS:attachment"),
                QueryKind::Conjunction { op, clauses } => {
                    let sep = match op {
                        ConjOp::And => " ",
                        ConjOp::Or => " OR ",
                    };
                    out.push('(');
                    stack.push(Piece::Lit(")"));
                    for (i, clause) in clauses.iter().enumerate().rev() {
                        stack.push(Piece::Node(clause));
                        if i > 0 {
                            stack.push(Piece::Lit(sep));
                        }
                    }
                }
            }
        }
        out
    }
}

fn db_op(build: impl FnOnce(&mut DbQueryOperation)) -> QueryOperation {
    let mut op = DbQueryOperation::new();
    build(&mut op);
    QueryOperation::Db(op)
}

/// Append a field value, quoting it when the parser would otherwise split
/// or misread it. Inside quotes `"` and `\` are backslash-escaped.
pub(crate) fn push_value(out: &mut String, value: &str) {
    let needs_quotes = value.is_empty()
        || value == "OR"
        || value.starts_with('-')
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '(' | ')' | ':' | '"'));
    if !needs_quotes {
        out.push_str(value);
        return;
    }
    out.push('"');
    for ch in value.chars() {
        if matches!(ch, '"' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::operation::Constraint;
    use crate::mailbox::memory::MemoryMailbox;
    use crate::model::item::{Folder, Tag};
    use crate::model::{FolderId, TagId};

    fn mailbox() -> MemoryMailbox {
        MemoryMailbox::builder("acct-1")
            .tag(Tag {
                id: TagId(64),
                name: "work".to_string(),
            })
            .tag(Tag {
                id: TagId(65),
                name: "urgent".to_string(),
            })
            .folder(Folder {
                id: FolderId(2),
                name: "inbox".to_string(),
            })
            .build()
    }

    fn single_constraint(op: &QueryOperation) -> (Constraint, bool) {
        let QueryOperation::Db(db) = op else {
            panic!("expected db op, got {op}");
        };
        assert_eq!(db.constraints().len(), 1);
        let c = &db.constraints()[0];
        (c.constraint.clone(), c.bool)
    }

    #[test]
    fn test_tag_query_resolves_id() {
        let op = Query::tag("work", true).compile(&mailbox(), true).unwrap();
        assert_eq!(single_constraint(&op), (Constraint::Tag(TagId(64)), true));
    }

    #[test]
    fn test_unknown_tag_is_not_found() {
        let err = Query::tag("nope", true).compile(&mailbox(), true).unwrap_err();
        assert!(matches!(err, crate::error::SearchError::NotFound { kind: "tag", .. }));
    }

    #[test]
    fn test_negation_composes_by_xor() {
        let mbox = mailbox();
        let cases = [(true, true, true), (false, true, false), (true, false, false), (false, false, true)];
        for (own, outer, expected) in cases {
            let op = Query::tag("work", own).compile(&mbox, outer).unwrap();
            assert_eq!(single_constraint(&op).1, expected, "own={own} outer={outer}");
        }
    }

    #[test]
    fn test_negated_group_applies_de_morgan() {
        let q = Query::conjunction(
            ConjOp::And,
            vec![Query::tag("work", true), Query::tag("urgent", false)],
        )
        .negate();
        let op = q.compile(&mailbox(), true).unwrap();
        let QueryOperation::Union(children) = &op else {
            panic!("expected union, got {op}");
        };
        assert_eq!(single_constraint(&children[0]), (Constraint::Tag(TagId(64)), false));
        assert_eq!(single_constraint(&children[1]), (Constraint::Tag(TagId(65)), true));
    }

    #[test]
    fn test_and_group_merges_into_one_db_operation() {
        let q = Query::conjunction(
            ConjOp::And,
            vec![
                Query::tag("work", true),
                Query::new(QueryKind::In {
                    folder: "inbox".to_string(),
                }),
            ],
        );
        let QueryOperation::Db(db) = q.compile(&mailbox(), true).unwrap() else {
            panic!("expected a single db op");
        };
        assert_eq!(db.constraints().len(), 2);
    }

    #[test]
    fn test_is_read_compiles_to_negated_unread() {
        let q = Query::new(QueryKind::Flag(FlagQuery {
            flag: ItemFlag::Unread,
            set: false,
        }));
        let op = q.compile(&mailbox(), true).unwrap();
        assert_eq!(single_constraint(&op), (Constraint::Flag(ItemFlag::Unread), false));
    }

    #[test]
    fn test_deep_nesting_compiles() {
        let mut q = Query::tag("work", true);
        for _ in 0..5_000 {
            q = Query::conjunction(ConjOp::Or, vec![q]).negate();
        }
        // 5000 negations cancel out.
        let op = q.compile(&mailbox(), true).unwrap();
        assert_eq!(single_constraint(&op), (Constraint::Tag(TagId(64)), true));
        // Unwind iteratively so dropping the test tree cannot overflow.
        let mut current = q;
        while let QueryKind::Conjunction { clauses, .. } = current.kind {
            current = clauses.into_iter().next().unwrap();
        }
    }

    #[test]
    fn test_dump_forms() {
        assert_eq!(Query::tag("work", true).dump(), "TAG:work");
        assert_eq!(Query::tag("my tag", false).dump(), "-TAG:\"my tag\"");
        let q = Query::conjunction(
            ConjOp::Or,
            vec![Query::tag("a", true), Query::new(QueryKind::Attachment)],
        );
        assert_eq!(q.dump(), "(TAG:a OR HAS:attachment)");
    }

    #[test]
    fn test_has_text_operation() {
        assert!(!Query::tag("a", true).has_text_operation());
        let q = Query::conjunction(
            ConjOp::And,
            vec![Query::tag("a", true), SenderQuery::create(&StandardAnalyzer, "alice")],
        );
        assert!(q.has_text_operation());
    }
}
