//! Executable query-operation trees.
//!
//! A [`QueryOperation`] is what a [`crate::query::Query`] compiles into:
//! names are resolved to mailbox-local identifiers and every leaf carries
//! its final polarity, so executors never look at the syntax again.
//!
//! Combinators are n-ary. [`QueryOperation::optimize`] flattens nested
//! combinators of the same kind and folds sibling database operations of an
//! intersection into a single [`DbQueryOperation`].

use std::fmt;
use std::ops::Bound;

use chrono::{DateTime, Utc};

use crate::model::{FolderId, TagId};

/// Text index fields a [`TextOperation`] can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    From,
    To,
    Cc,
    Subject,
    /// Message body, note content, document name.
    Content,
    /// Attachment filenames.
    Filename,
    /// Subject, addresses and content together.
    Any,
}

impl TextField {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::From => "from",
            Self::To => "to",
            Self::Cc => "cc",
            Self::Subject => "subject",
            Self::Content => "content",
            Self::Filename => "filename",
            Self::Any => "any",
        }
    }
}

/// Item flags usable as constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemFlag {
    Unread,
    Flagged,
}

impl ItemFlag {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unread => "unread",
            Self::Flagged => "flagged",
        }
    }
}

/// A one- or two-sided range. Either side may be unbounded.
#[derive(Debug, Clone, PartialEq)]
pub struct Range<T> {
    pub lower: Bound<T>,
    pub upper: Bound<T>,
}

impl<T: PartialOrd> Range<T> {
    pub fn contains(&self, value: &T) -> bool {
        let above = match &self.lower {
            Bound::Included(l) => value >= l,
            Bound::Excluded(l) => value > l,
            Bound::Unbounded => true,
        };
        let below = match &self.upper {
            Bound::Included(u) => value <= u,
            Bound::Excluded(u) => value < u,
            Bound::Unbounded => true,
        };
        above && below
    }
}

fn bound<T>(value: Option<T>, inclusive: bool) -> Bound<T> {
    match value {
        Some(v) if inclusive => Bound::Included(v),
        Some(v) => Bound::Excluded(v),
        None => Bound::Unbounded,
    }
}

/// What a single database constraint tests.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Tag(TagId),
    Folder(FolderId),
    /// Lowercased sender address range.
    Sender(Range<String>),
    Date(Range<DateTime<Utc>>),
    Size(Range<u64>),
    Flag(ItemFlag),
    Attachment,
}

/// A constraint plus its polarity: `bool == false` means the item must
/// NOT satisfy it.
#[derive(Debug, Clone, PartialEq)]
pub struct DbConstraint {
    pub constraint: Constraint,
    pub bool: bool,
}

/// Conjunction of metadata constraints, evaluated by the database layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DbQueryOperation {
    constraints: Vec<DbConstraint>,
}

impl DbQueryOperation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn constraints(&self) -> &[DbConstraint] {
        &self.constraints
    }

    fn push(&mut self, constraint: Constraint, bool: bool) {
        self.constraints.push(DbConstraint { constraint, bool });
    }

    pub fn add_tag(&mut self, tag: TagId, bool: bool) {
        self.push(Constraint::Tag(tag), bool);
    }

    pub fn add_folder(&mut self, folder: FolderId, bool: bool) {
        self.push(Constraint::Folder(folder), bool);
    }

    /// Record a sender range. A `None` side is open-ended.
    pub fn add_sender_range(
        &mut self,
        lower: Option<&str>,
        lower_inclusive: bool,
        upper: Option<&str>,
        upper_inclusive: bool,
        bool: bool,
    ) {
        let range = Range {
            lower: bound(lower.map(str::to_lowercase), lower_inclusive),
            upper: bound(upper.map(str::to_lowercase), upper_inclusive),
        };
        self.push(Constraint::Sender(range), bool);
    }

    pub fn add_date_range(
        &mut self,
        lower: Option<DateTime<Utc>>,
        lower_inclusive: bool,
        upper: Option<DateTime<Utc>>,
        upper_inclusive: bool,
        bool: bool,
    ) {
        let range = Range {
            lower: bound(lower, lower_inclusive),
            upper: bound(upper, upper_inclusive),
        };
        self.push(Constraint::Date(range), bool);
    }

    pub fn add_size_range(&mut self, lower: Option<u64>, upper: Option<u64>, bool: bool) {
        let range = Range {
            lower: bound(lower, false),
            upper: bound(upper, false),
        };
        self.push(Constraint::Size(range), bool);
    }

    pub fn add_flag(&mut self, flag: ItemFlag, bool: bool) {
        self.push(Constraint::Flag(flag), bool);
    }

    pub fn add_attachment(&mut self, bool: bool) {
        self.push(Constraint::Attachment, bool);
    }

    /// Append every constraint of `other`; both must hold afterwards.
    pub fn merge(&mut self, other: DbQueryOperation) {
        self.constraints.extend(other.constraints);
    }
}

/// Analyzed terms matched against one text field.
#[derive(Debug, Clone, PartialEq)]
pub struct TextOperation {
    pub field: TextField,
    /// Every term must occur in the field.
    pub terms: Vec<String>,
    pub bool: bool,
}

/// Compiled, mailbox-bound query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOperation {
    /// Matches every item.
    AllResults,
    /// Matches nothing.
    NoResults,
    Db(DbQueryOperation),
    Text(TextOperation),
    Intersection(Vec<QueryOperation>),
    Union(Vec<QueryOperation>),
}

enum Frame {
    Enter(QueryOperation),
    Exit { intersect: bool, arity: usize },
}

impl QueryOperation {
    /// Whether any leaf needs the text index.
    pub fn has_text_operation(&self) -> bool {
        let mut stack = vec![self];
        while let Some(op) = stack.pop() {
            match op {
                Self::Text(_) => return true,
                Self::Intersection(ops) | Self::Union(ops) => stack.extend(ops.iter()),
                Self::AllResults | Self::NoResults | Self::Db(_) => {}
            }
        }
        false
    }

    /// Simplify the tree bottom-up without recursion.
    pub fn optimize(self) -> QueryOperation {
        let mut frames = vec![Frame::Enter(self)];
        let mut done: Vec<QueryOperation> = Vec::new();

        while let Some(frame) = frames.pop() {
            match frame {
                Frame::Enter(Self::Intersection(children)) => {
                    frames.push(Frame::Exit {
                        intersect: true,
                        arity: children.len(),
                    });
                    frames.extend(children.into_iter().rev().map(Frame::Enter));
                }
                Frame::Enter(Self::Union(children)) => {
                    frames.push(Frame::Exit {
                        intersect: false,
                        arity: children.len(),
                    });
                    frames.extend(children.into_iter().rev().map(Frame::Enter));
                }
                Frame::Enter(leaf) => done.push(leaf),
                Frame::Exit { intersect, arity } => {
                    let children = done.split_off(done.len() - arity);
                    done.push(if intersect {
                        simplify_intersection(children)
                    } else {
                        simplify_union(children)
                    });
                }
            }
        }

        done.pop().unwrap_or(Self::AllResults)
    }
}

fn simplify_intersection(children: Vec<QueryOperation>) -> QueryOperation {
    let mut db: Option<DbQueryOperation> = None;
    let mut rest = Vec::new();

    let mut pending = children;
    while let Some(child) = pending.pop() {
        match child {
            QueryOperation::AllResults => {}
            QueryOperation::NoResults => return QueryOperation::NoResults,
            QueryOperation::Intersection(grandchildren) => pending.extend(grandchildren),
            QueryOperation::Db(op) => match db.as_mut() {
                Some(acc) => acc.merge(op),
                None => db = Some(op),
            },
            other => rest.push(other),
        }
    }

    rest.reverse();
    if let Some(acc) = db {
        rest.insert(0, QueryOperation::Db(acc));
    }
    match rest.len() {
        0 => QueryOperation::AllResults,
        1 => rest.remove(0),
        _ => QueryOperation::Intersection(rest),
    }
}

fn simplify_union(children: Vec<QueryOperation>) -> QueryOperation {
    let mut rest = Vec::new();

    let mut pending = children;
    while let Some(child) = pending.pop() {
        match child {
            QueryOperation::NoResults => {}
            QueryOperation::AllResults => return QueryOperation::AllResults,
            QueryOperation::Union(grandchildren) => pending.extend(grandchildren),
            other => rest.push(other),
        }
    }

    rest.reverse();
    match rest.len() {
        0 => QueryOperation::NoResults,
        1 => rest.remove(0),
        _ => QueryOperation::Union(rest),
    }
}

// ── Display (used by `explain` and debug logging) ───────────────

fn polarity(bool: bool) -> &'static str {
    if bool {
        ""
    } else {
        "-"
    }
}

fn fmt_range<T: fmt::Display>(f: &mut fmt::Formatter<'_>, range: &Range<T>) -> fmt::Result {
    match &range.lower {
        Bound::Included(v) => write!(f, "[{v}")?,
        Bound::Excluded(v) => write!(f, "({v}")?,
        Bound::Unbounded => f.write_str("(*")?,
    }
    f.write_str(",")?;
    match &range.upper {
        Bound::Included(v) => write!(f, "{v}]"),
        Bound::Excluded(v) => write!(f, "{v})"),
        Bound::Unbounded => f.write_str("*)"),
    }
}

impl fmt::Display for DbConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(polarity(self.bool))?;
        match &self.constraint {
            Constraint::Tag(id) => write!(f, "TAG({})", id.0),
            Constraint::Folder(id) => write!(f, "FOLDER({})", id.0),
            Constraint::Sender(range) => {
                f.write_str("SENDER")?;
                fmt_range(f, range)
            }
            Constraint::Date(range) => {
                f.write_str("DATE")?;
                fmt_range(f, range)
            }
            Constraint::Size(range) => {
                f.write_str("SIZE")?;
                fmt_range(f, range)
            }
            Constraint::Flag(flag) => write!(f, "FLAG({})", flag.as_str()),
            Constraint::Attachment => f.write_str("ATTACHMENT"),
        }
    }
}

impl fmt::Display for QueryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllResults => f.write_str("ALL"),
            Self::NoResults => f.write_str("NONE"),
            Self::Db(op) => {
                f.write_str("DB(")?;
                for (i, c) in op.constraints().iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{c}")?;
                }
                f.write_str(")")
            }
            Self::Text(op) => write!(
                f,
                "{}TEXT({}:{})",
                polarity(op.bool),
                op.field.as_str(),
                op.terms.join(",")
            ),
            Self::Intersection(ops) | Self::Union(ops) => {
                let sep = if matches!(self, Self::Intersection(_)) {
                    " AND "
                } else {
                    " OR "
                };
                f.write_str("(")?;
                for (i, op) in ops.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    write!(f, "{op}")?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tag_op(id: u32, bool: bool) -> QueryOperation {
        let mut op = DbQueryOperation::new();
        op.add_tag(TagId(id), bool);
        QueryOperation::Db(op)
    }

    fn text_op(term: &str) -> QueryOperation {
        QueryOperation::Text(TextOperation {
            field: TextField::Subject,
            terms: vec![term.to_string()],
            bool: true,
        })
    }

    #[test]
    fn test_sender_range_bounds() {
        let mut op = DbQueryOperation::new();
        op.add_sender_range(None, false, Some("Alice@x"), true, true);
        let Constraint::Sender(range) = &op.constraints()[0].constraint else {
            panic!("expected sender constraint");
        };
        assert_eq!(range.lower, Bound::Unbounded);
        assert_eq!(range.upper, Bound::Included("alice@x".to_string()));
        assert!(range.contains(&"aaron@x".to_string()));
        assert!(range.contains(&"alice@x".to_string()));
        assert!(!range.contains(&"bob@x".to_string()));
    }

    #[test]
    fn test_intersection_merges_db_operations() {
        let tree = QueryOperation::Intersection(vec![
            tag_op(1, true),
            QueryOperation::Intersection(vec![tag_op(2, false), text_op("budget")]),
        ]);
        let optimized = tree.optimize();
        let QueryOperation::Intersection(children) = &optimized else {
            panic!("expected intersection, got {optimized}");
        };
        assert_eq!(children.len(), 2);
        let QueryOperation::Db(db) = &children[0] else {
            panic!("expected merged db op first");
        };
        assert_eq!(db.constraints().len(), 2);
        assert!(matches!(children[1], QueryOperation::Text(_)));
    }

    #[test]
    fn test_union_keeps_db_operations_apart() {
        let tree = QueryOperation::Union(vec![tag_op(1, true), tag_op(2, true)]);
        let QueryOperation::Union(children) = tree.optimize() else {
            panic!("expected union");
        };
        assert_eq!(children.len(), 2);
    }

    #[test]
    fn test_identities() {
        let and = QueryOperation::Intersection(vec![QueryOperation::AllResults, tag_op(1, true)]);
        assert_eq!(and.optimize(), tag_op(1, true));

        let and = QueryOperation::Intersection(vec![QueryOperation::NoResults, tag_op(1, true)]);
        assert_eq!(and.optimize(), QueryOperation::NoResults);

        let or = QueryOperation::Union(vec![QueryOperation::AllResults, tag_op(1, true)]);
        assert_eq!(or.optimize(), QueryOperation::AllResults);

        assert_eq!(QueryOperation::Union(vec![]).optimize(), QueryOperation::NoResults);
        assert_eq!(QueryOperation::Intersection(vec![]).optimize(), QueryOperation::AllResults);
    }

    #[test]
    fn test_deep_tree_optimizes_without_recursion() {
        let mut tree = tag_op(1, true);
        for _ in 0..10_000 {
            tree = QueryOperation::Intersection(vec![tree]);
        }
        assert_eq!(tree.optimize(), tag_op(1, true));
    }

    #[test]
    fn test_display() {
        let mut db = DbQueryOperation::new();
        db.add_tag(TagId(3), false);
        db.add_sender_range(Some("bob@x"), false, None, false, true);
        let op = QueryOperation::Union(vec![QueryOperation::Db(db), text_op("hi")]);
        assert_eq!(op.to_string(), "(DB(-TAG(3) SENDER(bob@x,*)) OR TEXT(subject:hi))");
    }

    #[test]
    fn test_has_text_operation() {
        assert!(!tag_op(1, true).has_text_operation());
        assert!(QueryOperation::Union(vec![tag_op(1, true), text_op("x")]).has_text_operation());
    }
}
