//! Query by sender.
//!
//! `from:` values starting with `<` or `>` are range comparisons over the
//! sender address (`from:<=m@x` is every sender sorting at or before
//! `m@x`). Everything else is a plain text match on the From field.

use crate::index::{DbQueryOperation, QueryOperation, TextField};

use super::analyzer::Analyzer;
use super::text::TextQuery;
use super::{Query, QueryKind};

/// A range over the sender field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderQuery {
    sender: String,
    /// `true` for an upper bound (`<`), `false` for a lower bound (`>`).
    lt: bool,
    inclusive: bool,
}

impl SenderQuery {
    /// Build a sender query: a range when `text` is longer than one
    /// character and starts with `<` or `>`, a From-field text query
    /// otherwise.
    pub fn create(analyzer: &dyn Analyzer, text: &str) -> Query {
        if text.chars().count() > 1 && (text.starts_with('<') || text.starts_with('>')) {
            Query::new(QueryKind::Sender(Self::range(text)))
        } else {
            Query::new(QueryKind::Text(TextQuery::new(analyzer, TextField::From, text)))
        }
    }

    fn range(text: &str) -> Self {
        let lt = text.starts_with('<');
        let rest = &text[1..];
        match rest.strip_prefix('=') {
            Some(sender) => Self {
                sender: sender.to_string(),
                lt,
                inclusive: true,
            },
            None => Self {
                sender: rest.to_string(),
                lt,
                inclusive: false,
            },
        }
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn is_upper_bound(&self) -> bool {
        self.lt
    }

    pub fn is_inclusive(&self) -> bool {
        self.inclusive
    }

    pub(crate) fn compile(&self, bool: bool) -> QueryOperation {
        let mut op = DbQueryOperation::new();
        if self.lt {
            op.add_sender_range(None, false, Some(&self.sender), self.inclusive, bool);
        } else {
            op.add_sender_range(Some(&self.sender), self.inclusive, None, false, bool);
        }
        QueryOperation::Db(op)
    }

    /// The operator is written inside any quotes so the whole operand
    /// reaches [`SenderQuery::create`] again.
    pub(crate) fn dump(&self, out: &mut String) {
        let mut operand = String::from(if self.lt { "<" } else { ">" });
        if self.inclusive {
            operand.push('=');
        }
        operand.push_str(&self.sender);
        out.push_str("SENDER:");
        super::push_value(out, &operand);
    }
}

#[cfg(test)]
mod tests {
    use std::ops::Bound;

    use super::*;
    use crate::index::operation::Constraint;
    use crate::query::analyzer::StandardAnalyzer;

    fn sender_range(q: &Query) -> crate::index::operation::Range<String> {
        let QueryKind::Sender(s) = q.kind() else {
            panic!("expected sender range query, got {q:?}");
        };
        let QueryOperation::Db(op) = s.compile(true) else {
            panic!("expected db op");
        };
        match &op.constraints()[0].constraint {
            Constraint::Sender(range) => range.clone(),
            other => panic!("expected sender constraint, got {other:?}"),
        }
    }

    #[test]
    fn test_lt_is_exclusive_upper_bound() {
        let q = SenderQuery::create(&StandardAnalyzer, "<alice@x");
        let range = sender_range(&q);
        assert_eq!(range.lower, Bound::Unbounded);
        assert_eq!(range.upper, Bound::Excluded("alice@x".to_string()));
    }

    #[test]
    fn test_lte_is_inclusive_upper_bound() {
        let q = SenderQuery::create(&StandardAnalyzer, "<=alice@x");
        let range = sender_range(&q);
        assert_eq!(range.upper, Bound::Included("alice@x".to_string()));
    }

    #[test]
    fn test_gt_is_exclusive_lower_bound() {
        let q = SenderQuery::create(&StandardAnalyzer, ">bob@x");
        let range = sender_range(&q);
        assert_eq!(range.lower, Bound::Excluded("bob@x".to_string()));
        assert_eq!(range.upper, Bound::Unbounded);

        let q = SenderQuery::create(&StandardAnalyzer, ">=bob@x");
        assert_eq!(sender_range(&q).lower, Bound::Included("bob@x".to_string()));
    }

    #[test]
    fn test_falls_back_to_from_text() {
        for input in ["<", ">", "alice@x", "=alice"] {
            let q = SenderQuery::create(&StandardAnalyzer, input);
            match q.kind() {
                QueryKind::Text(t) => {
                    assert_eq!(t.field(), TextField::From);
                    assert_eq!(t.text(), input);
                }
                other => panic!("{input:?} should be a text query, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_dump() {
        assert_eq!(SenderQuery::create(&StandardAnalyzer, "<=alice@x").dump(), "SENDER:<=alice@x");
        assert_eq!(SenderQuery::create(&StandardAnalyzer, ">bob@x").dump(), "SENDER:>bob@x");
        assert_eq!(SenderQuery::create(&StandardAnalyzer, "bob").dump(), "FROM:bob");
        assert_eq!(
            SenderQuery::create(&StandardAnalyzer, "<=alice smith").dump(),
            r#"SENDER:"<=alice smith""#
        );
        assert_eq!(
            SenderQuery::create(&StandardAnalyzer, r#">"q"@x"#).dump(),
            r#"SENDER:">\"q\"@x""#
        );
    }
}
