//! Search query parser.
//!
//! Parses user-typed query strings into a [`Query`] tree.
//!
//! # Supported syntax
//!
//! **Simple search**: `budget` searches subject, addresses and content.
//!
//! **Field-specific** (field names are case-insensitive):
//! - `tag:work`, `in:inbox`
//! - `from:alice@example.com`, `sender:` (alias), `from:<=m@x` (range)
//! - `to:`, `cc:`, `subject:`, `content:` / `body:`, `filename:`
//! - `is:unread` / `is:read` / `is:flagged` / `is:unflagged`
//! - `has:attachment` / `has:no-attachment`
//! - `date:2024-01-01`, `date:2024-01`, `date:2024`, `date:2024-01..2024-06`
//! - `before:2024-06-01` / `after:2024-01-01`
//! - `size:>1mb` / `size:<100kb`
//!
//! **Operators**:
//! - `a b`: implicit AND
//! - `a OR b`: OR, binds tighter than AND (`a b OR c` is `a AND (b OR c)`)
//! - `-a`, `-(a b)`: NOT
//! - `( … )`: grouping
//! - `"exact phrase"`: quoted value; `\"` and `\\` escape inside quotes
//!
//! The output of [`Query::dump`] is valid input.

use std::borrow::Cow;

use crate::error::{Result, SearchError};
use crate::index::operation::ItemFlag;
use crate::index::TextField;

use super::analyzer::Analyzer;
use super::range::{DateQuery, SizeQuery};
use super::sender::SenderQuery;
use super::text::TextQuery;
use super::{ConjOp, FlagQuery, Query, QueryKind};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Open { negated: bool },
    Close,
    Or,
}

/// One open parenthesis level: AND-ed chains of OR-ed clauses.
#[derive(Default)]
struct Group {
    negated: bool,
    chains: Vec<Vec<Query>>,
    pending_or: bool,
}

impl Group {
    fn push(&mut self, query: Query) {
        match self.chains.last_mut() {
            Some(chain) if self.pending_or => chain.push(query),
            _ => self.chains.push(vec![query]),
        }
        self.pending_or = false;
    }

    fn finish(self) -> Result<Query> {
        if self.pending_or {
            return Err(SearchError::invalid("OR must be followed by a clause"));
        }
        let mut ands: Vec<Query> = self
            .chains
            .into_iter()
            .map(|mut chain| {
                if chain.len() == 1 {
                    chain.remove(0)
                } else {
                    Query::conjunction(ConjOp::Or, chain)
                }
            })
            .collect();
        let query = match ands.len() {
            0 => return Err(SearchError::invalid("empty query or group")),
            1 => ands.remove(0),
            _ => Query::conjunction(ConjOp::And, ands),
        };
        Ok(if self.negated { query.negate() } else { query })
    }
}

/// Parse a query string into a [`Query`].
///
/// Fails with `InvalidRequest` on empty input, unbalanced parentheses,
/// nesting deeper than `max_depth`, or a malformed field value.
pub fn parse_query(input: &str, analyzer: &dyn Analyzer, max_depth: usize) -> Result<Query> {
    let mut stack = vec![Group::default()];

    for token in tokenize(input.trim()) {
        match token {
            Token::Open { negated } => {
                if stack.len() > max_depth {
                    return Err(SearchError::invalid(format!(
                        "query nests deeper than {max_depth} levels"
                    )));
                }
                stack.push(Group {
                    negated,
                    ..Group::default()
                });
            }
            Token::Close => {
                if stack.len() == 1 {
                    return Err(SearchError::invalid("unbalanced ')'"));
                }
                let group = stack.pop().map(Group::finish).transpose()?;
                if let (Some(query), Some(parent)) = (group, stack.last_mut()) {
                    parent.push(query);
                }
            }
            Token::Or => {
                let current = top(&mut stack)?;
                if current.chains.is_empty() || current.pending_or {
                    return Err(SearchError::invalid("OR must follow a clause"));
                }
                current.pending_or = true;
            }
            Token::Word(word) => {
                let query = parse_clause(&word, analyzer)?;
                top(&mut stack)?.push(query);
            }
        }
    }

    if stack.len() > 1 {
        return Err(SearchError::invalid("unbalanced '('"));
    }
    stack
        .pop()
        .map(Group::finish)
        .unwrap_or_else(|| Err(SearchError::invalid("empty query")))
}

fn top(stack: &mut [Group]) -> Result<&mut Group> {
    stack
        .last_mut()
        .ok_or_else(|| SearchError::invalid("unbalanced ')'"))
}

/// Parse one `field:value`, `-field:value` or bare word.
fn parse_clause(token: &str, analyzer: &dyn Analyzer) -> Result<Query> {
    let (negated, token) = match token.strip_prefix('-') {
        Some(rest) if !rest.is_empty() => (true, rest),
        _ => (false, token),
    };

    let query = match split_field(token) {
        Some((field, raw)) => parse_field(field, &unquote(raw), analyzer)?,
        None => Query::new(QueryKind::Text(TextQuery::new(
            analyzer,
            TextField::Any,
            &unquote(token),
        ))),
    };

    Ok(if negated { query.negate() } else { query })
}

fn parse_field(field: Field, value: &str, analyzer: &dyn Analyzer) -> Result<Query> {
    let text = |f: TextField| Query::new(QueryKind::Text(TextQuery::new(analyzer, f, value)));
    let bad = |what: &str| SearchError::invalid(format!("invalid {what} value: '{value}'"));

    let query = match field {
        Field::Tag => Query::tag(value, true),
        Field::In => Query::new(QueryKind::In {
            folder: value.to_string(),
        }),
        Field::From => SenderQuery::create(analyzer, value),
        Field::To => text(TextField::To),
        Field::Cc => text(TextField::Cc),
        Field::Subject => text(TextField::Subject),
        Field::Content => text(TextField::Content),
        Field::Filename => text(TextField::Filename),
        Field::Is => {
            let (flag, set) = match value.to_ascii_lowercase().as_str() {
                "unread" => (ItemFlag::Unread, true),
                "read" => (ItemFlag::Unread, false),
                "flagged" => (ItemFlag::Flagged, true),
                "unflagged" => (ItemFlag::Flagged, false),
                _ => return Err(bad("is:")),
            };
            Query::new(QueryKind::Flag(FlagQuery { flag, set }))
        }
        Field::Has => match value.to_ascii_lowercase().as_str() {
            "attachment" | "attachments" => Query::new(QueryKind::Attachment),
            "no-attachment" | "no-attachments" => Query::new(QueryKind::Attachment).negate(),
            _ => return Err(bad("has:")),
        },
        Field::Date => Query::new(QueryKind::Date(
            DateQuery::parse_date(value).ok_or_else(|| bad("date:"))?,
        )),
        Field::Before => Query::new(QueryKind::Date(
            DateQuery::parse_before(value).ok_or_else(|| bad("before:"))?,
        )),
        Field::After => Query::new(QueryKind::Date(
            DateQuery::parse_after(value).ok_or_else(|| bad("after:"))?,
        )),
        Field::Size => Query::new(QueryKind::Size(
            SizeQuery::parse(value).ok_or_else(|| bad("size:"))?,
        )),
    };
    Ok(query)
}

/// Field names recognized before a `:`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Tag,
    In,
    /// `from:` or `sender:`
    From,
    To,
    Cc,
    Subject,
    /// `content:` or `body:`
    Content,
    Filename,
    Is,
    Has,
    Date,
    Before,
    After,
    Size,
}

impl Field {
    fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "tag" => Self::Tag,
            "in" => Self::In,
            "from" | "sender" => Self::From,
            "to" => Self::To,
            "cc" => Self::Cc,
            "subject" => Self::Subject,
            "content" | "body" => Self::Content,
            "filename" => Self::Filename,
            "is" => Self::Is,
            "has" => Self::Has,
            "date" => Self::Date,
            "before" => Self::Before,
            "after" => Self::After,
            "size" => Self::Size,
            _ => return None,
        })
    }
}

/// Split `field:value` when `field` is a known field name. Quoted tokens
/// and unknown prefixes (`http://…`) are plain text.
fn split_field(token: &str) -> Option<(Field, &str)> {
    if token.starts_with('"') {
        return None;
    }
    let (field, value) = token.split_once(':')?;
    Field::from_name(field).map(|field| (field, value))
}

/// Strip one pair of surrounding double quotes and resolve the `\"` and
/// `\\` escapes between them. Unquoted values are returned as they are.
fn unquote(value: &str) -> Cow<'_, str> {
    let Some(inner) = value
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
    else {
        return Cow::Borrowed(value);
    };
    if !inner.contains('\\') {
        return Cow::Borrowed(inner);
    }

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars().peekable();
    while let Some(ch) = chars.next() {
        match (ch, chars.peek()) {
            ('\\', Some(&next)) if next == '"' || next == '\\' => {
                out.push(next);
                chars.next();
            }
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

/// Tokenize input respecting quoted strings and parentheses.
fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    let flush = |current: &mut String, tokens: &mut Vec<Token>| {
        if current.is_empty() {
            return;
        }
        let word = std::mem::take(current);
        tokens.push(if word == "OR" {
            Token::Or
        } else {
            Token::Word(word)
        });
    };

    let mut chars = input.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '"' {
            in_quotes = !in_quotes;
            current.push(ch);
        } else if in_quotes {
            current.push(ch);
            // Keep an escaped quote from closing the string.
            if ch == '\\' {
                if let Some(next) = chars.next_if(|&c| c == '"' || c == '\\') {
                    current.push(next);
                }
            }
        } else if ch.is_whitespace() {
            flush(&mut current, &mut tokens);
        } else if ch == '(' {
            let negated = current == "-";
            if negated {
                current.clear();
            }
            flush(&mut current, &mut tokens);
            tokens.push(Token::Open { negated });
        } else if ch == ')' {
            flush(&mut current, &mut tokens);
            tokens.push(Token::Close);
        } else {
            current.push(ch);
        }
    }
    flush(&mut current, &mut tokens);
    tokens
}
