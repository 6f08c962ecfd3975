//! Search request parameters.
//!
//! [`SearchRequest`] is the raw wire form; [`SearchParams::from_request`]
//! validates it against [`SearchConfig`] and applies defaults. Invalid
//! values are rejected as `InvalidRequest` before any query runs.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::index::SortBy;
use crate::model::{ItemId, ItemType};

/// Largest page size any configuration can allow.
pub const LIMIT_CEILING: usize = 1000;

/// Which hits get their full content inlined into the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpandResults {
    #[default]
    None,
    /// Only the first hit of the page.
    First,
    /// Every hit of the page.
    All,
    /// Matched hits only. Accepted on the wire; renders like `None`.
    Hits,
}

impl ExpandResults {
    /// Parse a `fetch` value. An absent value means `None`.
    pub fn get(value: Option<&str>) -> Result<Self> {
        let Some(value) = value else {
            return Ok(Self::None);
        };
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "none" | "0" | "false" => Ok(Self::None),
            "first" | "1" | "true" => Ok(Self::First),
            "all" => Ok(Self::All),
            "hits" => Ok(Self::Hits),
            other => Err(SearchError::invalid(format!("unknown fetch value: {other}"))),
        }
    }

    /// Whether hits should actually be expanded inline.
    pub fn expands(self) -> bool {
        matches!(self, Self::First | Self::All)
    }
}

/// Resume point from a previous page.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cursor {
    /// Last item returned on the previous page.
    pub prev_id: ItemId,
    /// That item's sort value, as reported in its `sort_field`.
    #[serde(default)]
    pub sort_value: Option<String>,
}

/// A search request as received from a caller.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: Option<String>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    /// Comma-separated result types.
    pub types: Option<String>,
    pub sort_by: Option<String>,
    /// Inline expansion: none, first, all, hits (or 0/1/false/true).
    pub fetch: Option<String>,
    pub want_html: bool,
    pub mark_read: bool,
    pub want_recipients: bool,
    pub locale: Option<String>,
    pub time_zone: Option<String>,
    pub cursor: Option<Cursor>,
    /// Qualify hit ids with the account id.
    pub include_mailbox: bool,
}

/// Validated search configuration for one request.
#[derive(Debug, Clone)]
pub struct SearchParams {
    query: String,
    offset: usize,
    limit: usize,
    sort_by: SortBy,
    types: BTreeSet<ItemType>,
    fetch: ExpandResults,
    want_html: bool,
    mark_read: bool,
    want_recipients: bool,
    locale: Option<String>,
    time_zone: Option<String>,
    cursor: Option<Cursor>,
    include_mailbox: bool,
    default_limit: usize,
    max_limit: usize,
}

impl SearchParams {
    /// Validate `request`, filling gaps from `config`.
    pub fn from_request(request: &SearchRequest, config: &SearchConfig) -> Result<Self> {
        let query = request
            .query
            .clone()
            .or_else(|| config.default_query.clone())
            .ok_or_else(|| SearchError::invalid("no query submitted and no default query found"))?;

        let offset = match request.offset {
            None => 0,
            Some(n) if n < 0 => {
                return Err(SearchError::invalid(format!("offset must be >= 0, got {n}")));
            }
            Some(n) => n as usize,
        };

        let sort_name = request.sort_by.as_deref().unwrap_or(&config.default_sort);
        let sort_by = SortBy::from_name(sort_name)
            .ok_or_else(|| SearchError::invalid(format!("unknown sort: {sort_name}")))?;

        let type_names = request.types.as_deref().unwrap_or(&config.default_types);
        let types = parse_types(type_names)?;

        let fetch = ExpandResults::get(request.fetch.as_deref())?;
        // Body rendering options only mean something for expanded hits.
        let expands = fetch.expands();

        let max_limit = config.max_limit.clamp(1, LIMIT_CEILING);
        let default_limit = config.default_limit.clamp(1, max_limit);
        if max_limit != config.max_limit || default_limit != config.default_limit {
            tracing::warn!(
                default_limit = config.default_limit,
                max_limit = config.max_limit,
                "Configured page sizes out of range, using {default_limit} of at most {max_limit}"
            );
        }

        let mut params = Self {
            query,
            offset,
            limit: default_limit,
            sort_by,
            types,
            fetch,
            want_html: expands && request.want_html,
            mark_read: expands && request.mark_read,
            want_recipients: request.want_recipients,
            locale: request.locale.clone(),
            time_zone: request.time_zone.clone(),
            cursor: request.cursor.clone(),
            include_mailbox: request.include_mailbox,
            default_limit,
            max_limit,
        };
        params.set_limit(request.limit);
        Ok(params)
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    /// Items to skip. Ignored when a cursor is present.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Always within `1..=max_limit`, and never above [`LIMIT_CEILING`].
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Set the page size. Missing, non-positive or over-maximum values fall
    /// back to the configured default.
    pub fn set_limit(&mut self, limit: Option<i64>) {
        self.limit = match limit {
            Some(n) if n > 0 && (n as u64) <= self.max_limit as u64 => n as usize,
            _ => self.default_limit,
        };
    }

    pub fn sort_by(&self) -> SortBy {
        self.sort_by
    }

    pub fn types(&self) -> &BTreeSet<ItemType> {
        &self.types
    }

    pub fn wants(&self, ty: ItemType) -> bool {
        self.types.contains(&ty)
    }

    pub fn fetch(&self) -> ExpandResults {
        self.fetch
    }

    pub fn want_html(&self) -> bool {
        self.want_html
    }

    pub fn mark_read(&self) -> bool {
        self.mark_read
    }

    pub fn want_recipients(&self) -> bool {
        self.want_recipients
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    pub fn time_zone(&self) -> Option<&str> {
        self.time_zone.as_deref()
    }

    pub fn cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn include_mailbox(&self) -> bool {
        self.include_mailbox
    }
}

fn parse_types(names: &str) -> Result<BTreeSet<ItemType>> {
    let mut types = BTreeSet::new();
    for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let ty = ItemType::from_name(name)
            .ok_or_else(|| SearchError::invalid(format!("unknown type: {name}")))?;
        types.insert(ty);
    }
    if types.is_empty() {
        return Err(SearchError::invalid("no result types requested"));
    }
    Ok(types)
}
