//! Windowing over a hit stream.
//!
//! [`ResultsPager`] skips to the requested page (by offset, or by cursor
//! when one is given), yields at most `limit` hits, and can peek one hit
//! past the page to tell whether more results exist. The underlying stream
//! is closed when the pager is exhausted or dropped, whichever comes first.

use crate::error::Result;
use crate::index::{Hit, SortBy, SortKey};
use crate::mailbox::{HitStream, QueryResults};
use crate::model::ItemId;

use super::params::SearchParams;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PagerState {
    /// Nothing pulled yet; the skip has not run.
    NotStarted,
    Paging,
    /// The stream ran dry; it has been closed.
    Exhausted,
}

/// Where the page starts.
#[derive(Debug, Clone)]
enum Start {
    Offset(usize),
    After { id: ItemId, sort_value: Option<SortKey> },
}

pub struct ResultsPager {
    sort_by: SortBy,
    stream: Box<dyn HitStream + Send>,
    state: PagerState,
    start: Start,
    limit: usize,
    returned: usize,
    /// A hit pulled from the stream but not yet handed out.
    pending: Option<Hit>,
    closed: bool,
}

impl ResultsPager {
    pub fn new(results: QueryResults, params: &SearchParams) -> Self {
        let start = match params.cursor() {
            Some(cursor) => Start::After {
                id: cursor.prev_id,
                sort_value: cursor
                    .sort_value
                    .as_deref()
                    .and_then(|raw| results.sort_by.parse_value(raw)),
            },
            None => Start::Offset(params.offset()),
        };
        Self {
            sort_by: results.sort_by,
            stream: results.hits,
            state: PagerState::NotStarted,
            start,
            limit: params.limit(),
            returned: 0,
            pending: None,
            closed: false,
        }
    }

    /// The sort the executor actually applied.
    pub fn sort_by(&self) -> SortBy {
        self.sort_by
    }

    /// Next hit of the page, or `None` once the page is full or the stream
    /// is exhausted.
    pub fn next_hit(&mut self) -> Result<Option<Hit>> {
        if self.returned >= self.limit {
            return Ok(None);
        }
        let hit = self.take()?;
        if hit.is_some() {
            self.returned += 1;
        }
        Ok(hit)
    }

    /// Whether another hit exists beyond those handed out so far.
    pub fn has_next(&mut self) -> Result<bool> {
        if self.pending.is_none() {
            self.pending = self.pull()?;
        }
        Ok(self.pending.is_some())
    }

    /// Iterate the remaining hits of the page.
    pub fn hits(&mut self) -> impl Iterator<Item = Result<Hit>> + '_ {
        std::iter::from_fn(move || self.next_hit().transpose())
    }

    /// Release the underlying stream. Idempotent.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.stream.close();
        }
    }

    fn take(&mut self) -> Result<Option<Hit>> {
        match self.pending.take() {
            Some(hit) => Ok(Some(hit)),
            None => self.pull(),
        }
    }

    /// Pull the next hit from the stream, running the skip first if needed.
    fn pull(&mut self) -> Result<Option<Hit>> {
        if self.state == PagerState::NotStarted {
            self.state = PagerState::Paging;
            if let Some(first) = self.skip()? {
                return Ok(Some(first));
            }
        }
        self.raw_next()
    }

    /// Advance past the previous pages. Returns the first hit of this page
    /// when finding the boundary consumed it.
    fn skip(&mut self) -> Result<Option<Hit>> {
        match self.start.clone() {
            Start::Offset(n) => {
                for _ in 0..n {
                    if self.raw_next()?.is_none() {
                        break;
                    }
                }
                Ok(None)
            }
            Start::After { id, sort_value } => {
                while let Some(hit) = self.raw_next()? {
                    if hit.item_id() == id {
                        return Ok(None);
                    }
                    if let Some(value) = &sort_value {
                        // Past the cursor's sort position: the cursor item is
                        // gone, so this is the first hit of the page.
                        let key = hit.sort_key(self.sort_by);
                        if self.sort_by.compare(&key, value).is_gt() {
                            return Ok(Some(hit));
                        }
                    }
                }
                Ok(None)
            }
        }
    }

    fn raw_next(&mut self) -> Result<Option<Hit>> {
        if self.state == PagerState::Exhausted {
            return Ok(None);
        }
        match self.stream.next().transpose()? {
            Some(hit) => Ok(Some(hit)),
            None => {
                self.state = PagerState::Exhausted;
                self.close();
                Ok(None)
            }
        }
    }
}

impl Drop for ResultsPager {
    fn drop(&mut self) {
        self.close();
    }
}
