//! The mailbox capability consumed by search.
//!
//! Search never reaches for a global mailbox: every entry point takes a
//! `&dyn Mailbox`. Implementations are responsible for their own internal
//! synchronization; concurrent searches may share one mailbox.

pub mod eval;
pub mod memory;

use crate::error::Result;
use crate::index::{Hit, QueryOperation, SortBy};
use crate::model::item::{Folder, Tag};
use crate::model::mail::MessageBody;
use crate::model::ItemId;
use crate::query::Analyzer;
use crate::search::params::SearchParams;

pub use memory::MemoryMailbox;

/// A lazy, single-pass sequence of hits backed by an open index/database
/// cursor.
///
/// Consumers must call [`HitStream::close`] on every exit path;
/// [`crate::search::pager::ResultsPager`] does this from `Drop`.
pub trait HitStream: Iterator<Item = Result<Hit>> {
    /// Release the underlying cursor. Must be idempotent.
    fn close(&mut self);
}

/// What [`Mailbox::execute`] returns.
pub struct QueryResults {
    /// The sort actually applied, which may differ from the requested one.
    pub sort_by: SortBy,
    pub hits: Box<dyn HitStream + Send>,
}

impl std::fmt::Debug for QueryResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResults")
            .field("sort_by", &self.sort_by)
            .finish_non_exhaustive()
    }
}

pub trait Mailbox: Send + Sync {
    /// Account owning this mailbox, used to qualify item ids.
    fn account_id(&self) -> &str;

    /// The analyzer the mailbox's text index was built with.
    fn analyzer(&self) -> &dyn Analyzer;

    /// Resolve a tag name. Absent tags are `NotFound`.
    fn tag_by_name(&self, name: &str) -> Result<Tag>;

    /// Resolve a folder name. Absent folders are `NotFound`.
    fn folder_by_name(&self, name: &str) -> Result<Folder>;

    /// Clear the unread flag on the given messages.
    fn mark_read(&self, ids: &[ItemId]) -> Result<()>;

    /// Load a message body for inline expansion.
    fn load_body(&self, id: ItemId) -> Result<MessageBody>;

    /// Run a compiled query, producing hits of the requested types in the
    /// requested order.
    fn execute(&self, op: &QueryOperation, params: &SearchParams) -> Result<QueryResults>;
}
