//! Search request handling: validate, parse, compile, execute, page and
//! dispatch.

pub mod dispatch;
pub mod pager;
pub mod params;
pub mod response;

use crate::config::Config;
use crate::error::Result;
use crate::mailbox::Mailbox;
use crate::query::parse_query;

use self::dispatch::{HitDispatcher, KeepGoing};
use self::pager::ResultsPager;
use self::params::{SearchParams, SearchRequest};
use self::response::SearchResponse;

/// High-level search: validate the request, then run it.
///
/// `keep_going` is called before each hit with the number dispatched so
/// far; returning `false` cancels with `SearchError::Cancelled`.
pub fn execute(
    mailbox: &dyn Mailbox,
    request: &SearchRequest,
    config: &Config,
    keep_going: Option<KeepGoing<'_>>,
) -> Result<SearchResponse> {
    let params = SearchParams::from_request(request, &config.search)?;
    execute_params(mailbox, &params, config, keep_going)
}

/// Run a search from already-validated parameters.
pub fn execute_params(
    mailbox: &dyn Mailbox,
    params: &SearchParams,
    config: &Config,
    keep_going: Option<KeepGoing<'_>>,
) -> Result<SearchResponse> {
    let query = parse_query(params.query(), mailbox.analyzer(), config.search.max_query_depth)?;
    let op = query.compile(mailbox, true)?;
    tracing::info!(
        account = mailbox.account_id(),
        query = %query.dump(),
        sort = %params.sort_by(),
        "Executing search"
    );

    let results = mailbox.execute(&op, params)?;
    let mut response = SearchResponse::new(results.sort_by, params.offset());
    // Dropping the pager closes the stream on every exit path.
    let mut pager = ResultsPager::new(results, params);
    HitDispatcher::new(mailbox, params, config.dispatch.email_cache_size).put_hits(
        &mut response,
        &mut pager,
        keep_going,
    )?;
    Ok(response)
}
