//! `tcs query` and `tcs search`.
//!
//! Both commands share [`QueryArgs`]: the input text plus every flag that
//! shapes the [`SearchRequest`]. `query` stops after building the TQL;
//! `search` runs it against the API, groups the results, applies the
//! client-side sort and filter, and prints either a table or JSON.

use std::collections::HashSet;
use std::time::Instant;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::Args;
use serde::Serialize;

use tc_search_core::aggregate::{GroupedRecord, SearchStats};
use tc_search_core::backend::Backend;
use tc_search_core::models::{PaginationInfo, Scope, SearchFilters, SearchRequest};
use tc_search_core::search::{self, SearchError, SearchOutcome};
use tc_search_core::session::SearchSession;
use tc_search_core::view::{Applied, SortKey, ViewController, ViewFilter};

use crate::client::HttpBackend;
use crate::config::Config;
use crate::progress::{SearchProgressEvent, SearchProgressReporter};
use crate::render;

/// Input and request-shaping flags shared by `query`, `search`, and `browse`.
#[derive(Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Free text (an IP, hash, URL, host, email, group name) or a TQL expression.
    #[arg(default_value = "")]
    pub input: String,

    /// Which collections to search: indicators, groups, or both.
    #[arg(long)]
    pub scope: Option<Scope>,

    /// Zero-based page number.
    #[arg(long, default_value_t = 0)]
    pub page: usize,

    /// Results per page (defaults to `ui.page_size`).
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Do not infer the indicator type from the input.
    #[arg(long)]
    pub no_detect: bool,

    /// Treat the input as TQL even if it does not look like it.
    #[arg(long)]
    pub tql: bool,

    /// Only return records owned by this organization.
    #[arg(long)]
    pub owner: Option<String>,

    #[arg(long)]
    pub rating_min: Option<f64>,

    #[arg(long)]
    pub rating_max: Option<f64>,

    #[arg(long)]
    pub confidence_min: Option<u32>,

    #[arg(long)]
    pub confidence_max: Option<u32>,

    /// Only records added after this date (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    pub added_after: Option<NaiveDate>,

    /// Only records added before this date (YYYY-MM-DD).
    #[arg(long, value_parser = parse_date)]
    pub added_before: Option<NaiveDate>,

    /// Require a tag (repeatable).
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Restrict to these type names (repeatable).
    #[arg(long = "types")]
    pub types: Vec<String>,
}

/// Client-side presentation flags for `search`.
#[derive(Args, Debug, Clone, Default)]
pub struct DisplayArgs {
    /// Sort: none, date, rating, or confidence (defaults to `ui.default_sort`).
    #[arg(long)]
    pub sort: Option<SortKey>,

    /// Hide values with no active record.
    #[arg(long)]
    pub active_only: bool,

    /// Only show values of this type.
    #[arg(long = "type")]
    pub type_filter: Option<String>,

    /// Print JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

impl DisplayArgs {
    fn filter(&self) -> ViewFilter {
        match (&self.type_filter, self.active_only) {
            (Some(t), _) => ViewFilter::ByType(t.clone()),
            (None, true) => ViewFilter::ActiveOnly,
            (None, false) => ViewFilter::None,
        }
    }
}

fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| format!("expected YYYY-MM-DD: {}", e))
}

/// Combine command-line flags with configured defaults into a request.
pub fn build_request(config: &Config, args: &QueryArgs) -> Result<SearchRequest> {
    let scope = match args.scope {
        Some(s) => s,
        None => config.scope()?,
    };
    let page_size = args.page_size.unwrap_or(config.ui.page_size);

    let owner = args
        .owner
        .clone()
        .or_else(|| config.owner().map(str::to_string));

    if let (Some(min), Some(max)) = (args.rating_min, args.rating_max) {
        if min > max {
            anyhow::bail!("--rating-min ({}) is greater than --rating-max ({})", min, max);
        }
    }
    if let (Some(min), Some(max)) = (args.confidence_min, args.confidence_max) {
        if min > max {
            anyhow::bail!(
                "--confidence-min ({}) is greater than --confidence-max ({})",
                min,
                max
            );
        }
    }

    let filters = SearchFilters {
        rating_min: args.rating_min,
        rating_max: args.rating_max,
        confidence_min: args.confidence_min,
        confidence_max: args.confidence_max,
        added_after: args.added_after,
        added_before: args.added_before,
        owner,
        types: args.types.clone(),
        tags: args.tags.clone(),
    };

    let mut request = config
        .base_request(&args.input, scope)
        .with_page(args.page, page_size)
        .with_filters(filters)
        .with_force_tql(args.tql);
    if args.no_detect {
        request.auto_detect = false;
    }
    Ok(request)
}

/// Run [`search::execute`] with progress events around it.
pub async fn execute_with_progress<B: Backend + ?Sized>(
    request: &SearchRequest,
    backend: &B,
    progress: &dyn SearchProgressReporter,
) -> Result<SearchOutcome, SearchError> {
    let started = Instant::now();
    progress.report(SearchProgressEvent::Started {
        scope: request.scope,
        query: request.query.clone(),
        page: request.page,
    });
    if let Ok(planned) = search::plan(request) {
        for p in planned {
            progress.report(SearchProgressEvent::Fetching {
                kind: p.kind,
                tql: p.query.into_string(),
            });
        }
    }

    let result = search::execute(request, backend).await;
    match &result {
        Ok(outcome) => {
            let grouped: HashSet<String> = outcome.records.iter().map(|r| r.group_key()).collect();
            progress.report(SearchProgressEvent::Completed {
                records: outcome.records.len() as u64,
                grouped: grouped.len() as u64,
                total: outcome.total,
                elapsed_ms: started.elapsed().as_millis(),
            });
        }
        Err(e) => progress.report(SearchProgressEvent::Failed {
            message: e.to_string(),
        }),
    }
    result
}

/// `tcs query`: print the TQL that would be sent, one line per collection.
pub fn run_query(config: &Config, args: &QueryArgs) -> Result<()> {
    let request = build_request(config, args)?;
    let planned = search::plan(&request).context("Failed to build query")?;
    for p in planned {
        if request.scope == Scope::Both {
            println!("{}: {}", p.kind.endpoint(), p.query);
        } else {
            println!("{}", p.query);
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    query: &'a str,
    scope: Scope,
    sort: SortKey,
    filter: String,
    pagination: &'a PaginationInfo,
    stats: &'a SearchStats,
    results: Vec<&'a GroupedRecord>,
}

/// Load `result` into a fresh view and apply the display flags.
pub fn build_view(
    config: &Config,
    display: &DisplayArgs,
    result: Result<SearchOutcome, SearchError>,
) -> Result<ViewController> {
    let mut view = ViewController::new(config.sort_key()?);
    let session = SearchSession::new();
    let ticket = session.begin();
    match view.apply(&ticket, result) {
        Applied::Loaded => {}
        Applied::Failed(e) => return Err(e).context("Search failed"),
        Applied::Stale => anyhow::bail!("search result was superseded"),
    }
    if let Some(sort) = display.sort {
        view.set_sort(sort);
    }
    let filter = display.filter();
    if filter != ViewFilter::None {
        view.set_filter(filter);
    }
    Ok(view)
}

/// Print a loaded view as a table or as JSON.
pub fn print_view(
    view: &ViewController,
    request: &SearchRequest,
    config: &Config,
    json: bool,
) -> Result<()> {
    let state = view.state();
    if json {
        let out = JsonOutput {
            query: &request.query,
            scope: request.scope,
            sort: state.sort_key,
            filter: state.active_filter.to_string(),
            pagination: &state.pagination,
            stats: &state.stats,
            results: view.visible().collect(),
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if view.visible_len() == 0 {
        println!("No results.");
    } else {
        print!("{}", render::render_list(view, Utc::now()));
    }
    println!();
    print!(
        "{}",
        render::render_stats(&state.stats, &state.pagination, &config.ui.date_format)
    );
    Ok(())
}

/// `tcs search`.
pub async fn run_search(
    config: &Config,
    args: &QueryArgs,
    display: &DisplayArgs,
    progress: &dyn SearchProgressReporter,
) -> Result<()> {
    let request = build_request(config, args)?;
    let backend = HttpBackend::from_config(config)?;
    let result = execute_with_progress(&request, &backend, progress).await;
    let view = build_view(config, display, result)?;
    print_view(&view, &request, config, display.json)
}
