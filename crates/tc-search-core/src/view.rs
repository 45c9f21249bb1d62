//! Carousel state with client-side sort and filter.
//!
//! [`ViewController`] owns the [`ViewState`] of the last successful search.
//! Sorting and filtering never touch `grouped`; they recompute a list of
//! visible indices into it, and the cursor moves over that list. Every
//! mutation bumps [`ViewController::version`] and notifies subscribers, so
//! a renderer can either poll the version or register a callback.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::aggregate::{aggregate, GroupedRecord, SearchStats};
use crate::models::PaginationInfo;
use crate::search::{SearchError, SearchOutcome};
use crate::session::SearchTicket;

/// Client-side ordering of the grouped list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SortKey {
    /// First-seen order.
    #[default]
    None,
    DateDesc,
    RatingDesc,
    ConfidenceDesc,
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "" => Ok(SortKey::None),
            "date" | "date_desc" | "datedesc" => Ok(SortKey::DateDesc),
            "rating" | "rating_desc" | "ratingdesc" => Ok(SortKey::RatingDesc),
            "confidence" | "confidence_desc" | "confidencedesc" => Ok(SortKey::ConfidenceDesc),
            other => Err(format!(
                "unknown sort key '{}': use none, date, rating, or confidence",
                other
            )),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SortKey::None => "none",
            SortKey::DateDesc => "date",
            SortKey::RatingDesc => "rating",
            SortKey::ConfidenceDesc => "confidence",
        };
        f.write_str(s)
    }
}

/// Client-side predicate over grouped records.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub enum ViewFilter {
    #[default]
    None,
    /// At least one member is active.
    ActiveOnly,
    /// At least one member has this type name, ignoring ASCII case.
    ByType(String),
}

impl ViewFilter {
    pub fn matches(&self, group: &GroupedRecord) -> bool {
        match self {
            ViewFilter::None => true,
            ViewFilter::ActiveOnly => group.has_active(),
            ViewFilter::ByType(t) => group
                .members
                .iter()
                .any(|m| m.type_name.eq_ignore_ascii_case(t)),
        }
    }
}

impl FromStr for ViewFilter {
    type Err = String;

    /// `none`, `active`, or `type:<TypeName>`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.to_ascii_lowercase().as_str() {
            "none" | "" => return Ok(ViewFilter::None),
            "active" | "active_only" | "activeonly" => return Ok(ViewFilter::ActiveOnly),
            _ => {}
        }
        match s.split_once(':') {
            Some((prefix, name))
                if prefix.eq_ignore_ascii_case("type") && !name.trim().is_empty() =>
            {
                Ok(ViewFilter::ByType(name.trim().to_string()))
            }
            _ => Err(format!(
                "unknown filter '{}': use none, active, or type:<TypeName>",
                s
            )),
        }
    }
}

impl fmt::Display for ViewFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewFilter::None => f.write_str("none"),
            ViewFilter::ActiveOnly => f.write_str("active"),
            ViewFilter::ByType(t) => write!(f, "type:{}", t),
        }
    }
}

/// What the UI reads between searches.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ViewState {
    pub grouped: Vec<GroupedRecord>,
    pub stats: SearchStats,
    pub pagination: PaginationInfo,
    /// Position within the visible (filtered and sorted) sequence.
    pub cursor: usize,
    pub sort_key: SortKey,
    pub active_filter: ViewFilter,
}

/// Outcome of [`ViewController::apply`].
#[derive(Debug, Clone, PartialEq)]
pub enum Applied {
    Loaded,
    /// A newer search began; the result was dropped.
    Stale,
    /// The search failed; the previous state is untouched.
    Failed(SearchError),
}

type Observer = Box<dyn Fn(&ViewState) + Send + Sync>;

/// Handle returned by [`ViewController::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(usize);

/// Owns the [`ViewState`] and the derived visible ordering.
pub struct ViewController {
    state: ViewState,
    visible: Vec<usize>,
    default_sort: SortKey,
    version: u64,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: usize,
}

impl Default for ViewController {
    fn default() -> Self {
        Self::new(SortKey::None)
    }
}

impl ViewController {
    /// Empty view; `default_sort` is applied on every [`load`](Self::load).
    pub fn new(default_sort: SortKey) -> Self {
        Self {
            state: ViewState {
                sort_key: default_sort,
                ..ViewState::default()
            },
            visible: Vec::new(),
            default_sort,
            version: 0,
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    /// Incremented after every mutation.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Register a callback invoked after every mutation.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&ViewState) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(callback)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) {
        self.observers.retain(|(sid, _)| *sid != id);
    }

    /// Replace the whole result set and reset cursor, sort and filter.
    pub fn load(&mut self, grouped: Vec<GroupedRecord>, stats: SearchStats) {
        self.state.grouped = grouped;
        self.state.stats = stats;
        self.state.cursor = 0;
        self.state.sort_key = self.default_sort;
        self.state.active_filter = ViewFilter::None;
        self.recompute(None);
        self.changed();
    }

    /// Load a search result if `ticket` is still current.
    ///
    /// Stale results are dropped whether they succeeded or not; a failed
    /// current search leaves the previous results visible.
    pub fn apply(
        &mut self,
        ticket: &SearchTicket,
        result: Result<SearchOutcome, SearchError>,
    ) -> Applied {
        if !ticket.is_current() {
            tracing::warn!(generation = ticket.generation(), "discarding stale search result");
            return Applied::Stale;
        }
        match result {
            Ok(outcome) => {
                let (grouped, stats) = aggregate(outcome.records);
                self.state.pagination = outcome.pagination;
                self.load(grouped, stats);
                Applied::Loaded
            }
            Err(e) => Applied::Failed(e),
        }
    }

    /// The focused record, if anything is visible.
    pub fn current(&self) -> Option<&GroupedRecord> {
        self.visible
            .get(self.state.cursor)
            .map(|&i| &self.state.grouped[i])
    }

    /// 1-based cursor position and the number of visible records.
    pub fn position(&self) -> Option<(usize, usize)> {
        if self.visible.is_empty() {
            None
        } else {
            Some((self.state.cursor + 1, self.visible.len()))
        }
    }

    /// Visible records in display order.
    pub fn visible(&self) -> impl Iterator<Item = &GroupedRecord> + '_ {
        self.visible.iter().map(move |&i| &self.state.grouped[i])
    }

    pub fn visible_len(&self) -> usize {
        self.visible.len()
    }

    pub fn next(&mut self) -> Option<&GroupedRecord> {
        if !self.visible.is_empty() {
            self.state.cursor = (self.state.cursor + 1) % self.visible.len();
            self.changed();
        }
        self.current()
    }

    pub fn previous(&mut self) -> Option<&GroupedRecord> {
        if !self.visible.is_empty() {
            let len = self.visible.len();
            self.state.cursor = (self.state.cursor + len - 1) % len;
            self.changed();
        }
        self.current()
    }

    /// Reorder the view. Ties keep first-seen order.
    pub fn set_sort(&mut self, key: SortKey) {
        let focused = self.visible.get(self.state.cursor).copied();
        self.state.sort_key = key;
        self.recompute(focused);
        self.changed();
    }

    /// Hide records the predicate rejects. The cursor follows the focused
    /// record if it stays visible and otherwise returns to the start.
    pub fn set_filter(&mut self, filter: ViewFilter) {
        let focused = self.visible.get(self.state.cursor).copied();
        self.state.active_filter = filter;
        self.recompute(focused);
        self.changed();
    }

    fn recompute(&mut self, focused: Option<usize>) {
        let grouped = &self.state.grouped;
        let filter = &self.state.active_filter;
        let mut order: Vec<usize> = (0..grouped.len())
            .filter(|&i| filter.matches(&grouped[i]))
            .collect();

        // sort_by is stable, so equal keys stay in first-seen order
        match self.state.sort_key {
            SortKey::None => {}
            SortKey::DateDesc => order.sort_by(|&a, &b| {
                grouped[b]
                    .max_date_added()
                    .cmp(&grouped[a].max_date_added())
            }),
            SortKey::RatingDesc => order.sort_by(|&a, &b| {
                grouped[b]
                    .max_rating()
                    .partial_cmp(&grouped[a].max_rating())
                    .unwrap_or(Ordering::Equal)
            }),
            SortKey::ConfidenceDesc => order.sort_by(|&a, &b| {
                grouped[b].max_confidence().cmp(&grouped[a].max_confidence())
            }),
        }

        self.state.cursor = focused
            .and_then(|f| order.iter().position(|&i| i == f))
            .unwrap_or(0);
        self.visible = order;
    }

    fn changed(&mut self) {
        self.version += 1;
        for (_, observer) in &self.observers {
            observer(&self.state);
        }
    }
}
