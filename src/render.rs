//! Plain-text rendering for search results.
//!
//! Everything here returns `String`s; the callers decide where to print.
//! Time-relative helpers take `now` explicitly so output is reproducible.

use chrono::{DateTime, Utc};

use tc_search_core::aggregate::{is_false_positive, GroupedRecord, SearchStats};
use tc_search_core::detail::RecordDetail;
use tc_search_core::models::{Association, PaginationInfo};
use tc_search_core::view::ViewController;

use crate::progress::format_number;

const STAR: char = '★';
const NO_STAR: char = '☆';

/// Rating as five stars plus the value, e.g. `★★★☆☆ (3.5/5)`.
/// Unrated (0.0) shows empty stars and `unrated`.
pub fn format_rating(rating: f64) -> String {
    if rating <= 0.0 {
        return format!("{} (unrated)", NO_STAR.to_string().repeat(5));
    }
    let filled = (rating.floor() as usize).min(5);
    format!(
        "{}{} ({:.1}/5)",
        STAR.to_string().repeat(filled),
        NO_STAR.to_string().repeat(5 - filled),
        rating
    )
}

pub fn format_confidence(confidence: u32) -> String {
    format!("{}%", confidence)
}

/// Format a timestamp with a `chrono` strftime pattern.
pub fn format_date(ts: DateTime<Utc>, date_format: &str) -> String {
    ts.format(date_format).to_string()
}

/// Relative time such as "3 hours ago"; older than 30 days falls back to
/// an absolute date.
pub fn format_ts_relative(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let delta = (now - ts).num_seconds();

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

/// Cut `text` to at most `max` characters, ending in `...` when shortened.
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max <= 3 {
        return ".".repeat(max);
    }
    let kept: String = text.chars().take(max - 3).collect();
    format!("{}...", kept)
}

/// Join up to `max_items` items, summarizing the rest as "and N more".
pub fn format_list<S: AsRef<str>>(items: &[S], max_items: usize) -> String {
    if items.is_empty() {
        return "none".to_string();
    }
    let shown: Vec<&str> = items.iter().take(max_items).map(|s| s.as_ref()).collect();
    if items.len() <= max_items {
        shown.join(", ")
    } else {
        format!("{}, and {} more", shown.join(", "), items.len() - max_items)
    }
}

fn opt_date(ts: Option<DateTime<Utc>>, date_format: &str) -> String {
    ts.map(|t| format_date(t, date_format))
        .unwrap_or_else(|| "n/a".to_string())
}

/// Multi-line summary block for [`SearchStats`].
pub fn render_stats(stats: &SearchStats, pagination: &PaginationInfo, date_format: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "  Results:       {} unique (page {} of {}, {} total)\n",
        format_number(stats.total_count as u64),
        pagination.page + 1,
        pagination.total_pages.max(1),
        format_number(pagination.total)
    ));
    out.push_str(&format!(
        "  Avg rating:    {}\n",
        stats
            .avg_rating
            .map(|r| format!("{:.2}", r))
            .unwrap_or_else(|| "n/a".to_string())
    ));
    out.push_str(&format!(
        "  Avg confidence:{}\n",
        stats
            .avg_confidence
            .map(|c| format!(" {:.0}%", c))
            .unwrap_or_else(|| " n/a".to_string())
    ));
    out.push_str(&format!("  Owners:        {}\n", stats.unique_owners));
    out.push_str(&format!("  Active:        {}\n", stats.active_count));
    out.push_str(&format!("  False pos.:    {}\n", stats.false_positive_count));
    out.push_str(&format!(
        "  First added:   {}\n",
        opt_date(stats.earliest_added, date_format)
    ));
    out.push_str(&format!(
        "  Last modified: {}\n",
        opt_date(stats.latest_modified, date_format)
    ));
    out
}

/// One table row per visible grouped record.
pub fn render_list(view: &ViewController, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "  {:<4} {:<14} {:<44} {:>7} {:>5} {:>6}   {}\n",
        "#", "TYPE", "VALUE", "RATING", "CONF", "OWNERS", "ADDED"
    ));
    out.push_str(&format!("  {}\n", "-".repeat(100)));
    for (i, g) in view.visible().enumerate() {
        out.push_str(&format!(
            "  {:<4} {:<14} {:<44} {:>7.1} {:>4}% {:>6}   {}\n",
            i + 1,
            truncate(&g.type_name, 14),
            truncate(g.display_value(), 44),
            g.max_rating(),
            g.max_confidence(),
            g.owners().len(),
            format_ts_relative(g.max_date_added(), now)
        ));
    }
    out
}

/// Detail card for one grouped record, listing each owner's copy.
pub fn render_card(
    group: &GroupedRecord,
    position: Option<(usize, usize)>,
    date_format: &str,
    now: DateTime<Utc>,
) -> String {
    let mut out = String::new();
    let (pos, len) = position.unwrap_or((1, 1));
    out.push_str(&format!(
        "[{}/{}] {}  ({} {})\n",
        pos,
        len,
        group.display_value(),
        group.kind(),
        group.type_name
    ));
    out.push_str(&format!("  Rating:     {}\n", format_rating(group.max_rating())));
    out.push_str(&format!(
        "  Confidence: {}\n",
        format_confidence(group.max_confidence())
    ));
    out.push_str(&format!(
        "  Added:      {} ({})\n",
        format_date(group.max_date_added(), date_format),
        format_ts_relative(group.max_date_added(), now)
    ));
    out.push_str(&format!("  Owners:     {}\n", format_list(&group.owners(), 3)));
    out.push_str(&format!("  Tags:       {}\n", format_list(&group.tags(), 5)));

    for m in &group.members {
        let mut flags = Vec::new();
        if !m.active {
            flags.push("inactive");
        }
        if is_false_positive(m) {
            flags.push("false positive");
        }
        out.push_str(&format!(
            "    - {:<24} id {:<10} {:.1}/5 {:>3}%  modified {}{}\n",
            truncate(&m.owner_name, 24),
            m.id,
            m.rating,
            m.confidence,
            format_date(m.last_modified, date_format),
            if flags.is_empty() {
                String::new()
            } else {
                format!("  [{}]", flags.join(", "))
            }
        ));
    }
    out
}

fn render_associations(out: &mut String, title: &str, items: &[Association]) {
    out.push_str(&format!("  {} ({}):\n", title, items.len()));
    for a in items {
        out.push_str(&format!(
            "    - {:<14} {:<40} id {:<10} {}\n",
            truncate(&a.type_name, 14),
            truncate(&a.display_value, 40),
            a.id,
            a.owner_name
        ));
    }
}

/// Full view of one record and everything associated with it.
pub fn render_detail(detail: &RecordDetail, date_format: &str, now: DateTime<Utc>) -> String {
    let r = &detail.record;
    let mut out = String::new();
    out.push_str(&format!(
        "{}  ({} {}, id {})\n",
        r.display_value, r.kind, r.type_name, r.id
    ));
    out.push_str(&format!("  Owner:      {}\n", r.owner_name));
    out.push_str(&format!("  Rating:     {}\n", format_rating(r.rating)));
    out.push_str(&format!("  Confidence: {}\n", format_confidence(r.confidence)));
    out.push_str(&format!(
        "  Added:      {} ({})\n",
        format_date(r.date_added, date_format),
        format_ts_relative(r.date_added, now)
    ));
    out.push_str(&format!(
        "  Modified:   {}\n",
        format_date(r.last_modified, date_format)
    ));
    out.push_str(&format!(
        "  Status:     {}{}\n",
        if r.active { "active" } else { "inactive" },
        if is_false_positive(r) { ", false positive" } else { "" }
    ));
    out.push_str(&format!("  Tags:       {}\n", format_list(&r.tags, 10)));
    render_associations(&mut out, "Associated groups", &detail.associations.groups);
    render_associations(&mut out, "Associated indicators", &detail.associations.indicators);
    out
}
