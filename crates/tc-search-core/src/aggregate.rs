//! Deduplication and result statistics.
//!
//! [`aggregate`] folds the flat record list from a search into
//! [`GroupedRecord`]s keyed by the case-folded display value, so that the
//! same indicator reported by several owners is navigated as one unit. The
//! [`SearchStats`] summary is accumulated in the same pass.
//!
//! Groups are emitted in first-seen order. Means are `None` when nothing
//! contributed to them, including for an empty input.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Record, RecordKind};

/// Tag that marks a record as a false positive, compared case-insensitively.
pub const FALSE_POSITIVE_TAG: &str = "false positive";

/// All owner-duplicates of one value. `members` is never empty.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupedRecord {
    /// Case-folded display value.
    pub key: String,
    /// Type of the first member.
    pub type_name: String,
    pub members: Vec<Record>,
}

impl GroupedRecord {
    fn new(key: String, first: Record) -> Self {
        Self {
            key,
            type_name: first.type_name.clone(),
            members: vec![first],
        }
    }

    /// The first member, whose display value is shown for the group.
    pub fn primary(&self) -> &Record {
        &self.members[0]
    }

    pub fn display_value(&self) -> &str {
        &self.primary().display_value
    }

    pub fn kind(&self) -> RecordKind {
        self.primary().kind
    }

    /// Latest `date_added` among members.
    pub fn max_date_added(&self) -> DateTime<Utc> {
        self.members
            .iter()
            .map(|m| m.date_added)
            .max()
            .unwrap_or_else(|| self.primary().date_added)
    }

    /// Highest rating among members.
    pub fn max_rating(&self) -> f64 {
        self.members.iter().map(|m| m.rating).fold(0.0, f64::max)
    }

    /// Highest confidence among members.
    pub fn max_confidence(&self) -> u32 {
        self.members.iter().map(|m| m.confidence).max().unwrap_or(0)
    }

    pub fn has_active(&self) -> bool {
        self.members.iter().any(|m| m.active)
    }

    /// Distinct owners in first-seen order.
    pub fn owners(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.members
            .iter()
            .map(|m| m.owner_name.as_str())
            .filter(|o| seen.insert(*o))
            .collect()
    }

    /// Union of member tags, deduplicated case-insensitively.
    pub fn tags(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.members
            .iter()
            .flat_map(|m| m.tags.iter())
            .map(String::as_str)
            .filter(|t| seen.insert(t.to_lowercase()))
            .collect()
    }
}

/// Summary over one completed search.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchStats {
    /// Number of grouped records, not raw records.
    pub total_count: usize,
    pub earliest_added: Option<DateTime<Utc>>,
    pub latest_modified: Option<DateTime<Utc>>,
    /// Mean over records with a non-zero rating.
    pub avg_rating: Option<f64>,
    pub avg_confidence: Option<f64>,
    pub unique_owners: usize,
    pub active_count: usize,
    pub false_positive_count: usize,
}

/// Whether a record is flagged or tagged as a false positive.
pub fn is_false_positive(record: &Record) -> bool {
    record.false_positive_flag == Some(true) || record.has_tag(FALSE_POSITIVE_TAG)
}

#[derive(Default)]
struct StatsAccumulator {
    earliest_added: Option<DateTime<Utc>>,
    latest_modified: Option<DateTime<Utc>>,
    rating_sum: f64,
    rating_count: usize,
    confidence_sum: u64,
    confidence_count: usize,
    owners: HashSet<String>,
    active_count: usize,
    false_positive_count: usize,
}

impl StatsAccumulator {
    fn add(&mut self, r: &Record) {
        self.earliest_added = Some(match self.earliest_added {
            Some(d) => d.min(r.date_added),
            None => r.date_added,
        });
        self.latest_modified = Some(match self.latest_modified {
            Some(d) => d.max(r.last_modified),
            None => r.last_modified,
        });
        if r.rating > 0.0 {
            self.rating_sum += r.rating;
            self.rating_count += 1;
        }
        self.confidence_sum += u64::from(r.confidence);
        self.confidence_count += 1;
        if !self.owners.contains(&r.owner_name) {
            self.owners.insert(r.owner_name.clone());
        }
        if r.active {
            self.active_count += 1;
        }
        if is_false_positive(r) {
            self.false_positive_count += 1;
        }
    }

    fn finish(self, total_count: usize) -> SearchStats {
        SearchStats {
            total_count,
            earliest_added: self.earliest_added,
            latest_modified: self.latest_modified,
            avg_rating: mean(self.rating_sum, self.rating_count),
            avg_confidence: mean(self.confidence_sum as f64, self.confidence_count),
            unique_owners: self.owners.len(),
            active_count: self.active_count,
            false_positive_count: self.false_positive_count,
        }
    }
}

fn mean(sum: f64, count: usize) -> Option<f64> {
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Group `records` by case-folded display value and summarize them.
///
/// Total over its input: the empty list yields no groups and a stats value
/// with every count at zero and every optional field `None`.
pub fn aggregate(records: Vec<Record>) -> (Vec<GroupedRecord>, SearchStats) {
    let mut acc = StatsAccumulator::default();
    let mut grouped: Vec<GroupedRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for record in records {
        acc.add(&record);
        let key = record.group_key();
        match index.get(&key) {
            Some(&i) => grouped[i].members.push(record),
            None => {
                index.insert(key.clone(), grouped.len());
                grouped.push(GroupedRecord::new(key, record));
            }
        }
    }

    let stats = acc.finish(grouped.len());
    (grouped, stats)
}
