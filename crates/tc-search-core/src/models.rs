//! Data types shared by the query builder, orchestrator, aggregation engine,
//! and view controller.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Indicator type names known to the platform.
pub const INDICATOR_TYPES: &[&str] = &[
    "Address",
    "EmailAddress",
    "File",
    "Host",
    "URL",
    "ASN",
    "CIDR",
    "Mutex",
    "Registry Key",
    "User Agent",
];

/// Group type names known to the platform.
pub const GROUP_TYPES: &[&str] = &[
    "Adversary",
    "Campaign",
    "Document",
    "Email",
    "Event",
    "Incident",
    "Intrusion Set",
    "Report",
    "Signature",
    "Threat",
];

/// Discriminant carried on every [`Record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Indicator,
    Group,
}

impl RecordKind {
    /// API collection name (`indicators` / `groups`).
    pub fn endpoint(&self) -> &'static str {
        match self {
            RecordKind::Indicator => "indicators",
            RecordKind::Group => "groups",
        }
    }

    /// Type names valid for this kind.
    pub fn known_types(&self) -> &'static [&'static str] {
        match self {
            RecordKind::Indicator => INDICATOR_TYPES,
            RecordKind::Group => GROUP_TYPES,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Indicator => write!(f, "indicator"),
            RecordKind::Group => write!(f, "group"),
        }
    }
}

impl FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "indicator" | "indicators" | "i" => Ok(RecordKind::Indicator),
            "group" | "groups" | "g" => Ok(RecordKind::Group),
            other => Err(format!("unknown kind '{}': use indicator or group", other)),
        }
    }
}

/// Which record collections a search covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Indicators,
    Groups,
    Both,
}

impl Scope {
    /// The single record kind for this scope, or `None` for [`Scope::Both`].
    pub fn kind(&self) -> Option<RecordKind> {
        match self {
            Scope::Indicators => Some(RecordKind::Indicator),
            Scope::Groups => Some(RecordKind::Group),
            Scope::Both => None,
        }
    }
}

impl From<RecordKind> for Scope {
    fn from(kind: RecordKind) -> Self {
        match kind {
            RecordKind::Indicator => Scope::Indicators,
            RecordKind::Group => Scope::Groups,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scope::Indicators => "indicators",
            Scope::Groups => "groups",
            Scope::Both => "both",
        };
        f.write_str(s)
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "indicators" | "indicator" | "i" => Ok(Scope::Indicators),
            "groups" | "group" | "g" => Ok(Scope::Groups),
            "both" | "all" | "b" => Ok(Scope::Both),
            other => Err(format!(
                "unknown scope '{}': use indicators, groups, or both",
                other
            )),
        }
    }
}

/// A tag attached to a raw item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Tag collection as returned by the API.
///
/// Accepts either a plain array of tags or the `{ "data": [...] }` wrapper
/// the v3 API uses when tags are requested as an extra field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TagList(pub Vec<Tag>);

#[derive(Deserialize)]
#[serde(untagged)]
enum TagListRepr {
    Plain(Vec<Tag>),
    Wrapped {
        #[serde(default)]
        data: Vec<Tag>,
    },
}

impl<'de> Deserialize<'de> for TagList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match TagListRepr::deserialize(deserializer)? {
            TagListRepr::Plain(tags) => TagList(tags),
            TagListRepr::Wrapped { data } => TagList(data),
        })
    }
}

/// Raw record returned by the backend before normalization.
///
/// Indicators carry `summary`, groups carry `name`; rating, confidence and
/// `active` are absent on groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawItem {
    #[serde(default)]
    pub id: i64,
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub confidence: Option<i64>,
    pub date_added: DateTime<Utc>,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub owner_name: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default)]
    pub false_positive_flag: Option<bool>,
    #[serde(default)]
    pub tags: TagList,
}

/// A single fetched entity, normalized from a [`RawItem`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: i64,
    pub kind: RecordKind,
    pub type_name: String,
    /// Summary for indicators, name for groups.
    pub display_value: String,
    /// 0.0 to 5.0; 0.0 means unrated.
    pub rating: f64,
    /// 0 to 100.
    pub confidence: u32,
    pub date_added: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub owner_name: String,
    pub active: bool,
    pub false_positive_flag: Option<bool>,
    pub tags: Vec<String>,
}

impl Record {
    /// Normalize a raw backend item.
    ///
    /// Out-of-range ratings and confidences are clamped; a missing
    /// `lastModified` falls back to `dateAdded`.
    pub fn from_raw(kind: RecordKind, raw: RawItem) -> Self {
        let display_value = match kind {
            RecordKind::Indicator => raw.summary.or(raw.name),
            RecordKind::Group => raw.name.or(raw.summary),
        }
        .unwrap_or_default();

        let rating = raw
            .rating
            .filter(|r| r.is_finite())
            .unwrap_or(0.0)
            .clamp(0.0, 5.0);
        let confidence = raw.confidence.unwrap_or(0).clamp(0, 100) as u32;

        Record {
            id: raw.id,
            kind,
            type_name: raw.type_name,
            display_value,
            rating,
            confidence,
            date_added: raw.date_added,
            last_modified: raw.last_modified.unwrap_or(raw.date_added),
            owner_name: raw.owner_name.unwrap_or_default(),
            active: raw.active.unwrap_or(true),
            false_positive_flag: raw.false_positive_flag,
            tags: raw.tags.0.into_iter().map(|t| t.name).collect(),
        }
    }

    /// Case-insensitive tag membership.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    /// Grouping key: the case-folded display value.
    pub fn group_key(&self) -> String {
        self.display_value.to_lowercase()
    }
}

/// A record linked to another one, as listed on its detail view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Association {
    pub id: i64,
    pub kind: RecordKind,
    pub type_name: String,
    /// Summary for indicators, name for groups.
    pub display_value: String,
    pub owner_name: String,
}

/// Groups and indicators associated with one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Associations {
    pub groups: Vec<Association>,
    pub indicators: Vec<Association>,
}

impl Associations {
    pub fn len(&self) -> usize {
        self.groups.len() + self.indicators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty() && self.indicators.is_empty()
    }
}

/// Structured predicates applied server-side through TQL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub rating_min: Option<f64>,
    pub rating_max: Option<f64>,
    pub confidence_min: Option<u32>,
    pub confidence_max: Option<u32>,
    pub added_after: Option<NaiveDate>,
    pub added_before: Option<NaiveDate>,
    /// Restrict the search to one owner (sent as a request parameter, not TQL).
    pub owner: Option<String>,
    /// Type allow-list; only names valid for the searched kind are applied.
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SearchFilters {
    /// True if any predicate that contributes a TQL clause is set.
    pub fn has_clauses(&self) -> bool {
        self.rating_min.is_some()
            || self.rating_max.is_some()
            || self.confidence_min.is_some()
            || self.confidence_max.is_some()
            || self.added_after.is_some()
            || self.added_before.is_some()
            || !self.types.is_empty()
            || !self.tags.is_empty()
    }

    /// True if nothing at all is set, owner included.
    pub fn is_empty(&self) -> bool {
        !self.has_clauses() && self.owner.is_none()
    }
}

/// One search invocation. Built by the caller, consumed by
/// [`search::execute`](crate::search::execute).
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Free text or an explicit TQL expression.
    pub query: String,
    pub scope: Scope,
    pub filters: Option<SearchFilters>,
    /// Zero-based.
    pub page: usize,
    pub page_size: usize,
    /// Infer the indicator type from free-text input.
    pub auto_detect: bool,
    /// Treat `query` as TQL even if it does not look like it.
    pub force_tql: bool,
    /// Ask the backend to include tags on each item.
    pub include_tags: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, scope: Scope) -> Self {
        Self {
            query: query.into(),
            scope,
            filters: None,
            page: 0,
            page_size: 100,
            auto_detect: true,
            force_tql: false,
            include_tags: true,
        }
    }

    pub fn with_page(mut self, page: usize, page_size: usize) -> Self {
        self.page = page;
        self.page_size = page_size;
        self
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = if filters.is_empty() {
            None
        } else {
            Some(filters)
        };
        self
    }

    pub fn with_auto_detect(mut self, auto_detect: bool) -> Self {
        self.auto_detect = auto_detect;
        self
    }

    pub fn with_force_tql(mut self, force_tql: bool) -> Self {
        self.force_tql = force_tql;
        self
    }

    /// Owner restriction from the filters, if any.
    pub fn owner(&self) -> Option<&str> {
        self.filters
            .as_ref()
            .and_then(|f| f.owner.as_deref())
            .filter(|o| !o.trim().is_empty())
    }

    /// Same request moved to another page.
    pub fn at_page(&self, page: usize) -> Self {
        let mut next = self.clone();
        next.page = page;
        next
    }
}

/// Page bookkeeping for a completed search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PaginationInfo {
    pub page: usize,
    pub page_size: usize,
    pub total: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl PaginationInfo {
    pub fn new(page: usize, page_size: usize, total: u64) -> Self {
        let size = page_size.max(1) as u64;
        let total_pages = total.div_ceil(size);
        let start = page as u64 * size;
        Self {
            page,
            page_size,
            total,
            total_pages,
            has_next: start + size < total,
            has_previous: page > 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scope_parses_aliases() {
        assert_eq!("Indicators".parse::<Scope>().unwrap(), Scope::Indicators);
        assert_eq!("group".parse::<Scope>().unwrap(), Scope::Groups);
        assert_eq!("both".parse::<Scope>().unwrap(), Scope::Both);
        assert!("everything".parse::<Scope>().is_err());
    }

    #[test]
    fn kind_parses_aliases() {
        assert_eq!("indicator".parse::<RecordKind>().unwrap(), RecordKind::Indicator);
        assert_eq!("Groups".parse::<RecordKind>().unwrap(), RecordKind::Group);
        assert_eq!("i".parse::<RecordKind>().unwrap(), RecordKind::Indicator);
        assert!("both".parse::<RecordKind>().is_err());
    }

    #[test]
    fn raw_indicator_maps_to_record() {
        let raw: RawItem = serde_json::from_value(json!({
            "id": 7,
            "type": "Address",
            "summary": "1.1.1.1",
            "rating": 3.0,
            "confidence": 80,
            "dateAdded": "2024-01-01T00:00:00Z",
            "lastModified": "2024-02-01T00:00:00Z",
            "ownerName": "Acme",
            "active": false,
            "falsePositiveFlag": true,
            "tags": { "data": [ { "name": "C2" } ] }
        }))
        .unwrap();

        let rec = Record::from_raw(RecordKind::Indicator, raw);
        assert_eq!(rec.display_value, "1.1.1.1");
        assert_eq!(rec.type_name, "Address");
        assert_eq!(rec.confidence, 80);
        assert!(!rec.active);
        assert_eq!(rec.false_positive_flag, Some(true));
        assert!(rec.has_tag("c2"));
    }

    #[test]
    fn raw_group_defaults() {
        let raw: RawItem = serde_json::from_value(json!({
            "id": 9,
            "type": "Adversary",
            "name": "APT29",
            "dateAdded": "2024-01-01T00:00:00Z",
            "ownerName": "Acme",
            "tags": [ { "name": "russia" } ]
        }))
        .unwrap();

        let rec = Record::from_raw(RecordKind::Group, raw);
        assert_eq!(rec.display_value, "APT29");
        assert_eq!(rec.rating, 0.0);
        assert_eq!(rec.confidence, 0);
        assert!(rec.active);
        assert_eq!(rec.last_modified, rec.date_added);
        assert_eq!(rec.tags, vec!["russia".to_string()]);
    }

    #[test]
    fn out_of_range_values_clamped() {
        let raw: RawItem = serde_json::from_value(json!({
            "type": "Host",
            "summary": "x.example.com",
            "rating": 9.5,
            "confidence": 250,
            "dateAdded": "2024-01-01T00:00:00Z"
        }))
        .unwrap();
        let rec = Record::from_raw(RecordKind::Indicator, raw);
        assert_eq!(rec.rating, 5.0);
        assert_eq!(rec.confidence, 100);
    }

    #[test]
    fn pagination_bounds() {
        let p = PaginationInfo::new(0, 10, 25);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(!p.has_previous);

        let last = PaginationInfo::new(2, 10, 25);
        assert!(!last.has_next);
        assert!(last.has_previous);

        let empty = PaginationInfo::new(0, 10, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
    }

    #[test]
    fn empty_filters_are_dropped_from_request() {
        let req = SearchRequest::new("x", Scope::Indicators).with_filters(SearchFilters::default());
        assert!(req.filters.is_none());

        let req = SearchRequest::new("x", Scope::Indicators).with_filters(SearchFilters {
            owner: Some("Acme".into()),
            ..Default::default()
        });
        assert_eq!(req.owner(), Some("Acme"));
    }
}
