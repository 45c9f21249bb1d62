//! TQL query construction and validation.
//!
//! Free-text input is turned into a TQL expression by [`build_simple`];
//! structured filters are conjoined onto it by [`build_filtered`]; and every
//! expression leaving this module passes the syntactic checks in
//! [`validate`]. Input that already looks like TQL is passed through
//! unchanged (see [`looks_like_tql`]).
//!
//! Clause order produced by [`build_filtered`]:
//!
//! 1. `(base)`
//! 2. `typeName in (...)`
//! 3. `rating >= / <=`
//! 4. `confidence >= / <=`
//! 5. `dateAdded > / <`
//! 6. one `tag in (...)` per tag

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::detect;
use crate::models::{RecordKind, Scope, SearchFilters};

/// A TQL expression ready to send to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct QueryExpr(String);

impl QueryExpr {
    /// Wrap an expression without validating it.
    pub fn new(expr: impl Into<String>) -> Self {
        Self(expr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for QueryExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Errors from assembling a query out of user input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// A single query cannot cover both indicators and groups.
    #[error("cannot build a single query for scope 'both'; split into indicator and group queries")]
    InvalidScope,
    /// Neither a base expression nor any filter produced a clause.
    #[error("no query or filters provided")]
    EmptyQuery,
    /// `page_size` must be at least 1.
    #[error("page size must be at least 1")]
    InvalidPageSize,
}

/// Syntactic problems with a TQL expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("query cannot be empty")]
    EmptyExpression,
    #[error("unmatched quotes in query")]
    UnbalancedQuotes,
    #[error("unmatched parentheses in query")]
    UnbalancedParens,
}

static TQL_COMPARISON: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)\b(?:typename|summary|name|rating|confidence|dateadded|lastmodified|tag|ownername|id|active|falsepositiveflag)\s*(?:==|!=|>=|<=|=|>|<|\s(?:not\s+)?in\s*\(|\s(?:not\s+)?like\s|\scontains\s|\sstartswith\s|\sendswith\s)"#,
    )
    .unwrap()
});

static TQL_CONNECTIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)["')]\s+(?:and|or)\s+"#).unwrap());

/// Heuristic: does `input` already read as a TQL expression?
///
/// True when it contains a field comparison (`rating >= 3`,
/// `typeName in (...)`) or a logical connective joining quoted or
/// parenthesized operands.
pub fn looks_like_tql(input: &str) -> bool {
    TQL_COMPARISON.is_match(input) || TQL_CONNECTIVE.is_match(input)
}

/// Quote a value as a TQL string literal, escaping `\` and `"`.
pub fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn in_clause(field: &str, values: &[&str]) -> String {
    let list: Vec<String> = values.iter().map(|v| quote(v)).collect();
    format!("{} in ({})", field, list.join(", "))
}

/// Build a single-scope query for raw free text.
///
/// - Indicators: with `auto_detect` and a recognized type,
///   `typeName in ("<type>") and summary in ("<raw>")`; otherwise just the
///   summary clause, searching across all indicator types.
/// - Groups: `name in ("<raw>")`.
/// - Both: rejected with [`BuildError::InvalidScope`].
pub fn build_simple(raw: &str, scope: Scope, auto_detect: bool) -> Result<QueryExpr, BuildError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(BuildError::EmptyQuery);
    }

    match scope {
        Scope::Indicators => {
            let detected = if auto_detect {
                detect::detect_type_name(value)
            } else {
                None
            };
            let value_clause = in_clause("summary", &[value]);
            Ok(QueryExpr(match detected {
                Some(type_name) => {
                    format!("{} and {}", in_clause("typeName", &[type_name]), value_clause)
                }
                None => value_clause,
            }))
        }
        Scope::Groups => Ok(QueryExpr(in_clause("name", &[value]))),
        Scope::Both => Err(BuildError::InvalidScope),
    }
}

/// Conjoin `filters` onto an optional base expression for one scope.
pub fn build_filtered(
    base: Option<&QueryExpr>,
    filters: &SearchFilters,
    scope: Scope,
) -> Result<QueryExpr, BuildError> {
    let kind = scope.kind().ok_or(BuildError::InvalidScope)?;
    let mut conditions: Vec<String> = Vec::new();

    if let Some(base) = base.filter(|b| !b.as_str().trim().is_empty()) {
        conditions.push(format!("({})", base.as_str()));
    }

    let types = allowed_types(&filters.types, kind);
    if !types.is_empty() {
        conditions.push(in_clause("typeName", &types));
    }

    if let Some(min) = filters.rating_min {
        conditions.push(format!("rating >= {:?}", min));
    }
    if let Some(max) = filters.rating_max {
        conditions.push(format!("rating <= {:?}", max));
    }
    if let Some(min) = filters.confidence_min {
        conditions.push(format!("confidence >= {}", min));
    }
    if let Some(max) = filters.confidence_max {
        conditions.push(format!("confidence <= {}", max));
    }
    if let Some(after) = filters.added_after {
        conditions.push(format!("dateAdded > \"{}\"", after.format("%Y-%m-%d")));
    }
    if let Some(before) = filters.added_before {
        conditions.push(format!("dateAdded < \"{}\"", before.format("%Y-%m-%d")));
    }
    for tag in filters.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        conditions.push(in_clause("tag", &[tag]));
    }

    if conditions.is_empty() {
        return Err(BuildError::EmptyQuery);
    }
    Ok(QueryExpr(conditions.join(" and ")))
}

/// Canonical type names from `requested` that are valid for `kind`.
fn allowed_types(requested: &[String], kind: RecordKind) -> Vec<&'static str> {
    let mut out: Vec<&'static str> = Vec::new();
    for name in requested {
        let canonical = kind
            .known_types()
            .iter()
            .copied()
            .find(|known| known.eq_ignore_ascii_case(name.trim()));
        if let Some(c) = canonical {
            if !out.contains(&c) {
                out.push(c);
            }
        }
    }
    out
}

/// Syntactic sanity check.
///
/// Rejects empty or whitespace-only input, an odd number of unescaped `"`,
/// and parentheses that do not balance outside quoted literals. Knows
/// nothing about the remote schema.
pub fn validate(expr: &QueryExpr) -> Result<(), ValidationError> {
    let s = expr.as_str();
    if s.trim().is_empty() {
        return Err(ValidationError::EmptyExpression);
    }

    let mut in_quotes = false;
    let mut escaped = false;
    let mut depth: i64 = 0;
    let mut went_negative = false;

    for c in s.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '(' if !in_quotes => depth += 1,
            ')' if !in_quotes => {
                depth -= 1;
                if depth < 0 {
                    went_negative = true;
                }
            }
            _ => {}
        }
    }

    if in_quotes {
        return Err(ValidationError::UnbalancedQuotes);
    }
    if depth != 0 || went_negative {
        return Err(ValidationError::UnbalancedParens);
    }
    Ok(())
}

/// Error from [`prepare`]: either stage can fail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrepareError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Turn user input plus optional filters into one validated expression for a
/// single scope.
///
/// TQL-looking input (or any input when `force_tql` is set) is validated and
/// used verbatim as the base; otherwise [`build_simple`] constructs it. Empty
/// input is allowed when filters alone produce clauses.
pub fn prepare(
    input: &str,
    scope: Scope,
    auto_detect: bool,
    force_tql: bool,
    filters: Option<&SearchFilters>,
) -> Result<QueryExpr, PrepareError> {
    if scope == Scope::Both {
        return Err(BuildError::InvalidScope.into());
    }

    let trimmed = input.trim();
    let base = if trimmed.is_empty() {
        None
    } else if force_tql || looks_like_tql(trimmed) {
        let expr = QueryExpr::new(trimmed);
        validate(&expr)?;
        Some(expr)
    } else {
        Some(build_simple(trimmed, scope, auto_detect)?)
    };

    let expr = match filters.filter(|f| f.has_clauses()) {
        Some(f) => build_filtered(base.as_ref(), f, scope)?,
        None => base.ok_or(BuildError::EmptyQuery)?,
    };

    validate(&expr)?;
    Ok(expr)
}
