use std::collections::HashMap;

use serde_json::Value;

/// Query-string keys that drive pagination and never become filter conditions.
pub const RESERVED_KEYS: [&str; 3] = ["limit", "page", "sortBy"];

pub const DEFAULT_LIMIT: u64 = 10;
pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_SORT_FIELD: &str = "createdAt";

/// Condition
///
/// A single match rule on a top-level document field. Values are compared on their textual
/// form (see [`text_of`]), so `"5000"` matches a stored number `5000`.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq { field: String, value: String },
    AnyOf { field: String, values: Vec<String> },
}

impl Condition {
    pub fn field(&self) -> &str {
        match self {
            Condition::Eq { field, .. } | Condition::AnyOf { field, .. } => field,
        }
    }

    pub fn matches(&self, doc: &Value) -> bool {
        let actual = doc.get(self.field()).and_then(text_of);
        match (self, actual) {
            (Condition::Eq { value, .. }, Some(actual)) => actual == *value,
            (Condition::AnyOf { values, .. }, Some(actual)) => values.contains(&actual),
            (_, None) => false,
        }
    }
}

/// Filter
///
/// Conjunction of conditions. The empty filter matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an equality filter from query parameters, skipping the pagination keys.
    /// Keys are not validated here; unknown fields simply match nothing.
    pub fn from_query(params: &HashMap<String, String>) -> Self {
        let mut pairs: Vec<(&String, &String)> = params
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .collect();
        // HashMap order is random; keep the generated SQL stable.
        pairs.sort();
        let mut filter = Self::new();
        for (field, value) in pairs {
            filter = filter.eq(field.clone(), value.clone());
        }
        filter
    }

    pub fn eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push(Condition::Eq {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn any_of<I, V>(mut self, field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        self.conditions.push(Condition::AnyOf {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Drops any caller-supplied condition on `field` and pins it to `value`.
    /// Used to scope non-admin callers to their own records.
    pub fn restrict(mut self, field: &str, value: impl Into<String>) -> Self {
        self.conditions.retain(|c| c.field() != field);
        self.eq(field, value)
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.conditions.iter().all(|c| c.matches(doc))
    }
}

/// Textual form of a JSON value, mirroring Postgres' `->>` operator: strings as-is, scalars
/// via their JSON text, `null` as absent.
pub fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Sort
///
/// Parsed form of `sortBy=<field>:<asc|desc>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            field: DEFAULT_SORT_FIELD.to_string(),
            direction: Direction::Desc,
        }
    }
}

impl Sort {
    /// Parses a sort spec. Absent or empty input yields `createdAt:desc`; a missing or
    /// unrecognised direction means ascending.
    pub fn parse(spec: Option<&str>) -> Self {
        let spec = match spec.map(str::trim) {
            Some(s) if !s.is_empty() => s,
            _ => return Self::default(),
        };
        let (field, direction) = match spec.split_once(':') {
            Some((field, dir)) if dir.eq_ignore_ascii_case("desc") => (field, Direction::Desc),
            Some((field, _)) => (field, Direction::Asc),
            None => (spec, Direction::Asc),
        };
        if field.is_empty() {
            return Self::default();
        }
        Self {
            field: field.to_string(),
            direction,
        }
    }
}

/// ListQuery
///
/// Everything a list endpoint needs: the filter plus page window and ordering.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub filter: Filter,
    pub sort: Sort,
    pub limit: u64,
    pub page: u64,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            filter: Filter::new(),
            sort: Sort::default(),
            limit: DEFAULT_LIMIT,
            page: DEFAULT_PAGE,
        }
    }
}

impl ListQuery {
    /// Splits raw query parameters into filter, sort and window. Non-positive or unparseable
    /// `limit`/`page` fall back to the defaults instead of failing.
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        Self {
            filter: Filter::from_query(params),
            sort: Sort::parse(params.get("sortBy").map(String::as_str)),
            limit: positive_or(params.get("limit"), DEFAULT_LIMIT),
            page: positive_or(params.get("page"), DEFAULT_PAGE),
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn skip(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

fn positive_or(raw: Option<&String>, default: u64) -> u64 {
    raw.and_then(|v| v.trim().parse::<i64>().ok())
        .filter(|v| *v > 0)
        .map(|v| v as u64)
        .unwrap_or(default)
}
