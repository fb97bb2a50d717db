use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Datetime format the remote API expects in filters.
pub const MAGENTO_DATETIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Eq,
    /// Inclusive lower bound.
    From,
    /// Inclusive upper bound.
    To,
}

impl Condition {
    fn legacy_key(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::From => "from",
            Self::To => "to",
        }
    }

    fn rest_condition_type(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::From => "gteq",
            Self::To => "lteq",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterCondition {
    pub field: String,
    pub condition: Condition,
    pub value: String,
}

/// Immutable search criteria. Every builder method returns a new value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    conditions: Vec<FilterCondition>,
}

impl SearchFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition, replacing any earlier one on the same field and operator.
    pub fn with(self, field: &str, condition: Condition, value: impl Into<String>) -> Self {
        let mut conditions: Vec<FilterCondition> = self
            .conditions
            .into_iter()
            .filter(|c| !(c.field == field && c.condition == condition))
            .collect();
        conditions.push(FilterCondition {
            field: field.to_string(),
            condition,
            value: value.into(),
        });
        Self { conditions }
    }

    /// Restrict to records whose `updated_at` lies in `[from, to]`.
    /// `updated_at` also covers freshly created records.
    pub fn updated_between(self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        let filters = match from {
            Some(from) => self.with("updated_at", Condition::From, format_datetime(from)),
            None => self,
        };
        match to {
            Some(to) => filters.with("updated_at", Condition::To, format_datetime(to)),
            None => filters,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> &[FilterCondition] {
        &self.conditions
    }

    /// Legacy shape: `{"field": {"operator": "value"}}`; `{}` when empty.
    pub fn to_legacy_value(&self) -> Value {
        let mut fields = Map::new();
        for c in &self.conditions {
            let entry = fields
                .entry(c.field.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(ops) = entry {
                ops.insert(
                    c.condition.legacy_key().to_string(),
                    Value::String(c.value.clone()),
                );
            }
        }
        Value::Object(fields)
    }

    /// REST shape: one filter group per condition, so groups are AND-ed.
    pub fn to_search_criteria(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(self.conditions.len() * 3);
        for (group, c) in self.conditions.iter().enumerate() {
            let prefix = format!("searchCriteria[filter_groups][{group}][filters][0]");
            params.push((format!("{prefix}[field]"), c.field.clone()));
            params.push((format!("{prefix}[value]"), c.value.clone()));
            params.push((
                format!("{prefix}[condition_type]"),
                c.condition.rest_condition_type().to_string(),
            ));
        }
        params
    }
}

pub fn format_datetime(value: DateTime<Utc>) -> String {
    value.format(MAGENTO_DATETIME_FORMAT).to_string()
}
