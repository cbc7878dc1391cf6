//! Request-level parsing for issue search endpoints.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::services::ServiceError;

pub const DEFAULT_SORT: &str = "date";
pub const DEFAULT_QUERY: &str = "is:unresolved";
pub const DEFAULT_STATS_PERIOD: &str = "24h";
pub const AUTO_STATS_PERIOD: &str = "auto";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CursorValue {
    Int(i64),
    Float(f64),
}

impl fmt::Display for CursorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CursorValue::Int(v) => write!(f, "{}", v),
            // Keep a fractional part so the value parses back as a float.
            CursorValue::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{:.1}", v),
            CursorValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Pagination cursor in `<value>:<offset>:<is_prev>` form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cursor {
    pub value: CursorValue,
    pub offset: i64,
    pub is_prev: bool,
}

impl FromStr for Cursor {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ServiceError::InvalidQuery("Invalid cursor parameter.".to_string());

        let bits: Vec<&str> = s.split(':').collect();
        let [value, offset, is_prev] = bits.as_slice() else {
            return Err(invalid());
        };

        let value = if value.contains('.') {
            CursorValue::Float(value.parse().map_err(|_| invalid())?)
        } else {
            CursorValue::Int(value.parse().map_err(|_| invalid())?)
        };
        let offset = offset.parse().map_err(|_| invalid())?;
        let is_prev = is_prev.parse::<i64>().map_err(|_| invalid())? != 0;

        Ok(Cursor {
            value,
            offset,
            is_prev,
        })
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.value, self.offset, u8::from(self.is_prev))
    }
}

/// Resolved stats window for issue lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsPeriod {
    /// `None` disables stats.
    pub period: Option<String>,
    /// Only set when `period` is `auto`.
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Absent period defaults to `24h`, an empty one disables stats, and `auto`
/// takes its window from `start`/`end`.
pub fn calculate_stats_period(
    stats_period: Option<&str>,
    start: Option<&str>,
    end: Option<&str>,
) -> StatsPeriod {
    let period = match stats_period {
        None => Some(DEFAULT_STATS_PERIOD.to_string()),
        Some("") => None,
        Some(p) => Some(p.to_string()),
    };

    let (start, end) = if period.as_deref() == Some(AUTO_STATS_PERIOD) {
        (start.map(str::to_string), end.map(str::to_string))
    } else {
        (None, None)
    };

    StatsPeriod { period, start, end }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IssueQueryParams {
    pub sort_by: String,
    pub limit: Option<i64>,
    pub cursor: Option<Cursor>,
    /// Trimmed search query; empty means no filters.
    pub query: String,
    pub stats: StatsPeriod,
}

impl IssueQueryParams {
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, ServiceError> {
        let get = |key: &str| params.get(key).map(String::as_str);

        let limit = match get("limit") {
            Some(raw) if !raw.is_empty() => Some(
                raw.parse::<i64>()
                    .map_err(|_| ServiceError::InvalidQuery("invalid limit".to_string()))?,
            ),
            _ => None,
        };

        let cursor = match get("cursor") {
            Some(raw) if !raw.is_empty() => Some(raw.parse::<Cursor>()?),
            _ => None,
        };

        let query = get("query").unwrap_or(DEFAULT_QUERY).trim().to_string();

        Ok(Self {
            sort_by: get("sort").unwrap_or(DEFAULT_SORT).to_string(),
            limit,
            cursor,
            query,
            stats: calculate_stats_period(get("statsPeriod"), get("start"), get("end")),
        })
    }
}
