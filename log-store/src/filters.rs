//! Conversion of [`FilterCriteria`] to the Qdrant REST filter shape.
//!
//! ```json
//! {"must": [
//!   {"key": "timestamp", "range": {"gte": "...", "lte": "..."}},
//!   {"key": "status", "match": {"value": "404"}}
//! ]}
//! ```
//!
//! An empty filter means "match everything" and is left out of request bodies.

use serde::Serialize;
use tracing::debug;

use crate::record::FilterCriteria;

/// Conjunction of field conditions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Filter {
    pub must: Vec<Condition>,
}

impl Filter {
    pub fn is_empty(&self) -> bool {
        self.must.is_empty()
    }

    /// `None` for an empty filter, so it can be skipped when serializing.
    pub fn non_empty(f: Option<&Filter>) -> Option<&Filter> {
        f.filter(|f| !f.is_empty())
    }
}

/// Single field condition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Condition {
    Match {
        key: String,
        #[serde(rename = "match")]
        matches: MatchValue,
    },
    Range {
        key: String,
        range: RangeBounds,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MatchValue {
    pub value: String,
}

/// Inclusive bounds; passed to the store as given.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RangeBounds {
    pub gte: String,
    pub lte: String,
}

/// Builds the filter for the given criteria.
///
/// Order is fixed: timestamp range, then status, ip, request_type, endpoint,
/// size, referer, user_agent, response_time.
pub fn build_filter(c: &FilterCriteria) -> Filter {
    let mut must = Vec::new();

    if let (Some(gte), Some(lte)) = (&c.timestamp_start, &c.timestamp_end) {
        must.push(Condition::Range {
            key: "timestamp".into(),
            range: RangeBounds {
                gte: gte.clone(),
                lte: lte.clone(),
            },
        });
    }

    for (key, value) in [
        ("status", &c.status),
        ("ip", &c.ip),
        ("request_type", &c.request_type),
        ("endpoint", &c.endpoint),
        ("size", &c.size),
        ("referer", &c.referer),
        ("user_agent", &c.user_agent),
        ("response_time", &c.response_time),
    ] {
        if let Some(v) = value {
            must.push(Condition::Match {
                key: key.into(),
                matches: MatchValue { value: v.clone() },
            });
        }
    }

    debug!(conditions = must.len(), "filters::build_filter");
    Filter { must }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_criteria_give_empty_filter() {
        let f = build_filter(&FilterCriteria::default());
        assert!(f.is_empty());
        assert_eq!(Filter::non_empty(Some(&f)), None);
    }

    #[test]
    fn status_only() {
        let f = build_filter(&FilterCriteria {
            status: Some("404".into()),
            ..Default::default()
        });
        assert_eq!(
            serde_json::to_value(&f).unwrap(),
            json!({"must": [{"key": "status", "match": {"value": "404"}}]})
        );
    }

    #[test]
    fn range_needs_both_bounds() {
        let half = build_filter(&FilterCriteria {
            timestamp_start: Some("a".into()),
            ..Default::default()
        });
        assert!(half.is_empty());

        let full = build_filter(&FilterCriteria {
            timestamp_start: Some("2023-10-01".into()),
            timestamp_end: Some("2023-10-31".into()),
            ip: Some("10.0.0.1".into()),
            ..Default::default()
        });
        assert_eq!(
            serde_json::to_value(&full).unwrap(),
            json!({"must": [
                {"key": "timestamp", "range": {"gte": "2023-10-01", "lte": "2023-10-31"}},
                {"key": "ip", "match": {"value": "10.0.0.1"}}
            ]})
        );
    }

    #[test]
    fn all_fields_keep_fixed_order() {
        let s = |v: &str| Some(v.to_string());
        let f = build_filter(&FilterCriteria {
            timestamp_start: None,
            timestamp_end: None,
            response_time: s("9"),
            user_agent: s("ua"),
            referer: s("-"),
            size: s("1"),
            endpoint: s("/"),
            request_type: s("GET"),
            ip: s("1.1.1.1"),
            status: s("200"),
        });
        let keys: Vec<&str> = f
            .must
            .iter()
            .map(|c| match c {
                Condition::Match { key, .. } | Condition::Range { key, .. } => key.as_str(),
            })
            .collect();
        assert_eq!(
            keys,
            [
                "status",
                "ip",
                "request_type",
                "endpoint",
                "size",
                "referer",
                "user_agent",
                "response_time"
            ]
        );
    }
}
