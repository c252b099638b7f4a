//! Enumerated view-query options.

use serde::Serialize;
use serde_json::Value;

/// Staleness tolerance for a materialized view read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stale {
    /// Update the index before serving the read.
    #[serde(rename = "false")]
    False,
    /// Serve whatever the index currently holds.
    #[serde(rename = "ok")]
    Ok,
    /// Serve the current index and trigger an update afterwards.
    #[serde(rename = "update_after")]
    UpdateAfter,
}

/// Options for a materialized view query.
///
/// Each logical query only ever uses a fixed, known subset of the
/// engine's option keys, so the option set is an explicit struct rather
/// than an untyped map. Unset fields are omitted from the serialized
/// form.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ViewQueryOptions {
    /// Staleness tolerance.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stale: Option<Stale>,

    /// Exact key match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<Value>,

    /// Inclusive range start key.
    #[serde(rename = "startkey", skip_serializing_if = "Option::is_none")]
    pub start_key: Option<Value>,

    /// Range end key; inclusive unless `inclusive_end` is false.
    #[serde(rename = "endkey", skip_serializing_if = "Option::is_none")]
    pub end_key: Option<Value>,

    /// Maximum number of rows to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,

    /// Whether to apply the reduce function.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduce: Option<bool>,

    /// Whether the end key itself is part of the range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inclusive_end: Option<bool>,
}

impl ViewQueryOptions {
    /// Sets the staleness tolerance.
    #[must_use]
    pub fn stale(mut self, stale: Stale) -> Self {
        self.stale = Some(stale);
        self
    }

    /// Sets an exact key match.
    #[must_use]
    pub fn key(mut self, key: Value) -> Self {
        self.key = Some(key);
        self
    }

    /// Sets the range start key.
    #[must_use]
    pub fn start_key(mut self, key: Value) -> Self {
        self.start_key = Some(key);
        self
    }

    /// Sets the range end key.
    #[must_use]
    pub fn end_key(mut self, key: Value) -> Self {
        self.end_key = Some(key);
        self
    }

    /// Sets the row limit.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sets whether to apply the reduce function.
    #[must_use]
    pub fn reduce(mut self, reduce: bool) -> Self {
        self.reduce = Some(reduce);
        self
    }

    /// Sets whether the end key is part of the range.
    #[must_use]
    pub fn inclusive_end(mut self, inclusive: bool) -> Self {
        self.inclusive_end = Some(inclusive);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unset_fields_are_omitted() {
        let options = ViewQueryOptions::default().stale(Stale::False);
        let serialized = serde_json::to_value(&options).unwrap();
        assert_eq!(serialized, json!({"stale": "false"}));
    }

    #[test]
    fn range_options_use_engine_key_names() {
        let options = ViewQueryOptions::default()
            .stale(Stale::Ok)
            .start_key(json!(["news", 1]))
            .end_key(json!(["news", 100]))
            .limit(10)
            .reduce(false)
            .inclusive_end(false);
        let serialized = serde_json::to_value(&options).unwrap();
        assert_eq!(
            serialized,
            json!({
                "stale": "ok",
                "startkey": ["news", 1],
                "endkey": ["news", 100],
                "limit": 10,
                "reduce": false,
                "inclusive_end": false,
            })
        );
    }
}
