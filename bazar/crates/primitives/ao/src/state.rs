//! Normalization of process state read from heterogeneous nodes.
//!
//! Different nodes and process versions put the interesting part of the state under different
//! wrapper keys, sometimes as JSON text. A [`Normalizer`] walks an ordered list of extractors and
//! keeps the first candidate that carries a known marker field, with aliases renamed to their
//! canonical spelling.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ops::Deref;

/// Canonical field name and the aliases it absorbs.
pub const CANONICAL_FIELDS: &[(&str, &[&str])] = &[
    ("Claims", &["claims"]),
    ("Balances", &["balances"]),
    ("TotalSupply", &["totalSupply", "total_supply"]),
    ("Stats", &["stats"]),
];

/// Normalized process state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessState(pub Value);

impl ProcessState {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn into_inner(self) -> Value {
        self.0
    }
}

impl Deref for ProcessState {
    type Target = Value;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// One way of locating the state inside a raw response.
#[derive(Clone, Copy)]
pub struct Extractor {
    pub name: &'static str,
    project: fn(&Value) -> Option<Value>,
}

impl std::fmt::Debug for Extractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Extractor").field("name", &self.name).finish()
    }
}

impl Extractor {
    pub const fn new(name: &'static str, project: fn(&Value) -> Option<Value>) -> Self {
        Self { name, project }
    }
}

#[derive(Debug, Clone)]
pub struct Normalizer {
    extractors: Vec<Extractor>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            extractors: vec![
                Extractor::new("top-level", |raw| raw.is_object().then(|| raw.clone())),
                Extractor::new("body", |raw| raw.get("body").and_then(parse_if_text)),
                Extractor::new("ao-result", ao_result),
                Extractor::new("asset", |raw| raw.get("asset").and_then(parse_if_text)),
                Extractor::new("json-text", |raw| raw.as_str().and_then(|text| serde_json::from_str(text).ok())),
            ],
        }
    }
}

impl Normalizer {
    pub fn new(extractors: Vec<Extractor>) -> Self {
        Self { extractors }
    }

    pub fn extractors(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.extractors.iter().map(|e| e.name)
    }

    /// Returns the first candidate carrying a marker, canonicalized, or `raw` unchanged.
    pub fn normalize(&self, raw: &Value) -> ProcessState {
        for extractor in &self.extractors {
            let Some(Value::Object(candidate)) = (extractor.project)(raw) else { continue };
            if has_marker(&candidate) {
                tracing::trace!(extractor = extractor.name, "Normalized process state");
                return ProcessState(Value::Object(canonicalize(candidate)));
            }
        }
        ProcessState(raw.clone())
    }
}

/// True when the object holds any canonical field or alias.
pub fn has_marker(object: &Map<String, Value>) -> bool {
    CANONICAL_FIELDS
        .iter()
        .any(|(canonical, aliases)| object.contains_key(*canonical) || aliases.iter().any(|a| object.contains_key(*a)))
}

fn canonicalize(mut object: Map<String, Value>) -> Map<String, Value> {
    for (canonical, aliases) in CANONICAL_FIELDS {
        if object.contains_key(*canonical) {
            continue;
        }
        if let Some(alias) = aliases.iter().find(|a| object.contains_key(**a)) {
            if let Some(value) = object.remove(*alias) {
                object.insert(canonical.to_string(), value);
            }
        }
    }
    object
}

fn parse_if_text(value: &Value) -> Option<Value> {
    match value {
        Value::String(text) => serde_json::from_str(text).ok(),
        other => Some(other.clone()),
    }
}

/// `ao-result` either holds the state or names the key that does.
fn ao_result(raw: &Value) -> Option<Value> {
    let value = raw.get("ao-result")?;
    if let Some(key) = value.as_str() {
        if let Some(pointed) = raw.get(key).filter(|_| key != "ao-result") {
            return parse_if_text(pointed);
        }
    }
    parse_if_text(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::top_level(json!({ "Claims": { "a": 1 }, "Name": "x" }))]
    #[case::body_text(json!({ "body": "{\"Claims\":{\"a\":1},\"Name\":\"x\"}" }))]
    #[case::body_object(json!({ "body": { "claims": { "a": 1 }, "Name": "x" } }))]
    #[case::ao_result_pointer(json!({ "ao-result": "body", "body": "{\"Claims\":{\"a\":1},\"Name\":\"x\"}" }))]
    #[case::ao_result_inline(json!({ "ao-result": { "Claims": { "a": 1 }, "Name": "x" } }))]
    #[case::asset(json!({ "asset": { "Claims": { "a": 1 }, "Name": "x" }, "status": 200 }))]
    #[case::json_text(json!("{\"Claims\":{\"a\":1},\"Name\":\"x\"}"))]
    fn finds_claims_wherever_they_are(#[case] raw: Value) {
        let state = Normalizer::default().normalize(&raw);
        assert_eq!(state.field("Claims"), Some(&json!({ "a": 1 })));
        assert_eq!(state.field("Name"), Some(&json!("x")));
    }

    #[test]
    fn aliases_are_canonicalized() {
        let state = Normalizer::default().normalize(&json!({ "balances": { "w": "10" }, "total_supply": 5 }));
        assert_eq!(state.0, json!({ "Balances": { "w": "10" }, "TotalSupply": 5 }));
    }

    #[test]
    fn canonical_field_is_kept_over_alias() {
        let raw = json!({ "Balances": { "a": "1" }, "balances": { "b": "2" } });
        assert_eq!(Normalizer::default().normalize(&raw).0, raw);
    }

    #[test]
    fn unknown_shape_is_returned_raw() {
        let raw = json!({ "foo": { "bar": 1 } });
        assert_eq!(Normalizer::default().normalize(&raw).0, raw);
    }

    #[test]
    fn top_level_is_preferred_over_body() {
        let raw = json!({ "Balances": {}, "body": { "Claims": {} } });
        let state = Normalizer::default().normalize(&raw);
        assert!(state.field("Balances").is_some());
        assert!(state.field("body").is_some());
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let key = prop_oneof![
            Just("Claims".to_string()),
            Just("claims".to_string()),
            Just("balances".to_string()),
            Just("total_supply".to_string()),
            Just("body".to_string()),
            Just("ao-result".to_string()),
            Just("asset".to_string()),
            "[a-z]{1,4}",
        ];
        let leaf = prop_oneof![Just(Value::Null), any::<i64>().prop_map(Value::from), "[a-z{}\":]{0,8}".prop_map(Value::String)];
        leaf.prop_recursive(3, 24, 4, move |inner| {
            prop::collection::btree_map(key.clone(), inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect()))
        })
    }

    proptest! {
        #[test]
        fn normalization_is_idempotent(raw in arb_json()) {
            let normalizer = Normalizer::default();
            let once = normalizer.normalize(&raw);
            let twice = normalizer.normalize(&once.0);
            prop_assert_eq!(once, twice);
        }
    }
}
