//! Search parameters with a complete default set.

use serde_json::{json, Map, Value};

/// Filter toggles defaulting to "any".
const ANY_FILTERS: &[&str] = &[
    "focus",
    "region",
    "date",
    "format",
    "file",
    "javascript",
    "trackers",
    "cookies",
    "affiliate",
    "adtech",
];

/// Filter toggles defaulting to "no".
const NO_FILTERS: &[&str] = &["extendedsearch", "intitle", "recent"];

/// The parameter set every routine receives.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchParams(Map<String, Value>);

impl Default for SearchParams {
    fn default() -> Self {
        let mut map = Map::new();
        map.insert("s".into(), json!(""));
        map.insert("country".into(), json!("us"));
        map.insert("nsfw".into(), json!("yes"));
        map.insert("lang".into(), json!("en"));
        map.insert("older".into(), json!(false));
        map.insert("newer".into(), json!(false));
        map.insert("spellcheck".into(), json!("yes"));
        map.insert("npt".into(), Value::Null);
        map.insert("offset".into(), json!(0));
        map.insert("domain".into(), json!(""));
        for key in ANY_FILTERS {
            map.insert((*key).into(), json!("any"));
        }
        for key in NO_FILTERS {
            map.insert((*key).into(), json!("no"));
        }
        Self(map)
    }
}

impl SearchParams {
    /// Merge client-supplied values over the defaults. Client keys win,
    /// unknown keys are kept for routines that understand them.
    pub fn merged(client: Map<String, Value>) -> Self {
        let mut params = Self::default();
        params.0.extend(client);
        params
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value of `key`, if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// The search string.
    pub fn query(&self) -> &str {
        self.get_str("s").map(str::trim).unwrap_or("")
    }

    /// Explicit continuation token, if a non-empty one was supplied.
    pub fn npt(&self) -> Option<&str> {
        self.get_str("npt").filter(|s| !s.is_empty())
    }

    pub fn set_npt(&mut self, token: &str) {
        self.0.insert("npt".into(), json!(token));
    }

    /// Result offset. Accepts integers and numeric strings; anything else is 0.
    pub fn offset(&self) -> u64 {
        match self.0.get("offset") {
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
                .unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}
