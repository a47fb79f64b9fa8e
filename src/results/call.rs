use std::collections::BTreeMap;

use serde_json::{Map, Value as JsonValue};

use super::ResultSet;
use crate::types::SqlValue;

/// Result of a stored-routine call.
#[derive(Debug, Clone, Default)]
pub struct CallOutcome {
    /// Every result set the routine produced, in order. Empty unless the call was
    /// issued as a query.
    pub rowsets: Vec<ResultSet>,
    /// OUT and INOUT variables keyed by the caller-chosen names; `None` when none
    /// were declared.
    pub out: Option<BTreeMap<String, SqlValue>>,
}

impl CallOutcome {
    /// Value of one OUT/INOUT variable.
    #[must_use]
    pub fn out_value(&self, var: &str) -> Option<&SqlValue> {
        self.out.as_ref().and_then(|out| out.get(var))
    }

    /// `{"rowsets": [...], "out": {...}}`; the `out` key is present only when OUT or
    /// INOUT variables were declared.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        let mut map = Map::new();
        map.insert(
            "rowsets".into(),
            JsonValue::Array(self.rowsets.iter().map(ResultSet::to_json).collect()),
        );
        if let Some(out) = &self.out {
            let vars: Map<String, JsonValue> = out
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect();
            map.insert("out".into(), JsonValue::Object(vars));
        }
        JsonValue::Object(map)
    }
}
