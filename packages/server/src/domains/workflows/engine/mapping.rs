use anyhow::{bail, Result};
use serde_json::{Map, Value};

use crate::domains::workflows::models::FieldMapping;

/// Resolve a step's field mappings against the run context, producing the
/// action's input object.
///
/// Sources are slash paths into `{"trigger": ..., "steps": {"<id>": ...}}`,
/// e.g. "trigger/lead/email" or "steps/<id>/status_code". A required mapping
/// with a missing or null source fails the step; optional mappings are
/// skipped silently.
pub fn apply_mappings(mappings: &[FieldMapping], context: &Value) -> Result<Value> {
    let mut input = Map::new();

    for mapping in mappings {
        let resolved = context
            .pointer(&format!("/{}", mapping.source))
            .filter(|v| !v.is_null());

        match resolved {
            Some(value) => {
                input.insert(mapping.target.clone(), value.clone());
            }
            None if mapping.required => {
                bail!(
                    "required mapping '{}' -> '{}' has no value in the run context",
                    mapping.source,
                    mapping.target
                );
            }
            None => {}
        }
    }

    Ok(Value::Object(input))
}
