use crate::api::{ApiError, ApiResult};
use crate::model::entity_schema;
use serde_json::{Map, Value};

const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// Project an entity document onto the properties its schema declares.
///
/// The entity schema is `definitions[cw_etype]` when present, else the schema
/// itself. Arrays of `#/definitions/X` references are projected recursively;
/// other arrays are skipped.
pub fn build_form_data(entity: &Value, schema: &Value) -> ApiResult<Value> {
    let cw_etype = entity.get("cw_etype").and_then(Value::as_str);
    project(entity, schema, entity_schema(schema, cw_etype))
}

fn project(entity: &Value, schema: &Value, eschema: &Value) -> ApiResult<Value> {
    let Some(properties) = eschema.get("properties").and_then(Value::as_object) else {
        return Ok(entity.clone());
    };

    let mut form_data = Map::new();
    for (key, property) in properties {
        let target = match entity.get(key) {
            Some(Value::Null) | None => continue,
            Some(target) => target,
        };
        if property.get("type").and_then(Value::as_str) != Some("array") {
            form_data.insert(key.clone(), target.clone());
            continue;
        }

        let Some(reference) = property.pointer("/items/$ref").and_then(Value::as_str) else {
            log::warn!("unhandled items kind {} in {} property", property, key);
            continue;
        };
        let target_type = reference
            .strip_prefix(DEFINITIONS_PREFIX)
            .ok_or_else(|| ApiError::InvalidOperation(format!("unhandled reference kind {}", reference)))?;
        let definition = schema
            .get("definitions")
            .and_then(|definitions| definitions.get(target_type))
            .ok_or_else(|| {
                ApiError::InvalidOperation(format!(
                    "missing definition for {} referenced in {}",
                    target_type, key
                ))
            })?;

        let items = match target {
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    let item_schema = match item.get("cw_etype").and_then(Value::as_str) {
                        Some(cw_etype) => entity_schema(schema, Some(cw_etype)),
                        None => definition,
                    };
                    project(item, schema, item_schema)
                })
                .collect::<ApiResult<Vec<_>>>()?,
            other => {
                log::warn!("expected an array in {} property, got {}", key, other);
                continue;
            }
        };
        form_data.insert(key.clone(), Value::Array(items));
    }
    Ok(Value::Object(form_data))
}
