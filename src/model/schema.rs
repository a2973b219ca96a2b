use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Which variant of an entity schema to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaRole {
    Creation,
    Edition,
    View,
}

impl SchemaRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaRole::Creation => "creation",
            SchemaRole::Edition => "edition",
            SchemaRole::View => "view",
        }
    }
}

impl fmt::Display for SchemaRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters of an entity schema request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaRequest {
    pub eid: Option<crate::model::Eid>,
    pub role: Option<SchemaRole>,
    /// `schema_type` query parameter, selects an alternative schema for the type.
    pub schema_type: Option<String>,
}

impl SchemaRequest {
    pub fn creation() -> Self {
        Self {
            role: Some(SchemaRole::Creation),
            ..Self::default()
        }
    }

    pub fn edition(eid: crate::model::Eid) -> Self {
        Self {
            eid: Some(eid),
            role: Some(SchemaRole::Edition),
            ..Self::default()
        }
    }

    pub fn with_schema_type(mut self, schema_type: impl Into<String>) -> Self {
        self.schema_type = Some(schema_type.into());
        self
    }
}

/// A `links` entry of a JSON-Schema document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaLink {
    pub rel: String,
    pub href: Option<String>,
    pub target_ref: Option<String>,
    pub title: Option<String>,
}

/// Data schema plus its UI-schema companion. Request-scoped, never cached.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaPair {
    pub data_schema: Value,
    pub ui_schema: Value,
}

impl SchemaPair {
    pub fn new(data_schema: Value, ui_schema: Value) -> Self {
        Self {
            data_schema,
            ui_schema,
        }
    }

    pub fn links(&self) -> Vec<SchemaLink> {
        schema_links(&self.data_schema)
    }

    /// Link whose `rel` is `related.{rtype}`.
    pub fn related_link(&self, rtype: &str) -> Option<SchemaLink> {
        let rel = format!("related.{}", rtype);
        self.links().into_iter().find(|link| link.rel == rel)
    }
}

pub fn schema_links(schema: &Value) -> Vec<SchemaLink> {
    let Some(links) = schema.get("links").and_then(Value::as_array) else {
        return Vec::new();
    };
    links
        .iter()
        .filter_map(|link| {
            let rel = link.get("rel")?.as_str()?.to_string();
            Some(SchemaLink {
                rel,
                href: link.get("href").and_then(Value::as_str).map(str::to_string),
                target_ref: link
                    .pointer("/targetSchema/$ref")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                title: link.get("title").and_then(Value::as_str).map(str::to_string),
            })
        })
        .collect()
}

/// Schema of `cw_etype` inside a document: `definitions[cw_etype]` when
/// present, otherwise the document itself.
pub fn entity_schema<'a>(schema: &'a Value, cw_etype: Option<&str>) -> &'a Value {
    cw_etype
        .and_then(|etype| schema.get("definitions").and_then(|defs| defs.get(etype)))
        .unwrap_or(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_links() {
        let pair = SchemaPair::new(
            json!({
                "type": "object",
                "links": [
                    {"rel": "related.children", "href": "/section/42/children",
                     "targetSchema": {"$ref": "#/definitions/Section"}},
                    {"rel": "related.translation_of", "title": "Translation"},
                    {"href": "/no-rel"},
                ]
            }),
            json!({}),
        );
        let links = pair.links();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].target_ref.as_deref(), Some("#/definitions/Section"));
        let translation = pair.related_link("translation_of").unwrap();
        assert_eq!(translation.title.as_deref(), Some("Translation"));
        assert!(pair.related_link("missing").is_none());
    }

    #[test]
    fn test_entity_schema_lookup() {
        let schema = json!({
            "definitions": {"Section": {"properties": {"title": {"type": "string"}}}},
            "properties": {"root": {}}
        });
        assert!(entity_schema(&schema, Some("Section")).get("properties").unwrap().get("title").is_some());
        assert!(entity_schema(&schema, Some("Other")).get("properties").unwrap().get("root").is_some());
        assert_eq!(SchemaRole::Edition.to_string(), "edition");
    }
}
