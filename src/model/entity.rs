use crate::model::{deserialize_eid, Eid, EntityRef, TargetOption};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON document describing one entity as returned by `GET /{etype}/{eid}`
/// and by relation/collection endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    #[serde(deserialize_with = "deserialize_eid")]
    pub eid: Eid,
    pub cw_etype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dc_title: Option<String>,
    #[serde(default, rename = "absoluteUrl", skip_serializing_if = "Option::is_none")]
    pub absolute_url: Option<String>,
    /// Remaining attributes, kept verbatim for form pre-filling.
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl Entity {
    pub fn entity_ref(&self) -> EntityRef {
        EntityRef::new(self.eid, self.cw_etype.clone())
    }

    /// Title used for display: `title`, then `dc_title`, then the type name.
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .or(self.dc_title.as_deref())
            .unwrap_or(&self.cw_etype)
    }

    /// Relation editors label targets with `dc_title`.
    pub fn related_option(&self) -> TargetOption {
        let label = self
            .dc_title
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or(&self.cw_etype);
        TargetOption::new(self.eid, label)
    }

    /// Full JSON document including the typed fields.
    pub fn to_document(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Typeahead row of the available-targets and group-candidates listings:
/// `{eid, title}`, with `url` on authority candidates. Not a full entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(deserialize_with = "deserialize_eid")]
    pub eid: Eid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cw_etype: Option<String>,
}

impl Candidate {
    /// Search results are labelled with `title`, falling back to the eid.
    pub fn option(&self) -> TargetOption {
        match &self.title {
            Some(title) => TargetOption::new(self.eid, title.clone()),
            None => TargetOption::new(self.eid, self.eid.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entity_keeps_extra_attributes() {
        let entity: Entity = serde_json::from_value(json!({
            "eid": 7,
            "cw_etype": "Section",
            "title": "Intro",
            "order": 2,
        }))
        .unwrap();
        assert_eq!(entity.display_title(), "Intro");
        assert_eq!(entity.attributes.get("order"), Some(&json!(2)));
        assert_eq!(entity.to_document()["order"], json!(2));
    }

    #[test]
    fn test_option_labels() {
        let entity: Entity = serde_json::from_value(json!({
            "eid": "12",
            "cw_etype": "AgentAuthority",
            "dc_title": "Victor Hugo",
        }))
        .unwrap();
        assert_eq!(entity.related_option(), TargetOption::new(12, "Victor Hugo"));

        let bare: Entity =
            serde_json::from_value(json!({"eid": 3, "cw_etype": "BaseContent"})).unwrap();
        assert_eq!(bare.display_title(), "BaseContent");
    }

    #[test]
    fn test_candidate_rows_need_no_type() {
        let candidate: Candidate = serde_json::from_value(json!({"eid": 3, "title": "Hugo"})).unwrap();
        assert_eq!(candidate.option(), TargetOption::new(3, "Hugo"));

        let authority: Candidate =
            serde_json::from_value(json!({"eid": "8", "url": "http://cms.test/agent/8", "title": null})).unwrap();
        assert_eq!(authority.option(), TargetOption::new(8, "8"));
    }
}
