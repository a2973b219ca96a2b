use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Entity identifier as issued by the backend.
pub type Eid = i64;

/// Immutable identity of a content entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(deserialize_with = "deserialize_eid")]
    pub eid: Eid,
    pub cw_etype: String,
}

impl EntityRef {
    pub fn new(eid: Eid, cw_etype: impl Into<String>) -> Self {
        Self {
            eid,
            cw_etype: cw_etype.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.cw_etype, self.eid)
    }
}

/// Option shown by the target selector: `{value: eid, label: title}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetOption {
    pub value: Eid,
    pub label: String,
}

impl TargetOption {
    pub fn new(value: Eid, label: impl Into<String>) -> Self {
        Self {
            value,
            label: label.into(),
        }
    }
}

/// Some routes and query strings carry eids as strings, the JSON API as numbers.
pub fn deserialize_eid<'de, D>(deserializer: D) -> Result<Eid, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawEid {
        Number(Eid),
        Text(String),
    }

    match RawEid::deserialize(deserializer)? {
        RawEid::Number(eid) => Ok(eid),
        RawEid::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid eid '{}'", text))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_ref_accepts_numeric_and_string_eids() {
        let numeric: EntityRef =
            serde_json::from_str(r#"{"eid": 42, "cw_etype": "Section"}"#).unwrap();
        let textual: EntityRef =
            serde_json::from_str(r#"{"eid": "42", "cw_etype": "Section"}"#).unwrap();
        assert_eq!(numeric, textual);
        assert_eq!(numeric.to_string(), "Section#42");
    }

    #[test]
    fn test_entity_ref_rejects_garbage_eid() {
        let result = serde_json::from_str::<EntityRef>(r#"{"eid": "abc", "cw_etype": "Section"}"#);
        assert!(result.is_err());
    }
}
