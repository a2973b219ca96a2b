use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Location of the offending field, a JSON-pointer-like path.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<String>,
}

/// One entry of the `{errors: [...]}` body shared by every backend endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServerError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ErrorSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ServerError {
    pub fn new(details: impl Into<String>) -> Self {
        Self {
            details: Some(details.into()),
            ..Self::default()
        }
    }

    pub fn at(pointer: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            source: Some(ErrorSource {
                pointer: Some(pointer.into()),
            }),
            details: Some(details.into()),
            ..Self::default()
        }
    }

    pub fn pointer(&self) -> Option<&str> {
        self.source
            .as_ref()
            .and_then(|source| source.pointer.as_deref())
            .filter(|pointer| !pointer.is_empty())
    }

    pub fn message(&self) -> &str {
        self.details
            .as_deref()
            .or(self.title.as_deref())
            .unwrap_or("")
    }

    /// `"{pointer}: {details|title}"`, as shown when a deletion is refused.
    pub fn render(&self) -> String {
        format!("{}: {}", self.pointer().unwrap_or(""), self.message())
    }
}

/// Body returned by create/update/delete/relate calls. Validation failures are
/// regular responses whose `errors` list is non-empty.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServerDoc(pub Value);

impl ServerDoc {
    pub fn errors(&self) -> Vec<ServerError> {
        match self.0.get("errors") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    serde_json::from_value(item.clone()).unwrap_or_else(|_| {
                        log::warn!("Unparseable server error entry: {}", item);
                        ServerError::new(item.to_string())
                    })
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        matches!(self.0.get("errors"), Some(Value::Array(items)) if !items.is_empty())
    }

    pub fn absolute_url(&self) -> Option<&str> {
        self.0.get("absoluteUrl").and_then(Value::as_str)
    }

    pub fn cwuri(&self) -> Option<&str> {
        self.0.get("cwuri").and_then(Value::as_str)
    }

    pub fn into_inner(self) -> Value {
        self.0
    }
}

impl From<Value> for ServerDoc {
    fn from(value: Value) -> Self {
        Self(value)
    }
}
