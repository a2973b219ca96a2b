use crate::api::ApiResult;
use crate::model::{SchemaPair, ServerDoc, ServerError};
use crate::store::InFlight;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorScope {
    /// Error attached to the field at this pointer.
    Field(String),
    Form,
}

/// One line of the rendered error list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormError {
    pub scope: ErrorScope,
    pub message: String,
}

impl FormError {
    pub fn field(pointer: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            scope: ErrorScope::Field(pointer.into()),
            message: message.into(),
        }
    }

    pub fn form(message: impl Into<String>) -> Self {
        Self {
            scope: ErrorScope::Form,
            message: message.into(),
        }
    }

    pub fn is_form_level(&self) -> bool {
        self.scope == ErrorScope::Form
    }
}

impl fmt::Display for FormError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Merge client-side validation errors with server errors.
///
/// Server errors with a pointer are appended as field errors rendered
/// `"{pointer}: {details}"`; the others go to the front as form-level errors.
pub fn merge_errors(client: &[FormError], server: &[ServerError]) -> Vec<FormError> {
    let mut errors = client.to_vec();
    for error in server {
        match error.pointer() {
            Some(pointer) => errors.push(FormError::field(pointer, error.render())),
            None => errors.insert(0, FormError::form(error.message())),
        }
    }
    errors
}

/// Check `form_data` against the `required` list and the primitive `type`
/// of each declared property.
pub fn validate(schema: &Value, form_data: &Value) -> Vec<FormError> {
    let mut errors = Vec::new();
    let required = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect::<Vec<_>>())
        .unwrap_or_default();
    for name in required {
        let missing = match form_data.get(name) {
            None | Some(Value::Null) => true,
            Some(Value::String(text)) => text.is_empty(),
            Some(_) => false,
        };
        if missing {
            errors.push(FormError::field(
                format!(".{}", name),
                format!(".{} is a required property", name),
            ));
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return errors;
    };
    for (name, property) in properties {
        let (Some(value), Some(expected)) = (form_data.get(name), property.get("type").and_then(Value::as_str)) else {
            continue;
        };
        if !value.is_null() && !has_type(value, expected) {
            errors.push(FormError::field(
                format!(".{}", name),
                format!(".{} should be {}", name, expected),
            ));
        }
    }
    errors
}

fn has_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => true,
    }
}

/// Custom field widgets injected into the form renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WidgetKind {
    Wysiwyg,
    Date,
    Image,
    Autocomplete,
    FilePicker,
}

/// Maps UI-schema `ui:widget` / `ui:field` hints to custom widgets.
#[derive(Debug, Clone)]
pub struct WidgetRegistry {
    widgets: HashMap<String, WidgetKind>,
}

impl Default for WidgetRegistry {
    fn default() -> Self {
        let widgets = [
            ("wysiwygEditor", WidgetKind::Wysiwyg),
            ("dateEditor", WidgetKind::Date),
            ("imageEditor", WidgetKind::Image),
            ("autocompleteField", WidgetKind::Autocomplete),
            ("filepicker", WidgetKind::FilePicker),
        ]
        .into_iter()
        .map(|(name, kind)| (name.to_string(), kind))
        .collect();
        Self { widgets }
    }
}

impl WidgetRegistry {
    pub fn register(&mut self, name: impl Into<String>, kind: WidgetKind) {
        self.widgets.insert(name.into(), kind);
    }

    pub fn get(&self, name: &str) -> Option<WidgetKind> {
        self.widgets.get(name).copied()
    }

    /// Widget for `field`, or `None` for the renderer default.
    pub fn resolve(&self, ui_schema: &Value, field: &str) -> Option<WidgetKind> {
        let hints = ui_schema.get(field)?;
        ["ui:widget", "ui:field"]
            .iter()
            .filter_map(|key| hints.get(*key).and_then(Value::as_str))
            .find_map(|name| self.get(name))
    }

    /// Every field of `ui_schema` that uses a custom widget, sorted by name.
    pub fn custom_fields(&self, ui_schema: &Value) -> Vec<(String, WidgetKind)> {
        let mut fields: Vec<(String, WidgetKind)> = ui_schema
            .as_object()
            .map(|map| {
                map.keys()
                    .filter_map(|field| self.resolve(ui_schema, field).map(|kind| (field.clone(), kind)))
                    .collect()
            })
            .unwrap_or_default();
        fields.sort();
        fields
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Saved(ServerDoc),
    /// Rendered error list; nothing was saved.
    Invalid(Vec<FormError>),
}

/// Schema-driven form: validation, error merging and the submit-in-flight flag.
#[derive(Debug)]
pub struct FormController {
    schema: SchemaPair,
    widgets: WidgetRegistry,
    submitting: InFlight<()>,
    form_data: Mutex<Value>,
    client_errors: Mutex<Vec<FormError>>,
    server_errors: Mutex<Vec<ServerError>>,
}

impl FormController {
    pub fn new(schema: SchemaPair) -> Self {
        Self::with_form_data(schema, Value::Object(Default::default()))
    }

    pub fn with_form_data(schema: SchemaPair, form_data: Value) -> Self {
        Self {
            schema,
            widgets: WidgetRegistry::default(),
            submitting: InFlight::new(),
            form_data: Mutex::new(form_data),
            client_errors: Mutex::new(Vec::new()),
            server_errors: Mutex::new(Vec::new()),
        }
    }

    pub fn schema(&self) -> &SchemaPair {
        &self.schema
    }

    pub fn widgets(&self) -> &WidgetRegistry {
        &self.widgets
    }

    pub fn form_data(&self) -> Value {
        self.form_data.lock().clone()
    }

    /// True while a submission is pending; the submit button is disabled.
    pub fn is_submitting(&self) -> bool {
        self.submitting.contains(&())
    }

    pub fn server_errors(&self) -> Vec<ServerError> {
        self.server_errors.lock().clone()
    }

    pub fn rendered_errors(&self) -> Vec<FormError> {
        merge_errors(&self.client_errors.lock(), &self.server_errors.lock())
    }

    /// Validate `form_data`, then hand it to `on_submit`.
    ///
    /// A second submit while one is pending fails with `Busy`. A server
    /// document with errors yields [`SubmitOutcome::Invalid`].
    pub async fn submit<F, Fut>(&self, form_data: Value, on_submit: F) -> ApiResult<SubmitOutcome>
    where
        F: FnOnce(Value) -> Fut,
        Fut: Future<Output = ApiResult<ServerDoc>>,
    {
        let _guard = self.submitting.try_acquire(())?;
        *self.form_data.lock() = form_data.clone();

        let client_errors = validate(&self.schema.data_schema, &form_data);
        if !client_errors.is_empty() {
            *self.client_errors.lock() = client_errors;
            self.server_errors.lock().clear();
            return Ok(SubmitOutcome::Invalid(self.rendered_errors()));
        }
        self.client_errors.lock().clear();

        let doc = on_submit(form_data).await?;
        if doc.has_errors() {
            *self.server_errors.lock() = doc.errors();
            return Ok(SubmitOutcome::Invalid(self.rendered_errors()));
        }
        self.server_errors.lock().clear();
        Ok(SubmitOutcome::Saved(doc))
    }
}
