use crate::api::{ApiClient, ApiResult, FilePart};
use crate::logic::form::{FormController, SubmitOutcome};
use crate::logic::form_data::build_form_data;
use crate::logic::schema_loader::SchemaLoader;
use crate::model::{EntityRef, SchemaRequest, ServerDoc, ServerError};
use crate::store::{Action, Store};
use serde_json::Value;
use std::sync::Arc;

/// Where the page goes after a form flow.
#[derive(Debug, Clone, PartialEq)]
pub enum Navigation {
    /// Open the URL of the created entity: `absoluteUrl`, else `cwuri`.
    Redirect(String),
    /// Reload the current page.
    Reload,
    /// Stay on the form, showing these errors.
    Stay(Vec<ServerError>),
}

/// Create, edit and delete flows for one entity type at a time.
///
/// Validation errors are dispatched to the global store so every connected
/// view shows them.
pub struct EntityForms {
    api: ApiClient,
    loader: SchemaLoader,
    store: Arc<Store>,
}

impl EntityForms {
    pub fn new(api: ApiClient, store: Arc<Store>) -> Self {
        Self {
            loader: SchemaLoader::new(api.clone()),
            api,
            store,
        }
    }

    /// Empty creation form of `etype`.
    pub async fn creation_form(&self, etype: &str, schema_type: Option<&str>) -> ApiResult<FormController> {
        let mut request = SchemaRequest::creation();
        request.schema_type = schema_type.map(str::to_string);
        let schema = self.loader.load(etype, &request).await?;
        Ok(FormController::new(schema))
    }

    /// Edition form of `entity`, pre-filled from its current document.
    pub async fn edition_form(&self, entity: &EntityRef) -> ApiResult<FormController> {
        let request = SchemaRequest::edition(entity.eid);
        let (schema, document) = tokio::try_join!(
            self.loader.load(&entity.cw_etype, &request),
            self.api.get_entity(&entity.cw_etype, entity.eid),
        )?;
        let form_data = build_form_data(&document.to_document(), &schema.data_schema)?;
        Ok(FormController::with_form_data(schema, form_data))
    }

    pub async fn create(
        &self,
        form: &FormController,
        etype: &str,
        form_data: Value,
        schema_type: Option<&str>,
        files: Vec<FilePart>,
    ) -> ApiResult<Navigation> {
        let outcome = form
            .submit(form_data, move |data| async move {
                self.api.create_entity(etype, &data, schema_type, files).await
            })
            .await?;
        Ok(self.navigate(form, outcome, |doc| match doc.absolute_url().or_else(|| doc.cwuri()) {
            Some(url) => Navigation::Redirect(url.to_string()),
            None => Navigation::Reload,
        }))
    }

    pub async fn update(&self, form: &FormController, entity: &EntityRef, form_data: Value) -> ApiResult<Navigation> {
        let outcome = form
            .submit(form_data, move |data| async move {
                self.api.update_entity(&entity.cw_etype, entity.eid, &data).await
            })
            .await?;
        Ok(self.navigate(form, outcome, |_| Navigation::Reload))
    }

    /// Fire a workflow transition described by `form_data`.
    pub async fn transition(&self, form: &FormController, entity: &EntityRef, form_data: Value) -> ApiResult<Navigation> {
        let outcome = form
            .submit(form_data, move |data| async move {
                self.api.add_transition(&entity.cw_etype, entity.eid, &data).await
            })
            .await?;
        Ok(self.navigate(form, outcome, |_| Navigation::Reload))
    }

    pub async fn delete(&self, entity: &EntityRef) -> ApiResult<Navigation> {
        let doc = self.api.delete_entity(&entity.cw_etype, entity.eid).await?;
        if doc.has_errors() {
            let errors = doc.errors();
            for error in &errors {
                log::warn!("deleting {} refused: {}", entity, error.render());
            }
            self.store.dispatch(Action::ShowErrors(errors.clone()));
            return Ok(Navigation::Stay(errors));
        }
        Ok(Navigation::Reload)
    }

    fn navigate<F>(&self, form: &FormController, outcome: SubmitOutcome, on_saved: F) -> Navigation
    where
        F: FnOnce(&ServerDoc) -> Navigation,
    {
        match outcome {
            SubmitOutcome::Saved(doc) => on_saved(&doc),
            SubmitOutcome::Invalid(_) => {
                let errors = form.server_errors();
                if !errors.is_empty() {
                    self.store.dispatch(Action::ShowErrors(errors.clone()));
                }
                Navigation::Stay(errors)
            }
        }
    }
}
