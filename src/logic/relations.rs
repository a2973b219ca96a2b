use crate::api::{ApiClient, ApiError, ApiResult, RelatedParams};
use crate::config::EditorConfig;
use crate::logic::schema_loader::SchemaLoader;
use crate::logic::throttle::Throttle;
use crate::model::{Candidate, Entity, EntityRef, SchemaPair, ServerDoc, ServerError, TargetOption};
use crate::store::{Generations, InFlight};
use itertools::Itertools;
use parking_lot::Mutex;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// How a relation is presented to the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationContext {
    pub title: String,
    /// Several targets may be related at once.
    pub multiple: bool,
    /// Targets are picked through typeahead search rather than edited as forms.
    pub fetch_possible_targets: bool,
}

impl RelationContext {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            multiple: true,
            fetch_possible_targets: true,
        }
    }

    pub fn single(mut self) -> Self {
        self.multiple = false;
        self
    }

    pub fn form_list(mut self) -> Self {
        self.fetch_possible_targets = false;
        self
    }
}

/// Snapshot of what a relation editor displays.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationView {
    pub loading: bool,
    pub schema: Option<SchemaPair>,
    /// Confirmed related entities, filtered by target type.
    pub related: Vec<Entity>,
    /// Current value of the target selector.
    pub targets: Vec<TargetOption>,
    pub display_creation_form: bool,
    /// The last search matched nothing, so creating a target is offered.
    pub no_results: bool,
    /// Dismissible message left by a failed mutation.
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    /// A newer load was issued meanwhile; this result was dropped.
    Stale,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    TooShort,
    Superseded,
    Results(Vec<TargetOption>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    /// Server accepted the change; the relation was reloaded, or a message
    /// says the reload failed.
    Applied,
    /// Server answered with validation errors; nothing was reloaded.
    Invalid(Vec<ServerError>),
    /// The call failed; nothing was reloaded.
    Failed(String),
}

/// Editor of the targets of one relation type of one entity.
pub struct RelationEditor {
    api: ApiClient,
    loader: SchemaLoader,
    key: Mutex<(EntityRef, String)>,
    context: RelationContext,
    target_type: Option<String>,
    sort: Option<String>,
    search_min_length: usize,
    throttle: Throttle,
    loads: Generations,
    searches: Generations,
    mutations: InFlight<String>,
    view: Mutex<RelationView>,
}

impl RelationEditor {
    pub fn new(
        api: ApiClient,
        entity: EntityRef,
        rtype: impl Into<String>,
        context: RelationContext,
        config: &EditorConfig,
    ) -> Self {
        Self {
            loader: SchemaLoader::new(api.clone()),
            api,
            key: Mutex::new((entity, rtype.into())),
            context,
            target_type: None,
            sort: None,
            search_min_length: config.search_min_length,
            throttle: Throttle::new(Duration::from_millis(config.search_throttle_ms)),
            loads: Generations::new(),
            searches: Generations::new(),
            mutations: InFlight::new(),
            view: Mutex::new(RelationView::default()),
        }
    }

    /// Restrict a polymorphic relation to one target type.
    pub fn with_target_type(mut self, target_type: impl Into<String>) -> Self {
        self.target_type = Some(target_type.into());
        self
    }

    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    pub fn context(&self) -> &RelationContext {
        &self.context
    }

    pub fn entity(&self) -> EntityRef {
        self.key.lock().0.clone()
    }

    pub fn rtype(&self) -> String {
        self.key.lock().1.clone()
    }

    pub fn view(&self) -> RelationView {
        self.view.lock().clone()
    }

    /// Fetch the relation schema and the related entities together.
    pub async fn load(&self) -> ApiResult<LoadOutcome> {
        let (entity, rtype) = self.key.lock().clone();
        let generation = self.loads.issue();
        self.view.lock().loading = true;

        let params = RelatedParams {
            sort: self.sort.clone(),
            target_type: self.target_type.clone(),
        };
        let target_type = self.target_type.as_deref();
        let result = tokio::try_join!(
            self.loader.load_relation(&entity.cw_etype, &rtype, None, target_type),
            self.api.get_related(&entity.cw_etype, entity.eid, &rtype, &params),
        );

        if !self.loads.is_current(generation) {
            log::debug!("discarding stale {} relation of {}", rtype, entity);
            return Ok(LoadOutcome::Stale);
        }

        let mut view = self.view.lock();
        view.loading = false;
        match result {
            Ok((schema, mut related)) => {
                if let Some(target_type) = target_type {
                    related.retain(|target| target.cw_etype == target_type);
                }
                view.targets = related.iter().map(Entity::related_option).collect();
                if !self.context.multiple {
                    view.targets.truncate(1);
                }
                view.display_creation_form = related.is_empty();
                view.schema = Some(schema);
                view.related = related;
                Ok(LoadOutcome::Applied)
            }
            Err(err) => {
                log::error!("loading {} relation of {} failed: {}", rtype, entity, err);
                Err(err)
            }
        }
    }

    /// Point the editor at another entity or relation type. Returns whether
    /// anything was fetched: the same entity and rtype keep the current view.
    pub async fn reinit(&self, entity: EntityRef, rtype: &str) -> ApiResult<bool> {
        {
            let mut key = self.key.lock();
            if key.0 == entity && key.1 == rtype {
                return Ok(false);
            }
            *key = (entity, rtype.to_string());
        }
        self.loads.invalidate();
        self.searches.invalidate();
        *self.view.lock() = RelationView::default();
        self.load().await?;
        Ok(true)
    }

    /// Typeahead search of possible targets.
    ///
    /// Inputs shorter than the configured minimum return without a request.
    /// Searches are throttled: of a burst, the first runs at once and only the
    /// last runs after it. A search overtaken by a newer one is dropped before
    /// or after its request.
    pub async fn search(&self, input: &str) -> ApiResult<SearchOutcome> {
        if input.chars().count() < self.search_min_length {
            return Ok(SearchOutcome::TooShort);
        }
        let generation = self.searches.issue();
        if !self.throttle.ready().await || !self.searches.is_current(generation) {
            return Ok(SearchOutcome::Superseded);
        }

        let (entity, rtype) = self.key.lock().clone();
        let extra: Vec<(String, String)> = self
            .target_type
            .iter()
            .map(|target_type| ("target_type".to_string(), target_type.clone()))
            .collect();
        let found = self
            .api
            .get_available_targets(&entity.cw_etype, &rtype, Some(entity.eid), Some(input), &extra)
            .await?;
        if !self.searches.is_current(generation) {
            return Ok(SearchOutcome::Superseded);
        }

        let options: Vec<TargetOption> = found.iter().map(Candidate::option).collect();
        self.view.lock().no_results = options.is_empty();
        Ok(SearchOutcome::Results(options))
    }

    /// Options for the target selector; empty when nothing was searched.
    pub async fn load_options(&self, input: &str) -> ApiResult<Vec<TargetOption>> {
        match self.search(input).await? {
            SearchOutcome::Results(options) => Ok(options),
            SearchOutcome::TooShort | SearchOutcome::Superseded => Ok(Vec::new()),
        }
    }

    /// Mirror the target selector. A single-valued relation keeps the first value.
    pub fn set_targets(&self, mut targets: Vec<TargetOption>) {
        if !self.context.multiple {
            targets.truncate(1);
        }
        self.view.lock().targets = targets;
    }

    /// Persist the selector value as the whole target set.
    pub async fn send_targets(&self) -> ApiResult<MutationOutcome> {
        let targets = self.view.lock().targets.clone();
        self.replace_targets(targets).await
    }

    /// Relate `target` in addition to the confirmed targets.
    pub async fn add_target(&self, target: TargetOption) -> ApiResult<MutationOutcome> {
        let desired = if self.context.multiple {
            let confirmed = self.confirmed_targets();
            confirmed
                .into_iter()
                .chain(std::iter::once(target))
                .unique_by(|option| option.value)
                .collect()
        } else {
            vec![target]
        };
        self.replace_targets(desired).await
    }

    /// Unrelate `target`, keeping the other confirmed targets.
    pub async fn remove_target(&self, target: &TargetOption) -> ApiResult<MutationOutcome> {
        let desired = self
            .confirmed_targets()
            .into_iter()
            .filter(|option| option.value != target.value)
            .collect();
        self.replace_targets(desired).await
    }

    fn confirmed_targets(&self) -> Vec<TargetOption> {
        self.view.lock().related.iter().map(Entity::related_option).collect()
    }

    async fn replace_targets(&self, targets: Vec<TargetOption>) -> ApiResult<MutationOutcome> {
        let (entity, rtype) = self.key.lock().clone();
        let target_type = self.target_type.as_deref();
        self.mutate(&rtype, async {
            if targets.is_empty() {
                self.api.delete_relation(&entity.cw_etype, entity.eid, &rtype).await
            } else {
                self.api
                    .add_relation(&entity.cw_etype, entity.eid, &rtype, &targets, target_type)
                    .await
            }
        })
        .await
    }

    /// Create a new target from the creation form and link it.
    pub async fn create_target(&self, attributes: &Value) -> ApiResult<MutationOutcome> {
        let (entity, rtype) = self.key.lock().clone();
        let target_type = self.target_type.as_deref();
        self.mutate(
            &rtype,
            self.api
                .relate_entity(&entity.cw_etype, entity.eid, &rtype, Some(attributes), target_type),
        )
        .await
    }

    /// Edit one of the related entities in place.
    pub async fn update_target(&self, target: &Entity, form_data: &Value) -> ApiResult<MutationOutcome> {
        let rtype = self.rtype();
        self.mutate(&rtype, self.api.update_entity(&target.cw_etype, target.eid, form_data))
            .await
    }

    /// Run one mutation of `rtype`, then reload on success only.
    async fn mutate<F>(&self, rtype: &str, call: F) -> ApiResult<MutationOutcome>
    where
        F: Future<Output = ApiResult<ServerDoc>>,
    {
        let _guard = self.mutations.try_acquire(rtype.to_string())?;
        let outcome = match call.await {
            Ok(doc) if doc.has_errors() => {
                let errors = doc.errors();
                self.view.lock().message = Some(errors.iter().map(ServerError::render).join("\n"));
                MutationOutcome::Invalid(errors)
            }
            Ok(_) => MutationOutcome::Applied,
            Err(ApiError::Busy(key)) => return Err(ApiError::Busy(key)),
            Err(err) => {
                log::error!("updating {} relation failed: {}", rtype, err);
                let message = err.to_string();
                self.view.lock().message = Some(message.clone());
                MutationOutcome::Failed(message)
            }
        };
        if outcome == MutationOutcome::Applied {
            self.view.lock().message = None;
            // the change is on the server already; only the view is behind
            if let Err(err) = self.load().await {
                log::warn!("reloading {} relation after update failed: {}", rtype, err);
                self.view.lock().message = Some(format!("saved, but reloading failed: {}", err));
            }
        }
        Ok(outcome)
    }

    pub fn dismiss_message(&self) {
        self.view.lock().message = None;
    }

    pub fn show_creation_form(&self, shown: bool) {
        self.view.lock().display_creation_form = shown;
    }

    /// Whether the creation form is reachable.
    pub fn can_create(&self) -> bool {
        let view = self.view.lock();
        view.display_creation_form || view.no_results
    }
}
