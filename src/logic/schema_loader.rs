use crate::api::{ApiClient, ApiResult};
use crate::model::{Eid, SchemaPair, SchemaRequest, SchemaRole};
use crate::store::Generations;
use serde_json::Value;

/// Fetches schema/UI-schema pairs. Nothing is cached: every mount or change
/// of the governing entity fetches again.
#[derive(Debug, Clone)]
pub struct SchemaLoader {
    api: ApiClient,
}

impl SchemaLoader {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn load(&self, etype: &str, request: &SchemaRequest) -> ApiResult<SchemaPair> {
        let (data_schema, ui_schema) = tokio::try_join!(
            self.api.get_schema(etype, request),
            self.api.get_ui_schema(etype, request.schema_type.as_deref()),
        )?;
        Ok(SchemaPair::new(data_schema, ui_schema))
    }

    /// Schema of the entity created through `rtype`, narrowed to `target_type`
    /// for polymorphic relations.
    pub async fn load_relation(
        &self,
        etype: &str,
        rtype: &str,
        role: Option<SchemaRole>,
        target_type: Option<&str>,
    ) -> ApiResult<SchemaPair> {
        let role = role.unwrap_or(SchemaRole::Creation);
        let (data_schema, ui_schema) = tokio::try_join!(
            self.api.get_related_schema(etype, rtype, role, target_type),
            self.api.get_related_ui_schema(etype, rtype, target_type),
        )?;
        Ok(SchemaPair::new(data_schema, ui_schema))
    }

    pub async fn load_transitions(&self, etype: &str, eid: Eid) -> ApiResult<Value> {
        self.api.get_transitions_schema(etype, eid).await
    }
}

/// Schema holder of one editor. A load superseded by a newer one resolves to
/// `None` instead of overwriting fresher data.
#[derive(Debug)]
pub struct SchemaSlot {
    loader: SchemaLoader,
    generations: Generations,
}

impl SchemaSlot {
    pub fn new(loader: SchemaLoader) -> Self {
        Self {
            loader,
            generations: Generations::new(),
        }
    }

    pub async fn load(&self, etype: &str, request: &SchemaRequest) -> ApiResult<Option<SchemaPair>> {
        let generation = self.generations.issue();
        let pair = self.loader.load(etype, request).await?;
        if !self.generations.is_current(generation) {
            log::debug!("discarding stale schema of {}", etype);
            return Ok(None);
        }
        Ok(Some(pair))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{MockTransport, Reply};
    use crate::api::ApiError;
    use reqwest::Method;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_load_pair() {
        let transport = MockTransport::new();
        transport
            .on(Method::GET, "/section/schema", Reply::json(200, json!({"type": "object"})))
            .on(Method::GET, "/section/uischema", Reply::json(200, json!({"ui:order": ["title"]})));
        let api = ApiClient::new(transport.clone(), "http://cms.test", "/").unwrap();

        let pair = SchemaLoader::new(api).load("section", &SchemaRequest::creation()).await.unwrap();
        assert_eq!(pair.data_schema, json!({"type": "object"}));
        assert_eq!(pair.ui_schema, json!({"ui:order": ["title"]}));
        assert!(transport.urls().contains(&"/section/schema?role=creation".to_string()));
    }

    #[tokio::test]
    async fn test_relation_schema_defaults_to_creation() {
        let transport = MockTransport::new();
        transport
            .on(Method::GET, "/section/relationships/children/schema", Reply::json(200, json!({})))
            .on(Method::GET, "/section/relationships/children/uischema", Reply::json(200, json!({})));
        let api = ApiClient::new(transport.clone(), "http://cms.test", "/").unwrap();

        SchemaLoader::new(api)
            .load_relation("section", "children", None, Some("BaseContent"))
            .await
            .unwrap();
        let urls = transport.urls();
        assert!(urls.contains(&"/section/relationships/children/schema?role=creation&target_type=BaseContent".to_string()));
        assert!(urls.contains(&"/section/relationships/children/uischema?target_type=BaseContent".to_string()));
    }

    #[tokio::test]
    async fn test_failed_load_is_passed_through() {
        let transport = MockTransport::new();
        transport.on(Method::GET, "/section/uischema", Reply::json(200, json!({})));
        let api = ApiClient::new(transport, "http://cms.test", "/").unwrap();
        let err = SchemaLoader::new(api).load("section", &SchemaRequest::default()).await.unwrap_err();
        assert!(matches!(err, ApiError::Protocol { .. }));
    }

    #[tokio::test]
    async fn test_slot_discards_superseded_load() {
        let transport = MockTransport::new();
        let gate = Arc::new(Notify::new());
        transport
            .on(Method::GET, "/section/schema", Reply::json(200, json!({"v": 1})).gated(gate.clone()))
            .on(Method::GET, "/section/schema", Reply::json(200, json!({"v": 2})))
            .on(Method::GET, "/section/uischema", Reply::json(200, json!({})));
        let api = ApiClient::new(transport.clone(), "http://cms.test", "/").unwrap();
        let slot = Arc::new(SchemaSlot::new(SchemaLoader::new(api)));

        let first = {
            let slot = Arc::clone(&slot);
            tokio::spawn(async move { slot.load("section", &SchemaRequest::default()).await })
        };
        while transport.request_count() < 2 {
            tokio::task::yield_now().await;
        }
        let second = slot.load("section", &SchemaRequest::default()).await.unwrap();
        gate.notify_one();

        assert_eq!(second.unwrap().data_schema, json!({"v": 2}));
        assert!(first.await.unwrap().unwrap().is_none());
    }
}
