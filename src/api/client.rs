use crate::api::error::{ApiError, ApiResult};
use crate::api::transport::{ApiRequest, FilePart, RawResponse, ReqwestTransport, RequestBody, Transport};
use crate::config::ApiConfig;
use crate::model::{Candidate, Eid, Entity, SchemaRequest, SchemaRole, ServerDoc, TargetOption};
use itertools::Itertools;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const JSON: &str = "application/json";
const SCHEMA_JSON: &str = "application/schema+json";

/// Outcome of a JSON fetch: a parsed body, or a successful response that
/// declared no content at all.
#[derive(Debug, Clone)]
pub enum ApiResponse {
    Json(Value),
    NoContent(RawResponse),
}

impl ApiResponse {
    pub fn is_no_content(&self) -> bool {
        matches!(self, ApiResponse::NoContent(_))
    }

    pub fn into_json(self) -> Value {
        match self {
            ApiResponse::Json(value) => value,
            ApiResponse::NoContent(_) => Value::Null,
        }
    }

    pub fn into_doc(self) -> ServerDoc {
        ServerDoc(self.into_json())
    }
}

/// Per-request options. Headers given here win over the defaults.
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub method: Option<Method>,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

impl FetchOptions {
    pub fn method(method: Method) -> Self {
        Self {
            method: Some(method),
            ..Self::default()
        }
    }

    pub fn accept(mut self, media_type: &'static str) -> Self {
        self.headers.insert(ACCEPT, HeaderValue::from_static(media_type));
        self
    }

    pub fn json_body(mut self, body: &Value) -> Self {
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
        self.body = RequestBody::Json(body.to_string());
        self
    }

    /// JSON content type without a body, as the relation endpoints expect.
    pub fn json_content(mut self) -> Self {
        self.headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
        self
    }
}

/// Query parameters of `GET /{etype}/{eid}/{rtype}`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelatedParams {
    pub sort: Option<String>,
    pub target_type: Option<String>,
}

/// JSON client for the CMS REST API. Every path is resolved under a mount
/// prefix fixed at construction time.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    root: Url,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient").field("root", &self.root.as_str()).finish()
    }
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, base_url: &str, mount_prefix: &str) -> ApiResult<Self> {
        let base = Url::parse(base_url).map_err(|e| ApiError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        let prefix = if mount_prefix.ends_with('/') {
            mount_prefix.to_string()
        } else {
            format!("{}/", mount_prefix)
        };
        let root = base
            .join(&prefix)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", prefix, e)))?;
        Ok(Self { transport, root })
    }

    pub fn from_config(config: &ApiConfig) -> ApiResult<Self> {
        let transport = ReqwestTransport::new(Duration::from_secs(config.timeout_secs))?;
        Self::new(Arc::new(transport), &config.base_url, &config.mount_prefix)
    }

    pub fn root(&self) -> &Url {
        &self.root
    }

    /// Resolve `path` under the mount prefix. One leading `/` is ignored.
    pub fn build_url(&self, path: &str) -> ApiResult<Url> {
        let uri = path.strip_prefix('/').unwrap_or(path);
        self.root
            .join(uri)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", path, e)))
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> ApiResult<Url> {
        let mut url = self.build_url(path)?;
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(key, value)| (*key, value.as_str())));
        }
        Ok(url)
    }

    async fn send(&self, url: Url, options: FetchOptions, default_accept: Option<&'static str>) -> ApiResult<(Method, Url, RawResponse)> {
        let method = options.method.unwrap_or(Method::GET);
        let mut headers = options.headers;
        if let Some(accept) = default_accept {
            if !headers.contains_key(ACCEPT) {
                headers.insert(ACCEPT, HeaderValue::from_static(accept));
            }
        }
        let request = ApiRequest {
            method: method.clone(),
            url: url.clone(),
            headers,
            body: options.body,
        };
        let response = self.transport.send(request).await?;
        Ok((method, url, response))
    }

    async fn fetch_url(&self, url: Url, options: FetchOptions) -> ApiResult<ApiResponse> {
        let (method, url, response) = self.send(url, options, Some(JSON)).await?;
        interpret_json_response(&method, &url, response)
    }

    /// Fetch `path` and interpret the response as JSON.
    pub async fn json_fetch(&self, path: &str, options: FetchOptions) -> ApiResult<ApiResponse> {
        let url = self.build_url(path)?;
        self.fetch_url(url, options).await
    }

    /// Like [`json_fetch`](Self::json_fetch) but asks for `application/schema+json`.
    pub async fn schema_fetch(&self, path: &str, options: FetchOptions) -> ApiResult<ApiResponse> {
        let options = if options.headers.contains_key(ACCEPT) {
            options
        } else {
            options.accept(SCHEMA_JSON)
        };
        self.json_fetch(path, options).await
    }

    /// Listing fetch. An `{errors: [...]}` body is logged and read as an empty
    /// collection; `{data: [...]}` is unwrapped.
    pub async fn fetch_collection(&self, path: &str) -> ApiResult<Vec<Value>> {
        let url = self.build_url(path)?;
        self.collection_url(url).await
    }

    async fn collection_url(&self, url: Url) -> ApiResult<Vec<Value>> {
        let doc = match self.fetch_url(url.clone(), FetchOptions::default()).await? {
            ApiResponse::Json(doc) => doc,
            ApiResponse::NoContent(_) => return Ok(Vec::new()),
        };
        Ok(collection_items(&url, doc))
    }

    async fn delete_url(&self, url: Url) -> ApiResult<ApiResponse> {
        // No default Accept: the backend selects routes on it
        let (method, url, response) = self.send(url, FetchOptions::method(Method::DELETE), None).await?;
        interpret_delete_response(&method, &url, response)
    }

    async fn fetch_entities(&self, url: Url) -> ApiResult<Vec<Entity>> {
        self.collection_url(url)
            .await?
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(ApiError::from))
            .collect()
    }

    async fn fetch_candidates(&self, url: Url) -> ApiResult<Vec<Candidate>> {
        self.collection_url(url)
            .await?
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(ApiError::from))
            .collect()
    }

    pub async fn get_schema(&self, etype: &str, request: &SchemaRequest) -> ApiResult<Value> {
        let path = match request.eid {
            Some(eid) => format!("/{}/{}/schema", etype, eid),
            None => format!("/{}/schema", etype),
        };
        let mut params = Vec::new();
        if let Some(role) = request.role {
            params.push(("role", role.as_str().to_string()));
        }
        if let Some(schema_type) = &request.schema_type {
            params.push(("schema_type", schema_type.clone()));
        }
        let url = self.endpoint(&path, &params)?;
        Ok(self.fetch_url(url, FetchOptions::default().accept(SCHEMA_JSON)).await?.into_json())
    }

    pub async fn get_ui_schema(&self, etype: &str, schema_type: Option<&str>) -> ApiResult<Value> {
        let params: Vec<(&str, String)> = schema_type
            .map(|schema_type| vec![("schema_type", schema_type.to_string())])
            .unwrap_or_default();
        let url = self.endpoint(&format!("/{}/uischema", etype), &params)?;
        Ok(self.fetch_url(url, FetchOptions::default()).await?.into_json())
    }

    pub async fn get_related_schema(
        &self,
        etype: &str,
        rtype: &str,
        role: SchemaRole,
        target_type: Option<&str>,
    ) -> ApiResult<Value> {
        let mut params = vec![("role", role.as_str().to_string())];
        if let Some(target_type) = target_type {
            params.push(("target_type", target_type.to_string()));
        }
        let url = self.endpoint(&format!("/{}/relationships/{}/schema", etype, rtype), &params)?;
        Ok(self.fetch_url(url, FetchOptions::default().accept(SCHEMA_JSON)).await?.into_json())
    }

    pub async fn get_related_ui_schema(
        &self,
        etype: &str,
        rtype: &str,
        target_type: Option<&str>,
    ) -> ApiResult<Value> {
        let params: Vec<(&str, String)> = target_type
            .map(|target_type| vec![("target_type", target_type.to_string())])
            .unwrap_or_default();
        let url = self.endpoint(&format!("/{}/relationships/{}/uischema", etype, rtype), &params)?;
        Ok(self.fetch_url(url, FetchOptions::default()).await?.into_json())
    }

    pub async fn get_entities(&self, etype: &str, attrs: &[&str]) -> ApiResult<Vec<Value>> {
        let params: Vec<(&str, String)> = if attrs.is_empty() {
            Vec::new()
        } else {
            vec![("attrs", attrs.iter().join(","))]
        };
        let url = self.endpoint(&format!("/{}/", etype), &params)?;
        self.collection_url(url).await
    }

    pub async fn get_related(
        &self,
        etype: &str,
        eid: Eid,
        rtype: &str,
        params: &RelatedParams,
    ) -> ApiResult<Vec<Entity>> {
        let mut query = Vec::new();
        if let Some(sort) = &params.sort {
            query.push(("sort", sort.clone()));
        }
        if let Some(target_type) = &params.target_type {
            query.push(("target_type", target_type.clone()));
        }
        let url = self.endpoint(&format!("/{}/{}/{}", etype, eid, rtype), &query)?;
        self.fetch_entities(url).await
    }

    /// Typeahead search of entities that may become targets of `rtype`.
    pub async fn get_available_targets(
        &self,
        etype: &str,
        rtype: &str,
        eid: Option<Eid>,
        q: Option<&str>,
        extra: &[(String, String)],
    ) -> ApiResult<Vec<Candidate>> {
        let mut query = Vec::new();
        let path = match eid {
            Some(eid) => {
                query.push(("eid", eid.to_string()));
                format!("/{}/{}/relationships/{}/available-targets", etype, eid, rtype)
            }
            None => format!("/{}/relationships/{}/available-targets", etype, rtype),
        };
        query.push(("rtype", rtype.to_string()));
        if let Some(q) = q {
            query.push(("q", q.to_string()));
        }
        query.extend(extra.iter().map(|(key, value)| (key.as_str(), value.clone())));
        let url = self.endpoint(&path, &query)?;
        self.fetch_candidates(url).await
    }

    /// Authorities that can be grouped with authority `eid`.
    pub async fn get_authority_to_group(&self, eid: Eid, q: Option<&str>) -> ApiResult<Vec<Candidate>> {
        let query: Vec<(&str, String)> = q.map(|q| vec![("q", q.to_string())]).unwrap_or_default();
        let url = self.endpoint(&format!("/fa/authority/{}/group_candidates", eid), &query)?;
        self.fetch_candidates(url).await
    }

    pub async fn get_entity(&self, etype: &str, eid: Eid) -> ApiResult<Entity> {
        let doc = self
            .json_fetch(&format!("/{}/{}", etype, eid), FetchOptions::default())
            .await?
            .into_doc();
        if doc.has_errors() {
            return Err(ApiError::Rejected(doc.errors()));
        }
        Ok(serde_json::from_value(doc.into_inner())?)
    }

    /// `POST /{etype}/`. Attached files turn the body into multipart form data.
    pub async fn create_entity(
        &self,
        etype: &str,
        attributes: &Value,
        schema_type: Option<&str>,
        files: Vec<FilePart>,
    ) -> ApiResult<ServerDoc> {
        let query: Vec<(&str, String)> = schema_type
            .map(|schema_type| vec![("schema_type", schema_type.to_string())])
            .unwrap_or_default();
        let url = self.endpoint(&format!("/{}/", etype), &query)?;
        let options = if files.is_empty() {
            FetchOptions::method(Method::POST).json_body(attributes)
        } else {
            FetchOptions {
                method: Some(Method::POST),
                headers: HeaderMap::new(),
                body: RequestBody::Multipart {
                    data: attributes.to_string(),
                    files,
                },
            }
        };
        Ok(self.fetch_url(url, options).await?.into_doc())
    }

    /// Create a new target entity and link it to `eid` through `rtype`.
    pub async fn relate_entity(
        &self,
        etype: &str,
        eid: Eid,
        rtype: &str,
        attributes: Option<&Value>,
        target_type: Option<&str>,
    ) -> ApiResult<ServerDoc> {
        let query: Vec<(&str, String)> = target_type
            .map(|target_type| vec![("target_type", target_type.to_string())])
            .unwrap_or_default();
        let url = self.endpoint(&format!("/{}/{}/relationships/{}", etype, eid, rtype), &query)?;
        let options = match attributes {
            Some(attributes) => FetchOptions::method(Method::POST).json_body(attributes),
            None => FetchOptions::method(Method::POST).json_content(),
        };
        Ok(self.fetch_url(url, options).await?.into_doc())
    }

    /// Replace the whole target set of `rtype`.
    pub async fn add_relation(
        &self,
        etype: &str,
        eid: Eid,
        rtype: &str,
        targets: &[TargetOption],
        target_type: Option<&str>,
    ) -> ApiResult<ServerDoc> {
        let query: Vec<(&str, String)> = target_type
            .map(|target_type| vec![("target_type", target_type.to_string())])
            .unwrap_or_default();
        let url = self.endpoint(
            &format!("/{}/{}/relationships/{}/targets", etype, eid, rtype),
            &query,
        )?;
        let body = serde_json::to_value(targets)?;
        Ok(self
            .fetch_url(url, FetchOptions::method(Method::POST).json_body(&body))
            .await?
            .into_doc())
    }

    /// Drop every target of `rtype`.
    pub async fn delete_relation(&self, etype: &str, eid: Eid, rtype: &str) -> ApiResult<ServerDoc> {
        let url = self.build_url(&format!("/{}/{}/relationships/{}", etype, eid, rtype))?;
        Ok(self
            .fetch_url(url, FetchOptions::method(Method::DELETE).json_content())
            .await?
            .into_doc())
    }

    pub async fn update_entity(&self, etype: &str, eid: Eid, attributes: &Value) -> ApiResult<ServerDoc> {
        let url = self.build_url(&format!("/{}/{}", etype, eid))?;
        Ok(self
            .fetch_url(url, FetchOptions::method(Method::PUT).json_body(attributes))
            .await?
            .into_doc())
    }

    pub async fn delete_entity(&self, etype: &str, eid: Eid) -> ApiResult<ServerDoc> {
        let url = self.build_url(&format!("/{}/{}", etype, eid))?;
        Ok(self.delete_url(url).await?.into_doc())
    }

    pub async fn get_transitions_schema(&self, etype: &str, eid: Eid) -> ApiResult<Value> {
        let url = self.endpoint(
            &format!("/{}/{}/transitions/schema", etype, eid),
            &[("role", SchemaRole::Creation.as_str().to_string())],
        )?;
        Ok(self.fetch_url(url, FetchOptions::default().accept(SCHEMA_JSON)).await?.into_json())
    }

    /// Fire a workflow transition on `eid`.
    pub async fn add_transition(&self, etype: &str, eid: Eid, attributes: &Value) -> ApiResult<ServerDoc> {
        let url = self.build_url(&format!("/{}/{}/transitions", etype, eid))?;
        Ok(self
            .fetch_url(url, FetchOptions::method(Method::POST).json_body(attributes))
            .await?
            .into_doc())
    }

    /// Reparent section `child` under `target`. The child is appended.
    pub async fn move_section(&self, target: Eid, child: Eid) -> ApiResult<ServerDoc> {
        let url = self.build_url("/section")?;
        let body = json!({"target": target, "child": child, "newOrder": 0});
        Ok(self
            .fetch_url(url, FetchOptions::method(Method::POST).json_body(&body))
            .await?
            .into_doc())
    }
}

/// Shared response policy of JSON fetches.
pub fn interpret_json_response(method: &Method, url: &Url, response: RawResponse) -> ApiResult<ApiResponse> {
    let status = response.status.as_u16();
    if response.declares_no_content() && (200..400).contains(&status) {
        return Ok(ApiResponse::NoContent(response));
    }
    if response.is_json() {
        return Ok(ApiResponse::Json(serde_json::from_slice(&response.body)?));
    }
    Err(protocol_error(method, url, &response))
}

/// Response policy of entity deletion: JSON bodies are parsed, a bare 204 is success.
pub fn interpret_delete_response(method: &Method, url: &Url, response: RawResponse) -> ApiResult<ApiResponse> {
    if response.is_json() {
        return Ok(ApiResponse::Json(serde_json::from_slice(&response.body)?));
    }
    if response.status == StatusCode::NO_CONTENT {
        return Ok(ApiResponse::NoContent(response));
    }
    Err(protocol_error(method, url, &response))
}

fn protocol_error(method: &Method, url: &Url, response: &RawResponse) -> ApiError {
    let err = ApiError::Protocol {
        status_text: response.status_text(),
        method: method.to_string(),
        url: url.to_string(),
    };
    log::error!("{}", err);
    err
}

fn collection_items(url: &Url, doc: Value) -> Vec<Value> {
    match doc {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            if map.contains_key("errors") {
                log::error!("Listing {} returned errors: {}", url, Value::Object(map));
                return Vec::new();
            }
            match map.remove("data") {
                Some(Value::Array(items)) => items,
                _ => {
                    log::warn!("Listing {} returned no data array", url);
                    Vec::new()
                }
            }
        }
        other => {
            log::warn!("Listing {} returned unexpected document {}", url, other);
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::{MockTransport, Reply};

    fn client(transport: Arc<MockTransport>) -> ApiClient {
        ApiClient::new(transport, "http://cms.test", "/").unwrap()
    }

    #[test]
    fn test_build_url_under_mount_prefix() {
        let transport = MockTransport::new();
        let mounted = ApiClient::new(transport.clone(), "http://cms.test", "/admin").unwrap();
        assert_eq!(mounted.build_url("/section/42").unwrap().as_str(), "http://cms.test/admin/section/42");
        assert_eq!(mounted.build_url("section/42").unwrap().as_str(), "http://cms.test/admin/section/42");

        let slashed = ApiClient::new(transport, "http://cms.test", "/admin/").unwrap();
        assert_eq!(slashed.root().as_str(), "http://cms.test/admin/");
    }

    #[tokio::test]
    async fn test_no_content_resolves_without_parsing() {
        let transport = MockTransport::new();
        transport.on(Method::GET, "/section/1", Reply::raw(204, Some("application/json"), Vec::new()));
        let response = client(transport).json_fetch("/section/1", FetchOptions::default()).await.unwrap();
        assert!(response.is_no_content());
    }

    #[tokio::test]
    async fn test_json_content_type_is_case_insensitive() {
        let transport = MockTransport::new();
        transport.on(
            Method::GET,
            "/section/1",
            Reply::raw(200, Some("Application/JSON; charset=UTF-8"), br#"{"eid": 1}"#.to_vec()),
        );
        let response = client(transport).json_fetch("/section/1", FetchOptions::default()).await.unwrap();
        assert_eq!(response.into_json(), json!({"eid": 1}));
    }

    #[tokio::test]
    async fn test_non_json_response_is_protocol_error() {
        let transport = MockTransport::new();
        transport.on(Method::GET, "/section/1", Reply::raw(502, Some("text/html"), b"<html/>".to_vec()));
        let err = client(transport).json_fetch("/section/1", FetchOptions::default()).await.unwrap_err();
        match err {
            ApiError::Protocol { status_text, method, url } => {
                assert_eq!(status_text, "Bad Gateway");
                assert_eq!(method, "GET");
                assert_eq!(url, "http://cms.test/section/1");
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_default_accept_header_can_be_overridden() {
        let transport = MockTransport::new();
        transport.on(Method::GET, "/section/schema", Reply::json(200, json!({})));
        let api = client(transport.clone());
        api.json_fetch("/section/schema", FetchOptions::default()).await.unwrap();
        api.schema_fetch("/section/schema", FetchOptions::default()).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].headers[ACCEPT], "application/json");
        assert_eq!(requests[1].headers[ACCEPT], "application/schema+json");
    }

    #[tokio::test]
    async fn test_collection_swallows_error_documents() {
        let transport = MockTransport::new();
        transport.on(
            Method::GET,
            "/section/42/children",
            Reply::json(400, json!({"errors": [{"details": "boom"}]})),
        );
        transport.on(Method::GET, "/section/", Reply::json(200, json!({"data": [{"eid": 1}]})));
        let api = client(transport);
        let related = api.get_related("section", 42, "children", &RelatedParams::default()).await.unwrap();
        assert!(related.is_empty());
        let listed = api.get_entities("section", &["title", "order"]).await.unwrap();
        assert_eq!(listed, vec![json!({"eid": 1})]);
    }

    #[tokio::test]
    async fn test_target_listings_decode_rows_without_type() {
        let transport = MockTransport::new();
        transport.on(
            Method::GET,
            "/Section/42/relationships/same_as/available-targets",
            Reply::json(200, json!({"data": [{"eid": 3, "title": "Hugo"}]})),
        );
        transport.on(
            Method::GET,
            "/fa/authority/12/group_candidates",
            Reply::json(200, json!([{"eid": "13", "url": "http://cms.test/agent/13", "title": "Paris"}])),
        );
        let api = client(transport);

        let rows = api
            .fetch_collection("/Section/42/relationships/same_as/available-targets")
            .await
            .unwrap();
        assert_eq!(rows, vec![json!({"eid": 3, "title": "Hugo"})]);

        let found = api.get_available_targets("Section", "same_as", Some(42), Some("hug"), &[]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].option(), TargetOption::new(3, "Hugo"));
        assert_eq!(found[0].cw_etype, None);

        let grouped = api.get_authority_to_group(12, Some("par")).await.unwrap();
        assert_eq!(grouped[0].eid, 13);
        assert_eq!(grouped[0].url.as_deref(), Some("http://cms.test/agent/13"));
    }

    #[tokio::test]
    async fn test_delete_does_not_send_default_accept() {
        let transport = MockTransport::new();
        transport.on(Method::DELETE, "/section/9", Reply::empty(204));
        let doc = client(transport.clone()).delete_entity("section", 9).await.unwrap();
        assert!(!doc.has_errors());
        assert!(!transport.requests()[0].headers.contains_key(ACCEPT));
    }

    #[tokio::test]
    async fn test_delete_reports_validation_errors() {
        let transport = MockTransport::new();
        transport.on(
            Method::DELETE,
            "/section/9",
            Reply::json(400, json!({"errors": [{"details": "has children", "source": {"pointer": "children"}}]})),
        );
        transport.on(Method::DELETE, "/section/10", Reply::raw(500, Some("text/plain"), b"oops".to_vec()));
        let api = client(transport);
        let doc = api.delete_entity("section", 9).await.unwrap();
        assert_eq!(doc.errors()[0].render(), "children: has children");
        assert!(matches!(api.delete_entity("section", 10).await, Err(ApiError::Protocol { .. })));
    }

    #[tokio::test]
    async fn test_endpoint_urls() {
        let transport = MockTransport::new();
        let api = client(transport.clone());
        let _ = api.get_schema("section", &SchemaRequest::edition(42).with_schema_type("light")).await;
        let _ = api.get_ui_schema("section", None).await;
        let _ = api.get_related_schema("section", "children", SchemaRole::Creation, Some("BaseContent")).await;
        let _ = api.get_related_ui_schema("section", "children", None).await;
        let _ = api
            .get_related("Section", 42, "children", &RelatedParams { sort: Some("order".into()), target_type: None })
            .await;
        let _ = api.get_available_targets("Section", "same_as", Some(42), Some("hugo"), &[]).await;
        let _ = api.get_available_targets("Section", "same_as", None, None, &[("limit".into(), "5".into())]).await;
        let _ = api.get_authority_to_group(12, Some("paris")).await;
        let _ = api.get_transitions_schema("BaseContent", 3).await;

        assert_eq!(
            transport.urls(),
            vec![
                "/section/42/schema?role=edition&schema_type=light",
                "/section/uischema",
                "/section/relationships/children/schema?role=creation&target_type=BaseContent",
                "/section/relationships/children/uischema",
                "/Section/42/children?sort=order",
                "/Section/42/relationships/same_as/available-targets?eid=42&rtype=same_as&q=hugo",
                "/Section/relationships/same_as/available-targets?rtype=same_as&limit=5",
                "/fa/authority/12/group_candidates?q=paris",
                "/BaseContent/3/transitions/schema?role=creation",
            ]
        );
    }

    #[tokio::test]
    async fn test_create_entity_with_files_is_multipart() {
        let transport = MockTransport::new();
        transport.on(Method::POST, "/Image/", Reply::json(201, json!({"eid": 5, "absoluteUrl": "http://cms.test/image/5"})));
        let api = client(transport.clone());
        let file = FilePart::new("image_file", "logo.png", "image/png", vec![1, 2, 3]);
        let doc = api
            .create_entity("Image", &json!({"title": "logo"}), Some("light"), vec![file.clone()])
            .await
            .unwrap();
        assert_eq!(doc.absolute_url(), Some("http://cms.test/image/5"));

        let request = &transport.requests()[0];
        assert_eq!(request.url.query(), Some("schema_type=light"));
        assert!(!request.headers.contains_key(CONTENT_TYPE));
        match &request.body {
            RequestBody::Multipart { data, files } => {
                assert_eq!(serde_json::from_str::<Value>(data).unwrap(), json!({"title": "logo"}));
                assert_eq!(files, &vec![file]);
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_move_section_body() {
        let transport = MockTransport::new();
        transport.on(Method::POST, "/section", Reply::empty(200));
        client(transport.clone()).move_section(8, 42).await.unwrap();
        match &transport.requests()[0].body {
            RequestBody::Json(text) => {
                assert_eq!(
                    serde_json::from_str::<Value>(text).unwrap(),
                    json!({"target": 8, "child": 42, "newOrder": 0})
                );
            }
            other => panic!("unexpected body {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_get_entity_rejected() {
        let transport = MockTransport::new();
        transport.on(Method::GET, "/section/1", Reply::json(404, json!({"errors": [{"title": "Not Found"}]})));
        let err = client(transport).get_entity("section", 1).await.unwrap_err();
        assert!(matches!(err, ApiError::Rejected(ref errors) if errors.len() == 1));
    }
}
