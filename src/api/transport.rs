use crate::api::error::ApiResult;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Method, StatusCode, Url};
use std::time::Duration;

/// File attached to a multipart entity creation, keyed by relation type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub rtype: String,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl FilePart {
    pub fn new(
        rtype: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            rtype: rtype.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    /// Already serialized JSON text.
    Json(String),
    /// `data` field holding JSON-encoded attributes plus one part per file.
    Multipart { data: String, files: Vec<FilePart> },
}

impl Default for RequestBody {
    fn default() -> Self {
        RequestBody::Empty
    }
}

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: RequestBody,
}

/// Fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn status_text(&self) -> String {
        self.status.canonical_reason().unwrap_or("").to_string()
    }

    /// True when the server declared an empty body with `Content-Length: 0`.
    pub fn declares_no_content(&self) -> bool {
        self.headers
            .get(CONTENT_LENGTH)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim() == "0")
            .unwrap_or(false)
    }

    /// Case-insensitive substring match on the `Content-Type` header.
    pub fn is_json(&self) -> bool {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_ascii_lowercase().contains("application/json"))
            .unwrap_or(false)
    }
}

/// Network seam of the client. Implementations perform exactly one round trip.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> ApiResult<RawResponse>;
}

/// Production transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> ApiResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> ApiResult<RawResponse> {
        let ApiRequest {
            method,
            url,
            mut headers,
            body,
        } = request;
        log::debug!("{} {}", method, url);

        let mut builder = self.client.request(method, url);
        builder = match body {
            RequestBody::Empty => builder,
            RequestBody::Json(text) => builder.body(text),
            RequestBody::Multipart { data, files } => {
                // reqwest sets the multipart boundary itself
                headers.remove(CONTENT_TYPE);
                let mut form = reqwest::multipart::Form::new().text("data", data);
                for file in files {
                    let part = reqwest::multipart::Part::bytes(file.bytes)
                        .file_name(file.file_name)
                        .mime_str(&file.content_type)?;
                    form = form.part(file.rtype, part);
                }
                builder.multipart(form)
            }
        };

        let response = builder.headers(headers).send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();
        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
