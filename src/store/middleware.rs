use crate::api::{ApiClient, FetchOptions};
use crate::store::app_state::{Action, AppState, FetchEvent, Store};
use serde_json::Value;

/// Action types dispatched over the lifecycle of one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchTypes {
    pub request: String,
    pub success: String,
    pub failure: String,
    pub not_necessary: String,
}

impl FetchTypes {
    /// `FOO_REQUEST`, `FOO_SUCCESS`, `FOO_FAILURE`, `FOO_NOT_NECESSARY`.
    pub fn with_prefix(prefix: &str) -> Self {
        Self {
            request: format!("{}_REQUEST", prefix),
            success: format!("{}_SUCCESS", prefix),
            failure: format!("{}_FAILURE", prefix),
            not_necessary: format!("{}_NOT_NECESSARY", prefix),
        }
    }
}

type Predicate = Box<dyn Fn(&AppState) -> bool + Send + Sync>;

/// A fetch described as data, executed by [`call_fetch`].
pub struct FetchCall {
    /// API path, or an absolute `http(s)` URL used as is.
    pub endpoint: String,
    pub types: FetchTypes,
    pub options: FetchOptions,
    pub payload: Value,
    pub should_make_request: Predicate,
}

impl FetchCall {
    pub fn new(endpoint: impl Into<String>, types: FetchTypes) -> Self {
        Self {
            endpoint: endpoint.into(),
            types,
            options: FetchOptions::default().json_content(),
            payload: Value::Null,
            should_make_request: Box::new(|_| true),
        }
    }

    pub fn payload(mut self, payload: Value) -> Self {
        self.payload = payload;
        self
    }

    pub fn options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn only_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&AppState) -> bool + Send + Sync + 'static,
    {
        self.should_make_request = Box::new(predicate);
        self
    }
}

fn event(action_type: &str, payload: &Value) -> FetchEvent {
    FetchEvent {
        action_type: action_type.to_string(),
        payload: payload.clone(),
        response: None,
        error: None,
    }
}

/// Dispatch the request action, then either the not-necessary action or the
/// outcome of the network call. Returns the last dispatched action.
pub async fn call_fetch(store: &Store, api: &ApiClient, call: FetchCall) -> Action {
    let FetchCall {
        endpoint,
        types,
        options,
        payload,
        should_make_request,
    } = call;

    store.dispatch(Action::Fetch(event(&types.request, &payload)));
    if !should_make_request(&store.state()) {
        let action = Action::Fetch(event(&types.not_necessary, &payload));
        store.dispatch(action.clone());
        return action;
    }

    let action = match api.json_fetch(&endpoint, options).await {
        Ok(response) => Action::Fetch(FetchEvent {
            response: Some(response.into_json()),
            ..event(&types.success, &payload)
        }),
        Err(err) => {
            log::warn!("fetch {} failed: {}", endpoint, err);
            Action::Fetch(FetchEvent {
                error: Some(err.to_string()),
                ..event(&types.failure, &payload)
            })
        }
    };
    store.dispatch(action.clone());
    action
}
