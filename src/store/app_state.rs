use crate::model::ServerError;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global application state shared by every editor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppState {
    pub show_panel: bool,
    /// Last validation errors reported by a form submission.
    pub errors: Vec<ServerError>,
}

/// Lifecycle event of a fetch driven by the middleware.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchEvent {
    pub action_type: String,
    pub payload: Value,
    pub response: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    TogglePanel,
    ShowPanel,
    ShowErrors(Vec<ServerError>),
    Fetch(FetchEvent),
}

pub fn reduce(mut state: AppState, action: &Action) -> AppState {
    match action {
        Action::TogglePanel => state.show_panel = !state.show_panel,
        Action::ShowPanel => state.show_panel = true,
        Action::ShowErrors(errors) => state.errors = errors.clone(),
        Action::Fetch(_) => {}
    }
    state
}

type Listener = Box<dyn Fn(&Action, &AppState) + Send + Sync>;

/// State container mutated only through [`Store::dispatch`].
pub struct Store {
    state: RwLock<AppState>,
    version: AtomicU64,
    listeners: Mutex<Vec<Listener>>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(AppState::default())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("state", &*self.state.read())
            .field("version", &self.version())
            .finish()
    }
}

impl Store {
    pub fn new(initial: AppState) -> Self {
        Self {
            state: RwLock::new(initial),
            version: AtomicU64::new(0),
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn dispatch(&self, action: Action) {
        let snapshot = {
            let mut state = self.state.write();
            *state = reduce(std::mem::take(&mut *state), &action);
            state.clone()
        };
        self.version.fetch_add(1, Ordering::SeqCst);
        log::debug!("dispatched {:?}", action);
        for listener in self.listeners.lock().iter() {
            listener(&action, &snapshot);
        }
    }

    pub fn state(&self) -> AppState {
        self.state.read().clone()
    }

    /// Bumped on every dispatch.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }

    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(&Action, &AppState) + Send + Sync + 'static,
    {
        self.listeners.lock().push(Box::new(listener));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_reducer() {
        let state = AppState::default();
        let state = reduce(state, &Action::TogglePanel);
        assert!(state.show_panel);
        let state = reduce(state, &Action::TogglePanel);
        assert!(!state.show_panel);
        let state = reduce(state, &Action::ShowPanel);
        let state = reduce(state, &Action::ShowPanel);
        assert!(state.show_panel);

        let errors = vec![ServerError::at("title", "required")];
        let state = reduce(state, &Action::ShowErrors(errors.clone()));
        assert_eq!(state.errors, errors);
    }

    #[test]
    fn test_store_notifies_listeners() {
        let store = Store::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        store.subscribe(move |action, state| sink.lock().push((action.clone(), state.show_panel)));

        store.dispatch(Action::ShowPanel);
        store.dispatch(Action::TogglePanel);

        assert_eq!(store.version(), 2);
        assert!(!store.state().show_panel);
        assert_eq!(
            *seen.lock(),
            vec![(Action::ShowPanel, true), (Action::TogglePanel, false)]
        );
    }
}
