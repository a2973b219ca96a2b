pub mod api;
pub mod config;
pub mod logic;
pub mod model;
pub mod routes;
pub mod store;

// Export API types
pub use api::{ApiClient, ApiError, ApiResponse, ApiResult, ReqwestTransport, Transport};

// Export the editors
pub use logic::{
    build_form_data, merge_errors, ApiTreeSource, EntityForms, EntityTree, FormController, Navigation,
    RelationContext, RelationEditor, SchemaLoader, TreeSource,
};

// Export all model types
pub use model::*;

pub use routes::{resolve, Route, RouteMatch};
pub use store::{Action, AppState, Store};
