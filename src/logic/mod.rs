pub mod editor;
pub mod form;
pub mod form_data;
pub mod relations;
pub mod schema_loader;
pub mod throttle;
pub mod tree;

pub use editor::*;
pub use form::*;
pub use form_data::*;
pub use relations::*;
pub use schema_loader::*;
pub use throttle::*;
pub use tree::*;
