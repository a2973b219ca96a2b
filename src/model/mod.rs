pub mod common;
pub mod entity;
pub mod errors;
pub mod schema;

pub use common::*;
pub use entity::*;
pub use errors::*;
pub use schema::*;
