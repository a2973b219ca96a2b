pub mod app_state;
pub mod inflight;
pub mod middleware;

pub use app_state::*;
pub use inflight::*;
pub use middleware::*;
