pub mod client;
pub mod error;
#[cfg(test)]
pub mod mock;
pub mod transport;

pub use client::*;
pub use error::*;
pub use transport::*;
