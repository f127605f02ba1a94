mod auth;
mod bulk;
pub mod client;
pub mod resources;
pub mod types;

pub use auth::LOGIN_ENDPOINT;
pub use bulk::{BulkReadReport, KeyOutcome};
pub use client::DataClient;
pub use resources::ResourceKey;
pub use types::*;

#[cfg(test)]
pub mod test_support;
