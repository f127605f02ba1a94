//! Data-access layer of the Celebstalks admin dashboard: authenticated
//! requests against the REST API, a shared reference-data store refreshed
//! with per-resource dedup and cooldown, and the toast/confirm hooks that
//! mutations report through.

pub mod api;
pub mod config;
pub mod notify;
pub mod state;
pub mod utils;
