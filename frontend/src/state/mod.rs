pub mod session;
pub mod store;

pub use session::SessionStore;
pub use store::{normalize_records, Record, SharedStore};
