//! Session and profile persistence

mod json;
mod memory;
mod traits;

pub use json::JsonProfileStore;
pub use memory::{InMemoryProfileStore, InMemorySessionStore};
pub use traits::{ProfileStore, SessionStore};
