//! Persistence for the channel sync document
//!
//! The trait-based design allows swapping between the in-memory store used
//! by tests and the JSON document kept in the config directory.

mod json;
mod memory;
mod traits;

pub use json::JsonStateStore;
pub use memory::InMemoryStateStore;
pub use traits::StateStore;
