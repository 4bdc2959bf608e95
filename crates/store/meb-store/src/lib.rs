//! Store implementations for the masked email bot.
//!
//! [`InMemoryStore`] keeps everything in process memory and is used by tests
//! and throwaway deployments. [`FileStore`] additionally snapshots the state to
//! a JSON file after every mutation so users and credentials survive restarts.

mod file;
mod memory;
mod state;

pub use file::FileStore;
pub use memory::InMemoryStore;
