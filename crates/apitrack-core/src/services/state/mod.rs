//! Phase state persistence
//!
//! ```text
//! pre ──save──▶ ┌──────────────────────┐ ◀──save── checkpoint
//!               │ trait StateStore     │
//!               │   SqliteStateStore   │
//!               │   MemoryStateStore   │
//!               └──────────────────────┘
//!                        │ load
//!                        ▼
//!                       post
//! ```

pub mod store;

pub use store::{MemoryStateStore, SqliteStateStore, StateKey, StateStore};
