//! # Durable Session State
//!
//! The presence registry and the component mirror store, behind one
//! storage trait.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ coordinator: admission + lifecycle decisions  │
//! └───────────────────────────────────────────────┘
//!                       ↓
//! ┌───────────────────────────────────────────────┐
//! │ store: CoordinatorStore                       │
//! │  - sessions (one row per user-session)        │
//! │  - component_mirror (bulk rows per session)   │
//! │  - atomic insert / supersede / delete         │
//! └───────────────────────────────────────────────┘
//!          ↓                         ↓
//! ┌──────────────────┐    ┌──────────────────────┐
//! │ MemoryStore      │    │ SqliteStore (sqlx)   │
//! └──────────────────┘    └──────────────────────┘
//! ```
//!
//! The store is the single source of truth: there is no cross-request
//! in-process session cache to keep consistent with it. Uniqueness of the
//! `(document, user)` key is a write-time constraint of the store, so races
//! between openers become deterministic [`StoreError::DuplicateSession`]
//! failures instead of silent double-admissions.

pub mod error;
pub mod memory;
pub mod mirror;
pub mod presence;
pub mod sqlite;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use mirror::ComponentMirrorEntry;
pub use presence::{SessionRole, SessionRow};
pub use sqlite::SqliteStore;
pub use store::CoordinatorStore;
