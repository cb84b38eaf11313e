//! # Pagecraft Session Coordinator
//!
//! Decides, for a given document and user, whether a new editing session may
//! be opened, what happens to a prior session when one already exists, and
//! how the per-session mirror of the document's structural components is
//! created and torn down.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │ HTTP action layer: open / close / heartbeat │
//! └─────────────────────────────────────────────┘
//!                      ↓
//! ┌─────────────────────────────────────────────┐
//! │ coordinator: admission + lifecycle          │
//! │  - check_open → Admitted | Conflict         │
//! │  - create_session (atomic row + mirror)     │
//! │  - force_supersede (one-winner replace)     │
//! │  - liveness advisory, close, heartbeat      │
//! └─────────────────────────────────────────────┘
//!        ↓                   ↓
//! ┌───────────────┐  ┌───────────────────────────┐
//! │ resolver /    │  │ store: presence registry  │
//! │ ingestion     │  │ + component mirror        │
//! └───────────────┘  └───────────────────────────┘
//! ```
//!
//! ## Core Principles
//!
//! 1. **The store is the source of truth**: no in-process session cache
//! 2. **Uniqueness at write time**: admission races become deterministic
//!    typed failures, never double-admissions
//! 3. **Mirror entries never outlive their session**: creation and teardown
//!    share the session row's transaction
//! 4. **Liveness is advisory**: staleness informs the user, never admission
//!
//! ## Usage
//!
//! ```rust,ignore
//! use pagecraft_coordinator::{AdmissionResult, SessionCoordinator};
//!
//! match coordinator.check_open(&locator, &user).await? {
//!     AdmissionResult::Admitted { document_id, version_id } => {
//!         let session = coordinator.create_session(request).await?;
//!     }
//!     AdmissionResult::Conflict { existing } => {
//!         // surface to the user, or force_supersede on their say-so
//!     }
//! }
//! ```

mod admission;
mod coordinator;
mod errors;
mod ingest;
mod liveness;
mod resolver;

pub use admission::AdmissionResult;
pub use coordinator::{
    CloseReason, CoordinatorConfig, CreateSession, SessionCoordinator, VersionSource,
};
pub use errors::CoordinatorError;
pub use ingest::{slot_path_for, ComponentPayload, ImportMode, IngestError, IngestionAdapter, StaticIngestion};
pub use liveness::{staleness_of, Staleness};
pub use resolver::{DocumentResolver, Locator, LocatorResolver, ResolveError};

// Re-export store types for convenience
pub use pagecraft_store::{ComponentMirrorEntry, CoordinatorStore, SessionRole, SessionRow};
