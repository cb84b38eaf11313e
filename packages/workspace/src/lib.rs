//! # Pagecraft Workspace Server
//!
//! The HTTP action layer between the designer UI and the session
//! coordinator. Handlers translate open/close/heartbeat requests into
//! coordinator calls and map the typed outcomes onto the API convention:
//! logical conflicts that need a user decision are 2xx with a structured
//! body, absent resources are 404, store failures are 5xx.

pub mod package;
pub mod server;
pub mod state;

pub use package::{ManifestIngestion, PackageManifest};
pub use server::router;
pub use state::{AppState, ServerConfig};
