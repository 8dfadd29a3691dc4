pub mod app;
pub mod authz;
pub mod catalog;
pub mod categorizer;
pub mod config;
pub mod db;
pub mod errors;
pub mod evaluation;
pub mod jwt;
pub mod keys;
pub mod labels;
pub mod models;
pub mod policy;
pub mod roles;
pub mod routes;
pub mod store;
pub mod strings;
pub mod sync;
pub mod utils;
pub mod view;

// Re-export commonly used items for tests
pub use app::{create_app, router, AppState};
pub use config::GuardianConfig;
pub use errors::{GuardianError, GuardianResult};
pub use keys::{CaseStyle, KeyCodec, PermissionKeyBuilder, SharedKeyBuilder};
