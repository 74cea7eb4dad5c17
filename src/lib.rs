/// Sabil registry
///
/// Household registry service: role-scoped person edits, household address
/// propagation, verification tracking, dashboard statistics and a geo-tag
/// catalog, served over a JSON HTTP API.

pub mod account;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod geotag;
pub mod jobs;
pub mod metrics;
pub mod pagination;
pub mod rate_limit;
pub mod registry;
pub mod server;

pub use context::AppContext;
pub use error::{RegistryError, RegistryResult};
