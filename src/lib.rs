//! Dashboard backend for apiary monitoring.
//!
//! Proxies a hosted REST document store and a public weather API for a
//! browser front end, normalizing loosely shaped documents and resolving
//! each hive's weight, temperature and humidity sensors into breach and
//! alarm state.
//!
//! Module layout follows the Explicit Module Boundary Pattern (EMBP):
//! - `adapter` is the only module that reads raw document fields
//! - `engine` holds the pure resolution and alarm rules
//! - `store`, `weather` and `notes` own their external resources
//! - `routes` is the HTTP gateway and the only place errors become responses

pub mod adapter;
pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod models;
pub mod notes;
pub mod routes;
pub mod schema;
pub mod sensors;
pub mod session;
pub mod store;
pub mod weather;

pub use config::Config;
pub use error::{AppError, Result};
