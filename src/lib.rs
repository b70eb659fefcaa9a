//! Multi-tenant translation-string management.
//!
//! Projects own languages and namespaced keys; every change is recorded in an
//! append-only history. Values can be machine-translated through an external
//! provider, imported and exported in several formats, and read by client
//! applications through an API-key protected endpoint.

pub mod api_keys;
pub mod client;
pub mod config;
pub mod editor;
pub mod error;
pub mod events;
pub mod gateway;
pub mod history;
pub mod http;
pub mod keys;
pub mod languages;
pub mod model;
pub mod projects;
pub mod retry;
pub mod security;
pub mod store;
pub mod transfer;
pub mod translations;
pub mod validator;

pub use error::{Error, Result};
