//! # Pet Sponsor
//!
//! Core of the shelter app: the sponsorship and adoption lifecycle between
//! users and pets, and the walk scheduler. Records live in SQLite (optionally
//! encrypted with SQLCipher) and every write is a compare-and-swap against
//! what was read, so concurrent staff and user sessions cannot silently
//! overwrite each other.

pub mod api;
pub mod config;
pub mod consts;
pub mod errors;
pub mod logger;
pub mod metric;
pub mod models;
pub mod repo;
pub mod services;
pub mod utils;
