//! # PPF Workflow Common Library
//!
//! Shared code for the intervention workflow services:
//! - Error and result types
//! - Tiered configuration resolution (CLI → ENV → TOML → default)
//! - Bearer credential parsing and signed-token verification
//! - SQLite schema initialization
//! - Timestamp and identifier helpers

pub mod api;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod config;
pub mod error;
pub mod time;
pub mod uuid_utils;

pub use error::{Error, Result};
