//! Correspondence library
//!
//! Letter routing, signing and approval-status tracking for an office,
//! exposed as a library for the binary and for testing.

pub mod aggregation;
pub mod app;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;
pub mod storage;

pub use app::AppState;
pub use error::{AppError, Result};
