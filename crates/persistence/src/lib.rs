//! Persistence layer for the Gatehouse backend.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations for the visiting workflow
//! - SQL migrations

pub mod db;
pub mod entities;
pub mod metrics;
pub mod repositories;
