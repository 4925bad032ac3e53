//! Ingestion use-case services.
//!
//! # Responsibility
//! - Apply grounded packages to the entity store as atomic units.
//! - Keep callers decoupled from transaction and store details.

pub mod ingest_service;
