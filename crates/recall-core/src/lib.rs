//! # Recall Core
//!
//! Shared, I/O-free logic for Recall: data models, extraction parsing,
//! store abstraction, owner-scoped retrieval, and vector utilities.
//!
//! This crate contains no tokio, sqlx, HTTP, or filesystem dependencies.
//! The application crate supplies the SQLite store and the model-service
//! client; everything here operates through the [`store::Store`] trait.

pub mod embedding;
pub mod extraction;
pub mod models;
pub mod retrieval;
pub mod store;
