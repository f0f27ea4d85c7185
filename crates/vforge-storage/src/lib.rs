//! S3-compatible object store and HTTP retrieval.
//!
//! This crate provides:
//! - Per-job storage configuration (environment defaults + job overrides)
//! - The [`ObjectStore`] trait and its S3 implementation
//! - Streaming HTTP downloads with URL re-quoting
//! - Google Drive share-link retrieval

pub mod client;
pub mod config;
pub mod error;
pub mod gdrive;
pub mod http;

pub use client::{object_key, ObjectStore, S3Store};
pub use config::StorageConfig;
pub use error::{StorageError, StorageResult};
pub use gdrive::DriveDownloader;
