//! # flux-core
//!
//! Core library for flux - immutable, content-addressed versioning for
//! tabular text datasets. A version is keyed by (raw content,
//! preprocessing config); identical inputs always deduplicate to one
//! stored version, and any two versions can be compared by config,
//! metrics, and row-level data overlap.
//!
//! This crate provides the core functionality that can be used by
//! different interfaces (CLI, web APIs, etc.).

pub mod canonical;
pub mod compare;
pub mod config;
pub mod data;
pub mod error;
pub mod hash;
pub mod lock;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod repository;

// Re-export the most commonly used types for convenience
pub use compare::compare;
pub use error::{FluxError, Result};
pub use lock::{FileLock, LockConfig};
pub use model::{ComparisonReport, PipelineStep, VersionInfo};
pub use pipeline::{Preprocess, TextPipeline};
pub use repository::{Artifact, CreateOptions, Repository};
