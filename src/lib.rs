//! Component Documentation Service
//!
//! This crate aggregates documentation about UI component libraries from GitHub repositories
//! and local checkouts, normalizes it into one schema, and serves cached query access to it.
//!
//! # Features
//!
//! - Heuristic extraction of props, examples, descriptions, accessibility hints and design tokens
//! - Multiple named sources merged into one deduplicated view
//! - Two-tier TTL cache with an optional durable store
//! - Plain serializable query results for any transport to encode
//!
//! # Modules
//!
//! - [`model`]: Canonical component record types
//! - [`extractor`]: Pattern-based extraction from raw text
//! - [`fetcher`] / [`github`]: Repository listing and file retrieval
//! - [`parser`]: Per-unit parsing of a repository tree
//! - [`source`]: Source configurations and the [`source::ComponentSource`] trait
//! - [`cache`]: In-process and durable caching of component lists
//! - [`orchestrator`]: Source registry, merging and lookups
//! - [`query`]: Caller-facing operations and response types
//! - [`config`]: JSON service configuration
//! - [`logging`]: Subscriber setup

pub mod cache;
pub mod config;
pub mod extractor;
pub mod fetcher;
pub mod github;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod parser;
pub mod query;
pub mod source;
