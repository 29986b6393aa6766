//! Embeddable core library for submirror.
//!
//! Provides a clap-free, I/O-abstracted entry point: the CLI and the acceptance suite both drive
//! the same pipeline.
//!
//! # Port traits
//!
//! All I/O is abstracted behind port traits in [`ports`]:
//! - [`MetadataSource`](ports::MetadataSource): fetch one course from the course service
//! - [`RepositoryPort`](ports::RepositoryPort): revisions, checkout/update, directory listings
//! - [`WritePort`](ports::WritePort): create directories and write files
//!
//! The [`adapters`] module provides the HTTP, `svn` and filesystem implementations plus
//! in-memory doubles.
//!
//! # Entry points
//!
//! - [`run_sync`](pipeline::run_sync): resolve, plan and execute one run over a
//!   [`RunPorts`](pipeline::RunPorts) bundle
//! - [`load_catalog`](pipeline::load_catalog): fetch metadata only (listings, link pruning)
//!
//! Repository work runs on the bounded [`WorkerPool`](pool::WorkerPool).

pub mod adapters;
pub mod feed;
pub mod pipeline;
pub mod pool;
pub mod ports;
pub mod settings;

// Re-export the domain ports so callers don't need submirror-domain directly.
pub use submirror_domain::{OverrideSink, Prompter, RepositoryListing};
