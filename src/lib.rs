//! # shotbot
//!
//! Captures a web page through a remote snapshot service, optionally crops away
//! uniform borders, and publishes the image with its caption and alt text to a
//! list of posting targets. If any step fails, the whole pipeline starts over
//! from the beginning, up to five times.
//!
//! ## Pipeline
//!
//! | Stage | Input | Output | Module |
//! |-------|-------|--------|--------|
//! | **Acquire shot** | `JobRequest` | `ImageArtifact` | [`snapshot`] |
//! | **Crop** | `ImageArtifact` | `ImageArtifact` | [`crop`] |
//! | **Distribute** | `ImageArtifact` | post or scratch file | [`distribute`] |
//!
//! The [`pipeline::Orchestrator`] runs each attempt as its own task and never
//! overlaps attempts. All failures are retried the same way; after the initial
//! attempt plus five retries the run gives up.
//!
//! ## Bot files
//!
//! ```text
//! configs/<bot>-config.json      snapshot service url/key, per-target settings
//! behaviors/<bot>-behavior.json  snapshot options, auto-crop, targets, image source
//! scratch/                       dry-run output
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Post for real
//! BOT=demo shotbot
//!
//! # Write the image to scratch/ instead of posting
//! BOT=demo shotbot --dry
//! ```

/// Configuration and settings for bots and runs
pub mod config;

/// Error types and error handling utilities
pub mod error;

/// Image sources producing jobs to capture
pub mod source;

/// Snapshot service client and the acquire-shot stage
pub mod snapshot;

/// Auto-crop stage
pub mod crop;

/// Distribution stage and target configuration
pub mod distribute;

/// Default distributor posting to archive and HTTP targets
pub mod poster;

/// Orchestrator and retry policy
pub mod pipeline;

/// Command-line interface implementation
pub mod cli;

/// Pipeline metrics collection
pub mod telemetry;

/// Utility functions and helpers
pub mod utils;


pub use cli::*;
pub use config::*;
pub use crop::*;
pub use distribute::*;
pub use error::*;
pub use pipeline::*;
pub use poster::*;
pub use snapshot::*;
pub use source::*;
pub use telemetry::*;
pub use utils::*;
