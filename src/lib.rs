//! # pslpkg
//!
//! Release automation for Policy Simulation Library (PSL) conda packages.
//!
//! The tool walks a small set of interdependent packages through three
//! phases: pull a tagged source snapshot from git, build conda artifacts
//! for every python version and platform, and upload them to an Anaconda
//! channel. Dependencies always build before their dependents, and a
//! dependent's recipe is rewritten to pin the tags resolved earlier in
//! the same run.
//!
//! ## Usage
//!
//! ```bash
//! pslpkg build taxcalc          # pull and build, no upload
//! pslpkg release                # build and upload everything
//! pslpkg upload btax --force    # re-publish staged btax artifacts
//! pslpkg info                   # show the resolved build order
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod cli;
pub mod conda;
pub mod error;
pub mod git;
pub mod package;
pub mod pipeline;
pub mod process;
pub mod recipe;
pub mod registry;
pub mod resolver;

pub use cli::Args;
pub use conda::{Anaconda, CondaBuild, UploadOutcome, PLATFORMS};
pub use error::{PipelineError, Result};
pub use git::Repository;
pub use package::{ArtifactUpload, BuiltArtifact, Package};
pub use pipeline::summary::RunSummary;
pub use pipeline::{Pipeline, PipelineConfig, TagSet};
pub use registry::{CacheLayout, PackageSet, default_set, DEFAULT_BASE_URL};
pub use resolver::{BuildOrder, PackageRequest, resolve};
