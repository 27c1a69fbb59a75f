//! Error types for pslpkg operations.
//!
//! All pipeline failures flow through one taxonomy so the driver can decide
//! which ones abort the run and which ones are recorded and tolerated.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pslpkg operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Main error type for all pslpkg operations
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Package resolution errors (unknown names, cycles)
    #[error("Resolution error: {0}")]
    Resolve(#[from] ResolveError),

    /// Source control errors
    #[error("Source control error: {0}")]
    Git(#[from] GitError),

    /// Package build errors
    #[error("Build error: {0}")]
    Build(#[from] BuildError),

    /// Upload errors that are not tolerated per-artifact
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    /// Missing upload credentials
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// CLI argument and environment errors
    #[error("CLI error: {0}")]
    Cli(#[from] CliError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors from anyhow
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),
}

/// An external command that exited non-zero or could not be spawned
#[derive(Error, Debug)]
#[error("command `{command}` failed: {reason}")]
pub struct CommandFailure {
    /// Rendered command line
    pub command: String,
    /// Exit status or spawn error, plus captured stderr when available
    pub reason: String,
}

/// Package resolution errors
#[derive(Error, Debug)]
pub enum ResolveError {
    /// Requested package name is not in the package set
    #[error("Unknown package '{name}' (known packages: {known})")]
    UnknownPackage {
        /// Requested name
        name: String,
        /// Comma-separated known package names
        known: String,
    },

    /// Dependency relation contains a cycle
    #[error("Cyclic dependency detected involving '{package}'")]
    CyclicDependency {
        /// A package on the cycle
        package: String,
    },

    /// A request specifier could not be parsed
    #[error("Invalid package specifier '{spec}': {reason}")]
    InvalidSpecifier {
        /// Raw specifier as given on the command line
        spec: String,
        /// Reason for the error
        reason: String,
    },
}

/// Source control errors from the system git binary
#[derive(Error, Debug)]
pub enum GitError {
    /// A git invocation failed
    #[error("git {operation} failed for {url}: {source}")]
    Command {
        /// Operation being performed (clone, fetch, checkout, ...)
        operation: String,
        /// Remote URL of the repository
        url: String,
        /// Underlying command failure
        #[source]
        source: CommandFailure,
    },

    /// Repository has no tags to resolve a version from
    #[error("Repository {url} has no tags; supply an explicit name=tag pin")]
    NoTags {
        /// Remote URL of the repository
        url: String,
    },

    /// Local working tree could not be removed before a fresh clone
    #[error("Failed to remove stale working tree {path}: {source}")]
    RemoveFailed {
        /// Working tree path
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },
}

/// Package build errors
#[derive(Error, Debug)]
pub enum BuildError {
    /// No recognizable build recipe in the source snapshot
    #[error("No conda recipe found under {snapshot} (tried: {tried})")]
    RecipeNotFound {
        /// Unpacked snapshot directory
        snapshot: PathBuf,
        /// Candidate relative paths that were checked
        tried: String,
    },

    /// External build or convert invocation failed
    #[error("conda {operation} failed for package '{package}': {source}")]
    Command {
        /// Operation being performed (build, convert, output)
        operation: String,
        /// Package being built
        package: String,
        /// Underlying command failure
        #[source]
        source: CommandFailure,
    },

    /// Snapshot tarball missing or unreadable
    #[error("Snapshot archive {path} for package '{package}' is unusable: {reason}")]
    BadSnapshot {
        /// Package name
        package: String,
        /// Archive path
        path: PathBuf,
        /// Reason for the error
        reason: String,
    },

    /// The build tool reported an artifact path that does not exist
    #[error("Build artifact {path} reported by the build tool does not exist")]
    MissingArtifact {
        /// Reported artifact path
        path: PathBuf,
    },
}

/// Upload errors
#[derive(Error, Debug)]
pub enum UploadError {
    /// Upload cache for a package is empty
    #[error("No cached artifacts to upload for package '{package}'; run build first")]
    EmptyCache {
        /// Package name
        package: String,
    },

    /// The upload tool itself could not be invoked
    #[error("upload tool invocation failed: {0}")]
    Command(#[from] CommandFailure),
}

/// Authentication errors raised before any upload call
#[derive(Error, Debug)]
pub enum AuthError {
    /// No token was supplied and the session is anonymous
    #[error(
        "Cannot upload as an anonymous user. Log in with the upload tool or supply --token \
         (env PSLMODELS_ANACONDA_TOKEN or ~/.pslmodels_anaconda_token)."
    )]
    AnonymousSession,

    /// Session state could not be determined
    #[error("Failed to verify upload session: {0}")]
    WhoamiFailed(#[from] CommandFailure),
}

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// A required external command is missing from PATH
    #[error("Required command not found on PATH: {command}")]
    MissingCommand {
        /// Command name
        command: String,
    },

    /// Invalid command line arguments
    #[error("Invalid arguments: {reason}")]
    InvalidArguments {
        /// Reason for the error
        reason: String,
    },
}

impl PipelineError {
    /// Whether this error aborts the whole run before any side effect.
    ///
    /// Resolution and authentication problems are detected up front; per
    /// package failures during pull/build are handled by the driver and
    /// never surface through this path.
    pub fn is_preflight(&self) -> bool {
        matches!(
            self,
            PipelineError::Resolve(_) | PipelineError::Auth(_) | PipelineError::Cli(_)
        )
    }
}
