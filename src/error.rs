/// Crate-level error types for ditaref diagnostics.
use std::path::PathBuf;

/// Errors that abort a run or signal a caller/index mismatch.
///
/// Broken references, unparsable documents and ambiguous repairs are not
/// errors: they are reported as values so one bad file never stops a crawl.
#[allow(clippy::error_impl_error, reason = "crate-internal error type in binary")]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying I/O error from the filesystem.
    #[error("io: {0}")]
    Io(
        /// The wrapped I/O error.
        #[from]
        std::io::Error,
    ),

    /// JSON report serialization failed.
    #[error("json: {0}")]
    Json(
        /// The wrapped JSON error.
        #[from]
        serde_json::Error,
    ),

    /// A path that must be a directory is something else.
    #[error("not a directory: {}", path.display())]
    NotADirectory {
        /// Path that was expected to be a directory.
        path: PathBuf,
    },

    /// Two repairs in one document touch the same bytes.
    #[error("overlapping repairs in {}", file.display())]
    OverlappingPatches {
        /// Document whose patch list overlaps.
        file: PathBuf,
    },

    /// The repair engine was asked to fix a reference the document does not contain.
    #[error("reference `{reference}` not found in {}", file.display())]
    ReferenceNotLocated {
        /// Document that should contain the reference.
        file: PathBuf,
        /// Raw reference text that could not be located.
        reference: String,
    },

    /// The seed map or directory does not exist.
    #[error("seed not found: {}", path.display())]
    SeedNotFound {
        /// Path given as the crawl seed.
        path: PathBuf,
    },

    /// TOML deserialization failed.
    #[error("toml deserialize: {0}")]
    TomlDe(
        /// The wrapped TOML deserialization error.
        #[from]
        toml::de::Error,
    ),
}
