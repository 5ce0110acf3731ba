use std::path::PathBuf;

/// Errors that can occur across the co-change mining workflow.
///
/// Each variant wraps a specific error domain. Library crates use this type
/// directly; the binary crate converts to `miette` diagnostics at the boundary.
///
/// # Examples
///
/// ```
/// use cochange_core::CochangeError;
///
/// let err = CochangeError::Config("min_support must be in (0, 1]".into());
/// assert!(err.to_string().contains("min_support"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum CochangeError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(code(cochange::config))]
    Config(String),

    /// Git operation failure.
    #[error("git error: {0}")]
    Git(String),

    /// Input file content could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A required file was not found.
    #[error("file not found: {}", .0.display())]
    #[diagnostic(
        code(cochange::file_not_found),
        help("check the path, or set it under [paths] in .cochange.toml")
    )]
    FileNotFound(PathBuf),

    /// A parameter passed to an algorithm is out of range.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A mined rule's antecedent has no entry in the ground truth, so the
    /// rule cannot be scored.
    #[error("no ground truth for antecedent {antecedent}")]
    #[diagnostic(code(cochange::no_ground_truth))]
    NoGroundTruth {
        /// The antecedent file that was looked up.
        antecedent: String,
    },
}

impl CochangeError {
    /// Map an I/O error on `path` to [`CochangeError::FileNotFound`] when the
    /// file is missing, keeping every other failure as [`CochangeError::Io`].
    pub fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            CochangeError::FileNotFound(path.into())
        } else {
            CochangeError::Io(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: CochangeError = io_err.into();
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn config_error_displays_message() {
        let err = CochangeError::Config("bad value".into());
        assert_eq!(err.to_string(), "configuration error: bad value");
    }

    #[test]
    fn file_not_found_shows_path() {
        let err = CochangeError::FileNotFound(PathBuf::from("/tmp/missing.txt"));
        assert!(err.to_string().contains("/tmp/missing.txt"));
    }

    #[test]
    fn from_io_maps_not_found_to_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = CochangeError::from_io("data/log.txt", io_err);
        assert!(matches!(err, CochangeError::FileNotFound(ref p) if p.ends_with("log.txt")));

        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err = CochangeError::from_io("data/log.txt", io_err);
        assert!(matches!(err, CochangeError::Io(_)));
    }

    #[test]
    fn no_ground_truth_names_antecedent() {
        let err = CochangeError::NoGroundTruth {
            antecedent: "src/Foo.java".into(),
        };
        assert_eq!(err.to_string(), "no ground truth for antecedent src/Foo.java");
    }
}
