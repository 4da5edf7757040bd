//! Errors raised while loading `site.toml`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read site config `{}`", .0.display())]
    Read(PathBuf, #[source] std::io::Error),

    #[error("malformed site config")]
    Parse(#[from] toml::de::Error),

    /// A field holds a value the tool cannot work with.
    #[error("{field} {reason}")]
    Invalid { field: &'static str, reason: &'static str },

    #[error("{0} names no program to run")]
    EmptyCommand(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_read_error_names_file() {
        let err = ConfigError::Read(
            PathBuf::from("blog/site.toml"),
            Error::new(ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "cannot read site config `blog/site.toml`");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_invalid_field_message() {
        let err = ConfigError::Invalid {
            field: "[base.url]",
            reason: "must start with http:// or https://",
        };
        assert_eq!(err.to_string(), "[base.url] must start with http:// or https://");

        let err = ConfigError::EmptyCommand("[build.command]".into());
        assert_eq!(err.to_string(), "[build.command] names no program to run");
    }
}
