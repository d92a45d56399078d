// SPDX-License-Identifier: Apache-2.0

use std::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Declared configuration is syntactically or semantically invalid.
    InvalidConfig,
    /// OS call failed: missing binary, I/O failure, command failure.
    EnvironmentError,
    PermissionError,
    /// Zero or multiple interfaces matched a rename or correlation rule.
    AmbiguousMatch,
    /// Failure while restoring a snapshot. Never retried.
    RevertError,
    NotSupportedError,
    #[default]
    Bug,
}

impl ErrorKind {
    /// Whether the trial session may still roll back after this error.
    pub fn can_revert(&self) -> bool {
        !matches!(self, ErrorKind::RevertError)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Position inside a declared configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigLocation {
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl std::fmt::Display for ConfigLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.line > 0 {
            write!(f, "{}:{}:{}", self.file, self.line, self.column)
        } else {
            write!(f, "{}", self.file)
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct NetplanError {
    kind: ErrorKind,
    msg: String,
    location: Option<ConfigLocation>,
}

impl std::fmt::Display for NetplanError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.location.as_ref() {
            Some(location) => {
                write!(f, "{}: {}: {}", self.kind, location, self.msg)
            }
            None => write!(f, "{}: {}", self.kind, self.msg),
        }
    }
}

impl Error for NetplanError {}

impl NetplanError {
    pub fn new(kind: ErrorKind, msg: String) -> Self {
        Self {
            kind,
            msg,
            ..Default::default()
        }
    }

    pub fn new_config_error(msg: String, location: ConfigLocation) -> Self {
        Self {
            kind: ErrorKind::InvalidConfig,
            msg,
            location: Some(location),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn msg(&self) -> &str {
        self.msg.as_str()
    }

    /// File (and line/column when known) that caused an `InvalidConfig`
    /// error.
    pub fn location(&self) -> Option<&ConfigLocation> {
        self.location.as_ref()
    }

    pub(crate) fn with_file(mut self, file: &std::path::Path) -> Self {
        match self.location.as_mut() {
            Some(location) => location.file = file.display().to_string(),
            None => {
                self.location = Some(ConfigLocation {
                    file: file.display().to_string(),
                    ..Default::default()
                })
            }
        }
        self
    }
}

impl From<std::io::Error> for NetplanError {
    fn from(e: std::io::Error) -> Self {
        let kind = if e.kind() == std::io::ErrorKind::PermissionDenied {
            ErrorKind::PermissionError
        } else {
            ErrorKind::EnvironmentError
        };
        NetplanError::new(kind, format!("I/O error: {e}"))
    }
}

impl From<serde_yaml::Error> for NetplanError {
    fn from(e: serde_yaml::Error) -> Self {
        let location = e
            .location()
            .map(|l| ConfigLocation {
                file: String::new(),
                line: l.line(),
                column: l.column(),
            })
            .unwrap_or_default();
        NetplanError::new_config_error(format!("{e}"), location)
    }
}

impl From<serde_json::Error> for NetplanError {
    fn from(e: serde_json::Error) -> Self {
        NetplanError::new(
            ErrorKind::EnvironmentError,
            format!("Invalid JSON reply: {e}"),
        )
    }
}

impl From<std::net::AddrParseError> for NetplanError {
    fn from(e: std::net::AddrParseError) -> Self {
        NetplanError::new(
            ErrorKind::InvalidConfig,
            format!("Invalid IP address: {e}"),
        )
    }
}

impl From<regex::Error> for NetplanError {
    fn from(e: regex::Error) -> Self {
        NetplanError::new(
            ErrorKind::InvalidConfig,
            format!("Invalid pattern: {e}"),
        )
    }
}

impl From<nix::Error> for NetplanError {
    fn from(e: nix::Error) -> Self {
        let kind = if e == nix::Error::EPERM || e == nix::Error::EACCES {
            ErrorKind::PermissionError
        } else {
            ErrorKind::EnvironmentError
        };
        NetplanError::new(kind, format!("System call failed: {e}"))
    }
}
