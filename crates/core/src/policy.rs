//! Upload filename checks.

use std::collections::BTreeSet;
use std::fmt;

/// Extension of a user-supplied filename: the text after the last `.` of the
/// final path component, lowercased. Empty when there is no dot.
pub fn extension_of(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    base.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

/// Why a filename was refused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// The filename has no extension.
    MissingExtension,
    /// The extension is on the deny-list.
    Denied(String),
    /// The extension is not on the allow-list.
    NotAllowed(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingExtension => write!(f, "missing file extension"),
            Rejection::Denied(ext) => write!(f, "extension '{ext}' is banned"),
            Rejection::NotAllowed(ext) => write!(f, "extension '{ext}' is not allowed"),
        }
    }
}

/// Allow-list and deny-list of file extensions. The deny-list always wins.
#[derive(Clone, Debug, Default)]
pub struct ExtensionPolicy {
    allowed: BTreeSet<String>,
    denied: BTreeSet<String>,
}

impl ExtensionPolicy {
    pub fn new<A, D>(allowed: A, denied: D) -> Self
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        Self {
            allowed: allowed.into_iter().map(normalize).collect(),
            denied: denied.into_iter().map(normalize).collect(),
        }
    }

    /// Build from configuration.
    pub fn from_config(config: &crate::config::PolicyConfig) -> Self {
        Self::new(&config.allowed_extensions, &config.denied_extensions)
    }

    /// Whether an already-normalized extension may be stored.
    pub fn is_allowed(&self, extension: &str) -> bool {
        !self.denied.contains(extension) && self.allowed.contains(extension)
    }

    /// Validate a filename and return its normalized extension.
    pub fn check(&self, filename: &str) -> Result<String, Rejection> {
        let extension = extension_of(filename);
        if self.denied.contains(&extension) {
            return Err(Rejection::Denied(extension));
        }
        if self.allowed.contains(&extension) {
            return Ok(extension);
        }
        if extension.is_empty() {
            Err(Rejection::MissingExtension)
        } else {
            Err(Rejection::NotAllowed(extension))
        }
    }
}

fn normalize(ext: impl AsRef<str>) -> String {
    ext.as_ref().trim().trim_start_matches('.').to_lowercase()
}
