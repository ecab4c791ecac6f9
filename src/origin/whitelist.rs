//! Explicit host whitelist, given literally or as a file.

use std::collections::BTreeSet;

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8::Dir};

use crate::error::ProvisionError;

/// Host names admitted by discovery regardless of the name expression.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Whitelist {
    /// Literal set of host names.
    Names(BTreeSet<String>),
    /// File listing one host name per line; `#` starts a comment line.
    File(Utf8PathBuf),
}

impl Default for Whitelist {
    fn default() -> Self {
        Self::Names(BTreeSet::new())
    }
}

impl Whitelist {
    /// Builds a literal whitelist from `names`.
    #[must_use]
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Names(names.into_iter().map(Into::into).collect())
    }

    /// Returns the admitted names, reading the file variant on every call.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Whitelist`] when the file cannot be read.
    pub fn resolve(&self) -> Result<BTreeSet<String>, ProvisionError> {
        match self {
            Self::Names(names) => Ok(names.clone()),
            Self::File(path) => read_whitelist(path).map(|contents| parse(&contents)),
        }
    }
}

/// Parses whitelist file contents.
///
/// Lines are trimmed; blank lines and lines starting with `#` are skipped.
#[must_use]
pub fn parse(contents: &str) -> BTreeSet<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_owned)
        .collect()
}

fn read_whitelist(path: &Utf8Path) -> Result<String, ProvisionError> {
    let failure = |message: String| ProvisionError::Whitelist {
        path: path.to_path_buf(),
        message,
    };
    let parent = path
        .parent()
        .filter(|dir| !dir.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| failure(String::from("path is missing a file name")))?;

    let dir = Dir::open_ambient_dir(parent, ambient_authority())
        .map_err(|err| failure(err.to_string()))?;
    dir.read_to_string(file_name)
        .map_err(|err| failure(err.to_string()))
}
