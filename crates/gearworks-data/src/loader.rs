//! Data file discovery and decoding.
//!
//! A catalog directory holds one file per stem (`blocks`, `families`,
//! `mechanics`), each in RON, TOML, or JSON. [`DataFile`] locates a stem,
//! remembers its format, and decodes it; the name helpers turn missing or
//! repeated names into [`DataLoadError`]s that point at the offending file.

use gearworks_core::registry::RegistryError;
use ron::extensions::Extensions;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

// ===========================================================================
// Errors
// ===========================================================================

#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// No file with this stem exists in the catalog directory.
    #[error("required file '{stem}' not found in {dir}")]
    MissingRequired { stem: String, dir: PathBuf },

    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// The same stem exists in more than one format.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// A field holds a value outside its domain (bad direction code, a
    /// placeholder that is not flagged as one).
    #[error("invalid value in {file}: {detail}")]
    InvalidValue { file: PathBuf, detail: String },

    /// The resolved catalog failed registry validation.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Formats
// ===========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    /// Search order when looking for a stem.
    pub const ALL: [Format; 3] = [Format::Ron, Format::Toml, Format::Json];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Ron => "ron",
            Format::Toml => "toml",
            Format::Json => "json",
        }
    }

    /// Format implied by a file extension.
    pub fn of(path: &Path) -> Result<Format, DataLoadError> {
        let ext = path.extension().and_then(|e| e.to_str());
        Format::ALL
            .into_iter()
            .find(|f| Some(f.extension()) == ext)
            .ok_or_else(|| DataLoadError::UnsupportedFormat {
                file: path.to_path_buf(),
            })
    }

    /// RON optional fields accept a bare value as well as `Some(..)`.
    fn parse<T: DeserializeOwned>(self, text: &str) -> Result<T, String> {
        match self {
            Format::Ron => ron::Options::default()
                .with_default_extension(Extensions::IMPLICIT_SOME)
                .from_str(text)
                .map_err(|e| e.to_string()),
            Format::Toml => toml::from_str(text).map_err(|e| e.to_string()),
            Format::Json => serde_json::from_str(text).map_err(|e| e.to_string()),
        }
    }
}

// ===========================================================================
// DataFile
// ===========================================================================

/// A located data file and its format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataFile {
    pub path: PathBuf,
    pub format: Format,
}

impl DataFile {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, DataLoadError> {
        let path = path.into();
        let format = Format::of(&path)?;
        Ok(Self { path, format })
    }

    /// Find `{stem}.ron`, `{stem}.toml`, or `{stem}.json` in `dir`.
    ///
    /// Returns `Ok(None)` if none exists and `ConflictingFormats` if more
    /// than one does.
    pub fn find(dir: &Path, stem: &str) -> Result<Option<Self>, DataLoadError> {
        let mut found: Option<DataFile> = None;
        for format in Format::ALL {
            let path = dir.join(format!("{stem}.{}", format.extension()));
            if !path.exists() {
                continue;
            }
            if let Some(existing) = &found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing.path.clone(),
                    b: path,
                });
            }
            found = Some(DataFile { path, format });
        }
        Ok(found)
    }

    /// Like [`DataFile::find`], but a missing file is an error.
    pub fn require(dir: &Path, stem: &str) -> Result<Self, DataLoadError> {
        Self::find(dir, stem)?.ok_or_else(|| DataLoadError::MissingRequired {
            stem: stem.to_string(),
            dir: dir.to_path_buf(),
        })
    }

    /// Decode the whole file as one value.
    pub fn read<T: DeserializeOwned>(&self) -> Result<T, DataLoadError> {
        let text = std::fs::read_to_string(&self.path)?;
        self.format.parse(&text).map_err(|detail| self.parse_error(detail))
    }

    /// Decode a list. RON and JSON files hold a bare sequence; TOML has no
    /// top-level arrays, so the list lives under `toml_key`
    /// (`[[families]]`).
    pub fn read_list<T: DeserializeOwned>(&self, toml_key: &str) -> Result<Vec<T>, DataLoadError> {
        if self.format != Format::Toml {
            return self.read();
        }
        let mut table: toml::Table = self.read()?;
        let value = table
            .remove(toml_key)
            .ok_or_else(|| self.parse_error(format!("missing key '{toml_key}'")))?;
        value
            .try_into()
            .map_err(|e: toml::de::Error| self.parse_error(e.to_string()))
    }

    pub fn parse_error(&self, detail: impl Into<String>) -> DataLoadError {
        DataLoadError::Parse {
            file: self.path.clone(),
            detail: detail.into(),
        }
    }

    pub fn invalid(&self, detail: impl Into<String>) -> DataLoadError {
        DataLoadError::InvalidValue {
            file: self.path.clone(),
            detail: detail.into(),
        }
    }
}

// ===========================================================================
// Names
// ===========================================================================

/// Resolve a by-name reference declared in `file`.
pub fn lookup<'a, V>(
    names: &'a HashMap<String, V>,
    name: &str,
    file: &DataFile,
    expected_kind: &'static str,
) -> Result<&'a V, DataLoadError> {
    names.get(name).ok_or_else(|| DataLoadError::UnresolvedRef {
        file: file.path.clone(),
        name: name.to_string(),
        expected_kind,
    })
}

/// Fail if `name` was already declared.
pub fn ensure_unique<V>(
    names: &HashMap<String, V>,
    name: &str,
    file: &DataFile,
) -> Result<(), DataLoadError> {
    if names.contains_key(name) {
        return Err(DataLoadError::DuplicateName {
            file: file.path.clone(),
            name: name.to_string(),
        });
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
