//! Size catalog.
//!
//! The catalog is the fixed set of named sizes the server can render. It is
//! parsed once from configuration and never changes while the process runs.
//!
//! # Entry syntax
//!
//! ```text
//! thumb=100x100:crop     exact 100x100, centre-cropped
//! medium=640x640         fit inside 640x640, aspect preserved (same as :fit)
//! full=original          source bytes, untouched
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use thiserror::Error;

/// Catalog used when none is configured.
pub const DEFAULT_SIZES: &[&str] = &["thumb=100x100:crop", "medium=640x640", "full=original"];

/// Size served by `GET /image/{id}`.
pub const DEFAULT_SIZE_NAME: &str = "full";

/// Largest accepted edge, in pixels.
pub const MAX_DIMENSION: u32 = 10_000;

/// Errors from parsing catalog entries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("invalid size entry '{entry}': {reason}")]
    InvalidEntry { entry: String, reason: String },

    #[error("size '{0}' is defined more than once")]
    Duplicate(String),

    #[error("size catalog is empty")]
    Empty,
}

/// How a rendition is derived from its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SizeMode {
    /// Serve the source bytes unchanged.
    Original,

    /// Scale down to fit inside the box, keeping aspect ratio. Never upscales.
    Fit { width: u32, height: u32 },

    /// Scale and centre-crop to exactly `width x height`.
    Crop { width: u32, height: u32 },
}

/// A named size.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizeSpec {
    #[serde(skip_serializing)]
    pub name: String,

    #[serde(flatten)]
    pub mode: SizeMode,
}

impl SizeSpec {
    pub fn new(name: impl Into<String>, mode: SizeMode) -> Self {
        Self {
            name: name.into(),
            mode,
        }
    }

    pub fn original(name: impl Into<String>) -> Self {
        Self::new(name, SizeMode::Original)
    }

    pub fn fit(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self::new(name, SizeMode::Fit { width, height })
    }

    pub fn crop(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self::new(name, SizeMode::Crop { width, height })
    }
}

impl fmt::Display for SizeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.mode {
            SizeMode::Original => write!(f, "{}=original", self.name),
            SizeMode::Fit { width, height } => write!(f, "{}={}x{}", self.name, width, height),
            SizeMode::Crop { width, height } => {
                write!(f, "{}={}x{}:crop", self.name, width, height)
            }
        }
    }
}

impl FromStr for SizeSpec {
    type Err = CatalogError;

    fn from_str(entry: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| CatalogError::InvalidEntry {
            entry: entry.to_string(),
            reason: reason.to_string(),
        };

        let (name, value) = entry
            .trim()
            .split_once('=')
            .ok_or_else(|| invalid("expected NAME=VALUE"))?;
        let name = name.trim();
        let value = value.trim();

        if !is_valid_size_name(name) {
            return Err(invalid(
                "name must be non-empty and use only a-z, 0-9, '-' or '_'",
            ));
        }

        if value.eq_ignore_ascii_case("original") {
            return Ok(SizeSpec::original(name));
        }

        let (dims, mode) = match value.split_once(':') {
            Some((dims, mode)) => (dims, mode),
            None => (value, "fit"),
        };

        let (w, h) = dims
            .split_once(|c: char| c == 'x' || c == 'X')
            .ok_or_else(|| invalid("expected WIDTHxHEIGHT"))?;
        let width: u32 = w.trim().parse().map_err(|_| invalid("width is not a number"))?;
        let height: u32 = h
            .trim()
            .parse()
            .map_err(|_| invalid("height is not a number"))?;

        if width == 0 || height == 0 {
            return Err(invalid("dimensions must be greater than 0"));
        }
        if width > MAX_DIMENSION || height > MAX_DIMENSION {
            return Err(invalid("dimensions exceed the maximum edge"));
        }

        match mode.trim().to_ascii_lowercase().as_str() {
            "fit" => Ok(SizeSpec::fit(name, width, height)),
            "crop" => Ok(SizeSpec::crop(name, width, height)),
            _ => Err(invalid("mode must be 'fit' or 'crop'")),
        }
    }
}

fn is_valid_size_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}

/// Immutable set of named sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SizeCatalog {
    sizes: BTreeMap<String, SizeSpec>,
}

impl SizeCatalog {
    /// Build a catalog from already-parsed specs.
    pub fn from_specs(specs: impl IntoIterator<Item = SizeSpec>) -> Result<Self, CatalogError> {
        let mut sizes = BTreeMap::new();
        for spec in specs {
            if sizes.contains_key(&spec.name) {
                return Err(CatalogError::Duplicate(spec.name));
            }
            sizes.insert(spec.name.clone(), spec);
        }

        if sizes.is_empty() {
            return Err(CatalogError::Empty);
        }

        Ok(Self { sizes })
    }

    /// Parse a list of `NAME=VALUE` entries.
    pub fn parse<I, S>(entries: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let specs = entries
            .into_iter()
            .filter(|e| !e.as_ref().trim().is_empty())
            .map(|e| e.as_ref().parse::<SizeSpec>())
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_specs(specs)
    }

    /// Look up a size by name.
    pub fn get(&self, name: &str) -> Option<&SizeSpec> {
        self.sizes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sizes.contains_key(name)
    }

    /// Size names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.sizes.keys().map(String::as_str)
    }

    pub fn specs(&self) -> impl Iterator<Item = &SizeSpec> {
        self.sizes.values()
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }
}

impl Default for SizeCatalog {
    fn default() -> Self {
        Self::parse(DEFAULT_SIZES).expect("default size catalog is valid")
    }
}
