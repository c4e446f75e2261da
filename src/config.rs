//! Site configuration and per-node metadata.
//!
//! Handles loading, validating, and merging TOML files. The site-wide
//! `config.toml` lives next to the content directory and overrides stock
//! defaults; `meta.toml` files inside the content tree carry node metadata
//! and cascade from parent to child directories.
//!
//! ## Layout
//!
//! ```text
//! site/
//! ├── config.toml              # Site config (overrides stock defaults)
//! └── content/
//!     ├── meta.toml            # Root node metadata (cascades to children)
//!     ├── index.html
//!     └── gallery/
//!         ├── meta.toml        # Overrides root metadata for this subtree
//!         └── 001-dawn.jpg
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! mode = "production"        # "dev..." disables the image sizer
//! content_root = "content"
//! deploy_root = "deploy"
//! media_root = "media"       # deploy directory served under media_url
//! media_url = "/media/"
//!
//! [thumbnails]               # defaults for every thumbnail spec
//! prefix = "thumb_"
//! suffix = ""
//! crop_type = "topleft"      # topleft | center | bottomright
//! engine = "pil"             # pil | sips
//! quality = 75
//! # width / height / larger / smaller have no default
//!
//! [processing]
//! max_processes = 4          # Max parallel thumbnail workers
//! ```
//!
//! ## Node Metadata
//!
//! ```toml
//! [[thumbnails]]
//! width = 50
//! prefix = "thumbs1_"
//! include = ["*.png", "*.jpg"]
//!
//! [[thumbnails]]
//! larger = 100
//! prefix = "thumbs3_"
//! include = ["*.jpg"]
//! ```
//!
//! A child's `thumbnails` array replaces the inherited one wholesale. Spec
//! problems (bad `crop_type`, conflicting sizes, ...) never fail loading:
//! they are reported per spec by [`ThumbnailSpec::resolve`] so the rest of
//! the build continues.

use crate::imaging::{CropType, Quality};
use crate::pattern::IncludeSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Site configuration file name, looked up in the site root.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Node metadata file name, looked up in every content directory.
pub const META_FILENAME: &str = "meta.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error in {path}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("TOML error: {0}")]
    Value(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
///
/// All fields have sensible defaults. User config files need only specify
/// the values they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Build mode. Any value starting with `dev` skips image sizing.
    pub mode: String,
    /// Content directory, relative to the site root.
    pub content_root: String,
    /// Output directory, relative to the site root.
    pub deploy_root: String,
    /// Deploy directory that `media_url` points at.
    pub media_root: String,
    /// URL prefix under which media files are served.
    pub media_url: String,
    /// Defaults for every thumbnail spec.
    pub thumbnails: ThumbnailDefaults,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            mode: "production".to_string(),
            content_root: "content".to_string(),
            deploy_root: "deploy".to_string(),
            media_root: "media".to_string(),
            media_url: "/media/".to_string(),
            thumbnails: ThumbnailDefaults::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.content_root.is_empty() {
            return Err(ConfigError::Validation("content_root must not be empty".into()));
        }
        if self.deploy_root.is_empty() {
            return Err(ConfigError::Validation("deploy_root must not be empty".into()));
        }
        if self.thumbnails.quality == 0 || self.thumbnails.quality > 100 {
            return Err(ConfigError::Validation(
                "thumbnails.quality must be 1-100".into(),
            ));
        }
        Ok(())
    }

    pub fn is_development(&self) -> bool {
        self.mode.starts_with("dev")
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel thumbnail workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Build-wide defaults for thumbnail specs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailDefaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub larger: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub smaller: Option<u32>,
    pub prefix: String,
    pub suffix: String,
    pub crop_type: String,
    pub engine: String,
    /// Encoding quality for lossy output formats.
    pub quality: u32,
}

impl Default for ThumbnailDefaults {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            larger: None,
            smaller: None,
            prefix: "thumb_".to_string(),
            suffix: String::new(),
            crop_type: "topleft".to_string(),
            engine: "pil".to_string(),
            quality: Quality::default().value(),
        }
    }
}

/// Metadata attached to a content node via `meta.toml`.
///
/// Keys other than `thumbnails` are accepted and ignored. Thumbnail entries
/// stay raw until [`specs`](Self::specs) types them one by one, so a
/// mistyped entry only rejects itself.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NodeMeta {
    pub thumbnails: Vec<toml::Value>,
}

impl NodeMeta {
    /// Every `[[thumbnails]]` entry, typed.
    pub fn specs(&self) -> impl Iterator<Item = Result<ThumbnailSpec, SpecError>> + '_ {
        self.thumbnails
            .iter()
            .map(|entry| entry.clone().try_into().map_err(SpecError::Invalid))
    }
}

/// One thumbnail rule as written in node metadata.
///
/// Every field is optional here; [`resolve`](Self::resolve) fills gaps from
/// [`ThumbnailDefaults`] and validates the result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThumbnailSpec {
    pub include: Option<Vec<String>>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub larger: Option<u32>,
    pub smaller: Option<u32>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub crop_type: Option<String>,
    pub engine: Option<String>,
    pub quality: Option<u32>,
    /// Anything else; reported as an error for this spec only.
    #[serde(flatten)]
    pub unknown: BTreeMap<String, toml::Value>,
}

/// Why a thumbnail spec was rejected.
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("invalid entry: {0}")]
    Invalid(toml::de::Error),
    #[error("include is not set")]
    MissingInclude,
    #[error("unknown key `{0}`")]
    UnknownKey(String),
    #[error("unknown crop_type `{0}` (expected topleft, center or bottomright)")]
    UnknownCropType(String),
    #[error("at least one of width, height, larger, or smaller must be set")]
    NoSize,
    #[error("width/height and larger/smaller cannot be combined")]
    ConflictingSizes,
    #[error("{0} must be greater than zero")]
    ZeroSize(&'static str),
    #[error("quality must be 1-100, got {0}")]
    InvalidQuality(u32),
    #[error("invalid include pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        source: regex::Error,
    },
}

/// Which pair of axes a spec constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeRule {
    /// Literal width and height; either may be absent.
    Axes {
        width: Option<u32>,
        height: Option<u32>,
    },
    /// Longer and shorter edge; bound to width/height by source orientation.
    Orientation {
        larger: Option<u32>,
        smaller: Option<u32>,
    },
}

impl SizeRule {
    /// `(width, height, preserve_orientation)` as handed to an engine.
    pub fn as_axes(self) -> (Option<u32>, Option<u32>, bool) {
        match self {
            Self::Axes { width, height } => (width, height, false),
            Self::Orientation { larger, smaller } => (larger, smaller, true),
        }
    }
}

/// A validated spec with every default applied.
#[derive(Debug, Clone)]
pub struct ResolvedSpec {
    pub include: IncludeSet,
    pub prefix: String,
    pub suffix: String,
    pub size: SizeRule,
    pub crop: CropType,
    pub engine: String,
    pub quality: Quality,
}

impl ThumbnailSpec {
    /// Merge with `defaults` and validate.
    pub fn resolve(&self, defaults: &ThumbnailDefaults) -> Result<ResolvedSpec, SpecError> {
        let include = match &self.include {
            Some(globs) if !globs.is_empty() => globs,
            _ => return Err(SpecError::MissingInclude),
        };
        if let Some(key) = self.unknown.keys().next() {
            return Err(SpecError::UnknownKey(key.clone()));
        }

        let prefix = self.prefix.clone().unwrap_or_else(|| defaults.prefix.clone());
        let suffix = self.suffix.clone().unwrap_or_else(|| defaults.suffix.clone());

        let crop_name = self.crop_type.as_deref().unwrap_or(&defaults.crop_type);
        let crop = CropType::parse(crop_name)
            .ok_or_else(|| SpecError::UnknownCropType(crop_name.to_string()))?;

        let width = self.width.or(defaults.width);
        let height = self.height.or(defaults.height);
        let larger = self.larger.or(defaults.larger);
        let smaller = self.smaller.or(defaults.smaller);

        let has_axes = width.is_some() || height.is_some();
        let has_edges = larger.is_some() || smaller.is_some();
        let size = match (has_axes, has_edges) {
            (false, false) => return Err(SpecError::NoSize),
            (true, true) => return Err(SpecError::ConflictingSizes),
            (true, false) => SizeRule::Axes { width, height },
            (false, true) => SizeRule::Orientation { larger, smaller },
        };
        for (name, value) in [
            ("width", width),
            ("height", height),
            ("larger", larger),
            ("smaller", smaller),
        ] {
            if value == Some(0) {
                return Err(SpecError::ZeroSize(name));
            }
        }

        let quality = self.quality.unwrap_or(defaults.quality);
        if quality == 0 || quality > 100 {
            return Err(SpecError::InvalidQuality(quality));
        }

        let include = IncludeSet::new(include)
            .map_err(|(pattern, source)| SpecError::InvalidPattern { pattern, source })?;

        Ok(ResolvedSpec {
            include,
            prefix,
            suffix,
            size,
            crop,
            engine: self.engine.clone().unwrap_or_else(|| defaults.engine.clone()),
            quality: Quality::new(quality),
        })
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay (arrays included) replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a TOML file from a directory as a raw value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw(dir: &Path, filename: &str) -> Result<Option<toml::Value>, ConfigError> {
    let path = dir.join(filename);
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&path)?;
    let value = toml::from_str(&content).map_err(|source| ConfigError::Toml { path, source })?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load `config.toml` from the site root.
///
/// Merges user values on top of stock defaults, rejects unknown keys,
/// and validates the result.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw(root, CONFIG_FILENAME)?)
}

/// Load a directory's `meta.toml` merged over the inherited metadata.
///
/// Returns the merged raw value (to pass on to child directories) together
/// with its typed form.
pub fn load_node_meta(
    dir: &Path,
    inherited: &toml::Value,
) -> Result<(toml::Value, NodeMeta), ConfigError> {
    let merged = match load_raw(dir, META_FILENAME)? {
        Some(own) => merge_toml(inherited.clone(), own),
        None => inherited.clone(),
    };
    let meta: NodeMeta = merged.clone().try_into().map_err(|source| ConfigError::Toml {
        path: dir.join(META_FILENAME),
        source,
    })?;
    Ok((merged, meta))
}

/// Empty metadata table, the inheritance base of the content root.
pub fn empty_meta() -> toml::Value {
    toml::Value::Table(toml::Table::new())
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# sitepix configuration
# =====================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# Build mode. Any value starting with "dev" skips adding width/height
# attributes to <img> tags.
mode = "production"

# Content directory, relative to this file.
content_root = "content"

# Output directory, relative to this file.
deploy_root = "deploy"

# Deploy directory served under media_url. An <img src> starting with
# media_url is looked up under this directory.
media_root = "media"
media_url = "/media/"

# ---------------------------------------------------------------------------
# Thumbnail defaults
# ---------------------------------------------------------------------------
# Every [[thumbnails]] entry in a meta.toml inherits these values.
# Thumbnails themselves are declared per directory in meta.toml:
#
#   [[thumbnails]]
#   width = 50
#   prefix = "thumbs1_"
#   include = ["*.png", "*.jpg"]
#
# Give either width/height or larger/smaller, never both groups. With
# larger/smaller the image orientation is preserved. With both values of a
# group the image is cropped according to crop_type.
[thumbnails]
prefix = "thumb_"
suffix = ""
# topleft | center | bottomright
crop_type = "topleft"
# pil (built-in) | sips (macOS command-line tool)
engine = "pil"
# Encoding quality for JPEG output (1-100).
quality = 75
# width = 100
# height = 120
# larger = 100
# smaller = 50

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel thumbnail workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
