//! Build driver: thumbnails first, then deploy every resource.
//!
//! ```text
//! 1. generate_thumbnails   content/ → content/.thumbnails/  (registers resources)
//! 2. deploy                content/ → deploy/               (HTML pages sized, rest copied)
//! ```
//!
//! One [`DimensionCache`] lives for the whole deploy step, so each distinct
//! `<img src>` is read from disk at most once per build.

use crate::imaging::{EngineRegistry, ImageBackend};
use crate::site::{Site, SiteError};
use crate::sizer::{DimensionCache, ImageSizer};
use crate::thumbnails::{self, ThumbnailError, ThumbnailReport};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Site(#[from] SiteError),
    #[error(transparent)]
    Thumbnails(#[from] ThumbnailError),
}

fn io_at(path: &Path) -> impl FnOnce(std::io::Error) -> BuildError + '_ {
    move |source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub thumbnails: ThumbnailReport,
    /// HTML pages passed through the image sizer.
    pub pages: usize,
    pub copied: usize,
    /// Registered resources whose source file does not exist.
    pub missing: Vec<String>,
    /// Distinct `<img src>` values whose dimensions were read.
    pub images_sized: usize,
    pub deploy_root: PathBuf,
}

/// Run the full build of `site` into `deploy_root`.
pub fn build(
    site: &mut Site,
    registry: &EngineRegistry,
    sizing_backend: &dyn ImageBackend,
    deploy_root: &Path,
) -> Result<BuildReport, BuildError> {
    let thumbnails = thumbnails::generate_thumbnails(site, registry)?;

    fs::create_dir_all(deploy_root).map_err(io_at(deploy_root))?;

    let site: &Site = site;
    let sizer = ImageSizer::new(site, sizing_backend);
    let mut cache = DimensionCache::new();
    let mut report = BuildReport {
        thumbnails,
        deploy_root: deploy_root.to_path_buf(),
        ..BuildReport::default()
    };

    for resource in site.resources() {
        if !resource.path.is_file() {
            tracing::warn!(
                "Skipping [{}]: {} does not exist",
                resource,
                resource.path.display()
            );
            report.missing.push(resource.relative_deploy_path().to_string());
            continue;
        }

        let dest = deploy_root.join(resource.relative_deploy_path());
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(io_at(parent))?;
        }

        if resource.kind() == "html" {
            let bytes = fs::read(&resource.path).map_err(io_at(&resource.path))?;
            match String::from_utf8(bytes) {
                Ok(text) => {
                    let text = sizer.rewrite_page(&mut cache, resource, &text);
                    fs::write(&dest, text).map_err(io_at(&dest))?;
                    tracing::debug!("Wrote page [{}]", resource);
                    report.pages += 1;
                }
                Err(e) => {
                    tracing::warn!("[{}] is not valid UTF-8, copying it unchanged", resource);
                    fs::write(&dest, e.into_bytes()).map_err(io_at(&dest))?;
                    report.copied += 1;
                }
            }
        } else {
            fs::copy(&resource.path, &dest).map_err(io_at(&dest))?;
            report.copied += 1;
        }
    }

    report.images_sized = cache.known_count();
    tracing::info!(
        "Deployed {} pages and {} files to {}",
        report.pages,
        report.copied,
        deploy_root.display()
    );
    Ok(report)
}
