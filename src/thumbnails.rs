//! Thumbnail generation from per-node `[[thumbnails]]` specs.
//!
//! For every node (pre-order) and every spec in its cascaded metadata:
//!
//! 1. **Resolve**: merge the spec over `config.thumbnails` and validate it.
//!    A rejected spec is logged and skipped; its siblings still run.
//! 2. **Engine**: look the engine up by name. An unknown name aborts the run.
//! 3. **Targets**: for each resource directly in the node that matches an
//!    include glob, derive the staged output and register it with the site.
//! 4. **Jobs**: stale targets become jobs, executed in parallel on the rayon
//!    pool. A failing job is logged and counted; it never aborts the run.
//!
//! ## Target layout
//!
//! Thumbnails are staged in one hidden directory of the content tree and
//! deployed next to their source:
//!
//! ```text
//! content/gallery/dawn.jpg
//! content/.thumbnails/gallery/thumb_dawn.jpg    (staged)
//! deploy/gallery/thumb_dawn.jpg                 (deployed)
//! ```
//!
//! A staged file at least as new as its source is reused as is.

use crate::config::ResolvedSpec;
use crate::imaging::{EngineRegistry, ImageBackend, ThumbnailParams};
use crate::site::{ResourceId, Site};
use rayon::prelude::*;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Staging directory under the content root.
pub const STAGING_DIR: &str = ".thumbnails";

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Unknown thumbnail engine `{name}` in [{node}]")]
    UnknownEngine { name: String, node: String },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Staged output for one (source, spec) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailTarget {
    pub source: PathBuf,
    pub output: PathBuf,
    /// The output, registered as a site resource.
    pub resource: ResourceId,
    /// Output exists and is not older than the source.
    pub fresh: bool,
}

/// Counts for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThumbnailReport {
    pub generated: usize,
    pub fresh: usize,
    pub failed: usize,
    /// Sources already carrying the thumbnail prefix.
    pub skipped: usize,
    pub rejected_specs: usize,
    /// Jobs replaced by a later spec writing the same output.
    pub superseded: usize,
}

struct ThumbnailJob {
    engine: Arc<dyn ImageBackend>,
    params: ThumbnailParams,
    deploy_path: String,
}

/// `name` with `suffix` inserted before the extension.
fn with_suffix(name: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        return name.to_string();
    }
    match name.rfind('.') {
        Some(dot) if dot > 0 => format!("{}{}{}", &name[..dot], suffix, &name[dot..]),
        _ => format!("{name}{suffix}"),
    }
}

fn is_fresh(source: &std::path::Path, output: &std::path::Path) -> bool {
    let (Ok(src), Ok(out)) = (source.metadata(), output.metadata()) else {
        return false;
    };
    match (src.modified(), out.modified()) {
        (Ok(src), Ok(out)) => src <= out,
        _ => false,
    }
}

/// Derive and register the thumbnail target of `source` for one spec.
///
/// Returns `None` when the source's deploy name already starts with the
/// (non-empty) prefix, so thumbnails are never made of thumbnails.
pub fn create_target(
    site: &mut Site,
    source: ResourceId,
    prefix: &str,
    suffix: &str,
) -> Result<Option<ThumbnailTarget>, ThumbnailError> {
    let resource = site.resource(source);
    let deploy_path = resource.relative_deploy_path();
    let (dir, name) = deploy_path.rsplit_once('/').unwrap_or(("", deploy_path));
    if !prefix.is_empty() && name.starts_with(prefix) {
        return Ok(None);
    }

    let file_name = format!("{}{}", prefix, with_suffix(name, suffix));
    let mut output = site.content_root.join(STAGING_DIR);
    if !dir.is_empty() {
        output.push(dir);
    }
    output.push(file_name);
    let source_path = resource.path.clone();

    let id = site.add_resource(output.clone());
    let staged = site.resource(id).relative_deploy_path().to_string();
    let deployed = staged.replacen(&format!("{STAGING_DIR}/"), "", 1);
    site.set_relative_deploy_path(id, deployed);

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent)?;
    }

    Ok(Some(ThumbnailTarget {
        fresh: is_fresh(&source_path, &output),
        source: source_path,
        output,
        resource: id,
    }))
}

/// Generate every stale thumbnail declared in the site's node metadata.
pub fn generate_thumbnails(
    site: &mut Site,
    registry: &EngineRegistry,
) -> Result<ThumbnailReport, ThumbnailError> {
    let defaults = site.config.thumbnails.clone();
    let mut report = ThumbnailReport::default();
    let mut jobs: Vec<ThumbnailJob> = Vec::new();
    let mut job_of_output: HashMap<PathBuf, usize> = HashMap::new();

    for node_index in 0..site.nodes().len() {
        let node = &site.nodes()[node_index];
        if node.meta.thumbnails.is_empty() {
            continue;
        }
        let label = node.to_string();
        let specs: Vec<_> = node.meta.specs().collect();
        let resources = node.resources.clone();

        for (n, spec) in specs.into_iter().enumerate() {
            let resolved = match spec.and_then(|spec| spec.resolve(&defaults)) {
                Ok(resolved) => resolved,
                Err(e) => {
                    tracing::error!("[{}] thumbnail spec #{} skipped: {}", label, n + 1, e);
                    report.rejected_specs += 1;
                    continue;
                }
            };
            let engine =
                registry
                    .get(&resolved.engine)
                    .ok_or_else(|| ThumbnailError::UnknownEngine {
                        name: resolved.engine.clone(),
                        node: label.clone(),
                    })?;

            for &id in &resources {
                if !resolved.include.matches(&site.resource(id).path) {
                    continue;
                }
                let Some(target) = create_target(site, id, &resolved.prefix, &resolved.suffix)?
                else {
                    report.skipped += 1;
                    continue;
                };
                let deploy_path = site
                    .resource(target.resource)
                    .relative_deploy_path()
                    .to_string();
                if target.fresh {
                    tracing::debug!("Thumbnail [{}] is up to date", deploy_path);
                    report.fresh += 1;
                    continue;
                }
                let job = ThumbnailJob {
                    engine: Arc::clone(&engine),
                    params: job_params(&resolved, target),
                    deploy_path,
                };
                // Jobs run concurrently, so one output must have one writer.
                // The last spec naming it wins.
                match job_of_output.get(&job.params.output) {
                    Some(&earlier) => {
                        tracing::warn!(
                            "[{}] thumbnail spec #{} overrides an earlier spec for [{}]",
                            label,
                            n + 1,
                            job.deploy_path
                        );
                        report.superseded += 1;
                        jobs[earlier] = job;
                    }
                    None => {
                        job_of_output.insert(job.params.output.clone(), jobs.len());
                        jobs.push(job);
                    }
                }
            }
        }
    }

    tracing::debug!("Running {} thumbnail jobs", jobs.len());
    let results: Vec<bool> = jobs
        .par_iter()
        .map(|job| match job.engine.thumbnail(&job.params) {
            Ok(()) => {
                tracing::info!("Generated thumbnail [{}]", job.deploy_path);
                true
            }
            Err(e) => {
                tracing::warn!(
                    "Unable to make thumbnail of [{}]: {}",
                    job.params.source.display(),
                    e
                );
                false
            }
        })
        .collect();

    report.generated = results.iter().filter(|ok| **ok).count();
    report.failed = results.len() - report.generated;
    Ok(report)
}

fn job_params(spec: &ResolvedSpec, target: ThumbnailTarget) -> ThumbnailParams {
    let (width, height, preserve_orientation) = spec.size.as_axes();
    ThumbnailParams {
        source: target.source,
        output: target.output,
        width,
        height,
        preserve_orientation,
        crop: spec.crop,
        quality: spec.quality,
    }
}

/// A spec that would be rejected or abort a build.
#[derive(Debug)]
pub struct SpecProblem {
    pub node: String,
    /// 1-based position in the node's `thumbnails` array.
    pub index: usize,
    pub message: String,
}

/// Result of validating every spec without generating anything.
#[derive(Debug, Default)]
pub struct CheckReport {
    pub specs: usize,
    pub problems: Vec<SpecProblem>,
}

/// Validate all thumbnail specs of the site, including engine names.
pub fn check_specs(site: &Site, registry: &EngineRegistry) -> CheckReport {
    let defaults = &site.config.thumbnails;
    let mut report = CheckReport::default();
    for node in site.nodes() {
        for (n, spec) in node.meta.specs().enumerate() {
            report.specs += 1;
            let message = match spec.and_then(|spec| spec.resolve(defaults)) {
                Err(e) => e.to_string(),
                Ok(resolved) if registry.get(&resolved.engine).is_none() => {
                    format!("unknown engine `{}`", resolved.engine)
                }
                Ok(_) => continue,
            };
            report.problems.push(SpecProblem {
                node: node.to_string(),
                index: n + 1,
                message,
            });
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockBackend, RecordedOp};
    use crate::imaging::{BackendError, Dimensions};
    use std::fs::{self, File};
    use std::path::Path;
    use std::time::{Duration, SystemTime};
    use tempfile::TempDir;

    struct FailingBackend;

    impl ImageBackend for FailingBackend {
        fn identify(&self, _path: &Path) -> Result<Dimensions, BackendError> {
            Err(BackendError::ProcessingFailed("broken".into()))
        }

        fn thumbnail(&self, _params: &ThumbnailParams) -> Result<(), BackendError> {
            Err(BackendError::ProcessingFailed("broken".into()))
        }
    }

    /// Site with the given content files and a root `meta.toml`.
    fn site_with(files: &[&str], meta: &str) -> (TempDir, Site) {
        let tmp = TempDir::new().unwrap();
        let content = tmp.path().join("content");
        fs::create_dir_all(&content).unwrap();
        for file in files {
            let path = content.join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "x").unwrap();
        }
        fs::write(content.join("meta.toml"), meta).unwrap();
        let site = Site::load(tmp.path()).unwrap();
        (tmp, site)
    }

    fn mock_registry() -> (Arc<MockBackend>, EngineRegistry) {
        let mock = Arc::new(MockBackend::new());
        let mut registry = EngineRegistry::new();
        registry.register("pil", mock.clone());
        (mock, registry)
    }

    fn thumbnail_ops(mock: &MockBackend) -> Vec<RecordedOp> {
        mock.get_operations()
            .into_iter()
            .filter(|op| matches!(op, RecordedOp::Thumbnail { .. }))
            .collect()
    }

    #[test]
    fn suffix_goes_before_extension() {
        assert_eq!(with_suffix("a.jpg", ""), "a.jpg");
        assert_eq!(with_suffix("a.jpg", "_s"), "a_s.jpg");
        assert_eq!(with_suffix("a.b.png", "_s"), "a.b_s.png");
        assert_eq!(with_suffix("README", "_s"), "README_s");
    }

    #[test]
    fn target_is_staged_and_deployed_next_to_source() {
        let (_tmp, mut site) = site_with(&["gallery/a.jpg"], "");
        let id = site
            .resources()
            .iter()
            .position(|r| r.relative_deploy_path() == "gallery/a.jpg")
            .unwrap();

        let target = create_target(&mut site, id, "thumb_", "").unwrap().unwrap();
        assert_eq!(
            target.output,
            site.content_root.join(".thumbnails/gallery/thumb_a.jpg")
        );
        assert!(target.output.parent().unwrap().is_dir());
        assert!(!target.fresh);
        assert_eq!(
            site.resource(target.resource).relative_deploy_path(),
            "gallery/thumb_a.jpg"
        );
    }

    #[test]
    fn prefixed_sources_are_skipped() {
        let meta = "[[thumbnails]]\nwidth = 50\ninclude = [\"*.jpg\"]\n";
        let (_tmp, mut site) = site_with(&["a.jpg", "thumb_b.jpg"], meta);
        let (mock, registry) = mock_registry();

        let report = generate_thumbnails(&mut site, &registry).unwrap();
        assert_eq!(report.generated, 1);
        assert_eq!(report.skipped, 1);

        let ops = thumbnail_ops(&mock);
        assert!(matches!(
            &ops[0],
            RecordedOp::Thumbnail { source, output, width: Some(50), height: None, .. }
                if source.ends_with("a.jpg") && output.ends_with(".thumbnails/thumb_a.jpg")
        ));
    }

    #[test]
    fn empty_prefix_does_not_skip() {
        let meta = concat!(
            "[[thumbnails]]\nwidth = 50\n",
            "prefix = \"\"\nsuffix = \"_s\"\ninclude = [\"*.jpg\"]\n",
        );
        let (_tmp, mut site) = site_with(&["a.jpg"], meta);
        let (mock, registry) = mock_registry();

        generate_thumbnails(&mut site, &registry).unwrap();
        assert!(site.resource_from_relative_deploy_path("a_s.jpg").is_some());
        assert_eq!(mock.thumbnail_count(), 1);
    }

    #[test]
    fn fresh_target_is_not_regenerated() {
        let meta = "[[thumbnails]]\nwidth = 50\ninclude = [\"*.jpg\"]\n";
        let (_tmp, mut site) = site_with(&["a.jpg"], meta);
        let source = site.content_root.join("a.jpg");
        let staged = site.content_root.join(".thumbnails/thumb_a.jpg");
        fs::create_dir_all(staged.parent().unwrap()).unwrap();
        fs::write(&staged, "thumb").unwrap();

        let old = SystemTime::now() - Duration::from_secs(3600);
        File::options()
            .write(true)
            .open(&source)
            .unwrap()
            .set_modified(old)
            .unwrap();

        let (mock, registry) = mock_registry();
        let report = generate_thumbnails(&mut site, &registry).unwrap();
        assert_eq!(report.fresh, 1);
        assert_eq!(report.generated, 0);
        assert_eq!(mock.thumbnail_count(), 0);
        assert!(site.resource_from_relative_deploy_path("thumb_a.jpg").is_some());
    }

    #[test]
    fn stale_target_is_regenerated() {
        let meta = "[[thumbnails]]\nwidth = 50\ninclude = [\"*.jpg\"]\n";
        let (_tmp, mut site) = site_with(&["a.jpg"], meta);
        let staged = site.content_root.join(".thumbnails/thumb_a.jpg");
        fs::create_dir_all(staged.parent().unwrap()).unwrap();
        fs::write(&staged, "thumb").unwrap();

        let old = SystemTime::now() - Duration::from_secs(3600);
        File::options()
            .write(true)
            .open(&staged)
            .unwrap()
            .set_modified(old)
            .unwrap();

        let (mock, registry) = mock_registry();
        let report = generate_thumbnails(&mut site, &registry).unwrap();
        assert_eq!(report.generated, 1);
        assert_eq!(mock.thumbnail_count(), 1);
    }

    #[test]
    fn invalid_spec_is_skipped_while_siblings_run() {
        let meta = "\
[[thumbnails]]
width = 50
larger = 100
prefix = \"bad_\"
include = [\"*.jpg\"]

[[thumbnails]]
larger = 100
smaller = 50
prefix = \"good_\"
include = [\"*.jpg\"]
";
        let (_tmp, mut site) = site_with(&["a.jpg"], meta);
        let (mock, registry) = mock_registry();

        let report = generate_thumbnails(&mut site, &registry).unwrap();
        assert_eq!(report.rejected_specs, 1);
        assert_eq!(report.generated, 1);
        assert!(site.resource_from_relative_deploy_path("bad_a.jpg").is_none());

        let ops = thumbnail_ops(&mock);
        assert_eq!(ops.len(), 1);
        assert!(matches!(
            &ops[0],
            RecordedOp::Thumbnail {
                width: Some(100),
                height: Some(50),
                preserve_orientation: true,
                ..
            }
        ));
    }

    #[test]
    fn mistyped_spec_is_skipped_while_siblings_run() {
        let meta = "\
[[thumbnails]]
width = -50
prefix = \"bad_\"
include = [\"*.jpg\"]

[[thumbnails]]
width = 20
include = [\"*.jpg\"]
";
        let (_tmp, mut site) = site_with(&["a.jpg"], meta);
        let (mock, registry) = mock_registry();

        let report = generate_thumbnails(&mut site, &registry).unwrap();
        assert_eq!(report.rejected_specs, 1);
        assert_eq!(report.generated, 1);
        assert!(site.resource_from_relative_deploy_path("thumb_a.jpg").is_some());
        assert!(matches!(
            &thumbnail_ops(&mock)[0],
            RecordedOp::Thumbnail { width: Some(20), .. }
        ));
    }

    #[test]
    fn specs_sharing_an_output_run_once_last_wins() {
        let meta = "\
[[thumbnails]]
width = 50
include = [\"*.jpg\"]

[[thumbnails]]
width = 20
include = [\"*.jpg\"]

[[thumbnails]]
width = 30
prefix = \"small_\"
include = [\"*.jpg\"]
";
        let (_tmp, mut site) = site_with(&["a.jpg"], meta);
        let (mock, registry) = mock_registry();

        let report = generate_thumbnails(&mut site, &registry).unwrap();
        assert_eq!(report.generated, 2);
        assert_eq!(report.superseded, 1);

        let widths: Vec<(String, Option<u32>)> = thumbnail_ops(&mock)
            .into_iter()
            .map(|op| match op {
                RecordedOp::Thumbnail { output, width, .. } => (output, width),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(widths.len(), 2);
        assert!(widths.iter().any(|(o, w)| o.ends_with("/thumb_a.jpg") && *w == Some(20)));
        assert!(widths.iter().any(|(o, w)| o.ends_with("/small_a.jpg") && *w == Some(30)));
    }

    #[test]
    fn unknown_engine_aborts_even_without_matches() {
        let meta = "[[thumbnails]]\nwidth = 50\nengine = \"gd\"\ninclude = [\"*.tiff\"]\n";
        let (_tmp, mut site) = site_with(&["a.jpg"], meta);
        let (_mock, registry) = mock_registry();

        match generate_thumbnails(&mut site, &registry) {
            Err(ThumbnailError::UnknownEngine { name, node }) => {
                assert_eq!(name, "gd");
                assert_eq!(node, "/");
            }
            other => panic!("expected unknown engine, got {other:?}"),
        }
    }

    #[test]
    fn engine_failure_is_counted_not_fatal() {
        let meta = "[[thumbnails]]\nheight = 20\ninclude = [\"*.jpg\"]\n";
        let (_tmp, mut site) = site_with(&["a.jpg", "b.jpg"], meta);
        let mut registry = EngineRegistry::new();
        registry.register("pil", Arc::new(FailingBackend));

        let report = generate_thumbnails(&mut site, &registry).unwrap();
        assert_eq!(report.failed, 2);
        assert_eq!(report.generated, 0);
    }

    #[test]
    fn specs_apply_to_resources_directly_in_node() {
        let meta = "[[thumbnails]]\nwidth = 10\ninclude = [\"*.jpg\"]\n";
        let (tmp, _) = site_with(&["a.jpg", "sub/b.jpg"], meta);
        fs::write(tmp.path().join("content/sub/meta.toml"), "thumbnails = []\n").unwrap();
        let mut site = Site::load(tmp.path()).unwrap();
        let (mock, registry) = mock_registry();

        generate_thumbnails(&mut site, &registry).unwrap();
        assert_eq!(mock.thumbnail_count(), 1);
        assert!(site.resource_from_relative_deploy_path("thumb_a.jpg").is_some());
        assert!(site.resource_from_relative_deploy_path("sub/thumb_b.jpg").is_none());
    }

    #[test]
    fn inherited_specs_reach_child_nodes() {
        let meta = "[[thumbnails]]\nwidth = 10\ninclude = [\"*.png\"]\n";
        let (_tmp, mut site) = site_with(&["sub/deep/c.png"], meta);
        let (mock, registry) = mock_registry();

        generate_thumbnails(&mut site, &registry).unwrap();
        assert_eq!(mock.thumbnail_count(), 1);
        assert!(site.resource_from_relative_deploy_path("sub/deep/thumb_c.png").is_some());
    }

    #[test]
    fn check_reports_bad_specs_and_engines() {
        let meta = "\
[[thumbnails]]
width = 50
include = [\"*.jpg\"]

[[thumbnails]]
include = [\"*.jpg\"]

[[thumbnails]]
width = 5
engine = \"gd\"
include = [\"*.jpg\"]

[[thumbnails]]
width = \"5\"
include = [\"*.jpg\"]
";
        let (_tmp, site) = site_with(&["a.jpg"], meta);
        let (mock, registry) = mock_registry();

        let report = check_specs(&site, &registry);
        assert_eq!(report.specs, 4);
        assert_eq!(report.problems.len(), 3);
        assert_eq!(report.problems[0].index, 2);
        assert_eq!(report.problems[1].message, "unknown engine `gd`");
        assert_eq!(report.problems[2].index, 4);
        assert!(report.problems[2].message.starts_with("invalid entry"));
        assert!(mock.get_operations().is_empty());
    }
}
