//! Content tree model: nodes, resources and their deploy paths.
//!
//! [`Site::load`] walks the content directory once and builds:
//!
//! - one [`Node`] per directory (pre-order, children sorted by name), carrying
//!   its cascaded [`NodeMeta`];
//! - one [`Resource`] per file, whose relative deploy path defaults to its
//!   path relative to the content root, with `/` separators.
//!
//! Hidden entries (names starting with `.`) and `meta.toml` files are not
//! part of the tree. Generated files are added later with
//! [`Site::add_resource`] and may be given a different deploy path with
//! [`Site::set_relative_deploy_path`].

use crate::config::{self, ConfigError, NodeMeta, SiteConfig};
use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum SiteError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("Content directory not found: {0}")]
    MissingContent(PathBuf),
}

/// Index of a resource within its [`Site`].
pub type ResourceId = usize;

/// A file in the content tree.
#[derive(Debug, Clone)]
pub struct Resource {
    /// Absolute source path.
    pub path: PathBuf,
    relative_deploy_path: String,
}

impl Resource {
    /// Deploy path relative to the output root, `/`-separated.
    pub fn relative_deploy_path(&self) -> &str {
        &self.relative_deploy_path
    }

    /// Lower-cased file extension, or `""`.
    pub fn kind(&self) -> String {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default()
    }

    /// Directory containing the source file.
    pub fn source_folder(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new(""))
    }

    pub fn modified(&self) -> std::io::Result<SystemTime> {
        self.path.metadata()?.modified()
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.relative_deploy_path)
    }
}

/// A directory in the content tree.
#[derive(Debug, Clone)]
pub struct Node {
    pub path: PathBuf,
    /// Path relative to the content root (`""` for the root).
    pub relative_path: String,
    pub meta: NodeMeta,
    /// Files directly inside this directory.
    pub resources: Vec<ResourceId>,
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.relative_path.is_empty() {
            f.write_str("/")
        } else {
            f.write_str(&self.relative_path)
        }
    }
}

#[derive(Debug)]
pub struct Site {
    pub config: SiteConfig,
    pub root: PathBuf,
    pub content_root: PathBuf,
    nodes: Vec<Node>,
    resources: Vec<Resource>,
    by_path: HashMap<PathBuf, ResourceId>,
    by_deploy_path: HashMap<String, ResourceId>,
}

/// Resolve `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// `/`-joined path of `path` relative to `base`.
fn relative_slash_path(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with('.'))
}

impl Site {
    /// Load `config.toml` from `root` and scan the content directory.
    pub fn load(root: &Path) -> Result<Self, SiteError> {
        let config = config::load_config(root)?;
        Self::scan(root, config)
    }

    /// Scan the content directory using an already loaded config.
    pub fn scan(root: &Path, config: SiteConfig) -> Result<Self, SiteError> {
        let root = normalize_path(&std::path::absolute(root)?);
        let content_root = normalize_path(&root.join(&config.content_root));
        if !content_root.is_dir() {
            return Err(SiteError::MissingContent(content_root));
        }

        let mut site = Self {
            config,
            root,
            content_root: content_root.clone(),
            nodes: Vec::new(),
            resources: Vec::new(),
            by_path: HashMap::new(),
            by_deploy_path: HashMap::new(),
        };

        // Raw metadata per directory, for cascading into children.
        let mut raw_meta: HashMap<PathBuf, toml::Value> = HashMap::new();
        let mut node_of_dir: HashMap<PathBuf, usize> = HashMap::new();

        let walker = WalkDir::new(&content_root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden(e));

        for entry in walker {
            let entry = entry?;
            let path = entry.path().to_path_buf();

            if entry.file_type().is_dir() {
                let inherited = path
                    .parent()
                    .and_then(|p| raw_meta.get(p))
                    .cloned()
                    .unwrap_or_else(config::empty_meta);
                let (raw, meta) = config::load_node_meta(&path, &inherited)?;
                raw_meta.insert(path.clone(), raw);
                node_of_dir.insert(path.clone(), site.nodes.len());
                site.nodes.push(Node {
                    relative_path: relative_slash_path(&path, &content_root),
                    path,
                    meta,
                    resources: Vec::new(),
                });
            } else if entry.file_name() != config::META_FILENAME {
                let id = site.add_resource(path.clone());
                if let Some(&node) = path.parent().and_then(|p| node_of_dir.get(p)) {
                    site.nodes[node].resources.push(id);
                }
            }
        }

        tracing::debug!(
            "Scanned {} nodes and {} resources under {}",
            site.nodes.len(),
            site.resources.len(),
            site.content_root.display()
        );
        Ok(site)
    }

    /// Directory the build writes to.
    pub fn deploy_root(&self) -> PathBuf {
        self.root.join(&self.config.deploy_root)
    }

    /// Nodes in pre-order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource(&self, id: ResourceId) -> &Resource {
        &self.resources[id]
    }

    pub fn resource_from_path(&self, path: &Path) -> Option<&Resource> {
        self.by_path
            .get(&normalize_path(path))
            .map(|&id| &self.resources[id])
    }

    pub fn resource_from_relative_deploy_path(&self, path: &str) -> Option<&Resource> {
        self.by_deploy_path
            .get(path)
            .map(|&id| &self.resources[id])
    }

    /// Register a file under the content root.
    ///
    /// The file need not exist yet. Registering the same path twice returns
    /// the existing resource.
    pub fn add_resource(&mut self, path: PathBuf) -> ResourceId {
        let path = normalize_path(&path);
        if let Some(&id) = self.by_path.get(&path) {
            return id;
        }
        let id = self.resources.len();
        let relative_deploy_path = relative_slash_path(&path, &self.content_root);
        self.by_deploy_path.insert(relative_deploy_path.clone(), id);
        self.by_path.insert(path.clone(), id);
        self.resources.push(Resource {
            path,
            relative_deploy_path,
        });
        id
    }

    /// Change where a resource is deployed.
    pub fn set_relative_deploy_path(&mut self, id: ResourceId, deploy_path: String) {
        let old = std::mem::replace(
            &mut self.resources[id].relative_deploy_path,
            deploy_path.clone(),
        );
        if self.by_deploy_path.get(&old) == Some(&id) {
            self.by_deploy_path.remove(&old);
        }
        self.by_deploy_path.insert(deploy_path, id);
    }
}
