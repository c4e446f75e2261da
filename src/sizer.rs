//! Add `width`/`height` attributes to `<img>` tags in generated HTML.
//!
//! The scanner is a small state machine over the page text, not an HTML
//! parser. It recognises `<img` followed by whitespace, collects the `src`,
//! `width` and `height` attribute values (quoted or not), and when it reaches
//! the closing `>` inserts the missing attributes right after `<img `:
//!
//! ```text
//! <img src="/media/a.png" alt="A">
//! <img height="480" width="640" src="/media/a.png" alt="A">
//! ```
//!
//! Markup it does not understand is left untouched; a tag without a closing
//! `>` ends the scan.
//!
//! ## Reference resolution
//!
//! | `src` | Looked up as |
//! |---|---|
//! | starts with `media_url` | deploy path under `media_root` |
//! | `scheme://...` or `//...` | external, skipped silently |
//! | `/path` | deploy path |
//! | anything else | file relative to the page's source folder |
//!
//! Dimensions are read at most once per distinct `src` per build through
//! the caller-owned [`DimensionCache`].

use crate::imaging::{Dimensions, ImageBackend, get_dimensions, scale_floor};
use crate::site::{Resource, Site};
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

static EXTERNAL_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z]+://|//)").expect("valid regex"));

// =============================================================================
// Tag scanner
// =============================================================================

/// Attributes the scanner tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attr {
    Src,
    Width,
    Height,
}

impl Attr {
    const ALL: [Attr; 3] = [Attr::Src, Attr::Width, Attr::Height];

    fn prefix(self) -> &'static [u8] {
        match self {
            Attr::Src => b"src=",
            Attr::Width => b"width=",
            Attr::Height => b"height=",
        }
    }
}

/// Raw attribute values of one `<img>` tag. Empty values count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImgAttrs {
    src: String,
    width: String,
    height: String,
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

impl ImgAttrs {
    pub fn src(&self) -> Option<&str> {
        non_empty(&self.src)
    }

    pub fn width(&self) -> Option<&str> {
        non_empty(&self.width)
    }

    pub fn height(&self) -> Option<&str> {
        non_empty(&self.height)
    }

    fn value_mut(&mut self, attr: Attr) -> &mut String {
        match attr {
            Attr::Src => &mut self.src,
            Attr::Width => &mut self.width,
            Attr::Height => &mut self.height,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    FindImg,
    FindAttr,
    GetValue(Attr),
}

fn is_quote(b: u8) -> bool {
    b == b'"' || b == b'\''
}

/// ASCII whitespace plus vertical tab and the 0x1c..=0x1f separators.
fn is_space(b: u8) -> bool {
    b.is_ascii_whitespace() || b == 0x0b || (0x1c..=0x1f).contains(&b)
}

/// Run `insertion` for every complete `<img ...>` tag and splice its result
/// right after the `<img ` prefix.
///
/// All positions where the scanner stops are ASCII bytes, so every slice
/// taken here falls on a UTF-8 boundary.
pub fn rewrite_img_tags(text: &str, mut insertion: impl FnMut(&ImgAttrs) -> String) -> String {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut copied = 0;

    let mut state = ScanState::FindImg;
    let mut pos = 0;
    let mut tag_start = 0;
    let mut value_start = 0;
    let mut attrs = ImgAttrs::default();

    while pos < bytes.len() {
        match state {
            ScanState::FindImg => {
                let Some(found) = text[pos..].find("<img") else {
                    break;
                };
                tag_start = pos + found;
                pos = tag_start + "<img".len();
                if !bytes.get(pos).copied().is_some_and(is_space) {
                    continue;
                }
                pos += 1;
                attrs = ImgAttrs::default();
                state = ScanState::FindAttr;
            }
            ScanState::FindAttr => {
                if bytes[pos] == b'>' {
                    let insert = insertion(&attrs);
                    let at = tag_start + "<img ".len();
                    out.push_str(&text[copied..at]);
                    out.push_str(&insert);
                    copied = at;
                    pos += 1;
                    state = ScanState::FindImg;
                    continue;
                }
                match Attr::ALL
                    .into_iter()
                    .find(|a| bytes[pos..].starts_with(a.prefix()))
                {
                    Some(attr) => {
                        pos += attr.prefix().len();
                        if bytes.get(pos).copied().is_some_and(is_quote) {
                            pos += 1;
                        }
                        value_start = pos;
                        state = ScanState::GetValue(attr);
                    }
                    None => pos += 1,
                }
            }
            ScanState::GetValue(attr) => {
                let b = bytes[pos];
                if b == b'>' || is_quote(b) || is_space(b) {
                    attrs.value_mut(attr).push_str(&text[value_start..pos]);
                    // `>` is left for FindAttr to close the tag
                    if b != b'>' {
                        pos += 1;
                    }
                    state = ScanState::FindAttr;
                } else {
                    pos += 1;
                }
            }
        }
    }

    out.push_str(&text[copied..]);
    out
}

// =============================================================================
// Dimension cache
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachedSize {
    Known(Dimensions),
    /// The image could not be read; never retried within the build.
    Unreadable,
}

/// Image sizes keyed by the raw `src` string, scoped to one build.
#[derive(Debug, Default)]
pub struct DimensionCache {
    entries: HashMap<String, CachedSize>,
}

impl DimensionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, src: &str) -> Option<CachedSize> {
        self.entries.get(src).copied()
    }

    /// Record the outcome for `src`. An existing entry is kept.
    pub fn insert(&mut self, src: &str, size: CachedSize) -> CachedSize {
        *self.entries.entry(src.to_string()).or_insert(size)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries whose dimensions were read successfully.
    pub fn known_count(&self) -> usize {
        self.entries
            .values()
            .filter(|size| matches!(size, CachedSize::Known(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Reference resolution
// =============================================================================

/// Raster formats the sizer reads dimensions from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterKind {
    Png,
    Jpg,
    Jpeg,
    Gif,
}

impl RasterKind {
    pub fn from_kind(kind: &str) -> Option<Self> {
        match kind {
            "png" => Some(Self::Png),
            "jpg" => Some(Self::Jpg),
            "jpeg" => Some(Self::Jpeg),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }
}

/// A `src` mapped onto a content resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub path: PathBuf,
    pub kind: RasterKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Image(ImageRef),
    /// Points outside the site.
    External,
    /// No resource at the referenced location.
    Unknown,
    /// A resource that is not a supported raster image.
    NotAnImage(String),
}

/// Map an `<img src>` found in `page` onto a site resource.
pub fn resolve_reference(site: &Site, page: &Resource, src: &str) -> Resolution {
    let media_url = site.config.media_url.as_str();

    let found = if !media_url.is_empty() && src.starts_with(media_url) {
        let rest = src[media_url.len()..].trim_start_matches('/');
        let media_root = site.config.media_root.trim_matches('/');
        let deploy_path = if media_root.is_empty() {
            rest.to_string()
        } else {
            format!("{media_root}/{rest}")
        };
        site.resource_from_relative_deploy_path(&deploy_path)
    } else if EXTERNAL_URL.is_match(src) {
        return Resolution::External;
    } else if let Some(absolute) = src.strip_prefix('/') {
        site.resource_from_relative_deploy_path(absolute.trim_start_matches('/'))
    } else {
        site.resource_from_path(&page.source_folder().join(src))
    };

    let Some(image) = found else {
        return Resolution::Unknown;
    };
    let kind = image.kind();
    match RasterKind::from_kind(&kind) {
        Some(raster) => Resolution::Image(ImageRef {
            path: image.path.clone(),
            kind: raster,
        }),
        None => Resolution::NotAnImage(kind),
    }
}

// =============================================================================
// Sizer
// =============================================================================

/// Rewrites pages of one site, reading image sizes through `backend`.
pub struct ImageSizer<'a> {
    site: &'a Site,
    backend: &'a dyn ImageBackend,
}

impl<'a> ImageSizer<'a> {
    pub fn new(site: &'a Site, backend: &'a dyn ImageBackend) -> Self {
        Self { site, backend }
    }

    /// Add missing image dimensions to an HTML page.
    ///
    /// Non-HTML resources, and every resource in development mode, come back
    /// unchanged.
    pub fn rewrite_page(&self, cache: &mut DimensionCache, page: &Resource, text: &str) -> String {
        if page.kind() != "html" {
            return text.to_string();
        }
        if self.site.config.is_development() {
            tracing::debug!("Skipping sizer in development mode.");
            return text.to_string();
        }
        rewrite_img_tags(text, |attrs| self.compute_insertion(cache, page, attrs))
    }

    /// The attribute text to insert for one tag, possibly empty.
    pub fn compute_insertion(
        &self,
        cache: &mut DimensionCache,
        page: &Resource,
        attrs: &ImgAttrs,
    ) -> String {
        let (width, height) = (attrs.width(), attrs.height());
        if width.is_some() && height.is_some() {
            return String::new();
        }
        let Some(src) = attrs.src() else {
            tracing::warn!("[{}] has an img tag without src attribute", page);
            return String::new();
        };

        // A given value must be usable for the proportion.
        let given = match (width, height) {
            (Some(w), _) => Some(("width", w)),
            (None, Some(h)) => Some(("height", h)),
            (None, None) => None,
        };
        let given = match given {
            Some((name, value)) => match value.trim().parse::<u32>() {
                Ok(n) => Some((name, n)),
                Err(_) => {
                    tracing::warn!(
                        "[{}] has an img tag with a non-numeric {} `{}`",
                        page,
                        name,
                        value
                    );
                    return String::new();
                }
            },
            None => None,
        };

        let Some(size) = self.lookup_size(cache, page, src) else {
            return String::new();
        };

        match given {
            Some(("width", w)) => {
                format!("height=\"{}\" ", scale_floor(w, size.width, size.height))
            }
            Some((_, h)) => format!("width=\"{}\" ", scale_floor(h, size.height, size.width)),
            None => format!("height=\"{}\" width=\"{}\" ", size.height, size.width),
        }
    }

    fn lookup_size(
        &self,
        cache: &mut DimensionCache,
        page: &Resource,
        src: &str,
    ) -> Option<Dimensions> {
        match cache.get(src) {
            Some(CachedSize::Known(dims)) => return Some(dims),
            Some(CachedSize::Unreadable) => return None,
            None => {}
        }

        let image = match resolve_reference(self.site, page, src) {
            Resolution::Image(image) => image,
            Resolution::External => return None,
            Resolution::Unknown => {
                tracing::warn!("[{}] has an unknown image [{}]", page, src);
                return None;
            }
            Resolution::NotAnImage(kind) => {
                tracing::warn!(
                    "[{}] has an img tag not linking to an image [{}] (kind `{}`)",
                    page,
                    src,
                    kind
                );
                return None;
            }
        };

        match get_dimensions(self.backend, &image.path) {
            Ok(dims) => {
                tracing::debug!("Image [{}] is {}x{}", src, dims.width, dims.height);
                cache.insert(src, CachedSize::Known(dims));
                Some(dims)
            }
            Err(e) => {
                tracing::warn!("Unable to process image [{}]: {}", image.path.display(), e);
                cache.insert(src, CachedSize::Unreadable);
                None
            }
        }
    }
}
