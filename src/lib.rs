//! # sitepix
//!
//! Image handling for static-site builds: fills in missing `width`/`height`
//! attributes of `<img>` tags in generated HTML, and produces resized or
//! cropped thumbnails declared per content directory.
//!
//! # Build Flow
//!
//! ```text
//! Site::load      config.toml + content/   →  nodes, resources, cascaded meta.toml
//! thumbnails      [[thumbnails]] specs     →  content/.thumbnails/ (only stale targets)
//! build           resources                →  deploy/ (HTML pages sized, rest copied)
//! ```
//!
//! Thumbnails run first so pages can reference them; the sizer then reads
//! each distinct image at most once through a build-scoped cache.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `config.toml` loading, `meta.toml` cascading, thumbnail spec resolution |
//! | [`site`] | Content tree: nodes, resources, deploy paths, lookups |
//! | [`pattern`] | `fnmatch`-style include globs |
//! | [`imaging`] | Scale/crop math, the engine trait, the `pil` and `sips` engines, the registry |
//! | [`sizer`] | `<img>` tag scanner and dimension insertion |
//! | [`thumbnails`] | Thumbnail targets, freshness, parallel generation |
//! | [`build`] | Runs thumbnails, then deploys every resource |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## A Scanner, Not A Parser
//!
//! Pages are produced by templates the site author controls, so the sizer
//! scans for `<img` and a handful of attribute prefixes instead of building a
//! DOM. Anything it does not recognise passes through byte for byte, and a
//! page rewritten twice is identical to a page rewritten once.
//!
//! ## Modification Times For Staleness
//!
//! A thumbnail is regenerated only when its source is newer. No hashing, no
//! manifest: deleting `content/.thumbnails/` forces a full rebuild.
//!
//! ## Engines Behind A Trait
//!
//! Engines are selected by name from node metadata (`engine = "sips"`). The
//! [`imaging::ImageBackend`] trait keeps the pipeline engine-agnostic and
//! lets tests record operations with a mock instead of decoding pixels.

pub mod build;
pub mod config;
pub mod imaging;
pub mod output;
pub mod pattern;
pub mod site;
pub mod sizer;
pub mod thumbnails;
