//! # hugopub-core
//!
//! Core library for turning a vault of wiki-style Markdown notes into Hugo
//! posts.
//!
//! The crate provides the note metadata model, the asset resolver, the
//! ordered content transform pipeline, the tag-category learner, a bounded
//! batch runner and the publish state manager. Command-line concerns live in
//! `hugopub-cli`.

pub mod assets;
pub mod batch;
pub mod config;
pub mod context;
pub mod frontmatter;
pub mod processor;
pub mod publish;
pub mod slug;
pub mod taxonomy;
pub mod transform;

pub use assets::{AssetReference, AssetResolver};
pub use batch::BatchRunner;
pub use config::Config;
pub use context::Context;
pub use frontmatter::{Metadata, Note};
pub use processor::{BlogProcessor, ProcessReport};
pub use publish::{PublishManager, SortOrder, UnpublishOutcome};
pub use slug::{is_plain_slug, post_slug, slugify};
pub use taxonomy::{TagLearner, TagMapping};
pub use transform::{DocumentContext, Pipeline, Transform};
