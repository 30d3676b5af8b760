//! CLI command implementations.

pub mod list;
pub mod publish;
pub mod tags;

pub use list::list_notes;
pub use publish::{publish_notes, unpublish_note};
pub use tags::sync_tags;
