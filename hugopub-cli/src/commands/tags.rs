//! Tag mapping maintenance.

use anyhow::Result;
use hugopub_core::{Context, TagLearner};

pub fn sync_tags(ctx: &Context) -> Result<()> {
    let learner = TagLearner::new(ctx);
    let mapping = learner.rebuild();

    println!(
        "{} tags mapped in {}",
        mapping.len(),
        learner.mapping_file().display()
    );
    Ok(())
}
