//! Generate and remove posts.

use anyhow::{bail, Result};
use hugopub_core::{BlogProcessor, Context, PublishManager};
use std::path::{Path, PathBuf};

pub fn publish_notes(ctx: Context, files: &[String], draft: bool) -> Result<()> {
    let processor = BlogProcessor::new(ctx);
    let selection = (!files.is_empty()).then_some(files);

    let report = processor.process_notes(selection, draft);
    for post in &report.generated {
        println!("{}", post.display());
    }
    println!(
        "Generated {} posts{}",
        report.generated.len(),
        if draft { " as drafts" } else { "" }
    );

    if report.failed > 0 {
        bail!("{} notes failed, see the log above", report.failed);
    }
    Ok(())
}

pub fn unpublish_note(ctx: &Context, note: &str) -> Result<()> {
    let publisher = PublishManager::new(ctx);
    let Some(path) = find_note(ctx, &publisher, note) else {
        bail!("No note matching `{}`", note);
    };

    let outcome = publisher.unpublish(&path);
    println!(
        "{}: publish flag {}, post {}",
        path.display(),
        if outcome.flag_cleared { "cleared" } else { "unchanged" },
        if outcome.post_removed { "removed" } else { "not found" }
    );
    Ok(())
}

/// A path as given, or a publishable note matched by file name or title
fn find_note(ctx: &Context, publisher: &PublishManager, query: &str) -> Option<PathBuf> {
    let direct = Path::new(query);
    if direct.is_file() {
        return Some(direct.to_path_buf());
    }
    let in_vault = ctx.config().notes_dir().join(query);
    if in_vault.is_file() {
        return Some(in_vault);
    }

    publisher
        .list_publishable(&ctx.config().notes_dir(), None)
        .into_iter()
        .find(|(path, metadata)| {
            let name_matches = path.file_name().is_some_and(|n| n == query)
                || path.file_stem().is_some_and(|s| s == query);
            name_matches || metadata.title().eq_ignore_ascii_case(query)
        })
        .map(|(path, _)| path)
}
