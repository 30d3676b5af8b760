//! List publishable notes.

use anyhow::Result;
use hugopub_core::publish::slug_for_note;
use hugopub_core::{Context, PublishManager, SortOrder};
use serde::Serialize;

#[derive(Serialize)]
struct ListedNote {
    path: String,
    title: String,
    slug: String,
    date: String,
    tags: Vec<String>,
    /// Whether the generated post directory exists
    generated: bool,
}

pub fn list_notes(ctx: &Context, order: Option<SortOrder>, json: bool) -> Result<()> {
    let publisher = PublishManager::new(ctx);
    let notes_dir = ctx.config().notes_dir();

    let listed: Vec<ListedNote> = publisher
        .list_publishable(&notes_dir, order)
        .into_iter()
        .map(|(path, metadata)| {
            let slug = slug_for_note(&path);
            let title = match metadata.title().trim() {
                "" => path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                title => title.to_string(),
            };
            ListedNote {
                path: path
                    .strip_prefix(&notes_dir)
                    .unwrap_or(path.as_path())
                    .display()
                    .to_string(),
                generated: publisher.is_generated(&slug),
                date: metadata.date().to_string(),
                tags: metadata.tags,
                title,
                slug,
            }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&listed)?);
        return Ok(());
    }

    if listed.is_empty() {
        println!("No publishable notes in {}", notes_dir.display());
        return Ok(());
    }
    for (idx, note) in listed.iter().enumerate() {
        let marker = if note.generated { "*" } else { " " };
        println!("{:>3}. [{}] {} ({})", idx + 1, marker, note.title, note.path);
    }
    println!("{} notes, * = post exists", listed.len());

    Ok(())
}
