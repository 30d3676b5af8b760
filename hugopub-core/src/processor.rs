//! Batch entry point: publishable notes in, generated posts out.

use crate::assets::first_local_image;
use crate::batch::BatchItem;
use crate::context::Context;
use crate::frontmatter::{FrontmatterError, Metadata, Note};
use crate::publish::PublishManager;
use crate::slug::{is_plain_slug, post_slug};
use crate::taxonomy::{categories_for_tags, TagLearner, TagMapping};
use crate::transform::{DocumentContext, Pipeline};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid header: {0}")]
    Frontmatter(#[from] FrontmatterError),

    #[error("{0:?} no longer has a header")]
    MissingHeader(PathBuf),

    #[error("Title {0:?} does not give a usable post directory name")]
    UnusableSlug(String),
}

/// Outcome of one batch run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessReport {
    /// Written `index.md` files, in completion order
    pub generated: Vec<PathBuf>,
    /// Notes that were selected but produced no post
    pub failed: usize,
}

struct NoteJob {
    path: PathBuf,
}

impl BatchItem for NoteJob {
    fn label(&self) -> String {
        format!("note {}", self.path.display())
    }
}

pub struct BlogProcessor {
    ctx: Context,
    pipeline: Pipeline,
    learner: TagLearner,
    publisher: PublishManager,
}

impl BlogProcessor {
    pub fn new(ctx: Context) -> Self {
        Self {
            pipeline: Pipeline::standard(&ctx),
            learner: TagLearner::new(&ctx),
            publisher: PublishManager::new(&ctx),
            ctx,
        }
    }

    pub fn publisher(&self) -> &PublishManager {
        &self.publisher
    }

    pub fn learner(&self) -> &TagLearner {
        &self.learner
    }

    /// Generate a post for every publishable note.
    ///
    /// `selection` restricts the run to notes with those file names (with or
    /// without the `.md` extension). With `as_draft` every post is marked as
    /// a draft. The tag mapping is rebuilt before any post is written and
    /// again afterwards, so it also covers the posts of this run.
    pub fn process_notes(&self, selection: Option<&[String]>, as_draft: bool) -> ProcessReport {
        let mapping = self.learner.rebuild();

        let notes_dir = self.ctx.config().notes_dir();
        let jobs: Vec<NoteJob> = self
            .publisher
            .list_publishable(&notes_dir, None)
            .into_iter()
            .filter(|(path, _)| is_selected(path, selection))
            .map(|(path, _)| NoteJob { path })
            .collect();
        let total = jobs.len();
        if total == 0 {
            info!("No publishable notes found in {:?}", notes_dir);
            return ProcessReport::default();
        }

        let generated = self.ctx.runner().map(jobs, |job| {
            self.generate(&job.path, &notes_dir, &mapping, as_draft)
        });
        let failed = total - generated.len();
        info!("Generated {} of {} posts", generated.len(), total);
        if !generated.is_empty() {
            self.learner.rebuild();
        }

        ProcessReport { generated, failed }
    }

    /// Write `<posts>/<slug>/index.md` for one note
    fn generate(
        &self,
        note_path: &Path,
        notes_dir: &Path,
        mapping: &TagMapping,
        as_draft: bool,
    ) -> Result<PathBuf, ProcessError> {
        let note =
            Note::load(note_path)?.ok_or_else(|| ProcessError::MissingHeader(note_path.into()))?;

        let title = note.display_title();
        let slug = post_slug(&title);
        if !is_plain_slug(&slug) {
            return Err(ProcessError::UnusableSlug(title));
        }
        let post_dir = self.publisher.post_dir(&slug);
        fs::create_dir_all(&post_dir)?;

        let doc = DocumentContext::new(note_path, &post_dir).with_extra_root(notes_dir);
        let body = self.pipeline.run(&note.body, &doc);

        let header = post_header(&note.metadata, title, &body, mapping, as_draft);
        let post_file = post_dir.join("index.md");
        let content = header.render(&format!("\n{}", body.trim_start_matches(['\r', '\n'])))?;
        fs::write(&post_file, content)?;

        info!("Created post {:?}", post_file);
        Ok(post_file)
    }
}

/// Header of a generated post
fn post_header(
    note: &Metadata,
    title: String,
    body: &str,
    mapping: &TagMapping,
    as_draft: bool,
) -> Metadata {
    let date = match note.date().trim() {
        "" => chrono::Local::now().format("%Y-%m-%d").to_string(),
        date => date.to_string(),
    };
    let categories = if note.categories.is_empty() {
        categories_for_tags(&note.tags, mapping)
    } else {
        note.categories.clone()
    };

    Metadata {
        title: Some(title),
        date: Some(date),
        draft: as_draft,
        description: Some(note.description().to_string()),
        image: Some(first_local_image(body).unwrap_or_default()),
        tags: note.tags.clone(),
        categories,
        ..Metadata::default()
    }
}

fn is_selected(path: &Path, selection: Option<&[String]>) -> bool {
    let Some(selection) = selection else {
        return true;
    };
    let name = path.file_name().map(|n| n.to_string_lossy());
    let stem = path.file_stem().map(|s| s.to_string_lossy());
    selection
        .iter()
        .any(|wanted| Some(wanted.as_str()) == name.as_deref() || Some(wanted.as_str()) == stem.as_deref())
}
