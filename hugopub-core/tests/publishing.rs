//! End-to-end behavior of the collaborator entry points.

use hugopub_core::frontmatter::{parse, parse_frontmatter};
use hugopub_core::taxonomy::TagMapping;
use hugopub_core::{
    BlogProcessor, Config, Context, DocumentContext, Metadata, Pipeline, PublishManager,
    TagLearner,
};
use parking_lot::Mutex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` and return the warnings it logged on this thread
fn with_warnings<T>(f: impl FnOnce() -> T) -> (T, Vec<String>) {
    let captured = Captured::default();
    let writer = captured.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();

    let out = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&captured.0.lock()).into_owned();
    let warnings = logs
        .lines()
        .filter(|line| line.contains("WARN"))
        .map(str::to_string)
        .collect();
    (out, warnings)
}

struct Site {
    dir: TempDir,
    ctx: Context,
}

impl Site {
    fn new() -> Self {
        Self::with_config(|config| config)
    }

    fn with_config(adjust: impl FnOnce(Config) -> Config) -> Self {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("vault")).unwrap();
        let config = adjust(Config::new(dir.path().join("vault"), dir.path().join("site")));
        let ctx = Context::new(config).unwrap();
        Self { dir, ctx }
    }

    fn vault(&self) -> PathBuf {
        self.dir.path().join("vault")
    }

    fn note(&self, name: &str, content: &str) -> PathBuf {
        let path = self.vault().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn existing_post(&self, slug: &str, tags: &str, categories: &str) {
        let dir = self.ctx.config().posts_dir().join(slug);
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("index.md"),
            format!("---\ntitle: {slug}\ntags: {tags}\ncategories: {categories}\n---\nbody\n"),
        )
        .unwrap();
    }

    fn read_post(&self, slug: &str) -> (Metadata, String) {
        let path = self.ctx.config().posts_dir().join(slug).join("index.md");
        let content = fs::read_to_string(path).unwrap();
        let (meta, body) = parse_frontmatter(&content).unwrap().unwrap();
        (meta, body.to_string())
    }
}

#[test]
fn test_categories_learned_from_earlier_post() {
    let site = Site::new();
    site.existing_post("b", "[a]", "[X]");
    site.note("a.md", "---\ntitle: A\npublish: true\ntags: [a]\n---\nText\n");

    let report = BlogProcessor::new(site.ctx.clone()).process_notes(None, false);
    assert_eq!(report.generated.len(), 1);

    let learner = TagLearner::new(&site.ctx);
    let mapping = learner.try_load().unwrap();
    assert_eq!(mapping.get("a").map(String::as_str), Some("X"));

    let (meta, _) = site.read_post("a");
    assert_eq!(meta.categories, vec!["X"]);
}

#[test]
fn test_collision_picks_first_and_warns() {
    let site = Site::new();
    site.existing_post("p1", "[t]", "[C1]");
    site.existing_post("p2", "[t]", "[C2]");

    let learner = TagLearner::new(&site.ctx);
    let (mapping, warnings) = with_warnings(|| learner.rebuild());

    let expected: TagMapping = [("t".to_string(), "C1".to_string())].into();
    assert_eq!(mapping, expected);
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("C2"));
}

#[test]
fn test_collision_keeps_existing_entry_silently() {
    let site = Site::new();
    site.existing_post("p1", "[t]", "[C1]");
    site.existing_post("p2", "[t]", "[C2]");
    let learner = TagLearner::new(&site.ctx);
    learner
        .persist(&[("t".to_string(), "C2".to_string())].into())
        .unwrap();

    let (mapping, warnings) = with_warnings(|| learner.rebuild());

    assert_eq!(mapping["t"], "C2");
    assert!(warnings.is_empty(), "{warnings:?}");
}

#[test]
fn test_asset_with_space_resolves_to_hyphenated_file() {
    let site = Site::with_config(|config| {
        let images = config.notes_dir().join("images");
        config.with_images(images)
    });
    let images = site.vault().join("images");
    fs::create_dir_all(&images).unwrap();
    fs::write(images.join("My-Photo.png"), b"\x89PNG").unwrap();
    site.note(
        "trip.md",
        "---\ntitle: Trip\npublish: true\n---\nLook: ![[My Photo.png]]\n",
    );

    let report = BlogProcessor::new(site.ctx.clone()).process_notes(None, false);
    assert_eq!(report.failed, 0);

    let post_dir = site.ctx.config().posts_dir().join("trip");
    assert!(post_dir.join("My-Photo.png").is_file());
    let (meta, body) = site.read_post("trip");
    assert!(body.contains("![My Photo.png](My-Photo.png)"), "{body}");
    assert_eq!(meta.image(), "My-Photo.png");
}

#[test]
fn test_unresolved_asset_left_untouched() {
    let site = Site::new();
    site.note(
        "gone.md",
        "---\ntitle: Gone\npublish: true\n---\n![[missing.png]] and ![x](nowhere.jpg)\n",
    );

    BlogProcessor::new(site.ctx.clone()).process_notes(None, false);

    let (_, body) = site.read_post("gone");
    assert_eq!(body, "\n![[missing.png]] and ![x](nowhere.jpg)\n");
}

#[test]
fn test_list_publishable_skips_broken_header() {
    let site = Site::new();
    site.note("good.md", "---\ntitle: Good\npublish: true\n---\nok\n");
    site.note("bad.md", "---\ntitle: \"unterminated\npublish: true\n---\n");

    let publisher = PublishManager::new(&site.ctx);
    let (listed, warnings) = with_warnings(|| publisher.list_publishable(&site.vault(), None));

    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].1.title(), "Good");
    assert_eq!(warnings.len(), 1, "{warnings:?}");
    assert!(warnings[0].contains("bad.md"));
}

#[test]
fn test_remove_generated_post_twice() {
    let site = Site::new();
    site.existing_post("hello-world", "[]", "[]");
    let publisher = PublishManager::new(&site.ctx);

    assert!(publisher.remove_generated_post("hello-world"));
    assert!(!publisher.remove_generated_post("hello-world"));
    assert!(!publisher.remove_generated_post("never-existed"));
}

#[test]
fn test_metadata_round_trip() {
    let content = "---\ntitle: Round Trip\ndate: 2024-01-02\ndraft: false\npublish: true\ndescription:\nimage: cover.png\ntags: solo\ncategories: [A, B]\nseries: notes\nweight: 3\nempty:\n---\nbody\n";
    let (meta, body) = parse(content);
    let meta = meta.unwrap();

    assert_eq!(meta.description(), "");
    assert_eq!(meta.tags, vec!["solo"]);
    assert_eq!(meta.extra["empty"], serde_yaml::Value::String(String::new()));

    let rendered = meta.render(&body).unwrap();
    let (again, again_body) = parse(&rendered);
    assert_eq!(again.unwrap(), meta);
    assert_eq!(again_body, body);
    assert!(!rendered.contains("null"));
}

#[test]
fn test_short_sum_math_stays_inline() {
    let site = Site::new();
    let pipeline = Pipeline::standard(&site.ctx);
    let note = site.vault().join("m.md");
    let post = site.dir.path().join("post");
    let doc = DocumentContext::new(&note, &post);

    assert_eq!(
        pipeline.run("Sum: $$a + b + c + d = e$$", &doc),
        "Sum: $$a + b + c + d = e$$"
    );
}

#[test]
fn test_single_worker_batch_with_assets() {
    let site = Site::with_config(|config| config.with_workers(1));
    for idx in 0..3 {
        let name = format!("pic{idx}.png");
        fs::write(site.vault().join(&name), b"png").unwrap();
        site.note(
            &format!("n{idx}.md"),
            &format!("---\ntitle: Note {idx}\npublish: true\n---\n![[{name}]] ![[{name}]]\n"),
        );
    }

    let report = BlogProcessor::new(site.ctx.clone()).process_notes(None, false);

    assert_eq!(report.generated.len(), 3);
    for idx in 0..3 {
        let dir = site.ctx.config().posts_dir().join(format!("note-{idx}"));
        assert!(dir.join(format!("pic{idx}.png")).is_file());
    }
}

#[test]
fn test_unpublish_keeps_body() {
    let site = Site::new();
    let body = "\nFirst line\n\n```\n---\n```\n";
    let note = site.note("keep.md", &format!("---\ntitle: Keep Me\npublish: true\n---\n{body}"));
    BlogProcessor::new(site.ctx.clone()).process_notes(None, false);
    let publisher = PublishManager::new(&site.ctx);
    assert!(publisher.is_generated("keep-me"));

    let outcome = publisher.unpublish(&note);

    assert!(outcome.flag_cleared && outcome.post_removed);
    let content = fs::read_to_string(&note).unwrap();
    let (meta, rest) = parse_frontmatter(&content).unwrap().unwrap();
    assert!(!meta.publish);
    assert_eq!(rest, body);
    assert!(!Path::new(&site.ctx.config().posts_dir().join("keep-me")).exists());
}
