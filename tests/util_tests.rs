use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use nestbox::archive::{Archiver, EntryInfo, PathExclusion, TrashBox};
use nestbox::utils::nestbox_toml::{apply_file_to_opts, load_nestbox_toml};
use nestbox::utils::tempfiles::SESSION_OWNER_FILE;
use nestbox::utils::{
    ExcludeFilter, create_session_temp_dir, glob_match, remove_stale_temp_dirs,
    remove_temp_dirs_older_than,
};
use nestbox::{CollectOpts, Error, Opts};
use tokio_util::sync::CancellationToken;

// --- glob_match ---

#[test]
fn test_glob_match_literal() {
    assert!(glob_match("__MACOSX", "__MACOSX"));
    assert!(!glob_match("__MACOSX", "__MACOSX2"));
    assert!(!glob_match("Thumbs.db", "thumbs.db"));
}

#[test]
fn test_glob_match_wildcards() {
    assert!(glob_match("*.txt", "notes.txt"));
    assert!(!glob_match("*.txt", "notes.txt.bak"));
    assert!(glob_match(".*", ".hidden"));
    assert!(glob_match("p??.jpg", "p01.jpg"));
    assert!(!glob_match("p??.jpg", "p1.jpg"));
    assert!(glob_match("a*b*c", "axxbyyc"));
    assert!(!glob_match("a*b*c", "axxbyy"));
    assert!(glob_match("*", ""));
    assert!(!glob_match("?", ""));
}

// --- ExcludeFilter ---

#[test]
fn test_exclude_filter_matches_any_segment() {
    let filter = ExcludeFilter::new(&["__MACOSX", "*.db"]);
    assert!(filter.is_excluded_path("__MACOSX"));
    assert!(filter.is_excluded_path("__MACOSX/p01.jpg"));
    assert!(filter.is_excluded_path("vol1/__MACOSX/p01.jpg"));
    assert!(filter.is_excluded_path("vol1/Thumbs.db"));
    assert!(!filter.is_excluded_path("vol1/p01.jpg"));
    assert!(!filter.is_excluded_path("not__MACOSX/p01.jpg"));
}

#[test]
fn test_exclude_filter_resource_forks() {
    let filter = ExcludeFilter::new::<&str>(&[]);
    assert!(filter.is_excluded_path("pages/._p01.jpg"));
    assert!(!filter.is_excluded_path("pages/p01.jpg"));
    assert!(filter.patterns().is_empty());
}

// --- TrashBox ---

#[derive(Debug)]
struct RecordingArchiver {
    path: PathBuf,
    log: Arc<Mutex<Vec<String>>>,
    disposed: AtomicBool,
}

impl RecordingArchiver {
    fn new(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Arc<dyn Archiver> {
        Arc::new(Self {
            path: PathBuf::from(name),
            log: Arc::clone(log),
            disposed: AtomicBool::new(false),
        })
    }
}

impl Archiver for RecordingArchiver {
    fn system_path(&self) -> &Path {
        &self.path
    }

    fn source_path(&self) -> &Path {
        &self.path
    }

    fn is_file_system(&self) -> bool {
        false
    }

    fn is_supported(&self) -> bool {
        true
    }

    fn read_entries(&self, _token: &CancellationToken) -> nestbox::Result<Vec<EntryInfo>> {
        Ok(Vec::new())
    }

    fn extract_to_file(&self, entry_name: &str, _dest: &Path) -> nestbox::Result<()> {
        Err(Error::not_found(entry_name))
    }

    fn open_entry(&self, entry_name: &str) -> nestbox::Result<Box<dyn Read + Send>> {
        Err(Error::not_found(entry_name))
    }

    fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::SeqCst) {
            self.log.lock().unwrap().push(self.path.display().to_string());
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

#[test]
fn test_trash_box_disposes_in_reverse_order_once() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut trash = TrashBox::new();
    trash.add_archiver(RecordingArchiver::new("first", &log));
    trash.add_archiver(RecordingArchiver::new("second", &log));
    trash.add_archiver(RecordingArchiver::new("third", &log));
    assert_eq!(trash.len(), 3);

    trash.clean_up();
    trash.clean_up();
    assert!(trash.is_empty());
    assert_eq!(*log.lock().unwrap(), ["third", "second", "first"]);
}

#[test]
fn test_trash_box_removes_temp_files_and_cleans_on_drop() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(Mutex::new(Vec::new()));
    let temp = tempfile::NamedTempFile::new_in(dir.path())
        .unwrap()
        .into_temp_path();
    let temp_path = temp.to_path_buf();
    {
        let mut trash = TrashBox::new();
        trash.add_temp_file(temp);
        trash.add_archiver(RecordingArchiver::new("archiver", &log));
        assert!(temp_path.exists());
    }
    assert!(!temp_path.exists());
    assert_eq!(*log.lock().unwrap(), ["archiver"]);
}

#[test]
fn test_trash_box_absorb_keeps_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut outer = TrashBox::new();
    outer.add_archiver(RecordingArchiver::new("a", &log));
    let mut inner = TrashBox::new();
    inner.add_archiver(RecordingArchiver::new("b", &log));
    outer.absorb(inner);
    assert_eq!(outer.len(), 2);
    drop(outer);
    assert_eq!(*log.lock().unwrap(), ["b", "a"]);
}

// --- config file ---

#[test]
fn test_load_nestbox_toml_missing_is_none() {
    let dir = tempfile::tempdir().unwrap();
    assert!(load_nestbox_toml(&dir.path().join(".nestbox.toml")).unwrap().is_none());
}

#[test]
fn test_load_nestbox_toml_applies_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".nestbox.toml");
    std::fs::write(
        &path,
        r#"
[jobs]
workers = 3

[traversal]
recursive = true
max_depth = 4
exclude = ["__MACOSX", "*.txt"]
archive_extensions = ["zip"]

[settings]
json = true
temp_dir = "/var/tmp/nb"
"#,
    )
    .unwrap();

    let file = load_nestbox_toml(&path).unwrap().unwrap();
    let mut opts = Opts::default();
    apply_file_to_opts(&file, &mut opts);

    assert_eq!(opts.workers, 3);
    assert!(opts.collect.recursive);
    assert_eq!(opts.collect.max_depth, 4);
    // Untouched fields keep their defaults.
    assert_eq!(opts.collect.max_fan_out, CollectOpts::default().max_fan_out);
    assert!(opts.collect.auto_single_archive);
    assert_eq!(opts.exclude, ["__MACOSX", "*.txt"]);
    assert_eq!(opts.archive_extensions, ["zip"]);
    assert!(opts.json);
    assert!(!opts.verbose);
    assert_eq!(opts.temp_dir, Some(PathBuf::from("/var/tmp/nb")));
}

#[test]
fn test_load_nestbox_toml_rejects_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(".nestbox.toml");
    std::fs::write(&path, "[traversal]\nmax_depth = \"deep\"\n").unwrap();
    match load_nestbox_toml(&path) {
        Err(Error::Config { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected config error, got {other:?}"),
    }

    std::fs::write(&path, "[traversal]\nunknown_key = 1\n").unwrap();
    assert!(load_nestbox_toml(&path).is_err());
}

// --- defaults ---

#[test]
fn test_default_opts() {
    let opts = Opts::default();
    assert_eq!(opts.workers, 2);
    assert!(!opts.collect.recursive);
    assert!(opts.collect.auto_single_archive);
    assert!(!opts.collect.all_entries);
    assert!(opts.exclude.iter().any(|p| p == "__MACOSX"));
    assert!(opts.archive_extensions.iter().any(|e| e == "cbz"));
    assert!(opts.image_extensions.iter().any(|e| e == "jpg"));
}

// --- temp dirs ---

#[test]
fn test_session_temp_dir_lifecycle() {
    let parent = tempfile::tempdir().unwrap();
    let session = create_session_temp_dir(Some(parent.path())).unwrap();
    let session_path = session.path().to_path_buf();
    assert!(session_path.is_dir());
    assert!(
        session_path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("nestbox-")
    );
    // Fresh directories are not stale.
    assert_eq!(remove_stale_temp_dirs(Some(parent.path())), 0);
    assert!(session_path.is_dir());
    drop(session);
    assert!(!session_path.exists());
}

#[test]
fn test_sweep_keeps_sessions_of_running_processes() {
    let parent = tempfile::tempdir().unwrap();
    let live = create_session_temp_dir(Some(parent.path())).unwrap();
    assert!(live.path().join(SESSION_OWNER_FILE).is_file());

    let orphan = parent.path().join("nestbox-orphan");
    fs::create_dir(&orphan).unwrap();
    fs::write(orphan.join(SESSION_OWNER_FILE), u32::MAX.to_string()).unwrap();
    let unowned = parent.path().join("nestbox-unowned");
    fs::create_dir(&unowned).unwrap();
    let stray = parent.path().join("nestbox-stray.zip");
    fs::write(&stray, b"x").unwrap();
    let other = parent.path().join("unrelated");
    fs::create_dir(&other).unwrap();

    // Everything counts as old; only ownership saves a directory.
    assert_eq!(remove_temp_dirs_older_than(Some(parent.path()), Duration::ZERO), 3);
    assert!(live.path().is_dir());
    assert!(!orphan.exists());
    assert!(!unowned.exists());
    assert!(!stray.exists());
    assert!(other.is_dir());
}
