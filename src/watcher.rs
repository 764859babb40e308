//! Watch orchestrator
//!
//! One `notify` watcher per transcript root feeds changed paths into a
//! channel. Each root has a dispatcher task that hands paths to a bounded
//! pool of blocking workers. A path is processed by at most one worker at a
//! time; an event that arrives while its file is in flight is dropped, since
//! the persisted cursor (or content hash) lets the next event pick up
//! whatever it missed.
//!
//! Startup backfill for a root completes before its dispatcher starts, so a
//! live event never races the backfill over the same bytes. Events seen
//! during backfill wait in the channel.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use dashmap::DashSet;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

use crate::error::{IngestError, IngestResult};
use crate::identity::{self, ProjectPrefix};
use crate::parser::{cursor, ClaudeReader, CursorChangeTracker, ParsedMessage, Vendor};
use crate::pending;
use crate::store::ActivityStore;
use crate::timestamps;

/// A directory of per-project transcript folders for one vendor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchRoot {
    pub vendor: Vendor,
    /// `<vendor base>/projects`
    pub projects_dir: PathBuf,
}

impl WatchRoot {
    pub fn new(vendor: Vendor, projects_dir: impl Into<PathBuf>) -> Self {
        Self {
            vendor,
            projects_dir: projects_dir.into(),
        }
    }

    /// Whether `path` is a transcript this root is responsible for
    pub fn owns(&self, path: &Path) -> bool {
        path.starts_with(&self.projects_dir) && self.vendor.is_transcript(path)
    }

    /// Existing transcripts in discovery order
    pub fn discover(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.projects_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| self.vendor.is_transcript(p))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Size of each root's worker pool
    pub workers_per_root: usize,
    /// How long shutdown waits for in-flight files
    pub shutdown_timeout: Duration,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            workers_per_root: 4,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

/// What one processing pass did with a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Another worker holds the file
    Busy,
    /// The file disappeared before it could be read
    Missing,
    /// Nothing new since the last pass
    Unchanged,
    Ingested { parsed: usize, inserted: usize },
}

/// Removes its path from the in-flight set when dropped
struct InFlight<'a> {
    set: &'a DashSet<PathBuf>,
    path: PathBuf,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.path);
    }
}

pub struct Orchestrator {
    store: Arc<ActivityStore>,
    roots: Vec<WatchRoot>,
    prefix: ProjectPrefix,
    cursor_hashes: CursorChangeTracker,
    in_flight: DashSet<PathBuf>,
    options: WatchOptions,
}

impl Orchestrator {
    pub fn new(store: Arc<ActivityStore>, roots: Vec<WatchRoot>, options: WatchOptions) -> Self {
        let prefix = roots
            .iter()
            .find(|r| r.vendor == Vendor::ClaudeCode)
            .map(|r| ProjectPrefix::new(&r.projects_dir))
            .unwrap_or_else(ProjectPrefix::empty);
        Self {
            store,
            roots,
            prefix,
            cursor_hashes: CursorChangeTracker::new(),
            in_flight: DashSet::new(),
            options,
        }
    }

    fn claim(&self, path: &Path) -> Option<InFlight<'_>> {
        let path = path.to_path_buf();
        if self.in_flight.insert(path.clone()) {
            Some(InFlight {
                set: &self.in_flight,
                path,
            })
        } else {
            None
        }
    }

    /// Process one transcript. Safe to call repeatedly; only new content is stored.
    pub fn process_file(&self, root: &WatchRoot, path: &Path) -> IngestResult<FileOutcome> {
        let Some(_guard) = self.claim(path) else {
            return Ok(FileOutcome::Busy);
        };
        match root.vendor {
            Vendor::ClaudeCode => self.ingest_claude(root, path),
            Vendor::Cursor => self.ingest_cursor(root, path),
        }
    }

    /// Process one transcript and log the outcome. Errors never escape.
    pub fn handle(&self, root: &WatchRoot, path: &Path) {
        match self.process_file(root, path) {
            Ok(FileOutcome::Ingested { inserted, .. }) if inserted > 0 => {
                info!(
                    "Processed {} new messages from {}",
                    inserted,
                    path.file_name().unwrap_or_default().to_string_lossy()
                );
            }
            Ok(outcome) => debug!("{}: {:?}", path.display(), outcome),
            Err(e @ IngestError::UnresolvedIdentity(_)) => warn!("{}, deferring", e),
            Err(e) => error!("Failed to ingest {}: {:#}", path.display(), e),
        }
    }

    /// Process every existing transcript under a root. Returns the file count.
    pub fn backfill(&self, root: &WatchRoot) -> usize {
        let files = root.discover();
        info!(
            "Backfilling {} {} transcripts under {}",
            files.len(),
            root.vendor.as_str(),
            root.projects_dir.display()
        );
        for path in &files {
            self.handle(root, path);
        }
        files.len()
    }

    /// Backfill every root whose directory exists.
    pub fn scan(&self) -> usize {
        self.roots
            .iter()
            .filter(|root| root.projects_dir.is_dir())
            .map(|root| self.backfill(root))
            .sum()
    }

    fn ingest_claude(&self, root: &WatchRoot, path: &Path) -> IngestResult<FileOutcome> {
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(FileOutcome::Missing),
            Err(e) => return Err(IngestError::io(path, e)),
        };
        let len = metadata.len();
        let mtime = modified_utc(&metadata);

        let mut offset = self.store.get_cursor(path)?;
        if offset > len {
            info!(
                "{} is shorter than its cursor ({} < {}), rereading from the start",
                path.display(),
                len,
                offset
            );
            offset = 0;
        }
        if offset == len {
            return Ok(FileOutcome::Unchanged);
        }

        let mut reader = ClaudeReader::open(path, offset).map_err(|e| IngestError::io(path, e))?;
        let mut batch = Vec::new();
        for item in reader.by_ref() {
            let (message, _end) = item.map_err(|e| IngestError::io(path, e))?;
            batch.push(message);
        }
        let end = reader.position();
        if end == offset {
            return Ok(FileOutcome::Unchanged);
        }
        if batch.is_empty() {
            self.store.set_cursor(path, end, mtime)?;
            return Ok(FileOutcome::Ingested {
                parsed: 0,
                inserted: 0,
            });
        }

        let session = self.resolve_session(root, path, &batch)?;
        let stored = self.store.insert_batch(session, &batch)?;
        // recomputed even when every message was a duplicate, so a pass that
        // failed after storing its batch still leaves pending state right
        if batch.iter().any(ParsedMessage::is_conversational) {
            let events = self.store.raw_events(session)?;
            let pending = pending::detect(&events);
            self.store.set_pending_interaction(session, pending.as_ref())?;
        }
        // only after everything above is durable
        self.store.set_cursor(path, end, mtime)?;

        Ok(FileOutcome::Ingested {
            parsed: batch.len(),
            inserted: stored.inserted,
        })
    }

    fn ingest_cursor(&self, root: &WatchRoot, path: &Path) -> IngestResult<FileOutcome> {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(FileOutcome::Missing),
            Err(e) => return Err(IngestError::io(path, e)),
        };
        let hash = cursor::content_hash(&bytes);
        if self.cursor_hashes.is_unchanged(path, &hash) {
            return Ok(FileOutcome::Unchanged);
        }

        let mtime = fs::metadata(path)
            .ok()
            .and_then(|m| modified_utc(&m))
            .unwrap_or_else(timestamps::utc_now);
        let text = String::from_utf8_lossy(&bytes);
        let batch = cursor::parse_file(path, &text, mtime);

        let inserted = if batch.is_empty() {
            0
        } else {
            let session = self.resolve_session(root, path, &batch)?;
            self.store.insert_batch(session, &batch)?.inserted
        };
        self.cursor_hashes.record(path, hash);

        Ok(FileOutcome::Ingested {
            parsed: batch.len(),
            inserted,
        })
    }

    /// Find or create the session a transcript belongs to.
    ///
    /// A known session keeps its project. Otherwise the project path is a
    /// `cwd` recorded in the batch, falling back to the decoded directory name.
    fn resolve_session(
        &self,
        root: &WatchRoot,
        path: &Path,
        batch: &[ParsedMessage],
    ) -> IngestResult<i64> {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| IngestError::UnresolvedIdentity(path.to_path_buf()))?;
        let session_key = root.vendor.session_id(&stem);

        let project_id = match self.store.get_session(&session_key)? {
            Some(existing) => existing.project_id,
            None => {
                let project_path = batch
                    .iter()
                    .find_map(|m| m.cwd.clone())
                    .or_else(|| {
                        identity::encoded_project_dir(&root.projects_dir, path)
                            .and_then(|dir| identity::decode_path(&dir, root.vendor))
                    })
                    .ok_or_else(|| IngestError::UnresolvedIdentity(path.to_path_buf()))?;
                let info = identity::project_info(&project_path, root.vendor, &self.prefix);
                self.store.get_or_create_project(&project_path, &info)?
            }
        };

        let branch = batch.iter().find_map(|m| m.git_branch.as_deref());
        let session =
            self.store
                .get_or_create_session(&session_key, project_id, root.vendor, branch)?;
        Ok(session)
    }

    /// Backfill, then watch every root until `shutdown` turns true.
    ///
    /// On shutdown the OS watchers are dropped first, then each dispatcher
    /// waits up to the configured timeout for its in-flight files.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut watchers = Vec::new();
        let mut dispatchers = Vec::new();

        for index in 0..self.roots.len() {
            let root = &self.roots[index];
            if !root.projects_dir.is_dir() {
                warn!(
                    "{} transcript directory {} does not exist, skipping",
                    root.vendor.as_str(),
                    root.projects_dir.display()
                );
                continue;
            }

            let (tx, rx) = mpsc::unbounded_channel();
            watchers.push(start_watcher(root, tx)?);

            let this = Arc::clone(&self);
            tokio::task::spawn_blocking(move || this.backfill(&this.roots[index]))
                .await
                .context("backfill task failed")?;

            dispatchers.push(tokio::spawn(Arc::clone(&self).dispatch(
                index,
                rx,
                shutdown.clone(),
            )));
        }

        if dispatchers.is_empty() {
            warn!("No transcript directories to watch");
        }

        while !*shutdown.borrow() {
            if shutdown.changed().await.is_err() {
                break;
            }
        }

        info!("Stopping watchers");
        drop(watchers);
        for handle in dispatchers {
            if let Err(e) = handle.await {
                error!("Dispatcher task failed: {}", e);
            }
        }
        info!("Watch stopped");
        Ok(())
    }

    /// Feed paths for one root to a bounded pool of blocking workers until
    /// the channel closes or shutdown is signalled.
    pub async fn dispatch(
        self: Arc<Self>,
        index: usize,
        mut rx: mpsc::UnboundedReceiver<PathBuf>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let permits = Arc::new(Semaphore::new(self.options.workers_per_root.max(1)));
        let mut jobs = JoinSet::new();

        loop {
            tokio::select! {
                received = rx.recv() => {
                    let Some(path) = received else { break };
                    let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                        break;
                    };
                    let this = Arc::clone(&self);
                    jobs.spawn_blocking(move || {
                        let _permit = permit;
                        this.handle(&this.roots[index], &path);
                    });
                }
                Some(joined) = jobs.join_next(), if !jobs.is_empty() => {
                    if let Err(e) = joined {
                        error!("Worker task failed: {}", e);
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let drain = async {
            while let Some(joined) = jobs.join_next().await {
                if let Err(e) = joined {
                    error!("Worker task failed: {}", e);
                }
            }
        };
        if tokio::time::timeout(self.options.shutdown_timeout, drain)
            .await
            .is_err()
        {
            warn!(
                "In-flight files under {} still running after {:?}",
                self.roots[index].projects_dir.display(),
                self.options.shutdown_timeout
            );
        }
    }
}

fn modified_utc(metadata: &fs::Metadata) -> Option<NaiveDateTime> {
    metadata
        .modified()
        .ok()
        .map(|t| timestamps::to_utc(&DateTime::<Utc>::from(t)))
}

/// Start an OS watcher for one root; matching create/modify paths go to `tx`.
/// The returned handle must be kept alive.
fn start_watcher(root: &WatchRoot, tx: mpsc::UnboundedSender<PathBuf>) -> Result<RecommendedWatcher> {
    let owner = root.clone();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                return;
            }
            for path in event.paths {
                if owner.owns(&path) {
                    debug!("File change detected: {}", path.display());
                    let _ = tx.send(path);
                }
            }
        }
        Err(e) => error!("Watcher error: {}", e),
    })
    .context("Failed to create file watcher")?;

    watcher
        .watch(&root.projects_dir, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", root.projects_dir.display()))?;
    info!(
        "Watching {} transcripts under {}",
        root.vendor.as_str(),
        root.projects_dir.display()
    );
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn claude_line(uuid: &str, role: &str, text: &str, ts: &str) -> String {
        format!(
            "{{\"type\":\"{role}\",\"uuid\":\"{uuid}\",\"timestamp\":\"{ts}\",\"cwd\":\"/Users/foo/code/repo\",\"message\":{{\"role\":\"{role}\",\"content\":\"{text}\"}}}}\n"
        )
    }

    fn tool_use_line(uuid: &str, id: &str, ts: &str) -> String {
        format!(
            "{{\"type\":\"assistant\",\"uuid\":\"{uuid}\",\"timestamp\":\"{ts}\",\"cwd\":\"/Users/foo/code/repo\",\"message\":{{\"role\":\"assistant\",\"content\":[{{\"type\":\"tool_use\",\"id\":\"{id}\",\"name\":\"Bash\",\"input\":{{}}}}]}}}}\n"
        )
    }

    fn append(path: &Path, text: &str) {
        let mut file = fs::OpenOptions::new().create(true).append(true).open(path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
    }

    /// Orchestrator over a file-backed store, plus a second connection to
    /// the same database for installing failure triggers.
    fn setup_on_disk() -> (tempfile::TempDir, Orchestrator, WatchRoot, rusqlite::Connection) {
        let tmp = tempfile::tempdir().unwrap();
        let projects = tmp.path().join("claude/projects");
        fs::create_dir_all(projects.join("-Users-foo-code-repo")).unwrap();
        let db = tmp.path().join("activity.db");
        let store = Arc::new(ActivityStore::open(&db).unwrap());
        let side = rusqlite::Connection::open(&db).unwrap();
        let root = WatchRoot::new(Vendor::ClaudeCode, &projects);
        let orchestrator = Orchestrator::new(store, vec![root.clone()], WatchOptions::default());
        (tmp, orchestrator, root, side)
    }

    fn setup() -> (tempfile::TempDir, Arc<Orchestrator>, WatchRoot) {
        let tmp = tempfile::tempdir().unwrap();
        let projects = tmp.path().join("claude/projects");
        fs::create_dir_all(projects.join("-Users-foo-code-repo")).unwrap();
        let root = WatchRoot::new(Vendor::ClaudeCode, &projects);
        let store = Arc::new(ActivityStore::open_in_memory().unwrap());
        let orchestrator = Arc::new(Orchestrator::new(
            store,
            vec![root.clone()],
            WatchOptions::default(),
        ));
        (tmp, orchestrator, root)
    }

    #[test]
    fn test_busy_path_is_dropped() {
        let (_tmp, orchestrator, root) = setup();
        let path = root.projects_dir.join("-Users-foo-code-repo/s.jsonl");
        fs::write(&path, claude_line("m1", "user", "hi", "2024-01-15T10:00:00Z")).unwrap();

        let guard = orchestrator.claim(&path).unwrap();
        assert_eq!(orchestrator.process_file(&root, &path).unwrap(), FileOutcome::Busy);
        drop(guard);
        assert!(matches!(
            orchestrator.process_file(&root, &path).unwrap(),
            FileOutcome::Ingested { inserted: 1, .. }
        ));
        assert!(orchestrator.in_flight.is_empty());
    }

    #[test]
    fn test_missing_file() {
        let (_tmp, orchestrator, root) = setup();
        let path = root.projects_dir.join("-Users-foo-code-repo/gone.jsonl");
        assert_eq!(orchestrator.process_file(&root, &path).unwrap(), FileOutcome::Missing);
    }

    #[test]
    fn test_system_messages_do_not_move_timing() {
        let (_tmp, orchestrator, root) = setup();
        let path = root.projects_dir.join("-Users-foo-code-repo/s.jsonl");
        let mut content = claude_line("m1", "user", "hi", "2024-01-15T10:00:00Z");
        content.push_str(
            "{\"type\":\"system\",\"uuid\":\"sys\",\"content\":\"boot\",\"timestamp\":\"2024-01-15T23:00:00Z\"}\n",
        );
        content.push_str(&claude_line("m2", "assistant", "hello", "2024-01-15T10:05:00Z"));
        fs::write(&path, content).unwrap();

        let outcome = orchestrator.process_file(&root, &path).unwrap();
        assert_eq!(outcome, FileOutcome::Ingested { parsed: 3, inserted: 3 });
        let session = orchestrator.store.get_session("s").unwrap().unwrap();
        assert_eq!(session.message_count, 2);
        assert_eq!(session.ended_at, timestamps::parse_str("2024-01-15T10:05:00Z"));
        assert_eq!(session.started_at, timestamps::parse_str("2024-01-15T10:00:00Z"));
    }

    #[test]
    fn test_shrunk_file_rereads_from_start() {
        let (_tmp, orchestrator, root) = setup();
        let path = root.projects_dir.join("-Users-foo-code-repo/s.jsonl");
        fs::write(&path, claude_line("m1", "user", "hi", "2024-01-15T10:00:00Z")).unwrap();
        orchestrator.store.set_cursor(&path, 10_000, None).unwrap();

        let outcome = orchestrator.process_file(&root, &path).unwrap();
        assert_eq!(outcome, FileOutcome::Ingested { parsed: 1, inserted: 1 });
        assert_eq!(
            orchestrator.store.get_cursor(&path).unwrap(),
            fs::metadata(&path).unwrap().len()
        );
    }

    #[test]
    fn test_unresolved_identity_leaves_cursor() {
        let tmp = tempfile::tempdir().unwrap();
        let projects = tmp.path().join("projects");
        // no leading dash and no cwd: nothing to derive a path from
        fs::create_dir_all(projects.join("bare")).unwrap();
        let root = WatchRoot::new(Vendor::ClaudeCode, &projects);
        let store = Arc::new(ActivityStore::open_in_memory().unwrap());
        let orchestrator = Orchestrator::new(store, vec![root.clone()], WatchOptions::default());

        let path = projects.join("bare/s.jsonl");
        fs::write(&path, "{\"type\":\"user\",\"uuid\":\"u\",\"content\":\"hi\"}\n").unwrap();
        let err = orchestrator.process_file(&root, &path).unwrap_err();
        assert!(matches!(err, IngestError::UnresolvedIdentity(_)));
        assert_eq!(orchestrator.store.get_cursor(&path).unwrap(), 0);
    }

    #[test]
    fn test_failed_batch_is_counted_on_retry() {
        let (_tmp, orchestrator, root, side) = setup_on_disk();
        let path = root.projects_dir.join("-Users-foo-code-repo/s.jsonl");
        append(&path, &claude_line("m1", "user", "one", "2024-01-15T10:00:00Z"));
        append(&path, &claude_line("m2", "assistant", "two", "2024-01-15T10:01:00Z"));
        append(&path, &claude_line("m3", "user", "three", "2024-01-15T10:02:00Z"));

        side.execute_batch(
            "CREATE TRIGGER reject_m3 BEFORE INSERT ON messages WHEN NEW.uuid = 'm3'
             BEGIN SELECT RAISE(ABORT, 'boom'); END;",
        )
        .unwrap();
        let err = orchestrator.process_file(&root, &path).unwrap_err();
        assert!(matches!(err, IngestError::Store(_)));
        assert_eq!(orchestrator.store.get_cursor(&path).unwrap(), 0);

        side.execute_batch("DROP TRIGGER reject_m3;").unwrap();
        assert_eq!(
            orchestrator.process_file(&root, &path).unwrap(),
            FileOutcome::Ingested { parsed: 3, inserted: 3 }
        );
        let session = orchestrator.store.get_session("s").unwrap().unwrap();
        assert_eq!(session.message_count, 3);
        assert_eq!(session.started_at, timestamps::parse_str("2024-01-15T10:00:00Z"));
        assert_eq!(session.ended_at, timestamps::parse_str("2024-01-15T10:02:00Z"));
    }

    #[test]
    fn test_pending_recomputed_after_failed_update() {
        let (_tmp, orchestrator, root, side) = setup_on_disk();
        let path = root.projects_dir.join("-Users-foo-code-repo/s.jsonl");
        append(&path, &claude_line("m1", "user", "run it", "2024-01-15T10:00:00Z"));
        append(&path, &tool_use_line("m2", "T1", "2024-01-15T10:00:05Z"));

        side.execute_batch(
            "CREATE TRIGGER reject_pending BEFORE UPDATE OF pending_question ON sessions
             BEGIN SELECT RAISE(ABORT, 'boom'); END;",
        )
        .unwrap();
        assert!(orchestrator.process_file(&root, &path).is_err());
        let session = orchestrator.store.get_session("s").unwrap().unwrap();
        assert_eq!(session.message_count, 2);
        assert!(session.pending.is_none());

        side.execute_batch("DROP TRIGGER reject_pending;").unwrap();
        assert_eq!(
            orchestrator.process_file(&root, &path).unwrap(),
            FileOutcome::Ingested { parsed: 2, inserted: 0 }
        );
        let session = orchestrator.store.get_session("s").unwrap().unwrap();
        assert_eq!(session.message_count, 2);
        assert_eq!(session.pending.unwrap().tool_use_id.as_deref(), Some("T1"));
        assert_eq!(
            orchestrator.store.get_cursor(&path).unwrap(),
            fs::metadata(&path).unwrap().len()
        );
    }

    #[test]
    fn test_discover_and_ownership() {
        let (_tmp, _orchestrator, root) = setup();
        let dir = root.projects_dir.join("-Users-foo-code-repo");
        fs::write(dir.join("b.jsonl"), "").unwrap();
        fs::write(dir.join("a.jsonl"), "").unwrap();
        fs::write(dir.join("notes.txt"), "").unwrap();
        let found = root.discover();
        assert_eq!(found, vec![dir.join("a.jsonl"), dir.join("b.jsonl")]);
        assert!(root.owns(&dir.join("a.jsonl")));
        assert!(!root.owns(&dir.join("notes.txt")));
        assert!(!root.owns(Path::new("/elsewhere/x.jsonl")));
    }

    #[tokio::test]
    async fn test_dispatch_processes_queued_paths() {
        let (_tmp, orchestrator, root) = setup();
        let dir = root.projects_dir.join("-Users-foo-code-repo");
        let first = dir.join("one.jsonl");
        let second = dir.join("two.jsonl");
        fs::write(&first, claude_line("a1", "user", "hi", "2024-01-15T10:00:00Z")).unwrap();
        let mut file = fs::File::create(&second).unwrap();
        file.write_all(claude_line("b1", "user", "yo", "2024-01-15T11:00:00Z").as_bytes())
            .unwrap();

        let (tx, rx) = mpsc::unbounded_channel();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        tx.send(first.clone()).unwrap();
        tx.send(second.clone()).unwrap();
        tx.send(first.clone()).unwrap();
        drop(tx);

        Arc::clone(&orchestrator).dispatch(0, rx, shutdown_rx).await;

        let stats = orchestrator.store.stats(None).unwrap();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.total_messages, 2);
        assert_eq!(stats.total_projects, 1);
    }

    async fn message_count(orchestrator: &Orchestrator, session: &str, want: i64) -> i64 {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        loop {
            let count = orchestrator
                .store
                .get_session(session)
                .unwrap()
                .map_or(0, |s| s.message_count);
            if count >= want || tokio::time::Instant::now() >= deadline {
                return count;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_backfills_follows_appends_and_stops() {
        let tmp = tempfile::tempdir().unwrap();
        // watchers report resolved paths on some platforms
        let projects = tmp.path().canonicalize().unwrap().join("claude/projects");
        fs::create_dir_all(projects.join("-Users-foo-code-repo")).unwrap();
        let path = projects.join("-Users-foo-code-repo/live.jsonl");
        append(&path, &claude_line("m1", "user", "before start", "2024-01-15T10:00:00Z"));

        let root = WatchRoot::new(Vendor::ClaudeCode, &projects);
        let store = Arc::new(ActivityStore::open_in_memory().unwrap());
        let options = WatchOptions {
            workers_per_root: 2,
            shutdown_timeout: Duration::from_secs(2),
        };
        let orchestrator = Arc::new(Orchestrator::new(store, vec![root], options));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let runner = tokio::spawn(Arc::clone(&orchestrator).run(shutdown_rx));

        assert_eq!(message_count(&orchestrator, "live", 1).await, 1);

        append(&path, &claude_line("m2", "assistant", "while watching", "2024-01-15T10:01:00Z"));
        assert_eq!(message_count(&orchestrator, "live", 2).await, 2);

        shutdown_tx.send(true).unwrap();
        let finished = tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .expect("run did not stop after shutdown");
        finished.unwrap().unwrap();

        let session = orchestrator.store.get_session("live").unwrap().unwrap();
        assert_eq!(session.message_count, 2);
        assert_eq!(session.ended_at, timestamps::parse_str("2024-01-15T10:01:00Z"));
    }
}
