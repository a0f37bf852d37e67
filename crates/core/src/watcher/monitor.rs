//! Directory monitoring.
//!
//! OS notifications arrive on notify's own thread. The callback only
//! filters the event and hands the path to an unbounded channel; a task on
//! the tokio runtime drains the channel and runs arrival handling, so the
//! handler never executes on the notification thread.

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Instant, SystemTime};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::types::{
    EventStatus, FileArrivalHandler, WatchDirectory, WatchDirectoryStatus, WatcherError,
    WatcherEvent, WatcherEventKind, WatcherSettings,
};
use crate::metrics;
use crate::pipeline::PipelineOutcome;

/// Events kept in memory; older ones are dropped.
pub const MAX_EVENT_LOG: usize = 500;

/// Called for every logged watcher event.
pub type EventListener = Arc<dyn Fn(&WatcherEvent) + Send + Sync>;

/// A path reported by a monitor, keyed by the watch root that saw it.
#[derive(Debug)]
struct Arrival {
    root: PathBuf,
    path: PathBuf,
}

#[derive(Default)]
struct Registry {
    running: bool,
    directories: BTreeMap<PathBuf, WatchDirectory>,
    monitors: HashMap<PathBuf, RecommendedWatcher>,
    sender: Option<mpsc::UnboundedSender<Arrival>>,
    /// Events raised under the lock, published once it is released.
    pending: Vec<WatcherEvent>,
}

impl Registry {
    fn record(
        &mut self,
        kind: WatcherEventKind,
        path: &Path,
        status: EventStatus,
        message: impl Into<String>,
    ) {
        self.pending
            .push(WatcherEvent::now(kind, path, status, message));
    }
}

struct Inner {
    handler: Arc<dyn FileArrivalHandler>,
    settings: WatcherSettings,
    available: bool,
    registry: Mutex<Registry>,
    events: Mutex<VecDeque<WatcherEvent>>,
    in_flight: Mutex<HashSet<PathBuf>>,
    processed: Mutex<HashSet<(PathBuf, Option<SystemTime>)>>,
    listener: Mutex<Option<EventListener>>,
}

/// Watches directories for new video files and hands each one to a
/// [`FileArrivalHandler`].
///
/// Availability of the OS watch backend is probed once, at construction.
/// Directories can be registered while the backend is unavailable; only
/// [`DirectoryWatcher::start`] requires it.
#[derive(Clone)]
pub struct DirectoryWatcher {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn probe_backend() -> bool {
    match notify::recommended_watcher(|_: notify::Result<Event>| {}) {
        Ok(_) => true,
        Err(e) => {
            warn!(error = %e, "File system notifications unavailable");
            false
        }
    }
}

fn resolve(path: &Path) -> Result<PathBuf, WatcherError> {
    std::path::absolute(path).map_err(|source| WatcherError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Paths that became present in a watched tree: creations and the target
/// side of renames.
fn arrival_paths(event: Event) -> Vec<PathBuf> {
    match event.kind {
        EventKind::Create(_) | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths,
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            event.paths.into_iter().last().into_iter().collect()
        }
        _ => Vec::new(),
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl DirectoryWatcher {
    pub fn new(handler: Arc<dyn FileArrivalHandler>, settings: WatcherSettings) -> Self {
        Self::with_availability(handler, settings, probe_backend())
    }

    /// Construct with a known backend availability instead of probing.
    pub fn with_availability(
        handler: Arc<dyn FileArrivalHandler>,
        settings: WatcherSettings,
        available: bool,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                handler,
                settings,
                available,
                registry: Mutex::new(Registry::default()),
                events: Mutex::new(VecDeque::new()),
                in_flight: Mutex::new(HashSet::new()),
                processed: Mutex::new(HashSet::new()),
                listener: Mutex::new(None),
            }),
        }
    }

    pub fn is_available(&self) -> bool {
        self.inner.available
    }

    /// The listener runs on the thread that raised the event, after the
    /// watcher has released its internal locks, so it may call back into
    /// the watcher.
    pub fn set_event_listener(&self, listener: EventListener) {
        *lock(&self.inner.listener) = Some(listener);
    }

    /// Register `dir`. Its path is made absolute and must be an existing
    /// directory not already registered. Monitoring begins immediately when
    /// the watcher is running and the entry is enabled.
    pub fn add_watch_directory(&self, mut dir: WatchDirectory) -> Result<PathBuf, WatcherError> {
        let path = resolve(&dir.path)?;
        if !path.is_dir() {
            return Err(WatcherError::NotADirectory(path));
        }
        dir.path = path.clone();

        let mut registry = lock(&self.inner.registry);
        if registry.directories.contains_key(&path) {
            return Err(WatcherError::AlreadyWatched(path));
        }
        let enabled = dir.enabled;
        registry.directories.insert(path.clone(), dir);
        registry.record(
            WatcherEventKind::Add,
            &path,
            EventStatus::Success,
            format!("Added watch directory {}", path.display()),
        );
        let started = if registry.running && enabled {
            self.inner.start_monitor(&mut registry, &path)
        } else {
            Ok(())
        };
        self.inner.flush(registry);
        started.map(|_| path)
    }

    /// Unregister `path`, stopping its monitor.
    pub fn remove_watch_directory(&self, path: &Path) -> Result<WatchDirectory, WatcherError> {
        let path = resolve(path)?;
        let mut registry = lock(&self.inner.registry);
        let dir = registry
            .directories
            .remove(&path)
            .ok_or_else(|| WatcherError::NotWatched(path.clone()))?;
        self.inner.stop_monitor(&mut registry, &path);
        registry.record(
            WatcherEventKind::Remove,
            &path,
            EventStatus::Success,
            format!("Removed watch directory {}", path.display()),
        );
        self.inner.flush(registry);
        Ok(dir)
    }

    /// Replace the settings of a registered directory, restarting its
    /// monitor. Unknown directories are added.
    pub fn update_watch_directory(&self, mut dir: WatchDirectory) -> Result<PathBuf, WatcherError> {
        let path = resolve(&dir.path)?;
        let mut registry = lock(&self.inner.registry);
        if !registry.directories.contains_key(&path) {
            drop(registry);
            return self.add_watch_directory(dir);
        }

        dir.path = path.clone();
        let enabled = dir.enabled;
        registry.directories.insert(path.clone(), dir);
        let mut started = Ok(());
        if registry.running {
            self.inner.stop_monitor(&mut registry, &path);
            if enabled {
                started = self.inner.start_monitor(&mut registry, &path);
            }
        }
        if started.is_ok() {
            registry.record(
                WatcherEventKind::Update,
                &path,
                EventStatus::Success,
                format!("Updated watch directory {}", path.display()),
            );
        }
        self.inner.flush(registry);
        started.map(|_| path)
    }

    /// Registered directories, ordered by path.
    pub fn watch_directories(&self) -> Vec<WatchDirectoryStatus> {
        let registry = lock(&self.inner.registry);
        registry
            .directories
            .iter()
            .map(|(path, dir)| WatchDirectoryStatus {
                directory: dir.clone(),
                is_watching: registry.monitors.contains_key(path),
            })
            .collect()
    }

    /// Start monitoring every enabled directory. Must be called from within
    /// a tokio runtime. Starting a running watcher is a no-op.
    pub fn start(&self) -> Result<(), WatcherError> {
        if !self.inner.available {
            self.inner.log(
                WatcherEventKind::Start,
                Path::new(""),
                EventStatus::Error,
                "File system notifications are unavailable",
            );
            return Err(WatcherError::Unavailable);
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| WatcherError::NoRuntime)?;

        let mut registry = lock(&self.inner.registry);
        if registry.running {
            return Ok(());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        registry.sender = Some(tx);
        registry.running = true;
        runtime.spawn(Arc::clone(&self.inner).dispatch(rx));

        let enabled: Vec<PathBuf> = registry
            .directories
            .iter()
            .filter(|(_, d)| d.enabled)
            .map(|(p, _)| p.clone())
            .collect();
        for path in enabled {
            if let Err(e) = self.inner.start_monitor(&mut registry, &path) {
                warn!(path = %path.display(), error = %e, "Failed to watch directory");
                registry.record(
                    WatcherEventKind::Watch,
                    &path,
                    EventStatus::Error,
                    e.to_string(),
                );
            }
        }

        info!(directories = registry.monitors.len(), "Directory watcher started");
        registry.record(
            WatcherEventKind::Start,
            Path::new(""),
            EventStatus::Success,
            "Directory watcher started",
        );
        self.inner.flush(registry);
        Ok(())
    }

    /// Stop all monitors. Arrivals already being processed run to
    /// completion.
    pub fn stop(&self) {
        let mut registry = lock(&self.inner.registry);
        if !registry.running {
            return;
        }
        registry.running = false;
        let paths: Vec<PathBuf> = registry.monitors.keys().cloned().collect();
        for path in paths {
            self.inner.stop_monitor(&mut registry, &path);
        }
        // closing the channel ends the dispatcher
        registry.sender = None;

        info!("Directory watcher stopped");
        registry.record(
            WatcherEventKind::Stop,
            Path::new(""),
            EventStatus::Success,
            "Directory watcher stopped",
        );
        self.inner.flush(registry);
    }

    pub fn is_running(&self) -> bool {
        lock(&self.inner.registry).running
    }

    /// The most recent `limit` events, oldest first.
    pub fn event_log(&self, limit: usize) -> Vec<WatcherEvent> {
        let events = lock(&self.inner.events);
        let skip = events.len().saturating_sub(limit);
        events.iter().skip(skip).cloned().collect()
    }

    /// Handle one arrived file: wait for it to settle, poll until it is
    /// readable, then run the handler once per (path, modification time).
    ///
    /// Returns `None` when the file vanished, never became readable, or
    /// was already handled.
    pub async fn process_arrival(
        &self,
        path: &Path,
        watch_dir: &WatchDirectory,
    ) -> Option<PipelineOutcome> {
        Arc::clone(&self.inner).process_arrival(path, watch_dir).await
    }
}

impl Inner {
    fn log(
        &self,
        kind: WatcherEventKind,
        path: &Path,
        status: EventStatus,
        message: impl Into<String>,
    ) {
        self.publish(WatcherEvent::now(kind, path, status, message));
    }

    /// Publish events recorded while `registry` was held, after unlocking.
    fn flush(&self, mut registry: MutexGuard<'_, Registry>) {
        let pending = std::mem::take(&mut registry.pending);
        drop(registry);
        for event in pending {
            self.publish(event);
        }
    }

    fn publish(&self, event: WatcherEvent) {
        {
            let mut events = lock(&self.events);
            events.push_back(event.clone());
            while events.len() > MAX_EVENT_LOG {
                events.pop_front();
            }
        }
        let listener = lock(&self.listener).clone();
        if let Some(listener) = listener {
            listener(&event);
        }
    }

    fn start_monitor(&self, registry: &mut Registry, path: &Path) -> Result<(), WatcherError> {
        if registry.monitors.contains_key(path) {
            return Ok(());
        }
        let Some(sender) = registry.sender.clone() else {
            return Ok(());
        };

        let root = path.to_path_buf();
        let mut monitor = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                for arrived in arrival_paths(event) {
                    let arrival = Arrival {
                        root: root.clone(),
                        path: arrived,
                    };
                    if sender.send(arrival).is_err() {
                        return;
                    }
                }
            }
            Err(e) => warn!(error = %e, "Watch error"),
        })
        .map_err(|e| WatcherError::Notify {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        monitor
            .watch(path, RecursiveMode::Recursive)
            .map_err(|e| WatcherError::Notify {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        registry.monitors.insert(path.to_path_buf(), monitor);
        debug!(path = %path.display(), "Watching directory");
        registry.record(
            WatcherEventKind::Watch,
            path,
            EventStatus::Success,
            format!("Watching {}", path.display()),
        );
        Ok(())
    }

    fn stop_monitor(&self, registry: &mut Registry, path: &Path) {
        if registry.monitors.remove(path).is_some() {
            debug!(path = %path.display(), "Stopped watching directory");
            registry.record(
                WatcherEventKind::Unwatch,
                path,
                EventStatus::Success,
                format!("Stopped watching {}", path.display()),
            );
        }
    }

    async fn dispatch(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<Arrival>) {
        while let Some(arrival) = rx.recv().await {
            let watch_dir = {
                let registry = lock(&self.registry);
                registry.directories.get(&arrival.root).cloned()
            };
            let Some(watch_dir) = watch_dir.filter(|d| d.enabled) else {
                continue;
            };
            if arrival.path.is_dir() || !watch_dir.accepts(&arrival.path) {
                continue;
            }
            if !lock(&self.in_flight).insert(arrival.path.clone()) {
                continue;
            }

            let inner = Arc::clone(&self);
            tokio::spawn(async move {
                Arc::clone(&inner)
                    .process_arrival(&arrival.path, &watch_dir)
                    .await;
                lock(&inner.in_flight).remove(&arrival.path);
            });
        }
        debug!("Watcher dispatcher finished");
    }

    async fn wait_until_readable(&self, path: &Path) -> bool {
        let deadline = Instant::now() + self.settings.readiness_timeout;
        loop {
            match tokio::fs::File::open(path).await {
                Ok(mut file) => {
                    use tokio::io::AsyncReadExt;
                    let mut buf = [0u8; 1];
                    if file.read(&mut buf).await.is_ok() {
                        return true;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return false,
                Err(_) => {}
            }
            if Instant::now() >= deadline {
                warn!(path = %path.display(), "File never became readable");
                return false;
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    async fn process_arrival(
        self: Arc<Self>,
        path: &Path,
        watch_dir: &WatchDirectory,
    ) -> Option<PipelineOutcome> {
        tokio::time::sleep(self.settings.settle_delay).await;
        if !path.exists() || !self.wait_until_readable(path).await {
            return None;
        }

        let key = (path.to_path_buf(), modified_time(path));
        if !lock(&self.processed).insert(key) {
            debug!(path = %path.display(), "Already processed, skipping");
            return None;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        info!(path = %path.display(), "New file detected");
        self.log(
            WatcherEventKind::NewFile,
            path,
            EventStatus::Pending,
            format!("New file: {}", file_name),
        );

        let outcome = self.handler.on_file_arrived(path, watch_dir).await;
        metrics::WATCHER_ARRIVALS
            .with_label_values(&[outcome.label()])
            .inc();

        match &outcome {
            PipelineOutcome::Saved(saved) => self.log(
                WatcherEventKind::Saved,
                saved,
                EventStatus::Success,
                format!("Saved subtitle for {}", file_name),
            ),
            PipelineOutcome::NoResults => self.log(
                WatcherEventKind::NoMatch,
                path,
                EventStatus::Skipped,
                format!("No subtitles found for {}", file_name),
            ),
            PipelineOutcome::NoMatch => self.log(
                WatcherEventKind::NoMatch,
                path,
                EventStatus::Skipped,
                format!("No suitable subtitle for {}", file_name),
            ),
            PipelineOutcome::Failed(message) => {
                warn!(path = %path.display(), error = %message, "Processing failed");
                self.log(
                    WatcherEventKind::Error,
                    path,
                    EventStatus::Error,
                    format!("Processing failed: {}", message),
                )
            }
        }
        Some(outcome)
    }
}
