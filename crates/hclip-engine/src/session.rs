//! Engine session lifecycle management.
//!
//! The transcoding engine is expensive to set up and leak-prone, so the
//! process owns exactly one live session at a time. [`EngineManager`]
//! enforces mutual exclusion over it, deduplicates concurrent loads,
//! and forces a reload once a session goes stale.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tempfile::TempDir;
use tokio::process::Command;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::error::{EngineError, EngineResult};

/// Environment override for the ffmpeg binary path.
pub const FFMPEG_PATH_ENV: &str = "HCLIP_FFMPEG";
/// Environment override for the ffprobe binary path.
pub const FFPROBE_PATH_ENV: &str = "HCLIP_FFPROBE";

/// Lifecycle state of the engine session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unloaded,
    Loading,
    Ready,
    Busy,
    Stale,
}

/// Thresholds that force a reload before reuse.
#[derive(Debug, Clone)]
pub struct SessionPolicy {
    /// Reload when the session has been idle longer than this.
    pub idle_timeout: Duration,
    /// Reload when more than this many operations have completed since load.
    pub max_uses: u32,
    /// Reload when the last operation finished longer ago than this.
    pub op_staleness: Duration,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(30),
            max_uses: 2,
            op_staleness: Duration::from_secs(10),
        }
    }
}

impl SessionPolicy {
    /// Create policy from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            idle_timeout: env_secs("HCLIP_SESSION_IDLE_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.idle_timeout),
            max_uses: env_parse("HCLIP_SESSION_MAX_USES").unwrap_or(defaults.max_uses),
            op_staleness: env_secs("HCLIP_SESSION_OP_STALENESS_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.op_staleness),
        }
    }
}

fn env_secs(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

/// The sole live handle to one loaded engine instance.
///
/// Owns the verified binaries and a private scratch directory that
/// stands in for the engine's working storage. All file names passed to
/// session operations are relative to that directory.
pub struct EngineSession {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    workdir: TempDir,
}

impl EngineSession {
    /// Resolve binaries, create scratch storage, and verify the engine.
    async fn load() -> EngineResult<Self> {
        let ffmpeg = resolve_binary(FFMPEG_PATH_ENV, "ffmpeg", EngineError::FfmpegNotFound)?;
        let ffprobe = resolve_binary(FFPROBE_PATH_ENV, "ffprobe", EngineError::FfprobeNotFound)?;

        let workdir = TempDir::with_prefix("hclip-engine-")
            .map_err(|e| EngineError::load_failed(format!("scratch dir creation: {}", e)))?;

        let session = Self {
            ffmpeg,
            ffprobe,
            workdir,
        };
        session.verify().await?;

        debug!(workdir = %session.workdir.path().display(), "Engine session loaded");
        Ok(session)
    }

    /// Path of a file inside the session's scratch storage.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.workdir.path().join(name)
    }

    /// Run a trivial no-op command to confirm the engine responds.
    pub async fn verify(&self) -> EngineResult<()> {
        let output = Command::new(&self.ffmpeg)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .await
            .map_err(|e| EngineError::load_failed(format!("engine verification: {}", e)))?;

        if output.status.success() {
            Ok(())
        } else {
            Err(EngineError::load_failed(
                "engine verification command exited with failure",
            ))
        }
    }

    /// Write input bytes into scratch storage.
    pub async fn write_input(&self, name: &str, data: &[u8]) -> EngineResult<()> {
        tokio::fs::write(self.path_of(name), data).await?;
        Ok(())
    }

    /// Read a file from scratch storage.
    ///
    /// A missing file is a resource error, not an IO error; callers
    /// treat it as fatal for the current attempt.
    pub async fn read_file(&self, name: &str) -> EngineResult<Vec<u8>> {
        match tokio::fs::read(self.path_of(name)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(EngineError::MissingOutput(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a file from scratch storage. Missing files are a no-op.
    pub async fn remove_file(&self, name: &str) -> EngineResult<()> {
        match tokio::fs::remove_file(self.path_of(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// List scratch files whose names start with `prefix`, sorted.
    pub async fn list_files(&self, prefix: &str) -> EngineResult<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(self.workdir.path()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with(prefix) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Execute an ffmpeg invocation inside the scratch directory.
    pub async fn exec(&self, args: &[String]) -> EngineResult<()> {
        debug!("Running engine command: ffmpeg {}", args.join(" "));

        let output = Command::new(&self.ffmpeg)
            .args(args)
            .current_dir(self.workdir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(EngineError::exec_failed(
                "engine command exited with non-zero status",
                Some(stderr),
                output.status.code(),
            ))
        }
    }

    /// Path of the ffprobe binary paired with this session.
    pub(crate) fn ffprobe(&self) -> &Path {
        &self.ffprobe
    }

    /// Tear down the engine and its scratch storage.
    fn terminate(self) {
        if let Err(e) = self.workdir.close() {
            warn!("Engine scratch storage removal failed: {}", e);
        }
    }
}

fn resolve_binary(env_key: &str, name: &str, not_found: EngineError) -> EngineResult<PathBuf> {
    if let Ok(path) = std::env::var(env_key) {
        let path = PathBuf::from(path);
        if path.is_file() {
            return Ok(path);
        }
        return Err(not_found);
    }
    which::which(name).map_err(|_| not_found)
}

type SharedLoad = Shared<BoxFuture<'static, Result<(), Arc<EngineError>>>>;

struct ManagerInner {
    state: SessionState,
    session: Option<Arc<EngineSession>>,
    load: Option<SharedLoad>,
    usage_count: u32,
    last_used_at: Instant,
    last_op_at: Instant,
    reload_count: u64,
    /// Bumped on every teardown; an in-flight load whose stamp no
    /// longer matches must discard its result instead of installing
    /// a second live session.
    generation: u64,
}

impl ManagerInner {
    fn new() -> Self {
        let now = Instant::now();
        Self {
            state: SessionState::Unloaded,
            session: None,
            load: None,
            usage_count: 0,
            last_used_at: now,
            last_op_at: now,
            reload_count: 0,
            generation: 0,
        }
    }

    fn teardown(&mut self) {
        if let Some(session) = self.session.take() {
            match Arc::try_unwrap(session) {
                Ok(session) => session.terminate(),
                Err(_) => warn!(
                    "Engine session still referenced at teardown; scratch storage reclaimed on last drop"
                ),
            }
        }
        self.state = SessionState::Unloaded;
        self.load = None;
        self.generation += 1;
    }
}

/// Owner of the single engine session.
///
/// One `EngineManager` exists per process; consumers hold it behind an
/// [`Arc`] and go through [`acquire`](Self::acquire)/[`release`](Self::release)
/// for every engine interaction.
pub struct EngineManager {
    inner: Arc<Mutex<ManagerInner>>,
    policy: SessionPolicy,
    ready_notify: Arc<Notify>,
}

impl EngineManager {
    /// Create a manager with the given lifecycle policy.
    pub fn new(policy: SessionPolicy) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ManagerInner::new())),
            policy,
            ready_notify: Arc::new(Notify::new()),
        }
    }

    /// Acquire exclusive use of a ready session, loading one if needed.
    ///
    /// A second caller arriving while a load is in flight awaits the
    /// same load instead of starting another. Stale sessions are torn
    /// down and replaced before the lease is handed out.
    pub async fn acquire(self: &Arc<Self>) -> EngineResult<EngineLease> {
        loop {
            enum Step {
                Lease(Arc<EngineSession>),
                AwaitLoad(SharedLoad),
                WaitReady,
            }

            // Register for ready wakeups before inspecting state;
            // notify_waiters stores no permit, so a lease dropped
            // between the check and the await would otherwise be a
            // lost wakeup.
            let notified = self.ready_notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let step = {
                let mut inner = self.inner.lock().expect("engine manager lock poisoned");
                match inner.state {
                    SessionState::Ready => {
                        if self.is_stale(&inner) {
                            inner.state = SessionState::Stale;
                            info!(
                                usage_count = inner.usage_count,
                                "Engine session stale, forcing reload"
                            );
                            inner.teardown();
                            continue;
                        }
                        inner.state = SessionState::Busy;
                        let session = inner
                            .session
                            .clone()
                            .ok_or(EngineError::NoSession)?;
                        Step::Lease(session)
                    }
                    SessionState::Busy => Step::WaitReady,
                    SessionState::Loading => {
                        let load = inner.load.clone().ok_or(EngineError::NoSession)?;
                        Step::AwaitLoad(load)
                    }
                    SessionState::Unloaded | SessionState::Stale => {
                        let load = self.start_load(&mut inner);
                        Step::AwaitLoad(load)
                    }
                }
            };

            match step {
                Step::Lease(session) => {
                    return Ok(EngineLease {
                        session,
                        manager: Arc::clone(self),
                    });
                }
                Step::AwaitLoad(load) => {
                    load.await
                        .map_err(|e| EngineError::load_failed(e.to_string()))?;
                }
                Step::WaitReady => {
                    notified.await;
                }
            }
        }
    }

    /// Terminate the engine and reset to Unloaded.
    ///
    /// Idempotent: calling with nothing loaded is a no-op. State is
    /// reset even when teardown itself fails.
    pub fn release(&self) {
        let mut inner = self.inner.lock().expect("engine manager lock poisoned");
        if inner.session.is_some() || inner.state != SessionState::Unloaded {
            info!("Releasing engine session");
        }
        inner.teardown();
        drop(inner);
        self.ready_notify.notify_waiters();
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.inner.lock().expect("engine manager lock poisoned").state
    }

    /// Number of fresh loads performed so far.
    pub fn reload_count(&self) -> u64 {
        self.inner
            .lock()
            .expect("engine manager lock poisoned")
            .reload_count
    }

    /// Operations completed since the last load.
    pub fn usage_count(&self) -> u32 {
        self.inner
            .lock()
            .expect("engine manager lock poisoned")
            .usage_count
    }

    fn is_stale(&self, inner: &ManagerInner) -> bool {
        inner.last_used_at.elapsed() > self.policy.idle_timeout
            || inner.usage_count > self.policy.max_uses
            || inner.last_op_at.elapsed() > self.policy.op_staleness
    }

    fn start_load(&self, inner: &mut ManagerInner) -> SharedLoad {
        inner.state = SessionState::Loading;
        let generation = inner.generation;

        let manager_inner = Arc::clone(&self.inner);
        let notify = Arc::clone(&self.ready_notify);
        let load: SharedLoad = async move {
            let result = EngineSession::load().await;
            let mut inner = manager_inner.lock().expect("engine manager lock poisoned");
            if inner.generation != generation {
                // A release retired this lifecycle while the load was
                // in flight; the result belongs to no one. Awaiters
                // re-check manager state on their next loop pass.
                drop(inner);
                if let Ok(session) = result {
                    session.terminate();
                }
                return Ok(());
            }
            inner.load = None;
            match result {
                Ok(session) => {
                    let now = Instant::now();
                    inner.session = Some(Arc::new(session));
                    inner.state = SessionState::Ready;
                    inner.usage_count = 0;
                    inner.last_used_at = now;
                    inner.last_op_at = now;
                    inner.reload_count += 1;
                    drop(inner);
                    notify.notify_waiters();
                    Ok(())
                }
                Err(e) => {
                    inner.state = SessionState::Unloaded;
                    inner.session = None;
                    Err(Arc::new(e))
                }
            }
        }
        .boxed()
        .shared();

        inner.load = Some(load.clone());
        load
    }

    /// Called by [`EngineLease`] on drop.
    fn end_use(&self) {
        let mut inner = self.inner.lock().expect("engine manager lock poisoned");
        if inner.state == SessionState::Busy {
            let now = Instant::now();
            inner.state = SessionState::Ready;
            inner.usage_count += 1;
            inner.last_used_at = now;
            inner.last_op_at = now;
        }
        drop(inner);
        self.ready_notify.notify_waiters();
    }
}

/// Scoped exclusive access to the loaded engine session.
///
/// Dropping the lease returns the session to Ready and records the use;
/// this happens on every exit path, including panics and early returns,
/// so the session is never leaked mid-operation.
pub struct EngineLease {
    session: Arc<EngineSession>,
    manager: Arc<EngineManager>,
}

impl std::fmt::Debug for EngineLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineLease").finish_non_exhaustive()
    }
}

impl std::ops::Deref for EngineLease {
    type Target = EngineSession;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl Drop for EngineLease {
    fn drop(&mut self) {
        self.manager.end_use();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Session tests mutate process-wide env vars; serialize them.
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn env_guard() -> std::sync::MutexGuard<'static, ()> {
        ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner())
    }

    // Session tests run against a stand-in binary so they do not
    // depend on an ffmpeg installation.
    fn stub_engine_env() -> bool {
        if !Path::new("/bin/true").is_file() {
            eprintln!("skipping: /bin/true not available");
            return false;
        }
        std::env::set_var(FFMPEG_PATH_ENV, "/bin/true");
        std::env::set_var(FFPROBE_PATH_ENV, "/bin/true");
        true
    }

    fn manager(policy: SessionPolicy) -> Arc<EngineManager> {
        Arc::new(EngineManager::new(policy))
    }

    #[tokio::test]
    async fn test_acquire_loads_and_reuses_session() {
        let _env = env_guard();
        if !stub_engine_env() {
            return;
        }
        let mgr = manager(SessionPolicy::default());

        {
            let lease = mgr.acquire().await.unwrap();
            assert_eq!(mgr.state(), SessionState::Busy);
            lease.verify().await.unwrap();
        }
        assert_eq!(mgr.state(), SessionState::Ready);
        assert_eq!(mgr.usage_count(), 1);
        assert_eq!(mgr.reload_count(), 1);

        // Second acquire reuses the same load.
        let _lease = mgr.acquire().await.unwrap();
        assert_eq!(mgr.reload_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_acquire_single_load() {
        let _env = env_guard();
        if !stub_engine_env() {
            return;
        }
        let mgr = manager(SessionPolicy::default());

        let a = {
            let mgr = Arc::clone(&mgr);
            tokio::spawn(async move {
                let lease = mgr.acquire().await.unwrap();
                drop(lease);
            })
        };
        let b = {
            let mgr = Arc::clone(&mgr);
            tokio::spawn(async move {
                let lease = mgr.acquire().await.unwrap();
                drop(lease);
            })
        };
        a.await.unwrap();
        b.await.unwrap();

        // Both callers went through exactly one load.
        assert_eq!(mgr.reload_count(), 1);
        assert_eq!(mgr.usage_count(), 2);
    }

    #[tokio::test]
    async fn test_release_is_idempotent() {
        let _env = env_guard();
        if !stub_engine_env() {
            return;
        }
        let mgr = manager(SessionPolicy::default());
        let lease = mgr.acquire().await.unwrap();
        drop(lease);

        mgr.release();
        assert_eq!(mgr.state(), SessionState::Unloaded);
        mgr.release();
        assert_eq!(mgr.state(), SessionState::Unloaded);
    }

    #[tokio::test]
    async fn test_usage_threshold_forces_reload() {
        let _env = env_guard();
        if !stub_engine_env() {
            return;
        }
        let policy = SessionPolicy {
            max_uses: 2,
            ..SessionPolicy::default()
        };
        let mgr = manager(policy);

        for _ in 0..3 {
            let lease = mgr.acquire().await.unwrap();
            drop(lease);
        }
        assert_eq!(mgr.reload_count(), 1);

        // usage_count is now 3 > max_uses, next acquire reloads.
        let _lease = mgr.acquire().await.unwrap();
        assert_eq!(mgr.reload_count(), 2);
        assert_eq!(mgr.usage_count(), 0);
    }

    #[tokio::test]
    async fn test_op_staleness_forces_reload() {
        let _env = env_guard();
        if !stub_engine_env() {
            return;
        }
        let policy = SessionPolicy {
            op_staleness: Duration::from_millis(20),
            ..SessionPolicy::default()
        };
        let mgr = manager(policy);

        let lease = mgr.acquire().await.unwrap();
        drop(lease);
        assert_eq!(mgr.reload_count(), 1);

        tokio::time::sleep(Duration::from_millis(50)).await;

        let _lease = mgr.acquire().await.unwrap();
        assert_eq!(mgr.reload_count(), 2);
    }

    #[tokio::test]
    async fn test_busy_waiter_wakes_on_lease_drop() {
        let _env = env_guard();
        if !stub_engine_env() {
            return;
        }
        let mgr = manager(SessionPolicy::default());
        let lease = mgr.acquire().await.unwrap();

        let waiter = {
            let mgr = Arc::clone(&mgr);
            tokio::spawn(async move {
                let lease = mgr.acquire().await.unwrap();
                drop(lease);
            })
        };
        // Let the waiter observe the Busy session and park.
        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(lease);

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter never woke after the lease dropped")
            .unwrap();
        assert_eq!(mgr.usage_count(), 2);
    }

    #[tokio::test]
    async fn test_release_during_load_discards_stale_result() {
        let _env = env_guard();
        if !Path::new("/bin/sh").is_file() {
            eprintln!("skipping: /bin/sh not available");
            return;
        }
        // A deliberately slow engine binary keeps the first load in
        // flight long enough to retire it mid-load.
        let dir = tempfile::TempDir::new().unwrap();
        let script = dir.path().join("slow_engine.sh");
        std::fs::write(&script, "#!/bin/sh\nsleep 0.3\nexit 0\n").unwrap();
        let mut perms = std::fs::metadata(&script).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        std::fs::set_permissions(&script, perms).unwrap();
        std::env::set_var(FFMPEG_PATH_ENV, &script);
        std::env::set_var(FFPROBE_PATH_ENV, "/bin/true");

        let mgr = manager(SessionPolicy::default());

        let first = {
            let mgr = Arc::clone(&mgr);
            tokio::spawn(async move {
                let lease = mgr.acquire().await.unwrap();
                drop(lease);
            })
        };
        // Let the first load get in flight, then retire it.
        tokio::time::sleep(Duration::from_millis(50)).await;
        mgr.release();

        let lease = mgr.acquire().await.unwrap();
        drop(lease);
        first.await.unwrap();

        // Only the load that survived the release installed a
        // session; the retired one was discarded, not overlaid.
        assert_eq!(mgr.reload_count(), 1);
        assert_eq!(mgr.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_load_failure_resets_state() {
        let _env = env_guard();
        if !Path::new("/bin/true").is_file() {
            eprintln!("skipping: /bin/true not available");
            return;
        }
        std::env::set_var(FFMPEG_PATH_ENV, "/nonexistent/ffmpeg");
        std::env::set_var(FFPROBE_PATH_ENV, "/bin/true");
        let mgr = manager(SessionPolicy::default());

        let err = mgr.acquire().await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::LoadFailed(_) | EngineError::FfmpegNotFound
        ));
        assert_eq!(mgr.state(), SessionState::Unloaded);

        // Restore stub for other tests sharing the process env.
        std::env::set_var(FFMPEG_PATH_ENV, "/bin/true");
    }

    #[tokio::test]
    async fn test_scratch_file_roundtrip() {
        let _env = env_guard();
        if !stub_engine_env() {
            return;
        }
        let mgr = manager(SessionPolicy::default());
        let lease = mgr.acquire().await.unwrap();

        lease.write_input("input.bin", b"hello").await.unwrap();
        let data = lease.read_file("input.bin").await.unwrap();
        assert_eq!(data, b"hello");

        lease.remove_file("input.bin").await.unwrap();
        // Idempotent removal.
        lease.remove_file("input.bin").await.unwrap();

        let err = lease.read_file("input.bin").await.unwrap_err();
        assert!(matches!(err, EngineError::MissingOutput(_)));
    }

    #[tokio::test]
    async fn test_list_files_sorted() {
        let _env = env_guard();
        if !stub_engine_env() {
            return;
        }
        let mgr = manager(SessionPolicy::default());
        let lease = mgr.acquire().await.unwrap();

        lease.write_input("chunk_002.mp3", b"c").await.unwrap();
        lease.write_input("chunk_000.mp3", b"a").await.unwrap();
        lease.write_input("chunk_001.mp3", b"b").await.unwrap();
        lease.write_input("other.txt", b"x").await.unwrap();

        let files = lease.list_files("chunk_").await.unwrap();
        assert_eq!(files, vec!["chunk_000.mp3", "chunk_001.mp3", "chunk_002.mp3"]);
    }
}
