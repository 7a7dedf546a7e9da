use std::path::{Path, PathBuf};
use std::process::Child;

use crate::cmd;
use crate::config::Config;
use crate::error::Error;
use crate::mountpoint;

/// One mount this plug-in instance established: the target path, the daemon
/// child backing it, and the log forwarder draining the daemon's output.
#[derive(Debug)]
pub struct MountRecord {
    mount_point: PathBuf,
    daemon: Child,
    logger: Option<Child>,
}

impl MountRecord {
    pub fn new(mount_point: PathBuf, daemon: Child, logger: Option<Child>) -> MountRecord {
        MountRecord {
            mount_point,
            daemon,
            logger,
        }
    }

    pub fn mount_point(&self) -> &Path {
        &self.mount_point
    }

    pub fn daemon_pid(&self) -> u32 {
        self.daemon.id()
    }
}

/// Ordered table of the step's live mounts. Filled by the execution-side
/// init callback, drained by the exit callback.
#[derive(Default)]
pub struct SessionMountTable {
    entries: Vec<MountRecord>,
}

impl SessionMountTable {
    pub fn push(&mut self, record: MountRecord) {
        self.entries.push(record);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn mount_points(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|r| r.mount_point())
    }

    /// Tear down every recorded mount, newest first — a nested mount must go
    /// before the directory it lives in. Best-effort throughout: one stuck
    /// mount never stops the rest of the table from being cleaned.
    pub fn teardown(&mut self, config: &Config) {
        if !self.entries.is_empty() {
            log::info!(
                "gcsfuse-mount: cleaning up {} mount(s)",
                self.entries.len()
            );
        }
        while let Some(record) = self.entries.pop() {
            teardown_one(config, record);
        }
    }
}

fn teardown_one(config: &Config, mut record: MountRecord) {
    let mount_point = record.mount_point.to_string_lossy().into_owned();
    log::info!("gcsfuse-mount: unmounting {mount_point}");

    // Graceful first: let the daemon flush and detach.
    if let Err(e) = run_unmount_tool(
        &config.fusermount_path,
        &["-u", &mount_point],
        &record.mount_point,
    ) {
        log::warn!("gcsfuse-mount: {e}");
    }

    // The daemon does not get a say: kill and reap whatever is left of it.
    let _ = record.daemon.kill();
    match record.daemon.wait() {
        Ok(status) => log::debug!("gcsfuse-mount: daemon for {mount_point} reaped ({status})"),
        Err(e) => log::warn!("gcsfuse-mount: reaping daemon for {mount_point}: {e}"),
    }

    // A hung endpoint survives both steps above; detach it lazily so the
    // path is free for the next step.
    if mountpoint::is_mountpoint(&record.mount_point)
        && let Err(e) = run_unmount_tool(
            &config.umount_path,
            &["-l", &mount_point],
            &record.mount_point,
        )
    {
        log::error!("gcsfuse-mount: lazy detach: {e}");
    }

    // The forwarder exits on EOF once the daemon is gone; reap it.
    if let Some(mut logger) = record.logger.take() {
        let _ = logger.wait();
    }
}

fn run_unmount_tool(tool: &str, args: &[&str], mount_point: &Path) -> Result<(), Error> {
    let out = cmd::run_capture(tool, args).map_err(|e| Error::Unmount {
        mount_point: mount_point.to_path_buf(),
        detail: format!("failed to run {tool}: {e}"),
    })?;
    if !out.success() {
        return Err(Error::Unmount {
            mount_point: mount_point.to_path_buf(),
            detail: format!("{tool} exited {}: {}", out.status, out.stderr.trim()),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Command, Stdio};

    fn sleeper() -> Child {
        Command::new("sleep")
            .arg("30")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .unwrap()
    }

    fn harmless_config() -> Config {
        // Point both unmount tools at `true` so teardown runs end to end
        // without touching the real mount table.
        let mut config = Config::default();
        config.fusermount_path = "true".to_string();
        config.umount_path = "true".to_string();
        config
    }

    #[test]
    fn table_starts_empty() {
        let table = SessionMountTable::default();
        assert!(table.is_empty());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn push_records_in_order() {
        let mut table = SessionMountTable::default();
        table.push(MountRecord::new(PathBuf::from("/a"), sleeper(), None));
        table.push(MountRecord::new(PathBuf::from("/a/b"), sleeper(), None));
        let points: Vec<_> = table.mount_points().collect();
        assert_eq!(points, [Path::new("/a"), Path::new("/a/b")]);
        // Clean up the sleepers.
        table.teardown(&harmless_config());
    }

    #[test]
    fn teardown_empties_table_and_kills_daemons() {
        let dir = assert_fs::TempDir::new().unwrap();
        let daemon = sleeper();
        let pid = daemon.id() as i32;

        let mut table = SessionMountTable::default();
        table.push(MountRecord::new(dir.path().to_path_buf(), daemon, None));
        table.teardown(&harmless_config());

        assert!(table.is_empty());
        // The daemon was reaped: signalling its pid must fail with ESRCH.
        let err = nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid), None).unwrap_err();
        assert_eq!(err, nix::errno::Errno::ESRCH);
    }

    #[test]
    fn teardown_survives_failing_unmount_tools() {
        let dir = assert_fs::TempDir::new().unwrap();
        let mut config = harmless_config();
        config.fusermount_path = "false".to_string();

        let mut table = SessionMountTable::default();
        table.push(MountRecord::new(dir.path().to_path_buf(), sleeper(), None));
        table.push(MountRecord::new(dir.path().to_path_buf(), sleeper(), None));
        table.teardown(&config);
        assert!(table.is_empty());
    }

    #[test]
    fn daemon_pid_reports_child_id() {
        let daemon = sleeper();
        let pid = daemon.id();
        let record = MountRecord::new(PathBuf::from("/x"), daemon, None);
        assert_eq!(record.daemon_pid(), pid);
        let mut table = SessionMountTable::default();
        table.push(record);
        table.teardown(&harmless_config());
    }
}
