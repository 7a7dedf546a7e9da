use std::io;
use std::os::unix::fs::{DirBuilderExt, MetadataExt};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use nix::unistd::{AccessFlags, Gid, Uid, User, access};

use crate::config::Config;
use crate::error::Error;
use crate::mount_spec::MountSpec;
use crate::mountpoint;
use crate::privdrop;
use crate::session::MountRecord;

// Exit-status protocol of the forked validation helper. 2 is reserved by
// privdrop for a failed identity change.
const EXIT_OK: i32 = 0;
const EXIT_NOT_DIR: i32 = 10;
const EXIT_NOT_OWNED: i32 = 11;
const EXIT_NOT_EMPTY: i32 = 12;
const EXIT_NOT_WRITABLE: i32 = 13;
const EXIT_CREATE_FAILED: i32 = 14;
const EXIT_STAT_FAILED: i32 = 15;

/// Establish one mount as the job user.
///
/// Returns `Ok(None)` when the target is already a mountpoint (nothing was
/// started, nothing to tear down later), `Ok(Some(record))` once the daemon
/// is up and the target is live, and an error otherwise — in which case no
/// child of ours survives.
pub fn mount_one(
    config: &Config,
    spec: &MountSpec,
    uid: u32,
    gid: u32,
) -> Result<Option<MountRecord>, Error> {
    let mount_point = Path::new(&spec.mount_point);
    let job_uid = Uid::from_raw(uid);
    let job_gid = Gid::from_raw(gid);

    // Idempotence: a prolog or an earlier step may already have mounted this.
    // When we are root the probe has to see the job user's view, not ours.
    let already_mounted = if Uid::effective().is_root() {
        mountpoint::is_mountpoint_as_user(mount_point, job_uid, job_gid)?
    } else {
        mountpoint::is_mountpoint(mount_point)
    };
    if already_mounted {
        log::info!(
            "gcsfuse-mount: {} is already a mountpoint, skipping",
            spec.mount_point
        );
        return Ok(None);
    }

    validate_target_as_user(mount_point, job_uid, job_gid)?;

    let home = job_user_home(job_uid);
    let mut logger = spawn_log_forwarder(config);

    let mut command = Command::new(&config.gcsfuse_path);
    command.args(daemon_args(spec, uid, gid));
    command.stdin(Stdio::null());
    wire_daemon_stdio(&mut command, &mut logger);
    if let Some(home) = &home {
        command.env("HOME", home);
    }
    unsafe {
        command.pre_exec(move || {
            if Uid::effective().is_root() {
                privdrop::drop_privileges(job_uid, job_gid)
                    .map_err(|errno| io::Error::from_raw_os_error(errno as i32))?;
            }
            Ok(())
        });
    }

    log::info!(
        "gcsfuse-mount: mounting {} on {}",
        spec.bucket_label(),
        spec.mount_point
    );
    let mut daemon = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            reap(&mut logger);
            return Err(Error::Exec {
                program: config.gcsfuse_path.clone(),
                detail: e.to_string(),
            });
        }
    };
    // Close our copies of the log pipe so the forwarder sees EOF when the
    // daemon goes away.
    drop(command);

    // Poll until the target becomes a boundary or the daemon gives up.
    for _ in 0..config.mount_wait_retries {
        if mountpoint::is_mountpoint(mount_point) {
            return Ok(Some(MountRecord::new(
                PathBuf::from(&spec.mount_point),
                daemon,
                logger,
            )));
        }
        match daemon.try_wait() {
            Ok(Some(status)) => {
                reap(&mut logger);
                return Err(Error::Exec {
                    program: config.gcsfuse_path.clone(),
                    detail: format!("daemon exited during startup: {status}"),
                });
            }
            Ok(None) => {}
            Err(e) => log::warn!("gcsfuse-mount: wait on daemon: {e}"),
        }
        std::thread::sleep(config.mount_wait_sleep);
    }

    let _ = daemon.kill();
    let _ = daemon.wait();
    reap(&mut logger);
    Err(Error::MountTimeout {
        mount_point: PathBuf::from(&spec.mount_point),
        waited_secs: config.mount_wait_total().as_secs(),
    })
}

/// Assemble the daemon argv (without the program name): mandatory flags,
/// then the user's flags, then the bucket (named-bucket specs only), then
/// the mount point.
pub fn daemon_args(spec: &MountSpec, uid: u32, gid: u32) -> Vec<String> {
    let mut args = vec![
        "--foreground".to_string(),
        "-o".to_string(),
        "allow_other".to_string(),
        "--uid".to_string(),
        uid.to_string(),
        "--gid".to_string(),
        gid.to_string(),
        "--log-format".to_string(),
        "json".to_string(),
    ];
    if let Some(flags) = &spec.flags {
        args.extend(flags.split_whitespace().map(str::to_string));
    }
    if let Some(bucket) = &spec.bucket
        && !bucket.is_empty()
    {
        args.push(bucket.clone());
    }
    args.push(spec.mount_point.clone());
    args
}

/// Check the mount target the way the job user will see it, creating it if
/// absent. Runs in a forked helper that has become `(uid, gid)`.
fn validate_target_as_user(path: &Path, uid: Uid, gid: Gid) -> Result<(), Error> {
    let target = path.to_path_buf();
    let raw_uid = uid.as_raw();
    let code = privdrop::run_as_user(uid, gid, move || validate_target_dir(&target, raw_uid))?;

    let reason = match code {
        EXIT_OK => return Ok(()),
        privdrop::EXIT_PRIV_DROP_FAILED => {
            return Err(Error::Privilege(format!(
                "could not become uid {uid} gid {gid} to validate the mount target"
            )));
        }
        EXIT_NOT_DIR => "exists but is not a directory",
        EXIT_NOT_OWNED => "not owned by the job user",
        EXIT_NOT_EMPTY => "directory is not empty",
        EXIT_NOT_WRITABLE => "not writable by the job user",
        EXIT_CREATE_FAILED => "could not be created",
        EXIT_STAT_FAILED => "could not be inspected",
        _ => "validation helper failed",
    };
    Err(Error::Validation {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    })
}

/// The in-helper half of target validation. Must run with the job user's
/// identity; communicates through the exit-status protocol above.
fn validate_target_dir(path: &Path, uid: u32) -> i32 {
    match std::fs::metadata(path) {
        Ok(md) => {
            if !md.is_dir() {
                return EXIT_NOT_DIR;
            }
            if md.uid() != uid {
                return EXIT_NOT_OWNED;
            }
            match std::fs::read_dir(path) {
                Ok(mut entries) => {
                    if entries.next().is_some() {
                        return EXIT_NOT_EMPTY;
                    }
                }
                Err(_) => return EXIT_STAT_FAILED,
            }
            if access(path, AccessFlags::W_OK).is_err() {
                return EXIT_NOT_WRITABLE;
            }
            EXIT_OK
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let mut builder = std::fs::DirBuilder::new();
            builder.mode(0o755);
            match builder.create(path) {
                Ok(()) => EXIT_OK,
                Err(_) => EXIT_CREATE_FAILED,
            }
        }
        Err(_) => EXIT_STAT_FAILED,
    }
}

/// `HOME` for the daemon's environment, from the job user's password-database
/// entry. The daemon's credential discovery may look under `$HOME`, so the
/// lookup is worth a warning when it fails, but never the mount.
fn job_user_home(uid: Uid) -> Option<PathBuf> {
    match User::from_uid(uid) {
        Ok(Some(user)) => Some(user.dir),
        Ok(None) => {
            log::warn!("gcsfuse-mount: uid {uid} has no password-database entry, leaving HOME unset");
            None
        }
        Err(e) => {
            log::warn!("gcsfuse-mount: password-database lookup for uid {uid} failed: {e}");
            None
        }
    }
}

/// Start the syslog forwarder the daemon's stdout/stderr will be piped into.
///
/// A missing forwarder costs us the daemon's log lines, not the mount: we
/// warn and fall back to the null device.
fn spawn_log_forwarder(config: &Config) -> Option<Child> {
    match Command::new(&config.logger_path)
        .args(["-t", &config.logger_tag, "-p", "user.info"])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => Some(child),
        Err(e) => {
            log::warn!(
                "gcsfuse-mount: cannot start {}: {e}; daemon output will be dropped",
                config.logger_path
            );
            None
        }
    }
}

/// Point the daemon's stdout and stderr at the forwarder's stdin.
fn wire_daemon_stdio(command: &mut Command, logger: &mut Option<Child>) {
    let pipe = logger.as_mut().and_then(|child| child.stdin.take());
    match pipe {
        Some(pipe) => {
            let pipe: std::os::fd::OwnedFd = pipe.into();
            match pipe.try_clone() {
                Ok(dup) => {
                    command.stdout(Stdio::from(dup));
                    command.stderr(Stdio::from(pipe));
                }
                Err(e) => {
                    log::warn!("gcsfuse-mount: cannot clone log pipe: {e}");
                    command.stdout(Stdio::null());
                    command.stderr(Stdio::null());
                }
            }
        }
        None => {
            command.stdout(Stdio::null());
            command.stderr(Stdio::null());
        }
    }
}

fn reap(logger: &mut Option<Child>) {
    if let Some(mut child) = logger.take() {
        let _ = child.kill();
        let _ = child.wait();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use nix::unistd::geteuid;

    // --- daemon_args ---

    #[test]
    fn named_bucket_argv_order() {
        let spec = MountSpec::parse("data:/mnt/data").unwrap();
        let args = daemon_args(&spec, 1000, 1000);
        // Mandatory flags lead; bucket then mount point close the line.
        assert_eq!(args[0], "--foreground");
        assert_eq!(&args[args.len() - 2..], &["data", "/mnt/data"]);
    }

    #[test]
    fn mandatory_flags_present() {
        let spec = MountSpec::parse("data:/mnt/data").unwrap();
        let args = daemon_args(&spec, 1000, 2000);
        let joined = args.join(" ");
        assert!(joined.contains("-o allow_other"), "got: {joined}");
        assert!(joined.contains("--uid 1000"), "got: {joined}");
        assert!(joined.contains("--gid 2000"), "got: {joined}");
        assert!(joined.contains("--log-format json"), "got: {joined}");
    }

    #[test]
    fn all_buckets_spec_omits_bucket_argument() {
        for token in ["/mnt/all", ":/mnt/all"] {
            let spec = MountSpec::parse(token).unwrap();
            let args = daemon_args(&spec, 1000, 1000);
            assert_eq!(args.last().unwrap(), "/mnt/all");
            assert_eq!(&args[args.len() - 2], "json", "got: {args:?}");
        }
    }

    #[test]
    fn user_flags_split_and_ordered_before_bucket() {
        let spec = MountSpec::parse("a:/p:-o ro --implicit-dirs").unwrap();
        let args = daemon_args(&spec, 1000, 1000);
        let tail = &args[args.len() - 5..];
        assert_eq!(tail, &["-o", "ro", "--implicit-dirs", "a", "/p"]);
    }

    #[test]
    fn mount_point_is_final_argument() {
        let spec = MountSpec::parse("b:/m:-o ro").unwrap();
        let args = daemon_args(&spec, 1000, 1000);
        assert_eq!(args.last().unwrap(), "/m");
    }

    // --- validate_target_dir (in-process, current identity) ---

    #[test]
    fn validate_accepts_empty_owned_dir() {
        let dir = assert_fs::TempDir::new().unwrap();
        assert_eq!(
            validate_target_dir(dir.path(), geteuid().as_raw()),
            EXIT_OK
        );
    }

    #[test]
    fn validate_creates_missing_dir_mode_0755() {
        let dir = assert_fs::TempDir::new().unwrap();
        let target = dir.child("new");
        assert_eq!(
            validate_target_dir(target.path(), geteuid().as_raw()),
            EXIT_OK
        );
        let md = std::fs::metadata(target.path()).unwrap();
        assert!(md.is_dir());
        assert_eq!(md.mode() & 0o777, 0o755);
    }

    #[test]
    fn validate_rejects_regular_file() {
        let dir = assert_fs::TempDir::new().unwrap();
        let file = dir.child("f");
        file.touch().unwrap();
        assert_eq!(
            validate_target_dir(file.path(), geteuid().as_raw()),
            EXIT_NOT_DIR
        );
    }

    #[test]
    fn validate_rejects_nonempty_dir() {
        let dir = assert_fs::TempDir::new().unwrap();
        dir.child("leftover").touch().unwrap();
        assert_eq!(
            validate_target_dir(dir.path(), geteuid().as_raw()),
            EXIT_NOT_EMPTY
        );
    }

    #[test]
    fn validate_rejects_wrong_owner() {
        let dir = assert_fs::TempDir::new().unwrap();
        let other = geteuid().as_raw() + 1;
        assert_eq!(validate_target_dir(dir.path(), other), EXIT_NOT_OWNED);
    }

    #[test]
    fn validate_rejects_uncreatable_path() {
        assert_eq!(
            validate_target_dir(
                Path::new("/nonexistent/__gcsfuse_spank__/deep"),
                geteuid().as_raw()
            ),
            EXIT_CREATE_FAILED
        );
    }

    // --- mount_one fast paths ---

    #[test]
    fn already_mounted_target_is_skipped_without_spawning() {
        // "/" is always a mountpoint; a bogus daemon path proves no spawn
        // was attempted.
        let mut config = Config::default();
        config.gcsfuse_path = "/nonexistent/__gcsfuse__".to_string();
        let spec = MountSpec::parse("b:/").unwrap();
        let (uid, gid) = (geteuid().as_raw(), nix::unistd::getegid().as_raw());
        let record = mount_one(&config, &spec, uid, gid).unwrap();
        assert!(record.is_none());
    }

    #[test]
    fn validation_failure_means_no_daemon() {
        let dir = assert_fs::TempDir::new().unwrap();
        dir.child("leftover").touch().unwrap();
        let mut config = Config::default();
        config.gcsfuse_path = "/nonexistent/__gcsfuse__".to_string();
        let spec =
            MountSpec::parse(&format!("b:{}", dir.path().to_string_lossy())).unwrap();
        let (uid, gid) = (geteuid().as_raw(), nix::unistd::getegid().as_raw());
        let err = mount_one(&config, &spec, uid, gid).unwrap_err();
        assert!(matches!(err, Error::Validation { .. }), "got: {err}");
    }
}
