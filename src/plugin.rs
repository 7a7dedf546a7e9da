use crate::config::Config;
use crate::conflict::check_mount_conflicts;
use crate::error::Error;
use crate::host::{Context, Host, OptionSpec};
use crate::mount;
use crate::mount_spec::MountSpec;
use crate::resolve::resolve_mount_list;
use crate::session::SessionMountTable;

/// The environment variable carrying the resolved, conflict-checked mount
/// list from the submission environment to the execution nodes. The only
/// cross-phase state the plug-in has.
pub const MOUNTS_ENV_VAR: &str = "GCSFUSE_MOUNTS";

/// The option the plug-in registers on the submission side.
pub const MOUNT_OPTION: OptionSpec = OptionSpec {
    name: "gcsfuse-mount",
    arginfo: "[BUCKET]:MOUNT_POINT[:FLAGS][;...]",
    usage: "Mount GCS buckets with gcsfuse for the duration of the job step",
};

/// The plug-in: one instance per step per process image.
///
/// The host owns the calling convention; this struct owns all state, so the
/// lifecycle is plain Rust and a test can drive it with any [`Host`].
pub struct Plugin {
    config: Config,
    session: SessionMountTable,
}

impl Plugin {
    pub fn new(config: Config) -> Plugin {
        Plugin {
            config,
            session: SessionMountTable::default(),
        }
    }

    /// Build from the host-supplied `key=value` plug-in arguments.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Plugin, Error> {
        Ok(Plugin::new(Config::from_args(args)?))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Number of mounts currently awaiting teardown.
    pub fn active_mounts(&self) -> usize {
        self.session.len()
    }

    /// Load-time callback: expose the mount option where steps are submitted.
    pub fn init(&mut self, host: &mut dyn Host) -> Result<(), Error> {
        if host.context().is_submission_side() {
            host.register_option(&MOUNT_OPTION)?;
        }
        Ok(())
    }

    /// One `--gcsfuse-mount=LIST` occurrence.
    ///
    /// Resolves relative mount points against the submitting directory,
    /// refuses conflicting additions, and appends to the accumulator. The
    /// execution side never writes the accumulator, so a remote replay of
    /// the option is a no-op.
    pub fn option_callback(
        &mut self,
        host: &mut dyn Host,
        arg: &str,
        remote: bool,
    ) -> Result<(), Error> {
        if remote {
            return Ok(());
        }
        let resolved = resolve_mount_list(arg, None)?;
        if resolved.is_empty() {
            return Ok(());
        }
        let current = host.getenv(MOUNTS_ENV_VAR).unwrap_or_default();
        check_mount_conflicts(&current, &resolved)?;
        let merged = if current.is_empty() {
            resolved
        } else {
            format!("{current};{resolved}")
        };
        host.setenv(MOUNTS_ENV_VAR, &merged)
    }

    /// Execution-side callback, before the user task starts: establish every
    /// mount in the accumulator, in list order.
    ///
    /// Best-effort across the list — a failed spec never blocks its siblings
    /// — but any failure makes the whole callback fail so the host refuses
    /// to start the task on a half-provisioned node. Whatever did mount is
    /// recorded for teardown either way.
    pub fn user_init(&mut self, host: &mut dyn Host) -> Result<(), Error> {
        if host.context() != Context::Remote {
            return Ok(());
        }
        let Some(list) = host.getenv(MOUNTS_ENV_VAR) else {
            return Ok(());
        };
        if list.is_empty() {
            return Ok(());
        }
        let (uid, gid) = host.job_user()?;

        let mut first_error = None;
        for token in list.split(';') {
            let spec = match MountSpec::parse(token) {
                Ok(spec) => spec,
                Err(e) => {
                    log::warn!("gcsfuse-mount: skipping unparseable entry: {e}");
                    continue;
                }
            };
            match mount::mount_one(&self.config, &spec, uid, gid) {
                Ok(Some(record)) => self.session.push(record),
                Ok(None) => {}
                Err(e) => {
                    log::error!("gcsfuse-mount: mount of {} failed: {e}", spec.mount_point);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    /// Execution-side callback at step end: unwind the session table.
    /// Teardown problems are logged, never returned — the step is over and
    /// the host cannot act on them anyway.
    pub fn exit(&mut self, host: &mut dyn Host) -> Result<(), Error> {
        if host.context() != Context::Remote {
            return Ok(());
        }
        self.session.teardown(&self.config);
        Ok(())
    }
}
