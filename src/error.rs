use std::path::PathBuf;

use thiserror::Error;

/// Failure kinds surfaced by the plug-in.
///
/// Submission-side callers (the option callback) treat `Parse` and `Conflict`
/// as "refuse this option"; execution-side callers record per-mount errors and
/// keep going, so a single bad spec never blocks its siblings.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid mount spec '{token}': {reason}")]
    Parse { token: String, reason: String },

    #[error(
        "mount point '{mount_point}' is already assigned to bucket '{existing}'; \
         cannot mount bucket '{requested}'"
    )]
    Conflict {
        mount_point: String,
        existing: String,
        requested: String,
    },

    #[error("mount target {} rejected: {reason}", .path.display())]
    Validation { path: PathBuf, reason: String },

    #[error("privilege drop failed: {0}")]
    Privilege(String),

    #[error("fork failed: {0}")]
    Fork(nix::errno::Errno),

    #[error("failed to run {program}: {detail}")]
    Exec { program: String, detail: String },

    #[error("timed out waiting for {} to become a mountpoint ({waited_secs}s)", .mount_point.display())]
    MountTimeout {
        mount_point: PathBuf,
        waited_secs: u64,
    },

    #[error("failed to unmount {}: {detail}", .mount_point.display())]
    Unmount {
        mount_point: PathBuf,
        detail: String,
    },

    #[error("invalid plugin argument '{arg}': {reason}")]
    Config { arg: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
