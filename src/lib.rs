//! Workload-manager plug-in core that mounts GCS buckets with `gcsfuse` for
//! the lifetime of a batch job step.
//!
//! The lifecycle is four callbacks driven by the host scheduler:
//! [`Plugin::init`] registers the `--gcsfuse-mount` option on the submission
//! side; [`Plugin::option_callback`] resolves, conflict-checks and
//! accumulates each occurrence into the `GCSFUSE_MOUNTS` job environment
//! variable; on the execution node [`Plugin::user_init`] establishes one
//! FUSE mount per spec under the job user's identity; [`Plugin::exit`] tears
//! them down again (graceful unmount, daemon kill, lazy detach for hung
//! endpoints).
//!
//! The `gcsfuse-spank` binary wraps the same building blocks as an operator
//! debugging tool.

pub mod cli;
pub mod cmd;
pub mod config;
pub mod conflict;
pub mod doctor;
pub mod error;
pub mod exit_codes;
pub mod format;
pub mod host;
pub mod mount;
pub mod mount_spec;
pub mod mountpoint;
pub mod plugin;
pub mod privdrop;
pub mod resolve;
pub mod session;

pub use config::Config;
pub use error::Error;
pub use host::{Context, Host, ProcessHost};
pub use mount_spec::MountSpec;
pub use plugin::{MOUNT_OPTION, MOUNTS_ENV_VAR, Plugin};
