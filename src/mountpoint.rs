use std::os::unix::fs::MetadataExt;
use std::path::Path;

use nix::unistd::{Gid, Uid};

use crate::error::Error;
use crate::privdrop;

/// Return `true` if `path` is currently a filesystem boundary.
///
/// A stat failure with "transport endpoint is not connected" means the path
/// is a FUSE mount whose daemon has died; that counts as mounted so teardown
/// will still attempt the unmount cascade. Otherwise the usual device/inode
/// comparison against `path/..` decides.
pub fn is_mountpoint(path: &Path) -> bool {
    let md = match std::fs::metadata(path) {
        Ok(md) => md,
        Err(e) => return e.raw_os_error() == Some(libc::ENOTCONN),
    };
    if !md.is_dir() {
        return false;
    }
    if path == Path::new("/") {
        return true;
    }
    let parent = match std::fs::metadata(path.join("..")) {
        Ok(md) => md,
        Err(_) => return false,
    };
    // Different device: boundary. Same inode as the parent: the degenerate
    // root-of-filesystem case.
    md.dev() != parent.dev() || md.ino() == parent.ino()
}

/// [`is_mountpoint`] evaluated with the job user's identity.
///
/// Runs the probe in a fork that drops group then user ids to `(uid, gid)`
/// and reports through its exit status, so the answer reflects the
/// permissions the job user actually has on `path`.
pub fn is_mountpoint_as_user(path: &Path, uid: Uid, gid: Gid) -> Result<bool, Error> {
    let path = path.to_path_buf();
    match privdrop::run_as_user(uid, gid, move || {
        if is_mountpoint(&path) { 0 } else { 1 }
    })? {
        0 => Ok(true),
        1 => Ok(false),
        privdrop::EXIT_PRIV_DROP_FAILED => Err(Error::Privilege(format!(
            "could not probe as uid {uid} gid {gid}"
        ))),
        other => Err(Error::Privilege(format!(
            "mountpoint probe helper exited with status {other}"
        ))),
    }
}
