use std::os::fd::AsRawFd;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{ForkResult, Gid, Uid, dup2, fork, setresgid, setresuid};

use crate::error::Error;

/// Exit status a forked helper uses to report that it could not become the
/// job user. Helpers reserve 0/1 for their own answer.
pub const EXIT_PRIV_DROP_FAILED: i32 = 2;

/// How long the parent waits on a forked helper before giving up on it.
const HELPER_WAIT_RETRIES: u32 = 20;
const HELPER_WAIT_SLEEP: Duration = Duration::from_millis(500);

/// Irreversibly become `(uid, gid)`: real, effective and saved ids are all
/// replaced, group first so the group change still has the privilege to
/// succeed.
pub fn drop_privileges(uid: Uid, gid: Gid) -> Result<(), Errno> {
    setresgid(gid, gid, gid)?;
    setresuid(uid, uid, uid)?;
    Ok(())
}

/// Fork, become `(uid, gid)` in the child, run `f` there and return its exit
/// code from the parent.
///
/// The child's stdout/stderr are pointed at the null device; its only output
/// channel is the exit status. The parent polls with a bounded non-blocking
/// wait so a helper wedged on a hung filesystem cannot wedge the plug-in:
/// after the bound it is killed, reaped, and reported as a privilege error.
pub fn run_as_user<F>(uid: Uid, gid: Gid, f: F) -> Result<i32, Error>
where
    F: FnOnce() -> i32,
{
    match unsafe { fork() } {
        Err(errno) => Err(Error::Fork(errno)),
        Ok(ForkResult::Child) => {
            silence_stdio();
            let code = match drop_privileges(uid, gid) {
                Ok(()) => f(),
                Err(_) => EXIT_PRIV_DROP_FAILED,
            };
            std::process::exit(code);
        }
        Ok(ForkResult::Parent { child }) => {
            for _ in 0..HELPER_WAIT_RETRIES {
                match waitpid(child, Some(WaitPidFlag::WNOHANG)) {
                    Ok(WaitStatus::StillAlive) => std::thread::sleep(HELPER_WAIT_SLEEP),
                    Ok(WaitStatus::Exited(_, code)) => return Ok(code),
                    Ok(WaitStatus::Signaled(_, signal, _)) => {
                        return Err(Error::Privilege(format!("helper killed by {signal}")));
                    }
                    Ok(_) => std::thread::sleep(HELPER_WAIT_SLEEP),
                    Err(errno) => {
                        return Err(Error::Privilege(format!("waitpid on helper: {errno}")));
                    }
                }
            }
            let _ = kill(child, Signal::SIGKILL);
            let _ = waitpid(child, None);
            Err(Error::Privilege("helper timed out".to_string()))
        }
    }
}

fn silence_stdio() {
    if let Ok(devnull) = std::fs::OpenOptions::new().write(true).open("/dev/null") {
        let _ = dup2(devnull.as_raw_fd(), std::io::stdout().as_raw_fd());
        let _ = dup2(devnull.as_raw_fd(), std::io::stderr().as_raw_fd());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::{getegid, geteuid};

    #[test]
    fn helper_exit_code_comes_back() {
        let code = run_as_user(geteuid(), getegid(), || 7).unwrap();
        assert_eq!(code, 7);
    }

    #[test]
    fn helper_runs_with_requested_identity() {
        // Re-dropping to the current identity must succeed and report it.
        let uid = geteuid();
        let code = run_as_user(uid, getegid(), move || {
            if geteuid() == uid { 0 } else { 1 }
        })
        .unwrap();
        assert_eq!(code, 0);
    }

    #[test]
    fn drop_to_current_identity_succeeds() {
        assert!(drop_privileges(geteuid(), getegid()).is_ok());
    }
}
