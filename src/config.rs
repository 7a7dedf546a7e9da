use std::time::Duration;

use crate::error::Error;

/// Plug-in configuration, overridable through `key=value` arguments on the
/// host's plug-in stack line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// The FUSE daemon binary.
    pub gcsfuse_path: String,
    /// The user-space FUSE unmount tool, invoked as `<tool> -u <path>`.
    pub fusermount_path: String,
    /// The system unmount tool, invoked as `<tool> -l <path>`.
    pub umount_path: String,
    /// The syslog forwarder the daemon's stdout/stderr are piped into.
    pub logger_path: String,
    /// Tag the forwarder stamps on every daemon line.
    pub logger_tag: String,
    /// Readiness poll iterations before a mount is declared dead.
    pub mount_wait_retries: u32,
    /// Sleep between readiness polls.
    pub mount_wait_sleep: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            gcsfuse_path: "gcsfuse".to_string(),
            fusermount_path: "fusermount".to_string(),
            umount_path: "umount".to_string(),
            logger_path: "logger".to_string(),
            logger_tag: "gcsfuse_mount".to_string(),
            mount_wait_retries: 60,
            mount_wait_sleep: Duration::from_millis(500),
        }
    }
}

impl Config {
    /// Parse the host-supplied plug-in arguments.
    ///
    /// Unknown keys and malformed values are refused: a typo in the plug-in
    /// stack should fail loudly at load time, not silently mount with
    /// defaults.
    pub fn from_args<S: AsRef<str>>(args: &[S]) -> Result<Config, Error> {
        let mut config = Config::default();
        for arg in args {
            let arg = arg.as_ref();
            let Some((key, value)) = arg.split_once('=') else {
                return Err(Error::Config {
                    arg: arg.to_string(),
                    reason: "expected key=value".to_string(),
                });
            };
            match key {
                "gcsfuse_path" => config.gcsfuse_path = value.to_string(),
                "fusermount_path" => config.fusermount_path = value.to_string(),
                "umount_path" => config.umount_path = value.to_string(),
                "logger_path" => config.logger_path = value.to_string(),
                "logger_tag" => config.logger_tag = value.to_string(),
                "mount_wait_retries" => config.mount_wait_retries = parse_number(arg, value)?,
                "mount_wait_sleep_ms" => {
                    config.mount_wait_sleep = Duration::from_millis(parse_number(arg, value)?);
                }
                _ => {
                    return Err(Error::Config {
                        arg: arg.to_string(),
                        reason: format!("unknown key '{key}'"),
                    });
                }
            }
        }
        Ok(config)
    }

    /// Total readiness timeout, for diagnostics.
    pub fn mount_wait_total(&self) -> Duration {
        self.mount_wait_sleep * self.mount_wait_retries
    }
}

fn parse_number<T: std::str::FromStr>(arg: &str, value: &str) -> Result<T, Error> {
    value.parse().map_err(|_| Error::Config {
        arg: arg.to_string(),
        reason: format!("'{value}' is not a valid number"),
    })
}
