use crate::cmd;
use crate::config::Config;
use crate::exit_codes;
use crate::format::{DoctorCheck, format_doctor_report};

/// Extract the first version-like token (`MAJOR.MINOR[.PATCH...]`) from `output`.
///
/// Strips a leading `v` and trailing punctuation before matching. Returns `None`
/// if no token with at least two dot-separated numeric parts is found.
pub fn parse_version_str(output: &str) -> Option<String> {
    for word in output.split_whitespace() {
        let w = word
            .trim_start_matches('v')
            .trim_end_matches([',', ';', '.'].as_slice());
        let parts: Vec<&str> = w.split('.').collect();
        if parts.len() >= 2
            && parts
                .iter()
                .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
        {
            return Some(w.to_string());
        }
    }
    None
}

fn which(prog: &str) -> bool {
    cmd::run_capture("which", &[prog])
        .map(|out| out.status == 0)
        .unwrap_or(false)
}

/// Probe one external tool: present, plus a version string if `--version`
/// yields one.
fn check_tool(label: &str, prog: &str, hint: &str) -> DoctorCheck {
    if !which(prog) {
        return DoctorCheck {
            name: format!("{label} installed"),
            passed: false,
            detail: Some(hint.to_string()),
        };
    }
    let version = cmd::run_capture(prog, &["--version"])
        .ok()
        .and_then(|out| parse_version_str(&out.stdout).or_else(|| parse_version_str(&out.stderr)));
    DoctorCheck {
        name: format!("{label} installed"),
        passed: true,
        detail: version,
    }
}

pub fn check_gcsfuse(config: &Config) -> DoctorCheck {
    check_tool(
        "gcsfuse",
        &config.gcsfuse_path,
        "install gcsfuse from the GCS release channel",
    )
}

pub fn check_fusermount(config: &Config) -> DoctorCheck {
    check_tool("fusermount", &config.fusermount_path, "install fuse")
}

pub fn check_umount(config: &Config) -> DoctorCheck {
    check_tool("umount", &config.umount_path, "install util-linux")
}

pub fn check_logger(config: &Config) -> DoctorCheck {
    check_tool("logger", &config.logger_path, "install util-linux")
}

/// Run all prerequisite checks and print the report.
///
/// Returns the exit code that `main` should pass to `std::process::exit`.
pub fn run_doctor(config: &Config) -> i32 {
    let checks = vec![
        check_gcsfuse(config),
        check_fusermount(config),
        check_umount(config),
        check_logger(config),
    ];
    println!("{}", format_doctor_report(&checks));
    if checks.iter().all(|c| c.passed) {
        exit_codes::SUCCESS
    } else {
        exit_codes::RUNTIME_ERROR
    }
}
