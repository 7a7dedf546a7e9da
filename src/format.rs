use crate::mount_spec::MountSpec;

/// Format the `parse` output table.
///
/// Returns `"No mount specs."` when `specs` is empty.
pub fn format_spec_table(specs: &[MountSpec]) -> String {
    if specs.is_empty() {
        return "No mount specs.".to_string();
    }
    let header = format!("{:<24} {:<32} {}", "BUCKET", "MOUNT_POINT", "FLAGS");
    let mut lines = vec![header];
    for spec in specs {
        let bucket = spec.bucket_label();
        let flags = spec.flags.as_deref().unwrap_or("(none)");
        lines.push(format!("{:<24} {:<32} {}", bucket, spec.mount_point, flags));
    }
    lines.join("\n")
}

/// A single prerequisite check result for `doctor`.
pub struct DoctorCheck {
    /// Short description of the check (e.g. `gcsfuse installed`).
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
    /// On pass: optional version string. On fail: optional fix hint.
    pub detail: Option<String>,
}

/// Format the full `doctor` report.
pub fn format_doctor_report(checks: &[DoctorCheck]) -> String {
    let mut lines = vec!["Checking prerequisites...".to_string()];
    let all_passed = !checks.is_empty() && checks.iter().all(|c| c.passed);

    for check in checks {
        if check.passed {
            let detail = check
                .detail
                .as_deref()
                .map(|d| format!(" ({})", d))
                .unwrap_or_default();
            lines.push(format!("  \u{2713} {}{}", check.name, detail));
        } else {
            lines.push(format!("  \u{2717} {}", check.name));
            if let Some(fix) = &check.detail {
                lines.push(format!("    Fix: {}", fix));
            }
        }
    }

    if all_passed {
        lines.push(String::new());
        lines.push("All checks passed.".to_string());
    }
    lines.join("\n")
}
