use std::path::Path;

use crate::error::Error;
use crate::mount_spec::MountSpec;

/// Rewrite every relative mount point in a `;`-delimited mount list to an
/// absolute path under `cwd`, preserving bucket and flags layout.
///
/// When `cwd` is `None` the process working directory is used; that is only
/// meaningful on the submission side, where the process runs in the directory
/// the user submitted from. Failure to obtain it is a hard error.
///
/// Empty input yields the empty string. Any token that does not parse rejects
/// the whole list — the accumulator must only ever receive valid specs.
pub fn resolve_mount_list(list: &str, cwd: Option<&Path>) -> Result<String, Error> {
    if list.is_empty() {
        return Ok(String::new());
    }

    let cwd_buf;
    let cwd = match cwd {
        Some(dir) => dir,
        None => {
            cwd_buf = std::env::current_dir()?;
            cwd_buf.as_path()
        }
    };
    let cwd = cwd.to_string_lossy();

    let mut resolved = Vec::new();
    for token in list.split(';') {
        let mut spec = MountSpec::parse(token)?;
        if !spec.mount_point.starts_with('/') {
            let rel = spec
                .mount_point
                .strip_prefix("./")
                .unwrap_or(&spec.mount_point);
            spec.mount_point = format!("{cwd}/{rel}");
        }
        resolved.push(spec.to_token());
    }
    Ok(resolved.join(";"))
}
