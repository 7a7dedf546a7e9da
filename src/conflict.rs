use crate::error::Error;
use crate::mount_spec::MountSpec;

/// Refuse any candidate spec that binds a different bucket to a mount point
/// already claimed in `current`.
///
/// Absent and explicit-empty buckets both mean all-buckets mode but are
/// textually distinct forms; each is equal only to itself, so `/m` and `:/m`
/// conflict rather than silently merging. Exact re-additions (same bucket and
/// mount point) are allowed — the idempotence probe makes the duplicate
/// harmless at mount time.
pub fn check_mount_conflicts(current: &str, candidate: &str) -> Result<(), Error> {
    if current.is_empty() || candidate.is_empty() {
        return Ok(());
    }

    let claimed: Vec<MountSpec> = current
        .split(';')
        .filter_map(|token| match MountSpec::parse(token) {
            Ok(spec) => Some(spec),
            Err(err) => {
                // A corrupt accumulator token cannot claim a mount point.
                log::warn!("gcsfuse-mount: ignoring unparseable accumulator entry: {err}");
                None
            }
        })
        .collect();

    for token in candidate.split(';') {
        let new = MountSpec::parse(token)?;
        for old in &claimed {
            if old.mount_point == new.mount_point && old.bucket != new.bucket {
                return Err(Error::Conflict {
                    mount_point: new.mount_point.clone(),
                    existing: old.bucket_label().to_string(),
                    requested: new.bucket_label().to_string(),
                });
            }
        }
    }
    Ok(())
}
