use serde::Serialize;

use crate::error::Error;

/// One parsed `[BUCKET:]MOUNT_POINT[:FLAGS]` token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MountSpec {
    /// `None`: no bucket given (implicit all-buckets mode).
    /// `Some("")`: explicit all-buckets mode (`:/mnt` form).
    /// `Some(name)`: a single named bucket.
    pub bucket: Option<String>,
    /// Target path. Never empty; may still be relative before resolution.
    pub mount_point: String,
    /// Extra daemon options, passed through verbatim (not tokenized here).
    pub flags: Option<String>,
}

impl MountSpec {
    /// Parse one mount token.
    ///
    /// The first segment is a path (not a bucket) when it contains `/` before
    /// the first `:` — bucket names cannot legally contain `/`, so ambiguity
    /// resolves in favor of the path reading.
    ///
    /// An empty mount point is a parse failure.
    pub fn parse(token: &str) -> Result<MountSpec, Error> {
        let (bucket, rest) = match token.find(':') {
            None => (None, token),
            Some(c) => {
                let first = &token[..c];
                if first.contains('/') {
                    // Path first: everything after the first colon is flags.
                    (None, token)
                } else if first.is_empty() {
                    (Some(String::new()), &token[c + 1..])
                } else {
                    (Some(first.to_string()), &token[c + 1..])
                }
            }
        };

        let (mount_point, flags) = match rest.split_once(':') {
            Some((mp, fl)) => (mp, Some(fl.to_string())),
            None => (rest, None),
        };

        if mount_point.is_empty() {
            return Err(Error::Parse {
                token: token.to_string(),
                reason: "empty mount point".to_string(),
            });
        }

        Ok(MountSpec {
            bucket,
            mount_point: mount_point.to_string(),
            flags,
        })
    }

    /// Serialize back to token form. Inverse of [`MountSpec::parse`]: the
    /// absent-bucket and explicit-all-buckets forms stay textually distinct.
    pub fn to_token(&self) -> String {
        let mut out = String::new();
        if let Some(bucket) = &self.bucket {
            out.push_str(bucket);
            out.push(':');
        }
        out.push_str(&self.mount_point);
        if let Some(flags) = &self.flags {
            out.push(':');
            out.push_str(flags);
        }
        out
    }

    /// True when the daemon should be invoked without a bucket argument and
    /// surface every accessible bucket under the mount point.
    pub fn is_all_buckets(&self) -> bool {
        match &self.bucket {
            None => true,
            Some(bucket) => bucket.is_empty(),
        }
    }

    /// Bucket name for diagnostics.
    pub fn bucket_label(&self) -> &str {
        match &self.bucket {
            Some(bucket) if !bucket.is_empty() => bucket,
            _ => "(all buckets)",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(token: &str) -> MountSpec {
        MountSpec::parse(token).unwrap()
    }

    // --- disambiguation ---

    #[test]
    fn bucket_and_mount_point() {
        let spec = parse("mybucket:/mnt/gcs");
        assert_eq!(spec.bucket.as_deref(), Some("mybucket"));
        assert_eq!(spec.mount_point, "/mnt/gcs");
        assert_eq!(spec.flags, None);
    }

    #[test]
    fn bucket_mount_point_and_flags() {
        let spec = parse("mybucket:/mnt/gcs:--implicit-dirs");
        assert_eq!(spec.bucket.as_deref(), Some("mybucket"));
        assert_eq!(spec.mount_point, "/mnt/gcs");
        assert_eq!(spec.flags.as_deref(), Some("--implicit-dirs"));
    }

    #[test]
    fn explicit_all_buckets() {
        let spec = parse(":/mnt/gcs");
        assert_eq!(spec.bucket.as_deref(), Some(""));
        assert_eq!(spec.mount_point, "/mnt/gcs");
        assert!(spec.is_all_buckets());
    }

    #[test]
    fn implicit_all_buckets() {
        let spec = parse("/mnt/gcs");
        assert_eq!(spec.bucket, None);
        assert_eq!(spec.mount_point, "/mnt/gcs");
        assert!(spec.is_all_buckets());
    }

    #[test]
    fn bare_relative_path() {
        let spec = parse("rel");
        assert_eq!(spec.bucket, None);
        assert_eq!(spec.mount_point, "rel");
    }

    #[test]
    fn path_before_first_colon_is_not_a_bucket() {
        // First segment contains '/', so the whole of it is the mount point
        // and everything after the first colon is flags.
        let spec = parse("a/b:/m");
        assert_eq!(spec.bucket, None);
        assert_eq!(spec.mount_point, "a/b");
        assert_eq!(spec.flags.as_deref(), Some("/m"));
    }

    #[test]
    fn absolute_path_with_flags() {
        let spec = parse("/mnt/gcs:-o ro");
        assert_eq!(spec.bucket, None);
        assert_eq!(spec.mount_point, "/mnt/gcs");
        assert_eq!(spec.flags.as_deref(), Some("-o ro"));
    }

    #[test]
    fn named_bucket_is_not_all_buckets() {
        assert!(!parse("b:/m").is_all_buckets());
    }

    // --- flags are opaque ---

    #[test]
    fn flags_whitespace_preserved_verbatim() {
        let spec = parse("b:/m:-o ro  --implicit-dirs");
        assert_eq!(spec.flags.as_deref(), Some("-o ro  --implicit-dirs"));
    }

    #[test]
    fn flags_may_contain_further_colons() {
        // Only the first two colons structure the token.
        let spec = parse("b:/m:--key-file=/etc/k:v");
        assert_eq!(spec.flags.as_deref(), Some("--key-file=/etc/k:v"));
    }

    #[test]
    fn trailing_colon_yields_empty_flags() {
        let spec = parse("b:/m:");
        assert_eq!(spec.flags.as_deref(), Some(""));
    }

    // --- parse failures ---

    #[test]
    fn empty_token_is_err() {
        assert!(MountSpec::parse("").is_err());
    }

    #[test]
    fn bucket_with_empty_mount_point_is_err() {
        assert!(MountSpec::parse("b:").is_err());
        assert!(MountSpec::parse("b::").is_err());
    }

    #[test]
    fn lone_colon_is_err() {
        assert!(MountSpec::parse(":").is_err());
    }

    #[test]
    fn parse_error_mentions_token() {
        let err = MountSpec::parse("b::-o ro").unwrap_err();
        assert!(err.to_string().contains("b::-o ro"), "got: {err}");
    }

    // --- round trips ---

    #[test]
    fn round_trip_named_bucket() {
        for token in ["b:/m", "b:/m:-o ro", "b:/m:"] {
            assert_eq!(parse(token).to_token(), token);
        }
    }

    #[test]
    fn round_trip_keeps_absent_and_empty_bucket_distinct() {
        assert_eq!(parse("/m").to_token(), "/m");
        assert_eq!(parse(":/m").to_token(), ":/m");
        assert_ne!(parse("/m"), parse(":/m"));
    }

    #[test]
    fn round_trip_path_with_flags() {
        assert_eq!(parse("a/b:/m").to_token(), "a/b:/m");
    }
}
