/// Exit code: success. For `probe`: the path is a mountpoint.
pub const SUCCESS: i32 = 0;

/// Exit code: runtime error (probe says not mounted, prerequisite missing, etc.).
pub const RUNTIME_ERROR: i32 = 1;

/// Exit code: usage / input error (malformed mount list, conflict, bad cwd).
pub const USAGE_ERROR: i32 = 2;
