//! Stable exit codes for repair CLI commands.

/// Command succeeded; for `run` and `check`, the acceptance test passed.
pub const OK: i32 = 0;
/// Invalid config, missing case files, or any other setup error.
pub const ERROR: i32 = 1;
/// The run finished without a passing acceptance test, or `exec` failed.
pub const INCOMPLETE: i32 = 2;
