//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// Success - operation completed without errors
#[allow(dead_code)]
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Validation error - released charts modified or repository checks failed
pub const VALIDATION_ERROR: i32 = 2;

/// Reconcile error - fetching or integrating upstream charts failed
pub const RECONCILE_ERROR: i32 = 3;

/// Package error - invalid upstream.yaml or configuration.yaml
pub const PACKAGE_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Usage error - invalid arguments or options (following sysexits.h convention)
pub const USAGE_ERROR: i32 = 64;
