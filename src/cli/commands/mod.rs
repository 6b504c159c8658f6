//! CLI command implementations
//!
//! Every command returns the process exit code:
//! 0 success, 1 completed with dropped entries or failed loads,
//! 2 configuration error, 4 collaborator connection error, 5 fatal error,
//! 130 interrupted.

pub mod count;
pub mod init;
pub mod run;
pub mod validate;

/// Exit codes shared by the commands
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const PARTIAL: i32 = 1;
    pub const CONFIGURATION: i32 = 2;
    pub const CONNECTION: i32 = 4;
    pub const FATAL: i32 = 5;
    pub const INTERRUPTED: i32 = 130;
}
