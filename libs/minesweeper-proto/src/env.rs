//! Environment variable plumbing between the judger and the three child
//! processes it launches. The judger sets these before `exec`; the game
//! server, player program, and nothing else read them back.

use std::os::unix::io::RawFd;

use crate::error::ShmError;

/// Read a required environment variable, failing loudly if it is unset.
///
/// There is no fallback-to-default here: every one of these variables is set
/// by the judger immediately before exec'ing its children, so a missing
/// variable means the process was not launched the way this harness expects.
pub fn required_env(name: &'static str) -> Result<String, ShmError> {
    std::env::var(name).map_err(|_| ShmError::MissingEnv(name))
}

/// Read a required environment variable and parse it as a raw file
/// descriptor number.
pub fn required_env_fd(name: &'static str) -> Result<RawFd, ShmError> {
    let value = required_env(name)?;
    value
        .parse::<RawFd>()
        .map_err(|_| ShmError::BadFdEnv { name, value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_env_is_reported_by_name() {
        let err = required_env("MINESWEEPER_DEFINITELY_NOT_SET_XYZ").unwrap_err();
        assert!(matches!(err, ShmError::MissingEnv(name) if name == "MINESWEEPER_DEFINITELY_NOT_SET_XYZ"));
    }

    #[test]
    fn bad_fd_value_is_reported_with_the_offending_string() {
        // SAFETY: test-only, single-threaded access to this specific var.
        unsafe {
            std::env::set_var("MINESWEEPER_TEST_FD_ENV", "not-a-number");
        }
        let err = required_env_fd("MINESWEEPER_TEST_FD_ENV").unwrap_err();
        assert!(matches!(
            err,
            ShmError::BadFdEnv { name, value }
                if name == "MINESWEEPER_TEST_FD_ENV" && value == "not-a-number"
        ));
        unsafe {
            std::env::remove_var("MINESWEEPER_TEST_FD_ENV");
        }
    }
}
