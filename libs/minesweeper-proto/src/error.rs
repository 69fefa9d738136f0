use std::io;

/// Errors from the shared-memory / environment plumbing layer.
///
/// These are all "OS-level failure" or "bug" category errors per the harness's
/// error taxonomy: callers are expected to propagate them with `anyhow::Context`
/// and treat them as fatal, not to recover from them.
#[derive(Debug, thiserror::Error)]
pub enum ShmError {
    #[error("required environment variable `{0}` is not set")]
    MissingEnv(&'static str),

    #[error("environment variable `{name}` has a value that is not a valid fd: `{value}`")]
    BadFdEnv { name: &'static str, value: String },

    #[error("shm_open failed: {0}")]
    ShmOpen(#[source] io::Error),

    #[error("ftruncate failed: {0}")]
    Ftruncate(#[source] io::Error),

    #[error("mmap failed: {0}")]
    Mmap(#[source] io::Error),

    #[error("futex syscall failed: {0}")]
    Futex(#[source] io::Error),
}
