mod gwinit;

pub use gwinit::GwInitError;

/// Coarse classification used by callers deciding how loudly to fail.
///
/// Nothing except `Config` is fatal to the process: every other failure means
/// "try again on the next restart".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Gateway unreachable or too slow.
    Transport,
    /// Gateway answered with an unexpected status or payload.
    Protocol,
    /// Bad or missing input: module packages, backups, driver mapping.
    Data,
    /// Statement failure in the embedded database.
    Database,
    /// Startup configuration.
    Config,
    /// Local filesystem or child-process failure.
    Io,
}
