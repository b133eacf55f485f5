//! Runtime/CLI error types, following the `BoxedCiderError`/`CiderError`
//! shape (`cider/src/errors.rs`): a thin boxed wrapper keeps `Result`s
//! small while the enum behind it grows one variant per failure class
//! in the error taxonomy (§7).

use thiserror::Error;

/// A `Result` alias for fallible runtime/CLI operations.
pub type XsimResult<T> = Result<T, BoxedXsimError>;

/// A wrapper type for [`XsimError`], kept small so `Result<T,
/// BoxedXsimError>` doesn't inflate every call site that can fail.
pub struct BoxedXsimError(Box<XsimError>);

impl BoxedXsimError {
    pub fn inner(&self) -> &XsimError {
        &self.0
    }
}

impl std::fmt::Display for BoxedXsimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&*self.0, f)
    }
}

impl std::fmt::Debug for BoxedXsimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

impl std::error::Error for BoxedXsimError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

impl std::ops::Deref for BoxedXsimError {
    type Target = XsimError;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> From<T> for BoxedXsimError
where
    T: Into<XsimError>,
{
    fn from(e: T) -> Self {
        Self(Box::new(T::into(e)))
    }
}

/// The error taxonomy of §7, minus `$finish` (a controlled termination,
/// never an error) and minus the user syntax/semantics category (owned
/// by the external front end, collected by `xsim_utils::DiagnosticEngine`
/// rather than raised as a `Result`).
#[derive(Error)]
pub enum XsimError {
    /// Elaboration failure (§7): combinational loop, unsupported port
    /// direction, `BothEdges` in an FF, non-named event expression.
    #[error(transparent)]
    Elaboration(#[from] xsim_utils::Diag),

    /// No `--top` given and more than one candidate top module exists.
    #[error("ambiguous top module; candidates: {0:?}")]
    AmbiguousTopModule(Vec<String>),

    /// `--top NAME` named a module that doesn't exist in the design.
    #[error("unknown top module `{0}`")]
    UnknownTopModule(String),

    /// No input file given on the command line.
    #[error("no input file given")]
    NoInput,

    /// A `--sv-lib`/`--vpi-lib` path could not be opened.
    #[error(transparent)]
    Loading(#[from] libloading::Error),

    /// None of the configured DPI libraries export the requested symbol.
    #[error("could not resolve DPI import `{symbol}` in any configured library")]
    DpiResolutionFailed { symbol: String },

    /// A `--vpi-lib` library is missing the required entry point.
    #[error("VPI library `{0}` does not export `vlog_startup_routines`")]
    VpiMissingStartupRoutine(String),

    /// Runtime failure (§7): an unhandled error on a worker is fatal
    /// and aborts the whole simulation.
    #[error("simulation aborted: {0}")]
    RuntimeFailure(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    GenericError(String),
}

// Mirrors `CiderError`'s `Debug` impl: makes `fn main() -> XsimResult<()>`
// print something readable instead of the derived struct dump.
impl std::fmt::Debug for XsimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(self, f)
    }
}

/// Maps a failure onto the exit-code contract of §6/§7:
/// 0 success, 1 diagnostics errors, 2 input-file errors, 3 no input,
/// 4 internal error, 5 unexpected exception.
pub fn exit_code_for(err: &XsimError) -> u8 {
    match err {
        XsimError::Elaboration(_) => 1,
        XsimError::AmbiguousTopModule(_) | XsimError::UnknownTopModule(_) => 1,
        XsimError::NoInput => 3,
        XsimError::Io(_) | XsimError::Loading(_) => 2,
        XsimError::DpiResolutionFailed { .. } | XsimError::VpiMissingStartupRoutine(_) => 2,
        XsimError::RuntimeFailure(_) => 4,
        XsimError::GenericError(_) => 5,
    }
}
