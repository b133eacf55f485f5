//! DPI import resolution (§6 "DPI resolution"): `dlopen` every
//! `--sv-lib`/`--vpi-lib` path up front, then `dlsym` each declared
//! import against them in order, succeeding on the first match.

use std::path::PathBuf;

use libloading::{Library, Symbol};

use crate::errors::{XsimError, XsimResult};

/// The shared objects loaded for one simulation run. Held for the
/// lifetime of the `Scheduler` so resolved symbols stay valid.
pub struct DpiLoader {
    libraries: Vec<Library>,
}

impl DpiLoader {
    pub fn load(paths: &[PathBuf]) -> XsimResult<Self> {
        let mut libraries = Vec::with_capacity(paths.len());
        for path in paths {
            // SAFETY: `--sv-lib`/`--vpi-lib` name externally supplied
            // shared objects whose static initializers run on load —
            // the caller opts into that by passing the flag at all.
            let lib = unsafe { Library::new(path) }?;
            libraries.push(lib);
        }
        Ok(Self { libraries })
    }

    /// Resolves `symbol` against every loaded library in order.
    pub fn resolve_raw(&self, symbol: &str) -> Option<*const ()> {
        for lib in &self.libraries {
            // SAFETY: looked up by name only; the returned address is
            // handed back to the interpreter's DPI call path, which
            // checks it against the import's declared signature before
            // ever calling through it.
            let sym: Result<Symbol<'_, *const ()>, _> =
                unsafe { lib.get(symbol.as_bytes()) };
            if let Ok(sym) = sym {
                return Some(*sym);
            }
        }
        None
    }

    pub fn resolve(&self, symbol: &str) -> XsimResult<*const ()> {
        self.resolve_raw(symbol).ok_or_else(|| {
            XsimError::DpiResolutionFailed {
                symbol: symbol.to_string(),
            }
            .into()
        })
    }

    /// VPI libraries must additionally export `vlog_startup_routines`
    /// (§6).
    pub fn require_vpi_startup(&self, lib_name: &str) -> XsimResult<()> {
        if self.resolve_raw("vlog_startup_routines").is_some() {
            Ok(())
        } else {
            Err(XsimError::VpiMissingStartupRoutine(lib_name.to_string()).into())
        }
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }
}
