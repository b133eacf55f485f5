//! `xsim`: interprets an already-elaborated design directly (§6).
//!
//! There is no front end in this tree — the external compiler's job
//! ends where ours begins — so the "input file" this binary reads is a
//! JSON-serialized [`xsim_ir::elab::Design`] rather than source text.

use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

use argh::FromArgs;

use xsim::configuration::{self, ColorConfig};
use xsim::dpi::DpiLoader;
use xsim::errors::{exit_code_for, XsimError, XsimResult};
use xsim::instance;
use xsim::logging::{self, warn, Logger};
use xsim::scheduler::Scheduler;
use xsim::vpi;
use xsim_ir::elab::Design;
use xsim_utils::HierPath;

#[derive(FromArgs)]
#[argh(help_triggers("-h", "--help"))]
/// Interprets an elaborated SystemVerilog-subset design.
pub struct Opts {
    /// path to the elaborated design (JSON), or stdin if omitted
    #[argh(positional)]
    pub file: Option<PathBuf>,

    /// select the top module when the design names more than one candidate
    #[argh(option, long = "top")]
    pub top: Option<String>,

    /// optimisation level 0-3 (recorded for parity; xsim interprets
    /// the IR directly, so this does not change codegen)
    #[argh(option, short = 'O', default = "0")]
    pub opt_level: u8,

    /// run the simulation immediately after elaboration
    #[argh(switch, short = 'R')]
    pub run: bool,

    /// compile with a 2-state value model instead of 4-state
    #[argh(switch, long = "two-state")]
    pub two_state: bool,

    /// load a shared object to satisfy `import "DPI-C"` declarations;
    /// repeatable
    #[argh(option, long = "sv-lib")]
    pub sv_lib: Vec<PathBuf>,

    /// load a VPI plugin (must export `vlog_startup_routines`); repeatable
    #[argh(option, long = "vpi-lib")]
    pub vpi_lib: Vec<PathBuf>,

    /// output binary name (unused by direct interpretation, kept so the
    /// flag still parses and round-trips for scripts that pass it)
    #[argh(option, short = 'o', default = "String::new()")]
    pub output_name: String,

    /// silence non-error logging
    #[argh(switch, short = 'q', long = "quiet")]
    pub quiet: bool,

    /// enable debug logging
    #[argh(switch, long = "debug-logging")]
    pub debug_logging: bool,

    /// configure color output (on | off | auto). default = on
    #[argh(option, long = "color", default = "ColorConfig::On")]
    pub color_conf: ColorConfig,
}

fn load_design(file: &Option<PathBuf>) -> XsimResult<Design> {
    let parsed = match file {
        Some(path) => serde_json::from_reader(BufReader::new(File::open(path)?)),
        None => serde_json::from_reader(std::io::stdin().lock()),
    };
    parsed.map_err(|e| XsimError::GenericError(e.to_string()).into())
}

/// Resolves which definition the top instance elaborates to (§6), given
/// `opts.top` and the design's own `top` field. Per §9's ambiguity note
/// (a): when multiple candidates exist and none matches `--top`, warn
/// and pick the first (lexicographically, for determinism) rather than
/// failing the run.
fn resolve_top(design: &mut Design, opts_top: &Option<String>, log: &Logger) -> XsimResult<()> {
    if let Some(top) = opts_top {
        if !design.bodies.contains_key(top) {
            return Err(XsimError::UnknownTopModule(top.clone()).into());
        }
        design.top = top.clone();
        return Ok(());
    }

    if !design.top.is_empty() {
        if !design.bodies.contains_key(&design.top) {
            return Err(XsimError::UnknownTopModule(design.top.clone()).into());
        }
        return Ok(());
    }

    // No `--top` and the design didn't name one: gather every body that
    // isn't some other body's child instance.
    let mut candidates: std::collections::BTreeSet<String> = design.bodies.keys().cloned().collect();
    for body in design.bodies.values() {
        for child in &body.child_instances {
            candidates.remove(&child.def_name);
        }
    }
    match candidates.len() {
        0 => Err(XsimError::NoInput.into()),
        1 => {
            design.top = candidates.into_iter().next().unwrap();
            Ok(())
        }
        _ => {
            let chosen = candidates.iter().next().cloned().unwrap();
            warn!(
                log,
                "multiple top-level candidates and no --top given; picking the first";
                "chosen" => &chosen, "candidates" => format!("{candidates:?}")
            );
            design.top = chosen;
            Ok(())
        }
    }
}

fn real_main() -> XsimResult<i32> {
    let opts: Opts = argh::from_env();

    let _config = configuration::Config::builder()
        .maybe_top(opts.top.clone())
        .opt_level(opts.opt_level)
        .two_state(opts.two_state)
        .output_name(opts.output_name.clone())
        .build();

    let runtime_config = configuration::RuntimeConfig::builder()
        .run_immediately(opts.run)
        .debug_logging(opts.debug_logging)
        .quiet(opts.quiet)
        .color_config(opts.color_conf)
        .sv_libs(opts.sv_lib.clone())
        .vpi_libs(opts.vpi_lib.clone())
        .build();

    let log = logging::initialize_logger(runtime_config.get_logging_config());

    vpi::init(std::env::args().collect());

    let mut lib_paths = runtime_config.sv_libs.clone();
    lib_paths.extend(runtime_config.vpi_libs.iter().cloned());
    let dpi = if lib_paths.is_empty() {
        None
    } else {
        let loader = DpiLoader::load(&lib_paths)?;
        for vpi_lib in &runtime_config.vpi_libs {
            loader.require_vpi_startup(&vpi_lib.display().to_string())?;
        }
        Some(loader)
    };

    let mut design = load_design(&opts.file)?;
    resolve_top(&mut design, &opts.top, &log)?;

    let top_module = xsim_ir::build_design(&design)?;

    let mut scheduler = Scheduler::new(dpi, Some(log));
    let top_name = top_module.name.clone();
    instance::instantiate(&mut scheduler, &top_module, HierPath::root(top_name));

    if runtime_config.run_immediately {
        scheduler.run_to_completion();
    }

    Ok(scheduler.finish_code().unwrap_or(0) as i32)
}

fn main() {
    match real_main() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("xsim: {err}");
            std::process::exit(exit_code_for(err.inner()) as i32);
        }
    }
}
