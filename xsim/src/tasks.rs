//! Display/file/assert runtime helpers (§4.6).
//!
//! `$display`'s two preprocessing passes (`%m` substitution, `%t` →
//! `%d` rewriting) and the printf-style formatter they feed into; the
//! 32-bit file-handle table `$fopen`/`$fclose`/`$fwrite` address into;
//! and assertion-failure reporting.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write as _;

use xsim_ir::Value;
use xsim_utils::HierPath;

/// Standard output, per §4.6's file-descriptor convention.
pub const STDOUT_HANDLE: u32 = 1;
/// Standard error, per the same convention.
pub const STDERR_HANDLE: u32 = 2;
/// User file descriptors are distinguished from the two standard
/// streams by having the high bit set (§4.6).
const USER_HANDLE_BIT: u32 = 1 << 31;

/// The open `$fopen` handles for one simulation run. Per-handle writes
/// are naturally serialized here since the scheduler drives everything
/// from one cooperative loop (§5's per-handle-mutex requirement
/// collapses to nothing needing a lock in that model — see `DESIGN.md`).
#[derive(Debug, Default)]
pub struct FileTable {
    files: HashMap<u32, File>,
    next_slot: u32,
}

impl FileTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// `$fopen(path, mode)`. Maps `r/w/a/+` to `OpenOptions` flags and
    /// returns a handle with the high bit set, or `0` (the LRM's "null
    /// descriptor") if the open fails.
    pub fn fopen(&mut self, path: &str, mode: &str) -> u32 {
        let mut opts = OpenOptions::new();
        match mode {
            "r" => {
                opts.read(true);
            }
            "a" | "a+" => {
                opts.append(true).create(true).read(mode == "a+");
            }
            "r+" | "+" => {
                opts.read(true).write(true).create(true);
            }
            // "w"/"w+" and anything unrecognized default to truncating write.
            _ => {
                opts.write(true).create(true).truncate(true);
            }
        }
        match opts.open(path) {
            Ok(file) => {
                let slot = self.next_slot;
                self.next_slot += 1;
                let handle = USER_HANDLE_BIT | slot;
                self.files.insert(handle, file);
                handle
            }
            Err(_) => 0,
        }
    }

    /// `$fclose`: flushes and erases the handle. Closing an
    /// already-closed or unknown handle is a no-op.
    pub fn fclose(&mut self, handle: u32) {
        if let Some(mut file) = self.files.remove(&handle) {
            let _ = file.flush();
        }
    }

    /// Writes `text` to `handle`, routing 1/2 to stdout/stderr and
    /// anything else through the open-file table.
    pub fn write(&mut self, handle: u32, text: &str) {
        match handle {
            STDOUT_HANDLE => {
                print!("{text}");
                let _ = std::io::stdout().flush();
            }
            STDERR_HANDLE => {
                eprint!("{text}");
            }
            _ => {
                if let Some(file) = self.files.get_mut(&handle) {
                    let _ = file.write_all(text.as_bytes());
                }
            }
        }
    }
}

/// Runs `$display`/`$write`/`$fdisplay`'s two preprocessing passes over
/// `fmt` (`%m` → `hier_path`, `%t` → `%d`), then consumes `args` in
/// order against the remaining format specifiers. `\n`/`\t` escapes are
/// retained (resolved to their literal meaning, per §4.6).
pub fn format_display(fmt: &str, args: &[Value], hier_path: &HierPath) -> String {
    let fmt = fmt.replace("%m", &hier_path.to_string());
    let fmt = fmt.replace("%t", "%d");

    let mut out = String::with_capacity(fmt.len());
    let mut args = args.iter();
    let mut chars = fmt.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.peek() {
                Some('n') => {
                    chars.next();
                    out.push('\n');
                }
                Some('t') => {
                    chars.next();
                    out.push('\t');
                }
                Some('\\') => {
                    chars.next();
                    out.push('\\');
                }
                _ => out.push('\\'),
            },
            '%' => match chars.next() {
                Some('%') => out.push('%'),
                Some('d' | 'D') => out.push_str(&args.next().map(format_decimal).unwrap_or_default()),
                Some('h' | 'H' | 'x' | 'X') => {
                    out.push_str(&args.next().map(format_hex).unwrap_or_default())
                }
                Some('b' | 'B') => out.push_str(&args.next().map(format_binary).unwrap_or_default()),
                Some('o' | 'O') => out.push_str(&args.next().map(format_octal).unwrap_or_default()),
                Some('s' | 'S') => out.push_str(&args.next().map(format_string).unwrap_or_default()),
                Some(other) => {
                    out.push('%');
                    out.push(other);
                }
                None => out.push('%'),
            },
            _ => out.push(c),
        }
    }
    out
}

fn format_decimal(v: &Value) -> String {
    if v.has_unknown() {
        return "x".to_string();
    }
    let Some(bits) = v.to_u64() else {
        return "x".to_string();
    };
    if v.is_signed() && v.width() < 64 {
        let sign_bit = 1u64 << (v.width() - 1);
        if bits & sign_bit != 0 {
            return (bits as i64 - (1i64 << v.width())).to_string();
        }
    }
    bits.to_string()
}

fn format_hex(v: &Value) -> String {
    if v.has_unknown() {
        return "x".repeat(v.width().div_ceil(4) as usize);
    }
    let digits = v.width().div_ceil(4) as usize;
    format!("{:0width$x}", v.to_u64().unwrap_or(0), width = digits)
}

fn format_octal(v: &Value) -> String {
    if v.has_unknown() {
        return "x".repeat(v.width().div_ceil(3) as usize);
    }
    format!("{:o}", v.to_u64().unwrap_or(0))
}

fn format_binary(v: &Value) -> String {
    (0..v.width())
        .rev()
        .map(|pos| v.get_bit(pos).to_string())
        .collect()
}

/// Decodes a packed-ASCII value (big-endian byte order, per `%s`'s
/// usual LRM treatment) into a string, dropping leading NUL bytes.
fn format_string(v: &Value) -> String {
    let mut bytes = Vec::new();
    let mut hi = v.width();
    while hi >= 8 {
        let byte = v.slice((hi - 1) as i32, (hi - 8) as i32).to_u64().unwrap_or(0) as u8;
        if byte != 0 || !bytes.is_empty() {
            bytes.push(byte);
        }
        hi -= 8;
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// An assertion-failure report (a `$error`/immediate-assert analogue),
/// formatted the way the reference simulator stamps one: time, the
/// hierarchical path, and the user's message.
pub fn format_assert_failure(hier_path: &HierPath, sim_time: u64, message: &str) -> String {
    format!("Assertion failed at time {sim_time} in {hier_path}: {message}")
}

/// `"$finish(CODE) called at TIME (LOC)"` (§4.4 "Finish").
pub fn format_finish_message(code: Option<i64>, sim_time: u64, hier_path: &HierPath) -> String {
    match code {
        Some(code) => format!("$finish({code}) called at {sim_time} ({hier_path})"),
        None => format!("$finish called at {sim_time} ({hier_path})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hp() -> HierPath {
        HierPath::root("top").child("dut")
    }

    #[test]
    fn percent_m_substitutes_hierarchical_path() {
        let out = format_display("in %m now", &[], &hp());
        assert_eq!(out, "in top.dut now");
    }

    #[test]
    fn percent_t_is_rewritten_to_decimal() {
        let v = Value::from_u64(42, 31, 0, false, true);
        let out = format_display("@%t", &[v], &hp());
        assert_eq!(out, "@42");
    }

    #[test]
    fn escapes_survive_formatting() {
        let out = format_display("a\\nb\\tc", &[], &hp());
        assert_eq!(out, "a\nb\tc");
    }

    #[test]
    fn decimal_arg_is_consumed_in_order() {
        let a = Value::from_u64(2, 31, 0, false, true);
        let c = Value::from_u64(3, 31, 0, false, true);
        let out = format_display("a=%d c=%d", &[a, c], &hp());
        assert_eq!(out, "a=2 c=3");
    }

    #[test]
    fn finish_message_matches_reference_format() {
        let msg = format_finish_message(Some(1), 42, &HierPath::root("top"));
        assert_eq!(msg, "$finish(1) called at 42 (top)");
    }
}
