//! Logging setup (spec.md §6 "Logging surface"). Grounded on the
//! teacher's plain `env_logger::init()` call in its examples, extended
//! with the verbosity/colour toggles the CLI exposes and the top-level
//! error convention for uncaught failures.

use std::io::Write;

/// Initialise `env_logger` for the process. `--verbose` raises the
/// default level to `debug` (per-header and codec-state-change lines);
/// without it the default is `info`. Either can still be overridden by
/// `RUST_LOG` in the environment. `--no-color` disables ANSI styling.
pub fn init(verbose: bool, no_color: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level));
    builder.format(move |buf, record| writeln!(buf, "{} {}", record.level(), record.args()));
    if no_color {
        builder.write_style(env_logger::WriteStyle::Never);
    }
    builder.init();
}

/// Print the process-exit convention for an uncaught top-level error
/// (spec.md §6: `turq: error: MESSAGE` normally, a full chain in verbose
/// mode) and return the exit code callers should use.
pub fn report_fatal(err: &(dyn std::error::Error + 'static), verbose: bool) -> i32 {
    if verbose {
        eprintln!("turq: error: {}", err);
        let mut source = err.source();
        while let Some(cause) = source {
            eprintln!("  caused by: {}", cause);
            source = cause.source();
        }
    } else {
        eprintln!("turq: error: {}", err);
    }
    1
}
