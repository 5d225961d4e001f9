//! Command-line surface (spec.md §6). Grounded on the teacher's own
//! `clap`-derive binary entry point style, generalised from swindon's
//! config-file-driven startup to turq's flag-driven one.

use clap::Parser;

/// A programmable mock HTTP/1.1 origin server.
#[derive(Parser, Debug)]
#[command(name = "turq", version, about, long_about = None)]
pub struct Cli {
    /// Address to bind both listeners on.
    #[arg(long, default_value = "127.0.0.1")]
    pub bind: String,

    /// Port for the mock HTTP surface.
    #[arg(long, default_value_t = 13085)]
    pub mock_port: u16,

    /// Port for the editor control surface.
    #[arg(long, default_value_t = 13086)]
    pub editor_port: u16,

    /// Also listen on the IPv6 wildcard/loopback address.
    #[arg(long)]
    pub ipv6: bool,

    /// Disable the editor listener entirely.
    #[arg(long)]
    pub no_editor: bool,

    /// Editor password. Pass an empty string to disable auth; omit to
    /// auto-generate one and log it once at startup.
    #[arg(long)]
    pub editor_password: Option<String>,

    /// Initial rules file to load instead of the built-in default program.
    #[arg(long)]
    pub rules: Option<std::path::PathBuf>,

    /// Verbose logging: headers, codec state changes, full tracebacks.
    #[arg(short, long)]
    pub verbose: bool,

    /// Disable ANSI colour in log output.
    #[arg(long)]
    pub no_color: bool,
}

impl Cli {
    pub fn parse_args() -> Cli {
        Cli::parse()
    }
}
