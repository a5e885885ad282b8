use crate::app::models::Toggle;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Render RPSL routing policy into router configuration with RtConfig"
)]
pub struct Cli {
    /// File holding the RtConfig template (reads stdin when omitted)
    pub input: Option<PathBuf>,

    /// Settings file (defaults to ~/.config/rtconfig/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Page identifier shown in the report heading
    #[arg(long, default_value = "stdin")]
    pub page_name: String,

    /// How to print the report
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Path to the RtConfig binary
    #[arg(long)]
    pub command: Option<String>,

    /// IRR cache file to load before querying whois (repeatable)
    #[arg(long = "include-file")]
    pub include_files: Vec<String>,

    /// Comma separated source list, first match wins
    #[arg(long)]
    pub source_list: Option<String>,

    /// Router configuration dialect (cisco, junos, bcc, gated, rsd, ...)
    #[arg(long)]
    pub output_format: Option<String>,

    /// Whois server to query
    #[arg(long)]
    pub whois_host: Option<String>,

    /// Whois server port
    #[arg(long)]
    pub whois_port: Option<u16>,

    /// Whois protocol (irrd, ripe, ripe_perl)
    #[arg(long)]
    pub whois_protocol: Option<String>,

    /// Turn on an RtConfig toggle (repeatable)
    #[arg(long = "enable", value_enum)]
    pub enable: Vec<Toggle>,

    /// Include the command line, raw input and stderr in the report
    #[arg(long)]
    pub debug: bool,

    /// Kill RtConfig if it runs longer than this many milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Text,
    Json,
}
