use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";
pub const DEFAULT_DEBOUNCE_MS: u64 = 150;

/// Command-line arguments for the toric binary.
#[derive(Debug, Parser)]
#[command(name = "toric", version, about = "Barcode and QR-code preview service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "TORIC_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the preview HTTP service.
    Serve(Box<ServeArgs>),
    /// Interactive preview client: each stdin line is one input event.
    Preview(PreviewArgs),
    /// Print an anti-forgery token for the configured action.
    #[command(name = "issue-token")]
    IssueToken(IssueTokenArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct LoggingOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override who may use the preview surface (private|public|both).
    #[arg(long = "access-mode", value_name = "MODE")]
    pub access_mode: Option<String>,

    /// Override the anti-forgery token lifetime.
    #[arg(long = "token-ttl-seconds", value_name = "SECONDS")]
    pub token_ttl_seconds: Option<i64>,
}

#[derive(Debug, Args, Clone)]
pub struct PreviewArgs {
    #[command(flatten)]
    pub logging: LoggingOverrides,

    /// Base URL of a running toric server.
    #[arg(
        long = "server",
        env = "TORIC_SERVER_URL",
        value_name = "URL",
        default_value = DEFAULT_SERVER_URL
    )]
    pub server: String,

    /// Editor key sent as a bearer token; omit to preview anonymously.
    #[arg(long = "api-key", env = "TORIC_API_KEY", value_name = "KEY")]
    pub api_key: Option<String>,

    /// Quiet period before an input is sent, in milliseconds.
    #[arg(long = "debounce-ms", value_name = "MILLIS", default_value_t = DEFAULT_DEBOUNCE_MS)]
    pub debounce_ms: u64,
}

#[derive(Debug, Args, Default, Clone)]
pub struct IssueTokenArgs {
    /// Issue for this editor; without it the token is for anonymous visitors.
    #[arg(long = "editor", value_name = "NAME")]
    pub editor: Option<String>,
}
