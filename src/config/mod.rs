//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    fmt,
    net::SocketAddr,
    num::NonZeroUsize,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::editors::EditorDirectory;
use crate::application::preview::{
    DEFAULT_ACTION, DEFAULT_EMPTY_MESSAGE, DEFAULT_ERROR_MESSAGE, DEFAULT_MAX_INPUT_BYTES,
    PreviewPolicy,
};
use crate::domain::actors::AccessMode;
use crate::domain::symbology::{Color, Padding, Symbology, SymbologySpec};

mod cli;

pub use cli::{
    CliArgs, Command, DEFAULT_DEBOUNCE_MS, DEFAULT_SERVER_URL, IssueTokenArgs, LoggingOverrides,
    PreviewArgs, ServeArgs, ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "toric";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_TOKEN_TTL_SECS: i64 = 86_400;
const MIN_TOKEN_SECRET_BYTES: usize = 32;
const DEFAULT_MODULE_SIZE: u32 = 8;
const MAX_MODULE_SIZE: u32 = 64;
const DEFAULT_PADDING: u32 = 2;
const MAX_PADDING: u32 = 64;
const DEFAULT_FOREGROUND: &str = "black";
const DEFAULT_BACKGROUND: &str = "white";

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub security: SecuritySettings,
    pub preview: PreviewSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

/// Configured HMAC secret. Never printed.
#[derive(Clone)]
pub struct TokenSecret(String);

impl TokenSecret {
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TokenSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TokenSecret(..)")
    }
}

#[derive(Debug, Clone)]
pub struct SecuritySettings {
    /// `None` when no secret is configured; a per-process one is generated.
    pub token_secret: Option<TokenSecret>,
    pub token_ttl: time::Duration,
    pub access_mode: AccessMode,
    pub editors: EditorDirectory,
}

#[derive(Debug, Clone)]
pub struct PreviewSettings {
    pub action: String,
    pub error_message: String,
    pub empty_message: String,
    pub max_input_bytes: NonZeroUsize,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub spec: SymbologySpec,
}

impl Settings {
    pub fn preview_policy(&self) -> PreviewPolicy {
        PreviewPolicy {
            action: self.preview.action.clone(),
            empty_message: self.preview.empty_message.clone(),
            error_message: self.preview.error_message.clone(),
            max_input_bytes: self.preview.max_input_bytes.get(),
            access_mode: self.security.access_mode,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("TORIC").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Preview(args)) => raw.apply_logging_overrides(&args.logging),
        Some(Command::IssueToken(_)) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    security: RawSecuritySettings,
    preview: RawPreviewSettings,
    render: RawRenderSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        self.apply_logging_overrides(&overrides.logging);
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(mode) = overrides.access_mode.as_ref() {
            self.security.access_mode = Some(mode.clone());
        }
        if let Some(ttl) = overrides.token_ttl_seconds {
            self.security.token_ttl_seconds = Some(ttl);
        }
    }

    fn apply_logging_overrides(&mut self, overrides: &LoggingOverrides) {
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            security,
            preview,
            render,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            security: build_security_settings(security)?,
            preview: build_preview_settings(preview)?,
            render: build_render_settings(render)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }
    let addr =
        parse_socket_addr(&host, port).map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_security_settings(security: RawSecuritySettings) -> Result<SecuritySettings, LoadError> {
    let token_secret = match non_blank(security.token_secret) {
        Some(secret) if secret.len() < MIN_TOKEN_SECRET_BYTES => {
            return Err(LoadError::invalid(
                "security.token_secret",
                format!("must be at least {MIN_TOKEN_SECRET_BYTES} bytes"),
            ));
        }
        secret => secret.map(TokenSecret),
    };

    let ttl_secs = security.token_ttl_seconds.unwrap_or(DEFAULT_TOKEN_TTL_SECS);
    if ttl_secs <= 0 {
        return Err(LoadError::invalid(
            "security.token_ttl_seconds",
            "must be greater than zero",
        ));
    }

    let access_mode = match security.access_mode {
        Some(mode) => mode
            .parse::<AccessMode>()
            .map_err(|err| LoadError::invalid("security.access_mode", err.to_string()))?,
        None => AccessMode::default(),
    };

    let mut editors = EditorDirectory::new();
    for editor in security.editors {
        editors = editors
            .with_hashed_key(editor.name, &editor.key_sha256)
            .map_err(|err| LoadError::invalid("security.editors", err.to_string()))?;
    }

    Ok(SecuritySettings {
        token_secret,
        token_ttl: time::Duration::seconds(ttl_secs),
        access_mode,
        editors,
    })
}

fn build_preview_settings(preview: RawPreviewSettings) -> Result<PreviewSettings, LoadError> {
    let action = non_blank(preview.action).unwrap_or_else(|| DEFAULT_ACTION.to_string());
    if !action
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(LoadError::invalid(
            "preview.action",
            "may only contain ASCII letters, digits, `_` and `-`",
        ));
    }

    let error_message =
        non_blank(preview.error_message).unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string());
    let empty_message =
        non_blank(preview.empty_message).unwrap_or_else(|| DEFAULT_EMPTY_MESSAGE.to_string());

    let max_input_bytes = preview
        .max_input_bytes
        .unwrap_or(DEFAULT_MAX_INPUT_BYTES as u64);
    let max_input_bytes = usize::try_from(max_input_bytes)
        .ok()
        .and_then(NonZeroUsize::new)
        .ok_or_else(|| {
            LoadError::invalid("preview.max_input_bytes", "must be greater than zero")
        })?;

    Ok(PreviewSettings {
        action,
        error_message,
        empty_message,
        max_input_bytes,
    })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let symbology = match non_blank(render.symbology) {
        Some(notation) => notation
            .parse::<Symbology>()
            .map_err(|err| LoadError::invalid("render.symbology", err.to_string()))?,
        None => Symbology::default(),
    };

    let module_size = render.module_size.unwrap_or(DEFAULT_MODULE_SIZE);
    if !(1..=MAX_MODULE_SIZE).contains(&module_size) {
        return Err(LoadError::invalid(
            "render.module_size",
            format!("must be between 1 and {MAX_MODULE_SIZE}"),
        ));
    }

    let padding = render.padding.unwrap_or(DEFAULT_PADDING);
    if padding > MAX_PADDING {
        return Err(LoadError::invalid(
            "render.padding",
            format!("must not exceed {MAX_PADDING}"),
        ));
    }

    let foreground = parse_color(render.foreground, DEFAULT_FOREGROUND, "render.foreground")?;
    let background = parse_color(render.background, DEFAULT_BACKGROUND, "render.background")?;

    Ok(RenderSettings {
        spec: SymbologySpec {
            symbology,
            module_size,
            padding: Padding::uniform(padding),
            foreground,
            background,
        },
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSecuritySettings {
    token_secret: Option<String>,
    token_ttl_seconds: Option<i64>,
    access_mode: Option<String>,
    editors: Vec<RawEditor>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawEditor {
    name: String,
    key_sha256: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPreviewSettings {
    action: Option<String>,
    error_message: Option<String>,
    empty_message: Option<String>,
    max_input_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    symbology: Option<String>,
    module_size: Option<u32>,
    padding: Option<u32>,
    foreground: Option<String>,
    background: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn parse_color(
    value: Option<String>,
    default: &str,
    key: &'static str,
) -> Result<Color, LoadError> {
    non_blank(value)
        .as_deref()
        .unwrap_or(default)
        .parse()
        .map_err(|err: crate::domain::error::DomainError| LoadError::invalid(key, err.to_string()))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}
