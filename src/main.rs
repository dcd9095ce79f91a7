use std::{process, sync::Arc, time::Duration};

use tokio::io::{AsyncBufReadExt, BufReader};
use toric::{
    application::{
        controller::{DisplayRegion, DisplayState, PreviewController},
        error::AppError,
        preview::PreviewService,
        render::{SvgSanitizer, SymbolRenderer},
        tokens::{TokenService, generate_secret},
    },
    config,
    domain::actors::Actor,
    infra::{
        client::HttpTransport,
        error::InfraError,
        http::{self, HttpState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_max_level(Level::ERROR)
        .with_writer(std::io::stderr)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Preview(args) => run_preview(args).await,
        config::Command::IssueToken(args) => run_issue_token(settings, args),
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let preview = build_preview_service(&settings)?;
    let state = HttpState {
        preview: Arc::new(preview),
        editors: Arc::new(settings.security.editors.clone()),
    };
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        addr = %settings.server.addr,
        access_mode = %settings.security.access_mode,
        editors = settings.security.editors.len(),
        symbology = %settings.render.spec.symbology,
        "toric listening"
    );

    let grace = settings.server.graceful_shutdown;
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal());

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = async {
            shutdown_signal().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(grace_seconds = grace.as_secs(), "graceful shutdown timed out");
        }
    }

    Ok(())
}

async fn run_preview(args: config::PreviewArgs) -> Result<(), AppError> {
    let (transport, bootstrap) = HttpTransport::connect(&args.server, args.api_key)
        .await
        .map_err(AppError::from)?;
    info!(endpoint = %transport.endpoint(), action = %bootstrap.action, "preview connected");

    let controller = PreviewController::from_bootstrap(
        transport,
        TerminalDisplay,
        bootstrap,
        Duration::from_millis(args.debounce_ms),
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?
    {
        controller.on_input(line);
    }

    controller.settle().await;
    Ok(())
}

fn run_issue_token(
    settings: config::Settings,
    args: config::IssueTokenArgs,
) -> Result<(), AppError> {
    if settings.security.token_secret.is_none() {
        return Err(AppError::validation(
            "security.token_secret must be configured to issue tokens a server will accept",
        ));
    }

    let preview = build_preview_service(&settings)?;
    let actor = match args.editor {
        Some(name) => Actor::editor(name),
        None => Actor::Anonymous,
    };
    println!("{}", preview.issue_token(&actor));
    Ok(())
}

fn build_preview_service(settings: &config::Settings) -> Result<PreviewService, AppError> {
    let secret = match settings.security.token_secret.as_ref() {
        Some(secret) => secret.expose().to_string(),
        None => {
            warn!("security.token_secret is not set; tokens will not survive a restart");
            generate_secret()
        }
    };
    let tokens = TokenService::new(secret, settings.security.token_ttl)
        .map_err(|err| AppError::validation(err.to_string()))?;

    Ok(PreviewService::new(
        tokens,
        Arc::new(SymbolRenderer),
        SvgSanitizer::new(),
        settings.render.spec.clone(),
        settings.preview_policy(),
    ))
}

/// Display region backed by stdout: each state is printed as its HTML form.
struct TerminalDisplay;

impl DisplayRegion for TerminalDisplay {
    fn show(&self, state: DisplayState) {
        println!("{}", state.to_html());
    }
}

/// Wait for Ctrl-C.
async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received, stopping server");
}
