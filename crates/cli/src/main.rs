mod commands;
mod handlers;
mod output;
mod shell;

use std::sync::Arc;

use clap::Parser;
use infrastructure::{FileSessionStore, HttpTodoApi, SessionStore, TodoApi};
use shared::{init_tracing, AppError, Config};
use tracing::debug;

use crate::commands::Cli;
use crate::handlers::Context;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("error: {}", describe(&e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env()?;
    if let Some(url) = cli.api_url {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AppError::Configuration(format!("--api-url must be an http(s) URL: {url}")).into());
        }
        config.api_base_url = url.trim_end_matches('/').to_string();
    }
    if let Some(path) = cli.session_file {
        config.session_file = path;
    }

    init_tracing(config.log_format).map_err(|e| anyhow::anyhow!("logging setup failed: {e}"))?;
    debug!(
        api = %config.api_base_url,
        session_file = %config.session_file.display(),
        environment = %config.environment,
        "Configuration loaded"
    );

    let sessions: Arc<dyn SessionStore> = Arc::new(FileSessionStore::new(&config.session_file));
    let api: Arc<dyn TodoApi> = Arc::new(HttpTodoApi::new(config, sessions.clone())?);

    let ctx = Context {
        api,
        sessions,
        json: cli.json,
    };
    handlers::dispatch(&ctx, cli.command).await
}

/// アプリケーションエラーは利用者向けの文言で表示する
fn describe(error: &anyhow::Error) -> String {
    match error.downcast_ref::<AppError>() {
        Some(app_error) => match app_error {
            AppError::Validation(_)
            | AppError::AlreadyExists(_)
            | AppError::Domain(_)
            | AppError::Authentication(_)
            | AppError::NotAuthenticated
            | AppError::TokenExpired
            | AppError::RefetchFailed(_) => app_error.user_message(),
            other => format!("{} ({})", other.user_message(), other),
        },
        None => error.to_string(),
    }
}
