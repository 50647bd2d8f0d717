use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use stellar_planner::channels::CliChannel;
use stellar_planner::config::PlannerConfig;
use stellar_planner::llm::create_dispatcher;
use stellar_planner::wizard::{DialogueEngine, SessionController};

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Stderr by default; a daily-rolling file when a log directory is set.
/// The returned guard must live until exit so buffered lines are flushed.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "stellar-planner.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Optional .env next to the binary's working directory
    dotenvy::dotenv().ok();

    let config = PlannerConfig::from_env()?;
    let _log_guard = init_tracing(config.log_dir.as_deref());

    eprintln!("🏗️  Stellar Planner v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.model);
    eprintln!("   Mode: {}", config.initial_mode);

    let dispatcher = create_dispatcher(&config);
    let engine =
        DialogueEngine::new(dispatcher, config.model.clone()).with_policy(config.contextual_replies);
    let controller = SessionController::new(engine, config.initial_mode);

    CliChannel::new(controller).run().await?;
    Ok(())
}
