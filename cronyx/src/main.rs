use clap::Parser;
use cronyx::cli::{Cli, Command, EXIT_INTERRUPTED, EXIT_RUNTIME_INIT, EXIT_USAGE_OR_CONFIG};
use cronyx::config::{self, ini};
use cronyx::middleware::SaveMiddleware;
use cronyx::runtime::{BollardRuntime, ContainerRuntime};
use cronyx::scheduler::Scheduler;
use cronyx::shutdown::ShutdownManager;
use cronyx::watcher::Watcher;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to start the tokio runtime");
    runtime.block_on(run(cli))
}

async fn run(cli: Cli) -> ExitCode {
    let mut config = match ini::load(&cli.config) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("failed to load configuration from '{}': {error}", cli.config);
            return ExitCode::from(EXIT_USAGE_OR_CONFIG as u8);
        }
    };
    config.apply_overrides(cli.config_overrides());

    cronyx::logging::init(&cli.resolve_log_level(&config));

    match cli.command {
        Command::Validate => {
            info!("configuration at '{}' is valid ({} job(s))", cli.config, config.jobs.len());
            ExitCode::from(0)
        }
        Command::Doctor { json } => run_doctor(&cli, &config, json).await,
        Command::Daemon => run_daemon(cli, config).await,
    }
}

async fn run_doctor(cli: &Cli, config: &config::Config, json: bool) -> ExitCode {
    let config_ok = true; // already loaded successfully by the time we get here
    let runtime_ok = match BollardRuntime::connect() {
        Ok(runtime) => runtime.list_containers().await.is_ok(),
        Err(_) => false,
    };
    let healthy = config_ok && runtime_ok;

    if json {
        let report = serde_json::json!({
            "config_path": cli.config,
            "config_ok": config_ok,
            "job_count": config.jobs.len(),
            "runtime_ok": runtime_ok,
            "healthy": healthy,
        });
        println!("{}", serde_json::to_string_pretty(&report).unwrap());
    } else {
        println!("config:  ok ({} job(s) at '{}')", config.jobs.len(), cli.config);
        println!("runtime: {}", if runtime_ok { "reachable" } else { "unreachable" });
    }

    if healthy {
        ExitCode::from(0)
    } else {
        ExitCode::from(EXIT_RUNTIME_INIT as u8)
    }
}

async fn run_daemon(cli: Cli, config: config::Config) -> ExitCode {
    let container_runtime: Arc<dyn cronyx::runtime::ContainerRuntime> = match BollardRuntime::connect() {
        Ok(runtime) => Arc::new(runtime),
        Err(error) => {
            error!(%error, "failed to connect to the container runtime");
            return ExitCode::from(EXIT_RUNTIME_INIT as u8);
        }
    };

    let scheduler = Arc::new(Scheduler::new());

    if let Some(folder) = &config.global.notify.save_folder {
        let restored = SaveMiddleware::restore(std::path::Path::new(folder));
        scheduler.seed_history(restored, chrono::Duration::days(7));
    }

    let watcher = match Watcher::new(
        cli.config.clone(),
        cli.config_overrides(),
        container_runtime,
        scheduler.clone(),
        cli.label_prefix.clone(),
    )
    .await
    {
        Ok(watcher) => Arc::new(watcher),
        Err(error) => {
            error!(%error, "failed to start the configuration watcher");
            return ExitCode::from(EXIT_RUNTIME_INIT as u8);
        }
    };

    scheduler.start();
    let cancel = CancellationToken::new();
    let watcher_handle = tokio::spawn({
        let watcher = watcher.clone();
        let cancel = cancel.clone();
        async move { watcher.run(cancel).await }
    });

    let exit_code = wait_for_termination().await;

    info!("shutting down");
    cancel.cancel();
    let _ = watcher_handle.await;

    let mut hooks = ShutdownManager::new();
    hooks.register("scheduler", Duration::from_secs(30), move || async move {
        scheduler.stop(Duration::from_secs(25)).await;
    });
    hooks.shutdown(Duration::from_secs(30)).await;

    exit_code
}

/// Waits for SIGINT or (on unix) SIGTERM and returns the exit code the
/// process should report.
async fn wait_for_termination() -> ExitCode {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => ExitCode::from(EXIT_INTERRUPTED as u8),
            _ = sigterm.recv() => ExitCode::from(0),
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        ExitCode::from(EXIT_INTERRUPTED as u8)
    }
}
