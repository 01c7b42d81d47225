//! pipedash - Entry Point
//!
//! Polls deployment pipelines of every configured environment and serves
//! their live status over a local HTTP API.

use std::collections::HashMap;
use std::env;

use chrono::Utc;
use pipedash::app::options::AppOptions;
use pipedash::app::run::run;
use pipedash::app::state::AppState;
use pipedash::filesys::file::File;
use pipedash::logs::init_logging;
use pipedash::render::render_status;
use pipedash::storage::settings::{Settings, DEFAULT_SETTINGS_PATH};
use pipedash::utils::version_info;

use tracing::{error, info};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(text) => println!("{}", text),
            Err(e) => eprintln!("Failed to print version: {e}"),
        }
        return;
    }

    // Retrieve the settings file
    let settings_path = cli_args
        .get("config")
        .cloned()
        .unwrap_or_else(|| DEFAULT_SETTINGS_PATH.to_string());
    let settings_file = File::new(settings_path);
    let settings = match settings_file.read_json::<Settings>().await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!(
                "Unable to read settings file {}: {}",
                settings_file.path().display(),
                e
            );
            return;
        }
    };

    // Initialize logging
    let _log_guard = match init_logging(settings.log_options()) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    let mut options = match settings.to_app_options() {
        Ok(options) => options,
        Err(e) => {
            error!("Invalid settings: {}", e);
            return;
        }
    };

    if let Some(environment) = cli_args.get("environment") {
        options.environments.retain(|env| &env.name == environment);
        if options.environments.is_empty() {
            error!("Unknown environment: {}", environment);
            return;
        }
    }

    // Print every pipeline once and exit
    if cli_args.contains_key("once") {
        return print_once(options).await;
    }

    info!("Running pipedash with options: {:?}", options);
    let result = run(options, await_shutdown_signal()).await;
    if let Err(e) = result {
        error!("Failed to run pipedash: {e}");
    }
}

async fn print_once(options: AppOptions) {
    let state = match AppState::init(
        &options.environments,
        options.request_timeout,
        &options.controller,
        options.caches,
        false,
    ) {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize: {}", e);
            return;
        }
    };

    state.load_all().await;

    for (environment, dashboard) in &state.dashboards {
        println!("== {} ==", environment);
        dashboard.poll_all().await;
        for controller in dashboard.controllers().await {
            print!("{}", render_status(&controller.status().await, Utc::now()));
        }
        println!();
    }

    if let Err(e) = state.shutdown().await {
        error!("Failed to shut down: {}", e);
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Failed to install signal handlers, waiting for Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
