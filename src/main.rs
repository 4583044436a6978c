/*!
 * Copyright (c) 2026 Ming Lyu, aka mingcheng
 *
 * This source code is licensed under the MIT License,
 * which is located in the LICENSE file in the source tree's root directory.
 *
 * File: main.rs
 * Author: mingcheng <mingcheng@apache.org>
 * File Created: 2026-03-02 09:58:12
 *
 * Modified By: mingcheng <mingcheng@apache.org>
 * Last Modified: 2026-03-06 17:02:51
 */

mod config;
mod confirmation;
mod error;
mod extractor;
mod mailbox;
mod models;
mod orchestrator;
mod retry;
mod traits;

use clap::{Parser, Subcommand};
use config::AppConfig;
use confirmation::{ConfirmationSettings, await_confirmation};
use log::{error, info, warn};
use mailbox::TempMailClient;
use models::CreateAccountOptions;
use orchestrator::Orchestrator;
use rustls::crypto;
use serde::Serialize;
use std::io::Write;
use tokio::signal;
use tokio_util::sync::CancellationToken;

struct MultiWriter {
    writers: Vec<Box<dyn Write + Send + 'static>>,
}

impl Write for MultiWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        for w in &mut self.writers {
            let _ = w.write(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        for w in &mut self.writers {
            let _ = w.flush();
        }
        Ok(())
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Provision disposable email-backed accounts", long_about = None)]
struct Args {
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check the backend, then create an account (default)
    Run {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Probe backend liveness
    Status,
    /// Create an account without probing the backend first
    Create {
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
    /// Run the backend CORS diagnostic
    CorsTest,
    /// Create a temporary mailbox and wait for a confirmation link
    Confirm,
}

fn initialize_logger(config: &AppConfig) -> anyhow::Result<()> {
    let mut builder = env_logger::Builder::new();

    if let Some(level) = &config.log_level {
        builder.parse_filters(level);
    } else if let Ok(env_level) = std::env::var("RUST_LOG") {
        builder.parse_filters(&env_level);
    } else {
        builder.filter_level(log::LevelFilter::Info);
    }

    if let Some(log_file) = &config.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .map_err(|e| anyhow::anyhow!("Failed to open log file {}: {}", log_file, e))?;

        if config.quiet {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        } else {
            let multi_writer = MultiWriter {
                writers: vec![Box::new(file), Box::new(std::io::stderr())],
            };
            builder.target(env_logger::Target::Pipe(Box::new(multi_writer)));
        }
    } else if config.quiet {
        builder.target(env_logger::Target::Pipe(Box::new(std::io::sink())));
    }

    builder.init();
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn create_account(
    orchestrator: &Orchestrator,
    options: CreateAccountOptions,
    cancel: &CancellationToken,
) -> anyhow::Result<bool> {
    let result = orchestrator
        .create_and_confirm_account(&options, cancel)
        .await;
    print_json(&result)?;
    Ok(result.success)
}

async fn execute(
    command: Command,
    config: &AppConfig,
    cancel: &CancellationToken,
) -> anyhow::Result<bool> {
    match command {
        Command::Run { username, password } => {
            let orchestrator = Orchestrator::new(&config.backend)?;
            if !orchestrator.check_backend_status(cancel).await {
                error!("Server is not responding. Please try again later.");
                return Ok(false);
            }
            create_account(&orchestrator, CreateAccountOptions { username, password }, cancel)
                .await
        }
        Command::Status => {
            let online = Orchestrator::new(&config.backend)?
                .check_backend_status(cancel)
                .await;
            println!("{}", if online { "online" } else { "offline" });
            Ok(online)
        }
        Command::Create { username, password } => {
            let orchestrator = Orchestrator::new(&config.backend)?;
            create_account(&orchestrator, CreateAccountOptions { username, password }, cancel)
                .await
        }
        Command::CorsTest => {
            let passed = Orchestrator::new(&config.backend)?.test_cors(cancel).await;
            println!("{}", if passed { "passed" } else { "failed" });
            Ok(passed)
        }
        Command::Confirm => {
            let mut provider = TempMailClient::new(&config.mailbox)?;
            let settings = ConfirmationSettings::from(&config.mailbox);
            let report = await_confirmation(&mut provider, &settings, cancel).await?;
            print_json(&report)?;
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = crypto::ring::default_provider().install_default();

    let args = Args::parse();

    let config = match args.config {
        Some(path) => AppConfig::new_from_file(&path),
        None => AppConfig::new(),
    }
    .unwrap_or_else(|e| {
        eprintln!("Failed to load config: {:?}", e);
        if let Ok(path) = std::env::current_dir() {
            eprintln!("Current search path: {:?}", path);
        }
        eprintln!("Please create a `config.toml` or set APP_... environment variables, or specify a config file with --config.");
        std::process::exit(1);
    });

    initialize_logger(&config)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                warn!("Shutdown signal received (Ctrl+C). Cancelling...");
                on_signal.cancel();
            }
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }
    });

    let command = args.command.unwrap_or(Command::Run {
        username: None,
        password: None,
    });

    match execute(command, &config, &cancel).await {
        Ok(true) => {
            info!("Done.");
            Ok(())
        }
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}
