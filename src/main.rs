//
//  octopus-client
//  main.rs
//
//  Created by Ngonidzashe Mangudya on 2026/01/12.
//  Copyright (c) 2025 IAMNGONI. All rights reserved.
//

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use octopus_client::cli::{exit_code, Cli, Commands};
use octopus_client::exit_codes;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    init_logging();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Ctrl-C stops polling and cancels running tasks
    let cancellation = CancellationToken::new();
    watch_interrupt(cancellation.clone());

    // Execute command
    let result = run(cli, cancellation).await;

    // Handle result and exit
    match result {
        Ok(()) => std::process::exit(exit_codes::SUCCESS),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(exit_code(&e));
        }
    }
}

/// Initialize logging based on environment
fn init_logging() {
    let filter = EnvFilter::try_from_env("OCTO_DEBUG")
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Cancels `token` on the first Ctrl-C.
fn watch_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::warn!("Interrupted, cancelling");
                token.cancel();
            }
            Err(e) => tracing::debug!("Ctrl-C handler unavailable: {}", e),
        }
    });
}

/// Main command dispatcher
async fn run(cli: Cli, cancellation: CancellationToken) -> Result<()> {
    match cli.command {
        Commands::Release(cmd) => cmd.run(&cli.global, cancellation).await,
        Commands::Space(cmd) => cmd.run(&cli.global).await,
        Commands::Version => {
            println!("octo version {}", octopus_client::VERSION);
            Ok(())
        }
    }
}
