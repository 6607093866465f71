// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Courier - outbound delivery and conversational automation pipeline.
//!
//! This is the binary entry point for the Courier daemon.

use clap::{Parser, Subcommand};

mod console;
mod serve;

/// Courier - outbound delivery and conversational automation pipeline.
#[derive(Parser, Debug)]
#[command(name = "courier", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the delivery workers.
    Serve,
    /// Print the resolved configuration.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match courier_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            courier_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    match cli.command {
        Some(Commands::Serve) => {
            if let Err(e) = serve::run_serve(config).await {
                eprintln!("courier serve: {e}");
                std::process::exit(1);
            }
        }
        Some(Commands::Config) => match serde_json::to_string_pretty(&config) {
            Ok(rendered) => println!("{rendered}"),
            Err(e) => {
                eprintln!("courier config: {e}");
                std::process::exit(1);
            }
        },
        None => {
            println!("courier: use --help for available commands");
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn binary_loads_config_defaults() {
        // Config must load with defaults alone, no file needed.
        let config = courier_config::load_and_validate()
            .expect("default config should be valid");
        assert_eq!(config.dispatch.poll_interval_secs, 5);
        assert_eq!(config.rates.bridge.per_minute, 2);
    }
}
