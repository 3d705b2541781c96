use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::debug;
use weather_core::{
    ApiResponse, AthenaQueryService, Config, S3ObjectStore,
    handler::{get_weather_data, transform_weather_data},
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-etl", version, about = "Weather ETL pipeline")]
pub struct Cli {
    /// Config file to use instead of the one in the platform config directory.
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Query the most recent days of weather and print the response.
    Query,

    /// Transform pending raw files in the bucket and archive them.
    Transform,

    /// Print the effective configuration.
    Config {
        /// Also write it to the config file.
        #[arg(long)]
        init: bool,
    },
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        let path = match self.config_file {
            Some(path) => path,
            None => Config::config_file_path()?,
        };
        let config = Config::load_from(&path)?;
        debug!("Using configuration from {}", path.display());

        match self.command {
            Command::Query => {
                let sdk = aws_config::load_from_env().await;
                let service = AthenaQueryService::from_sdk_config(&sdk);
                print_response(&get_weather_data(&service, &config).await?)?;
            }
            Command::Transform => {
                let sdk = aws_config::load_from_env().await;
                let store = S3ObjectStore::from_sdk_config(&sdk);
                print_response(&transform_weather_data(&store, &config.storage).await?)?;
            }
            Command::Config { init } => {
                if init {
                    config.save_to(&path)?;
                    eprintln!("Wrote {}", path.display());
                }
                let toml = toml::to_string_pretty(&config)
                    .context("Failed to serialize configuration to TOML")?;
                print!("{toml}");
            }
        }

        Ok(())
    }
}

fn print_response(response: &ApiResponse) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(response).context("Failed to serialize response")?;
    println!("{json}");
    Ok(())
}
