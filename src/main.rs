use clap::Parser;
use relay::cli::{
    handle_completions, handle_config_init, handle_endpoints, handle_send, Cli, Commands,
    ConfigCommands,
};
use relay::config::RelayConfig;
use relay::logging::init_tracing;
use std::path::Path;

fn load_config(path: &Path) -> Result<RelayConfig, Box<dyn std::error::Error>> {
    let config = RelayConfig::load(Some(path))?.with_env_overrides();
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match cli.command.config_path() {
        Some(path) => {
            let config = load_config(path)?;
            if let Err(e) = init_tracing(&config.logging) {
                eprintln!("Warning: Failed to initialise logging: {}", e);
            }
            Some(config)
        }
        None => None,
    };

    let output = match (cli.command, config) {
        (Commands::Send(args), Some(config)) => handle_send(&args, &config).await?,
        (Commands::Endpoints(args), Some(config)) => handle_endpoints(&args, &config)?,
        (Commands::Config(ConfigCommands::Init(args)), _) => {
            handle_config_init(&args)?;
            String::new()
        }
        (Commands::Completions(args), _) => {
            handle_completions(&args);
            String::new()
        }
        (_, None) => return Err("configuration not loaded".into()),
    };

    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
