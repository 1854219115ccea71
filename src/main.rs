//! completion-gateway CLI - send conversations to a prompting network and track their cost

mod spinner;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use completion_gateway::{
    api::{ChatCompletionRequest, DispatchMode, HttpPromptingNetwork, Message},
    config::{Config, ConfigError},
    gateway::CompletionGateway,
    metrics::UsageTracker,
    selection::ResponseSelectionPolicy,
};
use spinner::WaitSpinner;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "completion-gateway")]
#[command(about = "Dispatch chat completions to a prompting network with usage accounting")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Config file (default: the per-user config path)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a prompt and print the selected response
    Chat {
        /// The user prompt
        prompt: String,

        /// Instructions sent ahead of the prompt
        #[arg(short, long)]
        system: Option<String>,

        /// Model to account the call against
        #[arg(short, long)]
        model: Option<String>,

        /// Sampling temperature
        #[arg(short, long)]
        temperature: Option<f32>,

        /// Maximum tokens for the response
        #[arg(long)]
        max_tokens: Option<u32>,

        /// Selection policy (longest, filtered-best)
        #[arg(long)]
        selection: Option<ResponseSelectionPolicy>,

        /// Dispatch mode (candidates, best)
        #[arg(long)]
        mode: Option<DispatchMode>,

        /// Budget in USD to report against
        #[arg(long)]
        budget: Option<f64>,
    },

    /// List model prices
    Costs,

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Initialize configuration file with defaults
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration
    Show {
        /// Show only specific section (gateway, network, budget, costs)
        #[arg(short, long)]
        section: Option<String>,
    },

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., gateway.selection, network.base_url)
        key: String,

        /// Value to set
        value: String,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.clone();

    match cli.command {
        Commands::Chat {
            prompt,
            system,
            model,
            temperature,
            max_tokens,
            selection,
            mode,
            budget,
        } => {
            let mut config = load_config(config_path.as_ref())?;
            if let Some(selection) = selection {
                config.gateway.selection = selection;
            }
            if let Some(mode) = mode {
                config.gateway.dispatch_mode = mode;
            }
            if let Some(budget) = budget {
                config.budget.total_budget = budget;
            }

            let mut request = ChatCompletionRequest::new(build_messages(system, prompt));
            if let Some(model) = model {
                request = request.with_model(model);
            }
            if let Some(temperature) = temperature {
                request = request.with_temperature(temperature);
            }
            if let Some(max_tokens) = max_tokens {
                request = request.with_max_tokens(max_tokens);
            }

            run_chat(config, request).await?;
        }
        Commands::Costs => {
            let config = load_config(config_path.as_ref())?;
            print!("{}", config.cost_table());
        }
        Commands::Config(cmd) => {
            run_config_command(cmd, config_path)?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<Config, ConfigError> {
    match path {
        Some(path) if !path.exists() => Err(ConfigError::NotFound(path.clone())),
        Some(path) => Config::load_from(path.to_path_buf()),
        None => Config::load(),
    }
}

fn build_messages(system: Option<String>, prompt: String) -> Vec<Message> {
    let mut messages = Vec::new();
    if let Some(system) = system {
        messages.push(Message::system(system));
    }
    messages.push(Message::user(prompt));
    messages
}

async fn run_chat(config: Config, request: ChatCompletionRequest) -> Result<()> {
    config.validate()?;

    let usage = UsageTracker::new(config.cost_table());
    usage.set_total_budget(config.budget.total_budget);

    let network = HttpPromptingNetwork::new(config.network_config());
    let gateway_config = config.gateway_config();
    info!(
        "Dispatching to {} (mode: {:?}, selection: {}, timeout: {:.0}s)",
        config.network.base_url,
        gateway_config.mode,
        gateway_config.selection,
        gateway_config.timeout.as_secs_f64()
    );
    let gateway = CompletionGateway::new(gateway_config, Arc::new(network), usage);

    let mut spinner = WaitSpinner::new();
    spinner.start("Waiting for the network");
    let result = gateway.create_chat_completion(request).await;
    spinner.stop();

    let result = result?;
    println!("{}", result.content);
    println!();
    print!("{}", gateway.usage().summary());

    if gateway.usage().is_over_budget() {
        println!("Warning: total cost has reached the configured budget");
    }

    Ok(())
}

fn run_config_command(cmd: ConfigCommands, path: Option<PathBuf>) -> Result<()> {
    let path = path.unwrap_or_else(Config::default_path);

    match cmd {
        ConfigCommands::Init { force } => config_init(&path, force)?,
        ConfigCommands::Show { section } => config_show(&path, section)?,
        ConfigCommands::Set { key, value } => config_set(&path, &key, &value)?,
        ConfigCommands::Path => config_path(&path),
        ConfigCommands::Validate => config_validate(&path)?,
    }
    Ok(())
}

fn config_init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        println!("Configuration file already exists at: {}", path.display());
        println!("Use --force to overwrite");
        return Ok(());
    }

    Config::default().save_to(path.to_path_buf())?;

    println!("Configuration file created at: {}", path.display());
    println!();
    println!("Next steps:");
    println!("  1. Point network.base_url at your prompting network, or");
    println!("  2. Set environment variables:");
    println!("     export GATEWAY_NETWORK_URL=http://host:port");
    println!("     export GATEWAY_API_KEY=your_key");

    Ok(())
}

fn config_show(path: &Path, section: Option<String>) -> Result<()> {
    let config = Config::load_from(path.to_path_buf())?;

    let display = if let Some(sec) = section {
        match sec.to_lowercase().as_str() {
            "gateway" => toml::to_string_pretty(&config.gateway)?,
            "budget" => toml::to_string_pretty(&config.budget)?,
            "costs" => config.cost_table().to_string(),
            "network" => {
                let mut network = config.network.clone();
                if network.api_key.is_some() {
                    network.api_key = Some("***".to_string());
                }
                toml::to_string_pretty(&network)?
            }
            _ => {
                println!("Unknown section: {}", sec);
                println!("Available: gateway, network, budget, costs");
                return Ok(());
            }
        }
    } else {
        // Mask API key in display
        let mut display_config = config.clone();
        if display_config.network.api_key.is_some() {
            display_config.network.api_key = Some("***".to_string());
        }
        toml::to_string_pretty(&display_config)?
    };

    println!("{}", display);

    println!("\n--- Environment Variables ---");
    for var in ["GATEWAY_NETWORK_URL", "GATEWAY_MODEL", "GATEWAY_TEMPERATURE"] {
        println!(
            "{}: {}",
            var,
            std::env::var(var).unwrap_or_else(|_| "not set".to_string())
        );
    }
    println!(
        "GATEWAY_API_KEY: {}",
        if std::env::var("GATEWAY_API_KEY").is_ok() { "set" } else { "not set" }
    );

    Ok(())
}

fn config_set(path: &Path, key: &str, value: &str) -> Result<()> {
    let mut config = Config::load_from(path.to_path_buf())?;

    let Some((section, field)) = key.split_once('.') else {
        println!("Invalid key format. Use: section.key (e.g., gateway.model)");
        return Ok(());
    };

    match section {
        "gateway" => match field {
            "model" => config.gateway.model = value.to_string(),
            "temperature" => config.gateway.temperature = value.parse()?,
            "max_tokens" => config.gateway.max_tokens = Some(value.parse()?),
            "timeout_secs" => config.gateway.timeout_secs = value.parse()?,
            "dispatch_mode" => {
                config.gateway.dispatch_mode =
                    value.parse::<DispatchMode>().map_err(anyhow::Error::msg)?
            }
            "selection" => {
                config.gateway.selection =
                    value.parse::<ResponseSelectionPolicy>().map_err(anyhow::Error::msg)?
            }
            "max_retries" => config.gateway.max_retries = value.parse()?,
            "retry_delay_ms" => config.gateway.retry_delay_ms = value.parse()?,
            _ => {
                println!("Unknown gateway field: {}", field);
                println!(
                    "Available: model, temperature, max_tokens, timeout_secs, dispatch_mode, \
                     selection, max_retries, retry_delay_ms"
                );
                return Ok(());
            }
        },
        "network" => match field {
            "base_url" => config.network.base_url = value.to_string(),
            "api_key" => config.network.api_key = Some(value.to_string()),
            _ => {
                println!("Unknown network field: {}", field);
                println!("Available: base_url, api_key");
                return Ok(());
            }
        },
        "budget" => match field {
            "total_budget" => {
                let budget: f64 = value.parse()?;
                if budget < 0.0 {
                    bail!("budget.total_budget must not be negative");
                }
                config.budget.total_budget = budget;
            }
            _ => {
                println!("Unknown budget field: {}", field);
                return Ok(());
            }
        },
        _ => {
            println!("Unknown section: {}", section);
            println!("Available: gateway, network, budget");
            return Ok(());
        }
    }

    config.save_to(path.to_path_buf())?;
    debug!("Saved config to {}", path.display());
    println!("Set {} = {}", key, if field == "api_key" { "***" } else { value });

    Ok(())
}

fn config_path(path: &Path) {
    println!("{}", path.display());

    if path.exists() {
        println!("(file exists)");
    } else {
        println!("(file does not exist - run 'config init' to create)");
    }
}

fn config_validate(path: &Path) -> Result<()> {
    let config = Config::load_from(path.to_path_buf())?;

    match config.validate() {
        Ok(()) => {
            println!("Configuration is valid!");
            println!();
            println!("Network: {}", config.network.base_url);
            println!(
                "  API key: {}",
                if config.network_api_key().is_some() { "set" } else { "not set" }
            );
            println!(
                "Model: {} ({} priced models)",
                config.gateway.model,
                config.cost_table().len()
            );
            println!(
                "Dispatch: {:?}, selection: {}, timeout: {}s, retries: {}",
                config.gateway.dispatch_mode,
                config.gateway.selection,
                config.gateway.timeout_secs,
                config.gateway.max_retries
            );
            if config.budget.total_budget > 0.0 {
                println!("Budget: ${:.2}", config.budget.total_budget);
            } else {
                println!("Budget: unlimited");
            }
        }
        Err(e) => {
            println!("Configuration validation failed:");
            println!("  {}", e);
            println!();
            println!("To fix, edit {} or use 'config set'", path.display());
        }
    }

    Ok(())
}
