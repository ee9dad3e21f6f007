use anyhow::{Result, anyhow, bail};
use console::style;
use std::collections::HashMap;
use tracing::Level;

use crate::config::{self, AppConfig};
use crate::core::bootstrap::{self, Services};
use crate::core::flows::{RuntimeInputs, StructuredGenerator};
use crate::core::terminal::{self, GuideSection};
use crate::interfaces::web::{self, AppState};
use crate::logging::{self, Console};

fn print_help() {
    terminal::print_banner();

    GuideSection::new("Core")
        .command("serve", "Start the HTTP API")
        .command("run <flow>", "Run one generation flow and print its JSON")
        .print();

    GuideSection::new("Catalog")
        .command("flows", "List available generation flows")
        .command("providers", "List known LLM providers")
        .print();

    GuideSection::new("Run options")
        .command("--input key=value", "Named value for a {{key}} placeholder")
        .command("--arg value", "Positional value for {{0}}, {{1}}, ...")
        .print();

    GuideSection::new("Serve options")
        .command("--host <addr>", "Bind address (default from bizstudio.toml)")
        .command("--port <port>", "Bind port (default from bizstudio.toml)")
        .print();

    println!(
        "\n {} {} <command> [options]\n",
        style("Usage:").bold(),
        style("bizstudio").green()
    );
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RunCommandArgs {
    pub flow: String,
    pub inputs: RuntimeInputs,
}

pub(crate) fn parse_run_command_args(args: &[String], start: usize) -> Result<RunCommandArgs> {
    let mut flow: Option<String> = None;
    let mut named = HashMap::new();
    let mut positional = Vec::new();
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--input" | "-i" => {
                let pair = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow!("--input expects key=value"))?;
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| anyhow!("--input expects key=value, got '{}'", pair))?;
                named.insert(key.trim().to_string(), value.to_string());
                i += 2;
            }
            "--arg" | "-a" => {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow!("--arg expects a value"))?;
                positional.push(value.clone());
                i += 2;
            }
            other if flow.is_none() && !other.starts_with('-') => {
                flow = Some(other.to_string());
                i += 1;
            }
            other => bail!("unexpected argument '{}'", other),
        }
    }

    let flow = flow.ok_or_else(|| anyhow!("usage: bizstudio run <flow> [--input k=v] [--arg v]"))?;
    Ok(RunCommandArgs {
        flow,
        inputs: RuntimeInputs { positional, named },
    })
}

pub(crate) fn parse_serve_flags(
    args: &[String],
    start: usize,
    mut host: String,
    mut port: u16,
) -> (String, u16) {
    let mut i = start;
    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                if i + 1 < args.len() {
                    port = args[i + 1].parse().unwrap_or(port);
                    i += 2;
                } else {
                    i += 1;
                }
            }
            "--host" => {
                if i + 1 < args.len() {
                    host = args[i + 1].clone();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    (host, port)
}

/// Only the long-running server logs to stdout; one-shot commands print
/// their results there, so their logs go to stderr.
pub(crate) fn console_for(command: &str) -> Console {
    match command {
        "serve" => Console::Stdout,
        _ => Console::Stderr,
    }
}

pub async fn run_main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");

    if matches!(command, "help" | "--help" | "-h") {
        print_help();
        return Ok(());
    }

    let data_dir = config::data_dir();
    let config = AppConfig::load(&data_dir).await?;

    match command {
        "serve" => {
            let log_tx = logging::init(config.logging.max_level(), console_for(command));
            let (host, port) =
                parse_serve_flags(&args, 2, config.server.host.clone(), config.server.port);
            let services = bootstrap::load_services(&config)?;
            let storage = bootstrap::open_storage(&config).await?;
            terminal::print_success("BusinessStudio AI API starting");
            terminal::print_link("API", &format!("http://{}:{}/api", host, port));
            let state = AppState::new(
                services.catalog,
                services.llm,
                services.provider_registry,
                storage,
                log_tx,
                port,
            );
            web::serve(state, &host, port).await
        }
        "run" => {
            logging::init(Level::WARN, console_for(command));
            let run_args = parse_run_command_args(&args, 2)?;
            let services = bootstrap::load_services(&config)?;
            run_flow(&services, &run_args).await
        }
        "flows" => {
            logging::init(Level::WARN, console_for(command));
            let services = bootstrap::load_services(&config)?;
            print_flows(&services);
            Ok(())
        }
        "providers" => {
            logging::init(Level::WARN, console_for(command));
            let services = bootstrap::load_services(&config)?;
            print_providers(&services, &config);
            Ok(())
        }
        other => {
            terminal::print_error(&format!("Unknown command '{}'", other));
            print_help();
            bail!("unknown command '{}'", other)
        }
    }
}

async fn run_flow(services: &Services, run_args: &RunCommandArgs) -> Result<()> {
    let flow = services
        .catalog
        .get(&run_args.flow)
        .ok_or_else(|| anyhow!("flow '{}' not found; see `bizstudio flows`", run_args.flow))?;
    let generator = StructuredGenerator::from_manager(&services.llm)?;

    let inputs = (!run_args.inputs.is_empty()).then_some(&run_args.inputs);
    let result = generator.execute(flow, inputs).await?;
    println!("{}", serde_json::to_string_pretty(result.data())?);
    Ok(())
}

fn print_flows(services: &Services) {
    terminal::print_step("Generation flows");
    for flow in services.catalog.list() {
        terminal::print_status(flow.identifier(), flow.description().unwrap_or("-"));
    }
}

fn print_providers(services: &Services, config: &AppConfig) {
    terminal::print_step("LLM providers");
    let (active, model) = services.llm.get_active_info();
    for def in &services.provider_registry.providers {
        let marker = if active == Some(&def.id) {
            format!(
                "active, model {}",
                model.map(String::as_str).unwrap_or(&def.default_model)
            )
        } else if def.id == config.llm.provider {
            format!("selected, but ${} is not set", def.auth.api_key_env)
        } else {
            format!("key from ${}", def.auth.api_key_env)
        };
        terminal::print_status(&def.name, &marker);
    }
    if active.is_none() {
        terminal::print_warn("No provider is active; `bizstudio run` will fail.");
    }
}
