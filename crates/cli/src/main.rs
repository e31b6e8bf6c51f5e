use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use triage_agents::{
    ChatOutcome, OpenAiAdvisor, OpenAiRuntimeConfig, RequestPipeline, DEFAULT_OPENAI_MODEL,
};
use triage_core::{AdvisoryResponse, SafetyFilter, TemplateStore};
use triage_observability::{init_cli_tracing, AppMetrics};

#[derive(Debug, Parser)]
#[command(name = "triage")]
#[command(about = "Symptom triage CLI")]
struct Cli {
    /// Enables the external model fallback.
    #[arg(long, env = "TRIAGE_OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    #[arg(long, env = "TRIAGE_OPENAI_MODEL", default_value = DEFAULT_OPENAI_MODEL)]
    openai_model: String,

    #[arg(long, env = "TRIAGE_EXTERNAL_TIMEOUT_SECONDS", default_value_t = 15)]
    timeout_seconds: u64,

    /// JSON file replacing the built-in templates.
    #[arg(long, env = "TRIAGE_TEMPLATES_PATH")]
    templates: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Answer one message and print the payload as JSON.
    Ask {
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Show which rule decides a message.
    Classify {
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,
    },
    /// Interactive session.
    Chat,
    /// Print the template store.
    Templates,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_cli_tracing("triage_cli");
    let cli = Cli::parse();

    let pipeline = build_pipeline(&cli)?;

    match cli.command {
        Command::Ask { message } => {
            let message = message.join(" ");
            match pipeline.handle(&message).await? {
                ChatOutcome::Delivered(delivery) => {
                    println!("{}", serde_json::to_string_pretty(&delivery.response)?);
                }
                ChatOutcome::Blocked(rejection) => {
                    println!("{}", serde_json::to_string_pretty(&rejection)?);
                    return Ok(ExitCode::from(2));
                }
            }
        }
        Command::Classify { message } => {
            let message = message.join(" ");
            let classifier = pipeline.classifier();
            let report = serde_json::json!({
                "blocked": SafetyFilter::new().is_unsafe(&message),
                "rule": classifier.explain(&message).map(|rule| rule.name()),
                "classification": classifier.classify(&message),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Chat => run_chat(pipeline).await?,
        Command::Templates => {
            let templates = pipeline
                .templates()
                .iter()
                .map(|(key, template)| (key.as_str(), template))
                .collect::<BTreeMap<_, _>>();
            println!("{}", serde_json::to_string_pretty(&templates)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn run_chat(pipeline: RequestPipeline<OpenAiAdvisor>) -> Result<()> {
    println!("Symptom triage chat. Describe your symptoms, or type 'exit' to quit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        let message = line.trim();
        if message.eq_ignore_ascii_case("exit") || message.eq_ignore_ascii_case("quit") {
            break;
        }

        if message.is_empty() {
            continue;
        }

        match pipeline.handle(message).await? {
            ChatOutcome::Delivered(delivery) => println!("\n{}\n", render(&delivery.response)),
            ChatOutcome::Blocked(rejection) => println!("\n{}\n", rejection.message),
        }
    }

    Ok(())
}

fn render(response: &AdvisoryResponse) -> String {
    fn bullets(items: &[String]) -> String {
        items
            .iter()
            .map(|item| format!("  • {item}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    format!(
        "CAUSES:\n{}\n\nMEDICINE CATEGORIES:\n{}\n\nHOME REMEDIES:\n{}\n\nRED FLAGS:\n{}\n\nNEXT STEPS:\n{}",
        response.causes,
        bullets(&response.medicine_categories),
        bullets(&response.home_remedies),
        bullets(&response.red_flags),
        response.next_steps.trim_start()
    )
}

fn build_pipeline(cli: &Cli) -> Result<RequestPipeline<OpenAiAdvisor>> {
    let templates = match cli.templates.as_ref() {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed reading templates from {}", path.display()))?;
            TemplateStore::from_json_str(&raw)
                .with_context(|| format!("invalid template file {}", path.display()))?
        }
        None => TemplateStore::standard(),
    };

    let openai = cli
        .openai_api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| OpenAiRuntimeConfig::new(key).with_model(cli.openai_model.clone()));

    RequestPipeline::standard(
        SafetyFilter::new(),
        templates,
        openai,
        Duration::from_secs(cli.timeout_seconds.clamp(1, 120)),
        AppMetrics::shared(),
    )
}
