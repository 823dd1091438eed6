use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use fysiocode_core::{load_config, AppConfig, Resolver};
use fysiocode_schema::{Query, ResolutionResult};
use fysiocode_server::state::AppState;

#[derive(Parser)]
#[command(name = "fysiocode", version, about = "Complaint-to-diagnosis-code resolution")]
struct Cli {
    #[arg(
        long,
        default_value = "fysiocode.yaml",
        help = "Config file; the offline stub provider is used when it does not exist"
    )]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Start the HTTP API server")]
    Serve {
        #[arg(long, help = "Override the configured bind address")]
        bind: Option<String>,
    },
    #[command(about = "Resolve a single complaint and print the result")]
    Resolve {
        #[arg(help = "Complaint description in Dutch")]
        text: String,
        #[arg(long, help = "Continue an existing conversation")]
        conversation: Option<String>,
    },
    #[command(about = "Interactive complaint dialogue on the terminal")]
    Chat,
    #[command(about = "Probe the resolution pipeline end to end")]
    Health,
    #[command(about = "Validate the config file")]
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = read_config(&cli.config)?;

    match cli.command {
        Commands::Serve { bind } => {
            let resolver = Arc::new(Resolver::from_config(&config)?);
            let addr = bind.unwrap_or_else(|| config.server.bind.clone());
            fysiocode_server::serve(AppState::new(resolver), &addr).await?;
        }
        Commands::Resolve { text, conversation } => {
            let resolver = Resolver::from_config(&config)?;
            let mut query = Query::new(text);
            if let Some(id) = conversation {
                query = query.with_conversation(id);
            }
            let result = resolver.resolve(&query).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Chat => {
            let resolver = Resolver::from_config(&config)?;
            run_chat(&resolver).await?;
        }
        Commands::Health => {
            let resolver = Resolver::from_config(&config)?;
            let report = resolver.health_check().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Validate => validate_config(&cli.config, &config)?,
    }

    Ok(())
}

fn read_config(path: &PathBuf) -> Result<AppConfig> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!(
            "config file {} not found, using the offline stub provider",
            path.display()
        );
        Ok(AppConfig::default())
    }
}

fn validate_config(path: &PathBuf, config: &AppConfig) -> Result<()> {
    // Constructing the resolver exercises provider selection and key checks.
    let resolver = Resolver::from_config(config)?;
    println!("config ok: {}", path.display());
    println!("  provider: {:?}", config.provider.provider_type);
    println!("  server bind: {}", config.server.bind);
    println!(
        "  resolver: {} attempts, backoff base {} ms",
        config.resolver.max_attempts, config.resolver.backoff_base_ms
    );
    println!(
        "  code table: {} locations x {} pathologies",
        resolver.table().locations().len(),
        resolver.table().pathologies().len()
    );
    Ok(())
}

async fn run_chat(resolver: &Resolver) -> Result<()> {
    println!("Beschrijf de klacht (leeg of 'stop' om te stoppen).");
    let stdin = std::io::stdin();
    let mut conversation: Option<String> = None;
    let mut awaiting_answer = false;

    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() || line.eq_ignore_ascii_case("stop") {
            break;
        }

        let result = match (&conversation, awaiting_answer) {
            (Some(id), true) => resolver.resolve_clarification(id, line).await,
            _ => {
                let mut query = Query::new(line);
                if let Some(id) = &conversation {
                    query = query.with_conversation(id.clone());
                }
                resolver.resolve(&query).await
            }
        };

        conversation = Some(result.conversation_id.clone());
        awaiting_answer = result.needs_clarification;
        print_result(&result);

        if result.success && !result.needs_clarification {
            conversation = None;
        }
    }
    Ok(())
}

fn print_result(result: &ResolutionResult) {
    if let Some(err) = &result.error {
        println!("[{:?}] {}", err.kind, err.message);
        for suggestion in &err.suggestions {
            println!("  - {suggestion}");
        }
    }
    if let Some(question) = &result.clarifying_question {
        println!("{question}");
        return;
    }
    for s in &result.suggestions {
        println!("{}  {}  ({:.0}%)", s.code, s.name, s.confidence * 100.0);
        println!("    {}", s.rationale);
    }
}
