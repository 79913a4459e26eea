use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use upsellr::domain::{AgentConfig, CustomerEvent, DecisionRecord, RunOutcome};
use upsellr::generator::LlmGenerator;
use upsellr::guidelines::Guidelines;
use upsellr::judge::{LlmJudge, RuleGates};
use upsellr::llm::{AnthropicClient, LlmClient};
use upsellr::orchestrator::Orchestrator;
use upsellr::prompt::PromptRenderer;
use upsellr::resolver::{AgentRegistry, FeatureStore};
use upsellr::storage::{DecisionStats, DecisionStore, Filter, JsonlDecisionStore};

mod cli;
mod config;

use cli::Cli;
use cli::commands::{AgentCommands, Commands, FeaturesCommands};
use config::GlobalConfig;

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("upsellr")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("upsellr.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn agent_registry(config: &GlobalConfig) -> Result<AgentRegistry> {
    let path = config.sources.resolve(&config.storage.data_dir, &config.sources.agents);
    let registry = AgentRegistry::open(&path).context(format!("Failed to open agent registry {}", path.display()))?;
    Ok(registry.with_fallback(AgentConfig::fallback(&config.agent_id, &config.llm.model)))
}

/// Read lazily; a bad file only costs runs their feature context.
fn feature_store(config: &GlobalConfig) -> FeatureStore {
    FeatureStore::open(config.sources.resolve(&config.storage.data_dir, &config.sources.features))
}

fn decision_store(config: &GlobalConfig) -> Result<JsonlDecisionStore> {
    let path = config.storage.decisions_path();
    JsonlDecisionStore::open(&path).context(format!("Failed to open decision store {}", path.display()))
}

fn load_guidelines(config: &GlobalConfig) -> Result<Guidelines> {
    let path = config.sources.resolve(&config.storage.data_dir, &config.sources.guidelines);
    Guidelines::load_or_default(Some(path.as_path())).context(format!("Failed to load guidelines {}", path.display()))
}

fn read_event(path: &Path) -> Result<CustomerEvent> {
    let content = fs::read_to_string(path).context(format!("Failed to read event {}", path.display()))?;
    let event = CustomerEvent::from_json(&content).context("Failed to parse event")?;
    event.validate().context("Event rejected")?;
    Ok(event)
}

fn build_orchestrator(config: &GlobalConfig, persist: bool) -> Result<Orchestrator> {
    let guidelines = load_guidelines(config)?;
    let catalog = Arc::new(guidelines.service_catalog);
    let brand = Arc::new(guidelines.brand);

    let renderer = match &config.sources.templates_dir {
        Some(dir) => PromptRenderer::with_templates_dir(dir).context("Failed to load prompt templates")?,
        None => PromptRenderer::new(),
    };
    let renderer = Arc::new(renderer);

    let client: Arc<dyn LlmClient> =
        Arc::new(AnthropicClient::new(config.llm.to_anthropic()).context("Failed to create LLM client")?);

    let generator = LlmGenerator::new(client.clone(), renderer.clone(), catalog.clone(), brand.clone())
        .with_timeout(std::time::Duration::from_millis(config.llm.timeout_ms));
    let judge = LlmJudge::new(client, renderer)
        .with_rules(RuleGates::new(
            config.orchestration.cooldown_days,
            config.orchestration.min_satisfaction,
        ))
        .with_model(config.llm.model.clone())
        .with_timeout(std::time::Duration::from_millis(config.llm.timeout_ms));

    let mut orchestrator = Orchestrator::new(
        Arc::new(feature_store(config)),
        Arc::new(agent_registry(config)?),
        Arc::new(generator),
        Arc::new(judge),
    )
    .with_catalog(catalog)
    .with_brand(brand)
    .with_policy(config.retry_policy())
    .with_transport(config.transport.to_retry())
    .with_agent_id(config.agent_id.clone());

    if persist {
        orchestrator = orchestrator.with_store(Arc::new(decision_store(config)?));
    }
    Ok(orchestrator)
}

fn outcome_label(outcome: RunOutcome) -> ColoredString {
    match outcome {
        RunOutcome::Approved => "approved".green(),
        RunOutcome::Rejected => "rejected".yellow(),
        RunOutcome::Exhausted => "exhausted".yellow(),
        RunOutcome::Errored => "errored".red(),
    }
}

fn print_summary(record: &DecisionRecord) {
    println!(
        "{}  {}  {}  attempts={}  agent={}",
        record.id.cyan(),
        outcome_label(record.outcome),
        record.customer_key,
        record.attempt_count,
        record.agent_version.as_deref().unwrap_or("-")
    );
}

fn print_record(record: &DecisionRecord, verbose: bool) {
    println!("{} {}", "Decision:".bold(), record.id.cyan());
    println!("  Outcome:   {} (final status: {})", outcome_label(record.outcome), record.final_status);
    println!("  Customer:  {}", record.customer_key);
    println!("  Created:   {}", record.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let (Some(agent), Some(version)) = (&record.agent_id, &record.agent_version) {
        let source = if record.used_fallback_config() {
            " (fallback default)".yellow().to_string()
        } else {
            String::new()
        };
        println!("  Agent:     {} v{}{}", agent, version, source);
    }
    println!(
        "  Features:  {}",
        if record.feature_context_available { "available" } else { "absent" }
    );
    if let Some(reason) = &record.reason {
        println!("  Reason:    {}", reason);
    }
    if let Some(error) = &record.error {
        println!("  {} {:?}: {}", "Error:".red(), error.kind, error.message);
    }

    for attempt in &record.attempts {
        let verdict = &attempt.verdict;
        let status = if verdict.approved {
            "approved".green()
        } else {
            verdict.category_label().yellow()
        };
        println!(
            "\n  {} {}  score={}/10  {}",
            "Attempt".bold(),
            attempt.attempt,
            verdict.score,
            status
        );
        println!("    Subject: {}", attempt.draft.subject);
        if let Some(service) = &attempt.draft.recommended_service {
            println!("    Service: {}", service);
        }
        println!("    Judge:   {}", verdict.feedback);
        if verbose {
            for issue in &verdict.issues {
                println!("      - {}", issue);
            }
        }
    }

    if let Some(draft) = &record.draft
        && (record.is_sendable() || verbose)
    {
        println!("\n  {} {}", "Subject:".bold(), draft.subject);
        println!("{}", draft.body);
    }

    if verbose {
        let path: Vec<String> = record.transitions.iter().map(|p| p.to_string()).collect();
        println!("\n  Transitions: {}", path.join(" -> "));
    }
}

async fn handle_run_command(event: &Path, dry_run: bool, cli: &Cli, config: &GlobalConfig) -> Result<()> {
    let event = read_event(event)?;
    let orchestrator = build_orchestrator(config, !dry_run)?;

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            canceller.cancel();
        }
    });

    let timeout = config.run_timeout();
    let record = match tokio::time::timeout(timeout, orchestrator.run_with_cancel(&event, token)).await {
        Ok(result) => result.context("Run did not complete")?,
        Err(_) => eyre::bail!("Run timed out after {:?}; no decision recorded", timeout),
    };

    print_record(&record, cli.is_verbose());
    if dry_run {
        println!("\n{}", "Dry run: decision not persisted".yellow());
    }
    if record.needs_followup() {
        println!("\n{}", "Errored run: event is unresolved and needs follow-up".red());
    }
    Ok(())
}

fn handle_list_command(status: Option<&str>, limit: Option<usize>, config: &GlobalConfig) -> Result<()> {
    let store = decision_store(config)?;
    let mut filters = Vec::new();
    if let Some(s) = status {
        let outcome: RunOutcome = serde_json::from_value(serde_json::Value::String(s.to_string()))
            .context(format!("Unknown status '{}'", s))?;
        filters.push(Filter::eq("outcome", outcome));
    }

    let mut records = store.query(&filters)?;
    if let Some(n) = limit {
        let skip = records.len().saturating_sub(n);
        records.drain(..skip);
    }

    if records.is_empty() {
        println!("{}", "No decisions recorded".yellow());
        return Ok(());
    }
    for record in &records {
        print_summary(record);
    }
    Ok(())
}

fn handle_show_command(id: &str, verbose: bool, config: &GlobalConfig) -> Result<()> {
    let store = decision_store(config)?;
    match store.get(id)? {
        Some(record) => {
            print_record(&record, verbose);
            Ok(())
        }
        None => Err(upsellr::error::UpsellError::DecisionNotFound(id.to_string()).into()),
    }
}

fn handle_stats_command(config: &GlobalConfig) -> Result<()> {
    let store = decision_store(config)?;
    let stats = DecisionStats::from_records(&store.list()?);

    println!("{}", "Decision statistics".bold());
    println!("  Total:             {}", stats.total);
    println!("  Approved:          {}", stats.approved.to_string().green());
    println!("  Rejected:          {}", stats.rejected);
    println!("  Exhausted:         {}", stats.exhausted);
    println!("  Errored:           {}", stats.errored.to_string().red());
    println!("  Approval rate:     {:.1}%", stats.approval_rate * 100.0);
    println!("  Average attempts:  {:.2}", stats.average_attempts);
    println!("  Approved on retry: {}", stats.approved_after_retry);
    for (category, count) in &stats.by_category {
        println!("  Rejected for {}: {}", category, count);
    }
    if stats.fallback_config_runs > 0 {
        println!(
            "  {} {} run(s) used the fallback agent configuration",
            "Warning:".yellow(),
            stats.fallback_config_runs
        );
    }
    if stats.needs_followup() > 0 {
        println!("  {} {} errored run(s) need follow-up", "Warning:".red(), stats.needs_followup());
    }
    Ok(())
}

fn handle_agent_command(command: &AgentCommands, config: &GlobalConfig) -> Result<()> {
    let registry = agent_registry(config)?;
    match command {
        AgentCommands::List => {
            let agents = registry.list()?;
            if agents.is_empty() {
                println!("{}", "No agents registered; runs will use the fallback default".yellow());
            }
            for agent in agents {
                println!(
                    "{:<24} {:<10} {:<12} {}",
                    agent.agent_id,
                    agent.version,
                    agent.status.to_string(),
                    agent.model
                );
            }
        }
        AgentCommands::Register { file } => {
            let content = fs::read_to_string(file).context(format!("Failed to read {}", file.display()))?;
            let agent: AgentConfig = serde_json::from_str(&content).context("Failed to parse agent configuration")?;
            let label = format!("{} v{}", agent.agent_id, agent.version);
            registry.register(agent)?;
            println!("{} {}", "Registered:".green(), label);
        }
        AgentCommands::Promote { agent_id, version } => {
            registry.promote(agent_id, version)?;
            println!("{} {} v{} is now production", "Promoted:".green(), agent_id, version);
        }
    }
    Ok(())
}

fn handle_features_command(command: &FeaturesCommands, config: &GlobalConfig) -> Result<()> {
    let store = feature_store(config);
    match command {
        FeaturesCommands::Enrich { event } => {
            let event = read_event(event)?;
            let features = store.enrich_event(&event)?;
            println!("{} {}", "Enriched:".green(), event.customer_key().unwrap_or_default());
            println!("{}", features.prompt_text());
        }
        FeaturesCommands::Show { customer } => match store.get(customer)? {
            Some(features) => println!("{}", serde_json::to_string_pretty(&features)?),
            None => println!("{} {}", "No features stored for".yellow(), customer),
        },
    }
    Ok(())
}

fn handle_catalog_command(config: &GlobalConfig) -> Result<()> {
    let guidelines = load_guidelines(config)?;
    for service in guidelines.service_catalog.services() {
        println!("{}", service.name.bold());
        if !service.description.is_empty() {
            println!("  {}", service.description);
        }
        for benefit in &service.benefits {
            println!("  + {}", benefit);
        }
    }
    Ok(())
}

async fn run_application(cli: &Cli, config: &GlobalConfig) -> Result<()> {
    info!("Starting application");

    if cli.is_verbose() {
        println!("{}", "Verbose mode enabled".yellow());
    }

    match &cli.command {
        Commands::Run { event, dry_run } => handle_run_command(event, *dry_run, cli, config).await,
        Commands::List { status, limit } => handle_list_command(status.as_deref(), *limit, config),
        Commands::Show { id } => handle_show_command(id, cli.is_verbose(), config),
        Commands::Stats => handle_stats_command(config),
        Commands::Agent { command } => handle_agent_command(command, config),
        Commands::Features { command } => handle_features_command(command, config),
        Commands::Catalog => handle_catalog_command(config),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();

    let config = GlobalConfig::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    run_application(&cli, &config).await.context("Application failed")?;

    Ok(())
}
