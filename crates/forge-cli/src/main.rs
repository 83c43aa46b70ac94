use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use forge_contracts::events::EventWriter;
use forge_contracts::ideas::{
    degen_label, Blueprint, ForgeConfig, ForgeMode, Idea, IdeaStatus, Language, MAX_DEGEN_LEVEL,
};
use forge_contracts::store::{JsonFileStore, ProviderSettings};
use forge_engine::{
    AiError, ForgeClient, ForgeSession, HttpChatTransport, ProviderEnv, ProviderResolver,
    SessionError,
};

const STORAGE_FILE: &str = "storage.json";
const EVENTS_FILE: &str = "events.jsonl";

#[derive(Debug, Parser)]
#[command(name = "idea-forge", version, about = "Forge, verify and expand Web3 project ideas")]
struct Cli {
    /// Directory holding storage.json and events.jsonl.
    #[arg(long, global = true, default_value = ".idea-forge")]
    data_dir: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate a new batch and make it the working set.
    Generate(GenerateArgs),
    /// Show the working set.
    List,
    Verify(IdeaArgs),
    Blueprint(BlueprintArgs),
    Translate(TranslateArgs),
    Contract(IdeaArgs),
    /// List archived batches, newest first.
    Batches,
    Restore(RestoreArgs),
    Settings(SettingsArgs),
    Lang(LangArgs),
}

#[derive(Debug, Args, Default)]
struct ProviderArgs {
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long)]
    base_url: Option<String>,
    #[arg(long)]
    model: Option<String>,
}

impl ProviderArgs {
    fn overrides(&self) -> Option<ProviderSettings> {
        let settings = ProviderSettings {
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
        };
        if settings.is_empty() {
            None
        } else {
            Some(settings)
        }
    }
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[arg(long, default_value = "targeted")]
    mode: ForgeMode,
    #[arg(long = "ecosystem")]
    ecosystems: Vec<String>,
    #[arg(long = "sector")]
    sectors: Vec<String>,
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u8).range(1..=5))]
    quantity: u8,
    #[arg(long, default_value_t = 20)]
    degen: u8,
    #[arg(long)]
    context: Option<String>,
    /// Also stores the language preference.
    #[arg(long)]
    lang: Option<Language>,
    #[command(flatten)]
    provider: ProviderArgs,
}

#[derive(Debug, Args)]
struct IdeaArgs {
    idea_id: String,
    #[command(flatten)]
    provider: ProviderArgs,
}

#[derive(Debug, Args)]
struct BlueprintArgs {
    idea_id: String,
    /// Regenerate even if a blueprint is cached.
    #[arg(long)]
    refresh: bool,
    #[command(flatten)]
    provider: ProviderArgs,
}

#[derive(Debug, Args)]
struct TranslateArgs {
    idea_id: String,
    /// Target language; defaults to the stored preference.
    #[arg(long)]
    lang: Option<Language>,
    #[command(flatten)]
    provider: ProviderArgs,
}

#[derive(Debug, Args)]
struct RestoreArgs {
    batch_id: String,
}

#[derive(Debug, Args)]
struct SettingsArgs {
    #[command(flatten)]
    provider: ProviderArgs,
    /// Forget all stored provider settings.
    #[arg(long)]
    clear: bool,
}

#[derive(Debug, Args)]
struct LangArgs {
    tag: Option<Language>,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            let (code, message) = describe_error(&err);
            eprintln!("error[{code}]: {message}");
            std::process::exit(1);
        }
    }
}

fn describe_error(err: &anyhow::Error) -> (String, String) {
    if let Some(session) = err.downcast_ref::<SessionError>() {
        return (session.code(), session.user_message());
    }
    if let Some(ai) = err.downcast_ref::<AiError>() {
        return (ai.code(), ai.user_message());
    }
    ("CLI_ERROR".to_string(), format!("{err:#}"))
}

fn run() -> Result<i32> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let mut session = open_session(&cli.data_dir)?;

    match cli.command {
        Command::Generate(args) => run_generate(&session, args),
        Command::List => {
            print_ideas(&session.ideas());
            Ok(0)
        }
        Command::Verify(args) => {
            let overrides = args.provider.overrides();
            let result = session.verify(&args.idea_id, overrides.as_ref())?;
            if result.is_unique {
                println!("Verified unique.");
            } else {
                println!(
                    "Collision detected: {} similar projects",
                    result.similar_projects.len()
                );
            }
            for project in &result.similar_projects {
                match &project.url {
                    Some(url) => println!("  - {} <{url}>", project.name),
                    None => println!("  - {}", project.name),
                }
            }
            if !result.notes.is_empty() {
                println!("Notes: {}", result.notes);
            }
            if let Some(pivot) = &result.pivot_suggestion {
                println!("Pivot: {pivot}");
            }
            Ok(0)
        }
        Command::Blueprint(args) => {
            let overrides = args.provider.overrides();
            let blueprint = if args.refresh {
                session.refresh_blueprint(&args.idea_id, overrides.as_ref())?
            } else {
                session.view_blueprint(&args.idea_id, overrides.as_ref())?
            };
            print_blueprint(&blueprint);
            Ok(0)
        }
        Command::Translate(args) => {
            let target = args.lang.unwrap_or_else(|| session.language());
            let overrides = args.provider.overrides();
            let idea = session.translate(&args.idea_id, target, overrides.as_ref())?;
            print_idea(&idea);
            Ok(0)
        }
        Command::Contract(args) => {
            let overrides = args.provider.overrides();
            let code = session.contract_code(&args.idea_id, overrides.as_ref())?;
            println!("{code}");
            Ok(0)
        }
        Command::Batches => {
            let batches = session.batches();
            if batches.is_empty() {
                println!("No archived batches.");
            }
            for batch in batches {
                println!("{}  {}  ({} ideas)", batch.id, batch.label, batch.ideas.len());
            }
            Ok(0)
        }
        Command::Restore(args) => {
            let restored = session.restore_batch(&args.batch_id)?;
            println!("Restored {} ideas.", restored.len());
            print_ideas(&restored);
            Ok(0)
        }
        Command::Settings(args) => run_settings(&mut session, args),
        Command::Lang(args) => {
            if let Some(language) = args.tag {
                session.set_language(language)?;
            }
            let language = session.language();
            println!("{} ({})", language.tag(), language.prompt_name());
            Ok(0)
        }
    }
}

fn open_session(data_dir: &Path) -> Result<ForgeSession<HttpChatTransport>> {
    fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data dir {}", data_dir.display()))?;
    let transport = HttpChatTransport::new()?;
    let resolver = ProviderResolver::new(ProviderSettings::default(), ProviderEnv::from_env());
    let store = JsonFileStore::new(data_dir.join(STORAGE_FILE));
    let events = EventWriter::new(data_dir.join(EVENTS_FILE), uuid::Uuid::new_v4().to_string());
    Ok(ForgeSession::open(
        ForgeClient::new(transport, resolver),
        Box::new(store),
        events,
    ))
}

fn run_generate(session: &ForgeSession<HttpChatTransport>, args: GenerateArgs) -> Result<i32> {
    if let Some(language) = args.lang {
        session.set_language(language)?;
    }
    let defaults = ForgeConfig::default();
    let config = ForgeConfig {
        mode: args.mode,
        ecosystems: if args.ecosystems.is_empty() {
            defaults.ecosystems
        } else {
            args.ecosystems
        },
        sectors: if args.sectors.is_empty() {
            defaults.sectors
        } else {
            args.sectors
        },
        quantity: args.quantity,
        degen_level: args.degen.min(MAX_DEGEN_LEVEL),
        user_context: args.context,
    };
    println!(
        "Forging {} {} ideas in {}...",
        config.quantity,
        config.mode.as_str(),
        session.language().prompt_name()
    );
    let overrides = args.provider.overrides();
    let batch = session.generate(&config, overrides.as_ref())?;
    println!("Batch {} saved: {}", batch.id, batch.label);
    print_ideas(&batch.ideas);
    Ok(0)
}

fn run_settings(session: &mut ForgeSession<HttpChatTransport>, args: SettingsArgs) -> Result<i32> {
    if args.clear {
        session.set_provider_settings(ProviderSettings::default())?;
        println!("Stored provider settings cleared.");
    } else if let Some(update) = args.provider.overrides() {
        let current = session.provider_settings().clone();
        let merged = ProviderSettings {
            api_key: update.api_key.or(current.api_key),
            base_url: update.base_url.or(current.base_url),
            model: update.model.or(current.model),
        };
        session.set_provider_settings(merged)?;
        println!("Provider settings saved.");
    }

    match session.client().effective_config(None) {
        Ok(config) => {
            println!("api key:  {}", config.masked_api_key());
            println!("base url: {}", config.base_url);
            println!("model:    {}", config.model);
        }
        Err(AiError::MissingCredential) => {
            println!("api key:  (not set)");
        }
        Err(err) => return Err(err.into()),
    }
    Ok(0)
}

fn print_ideas(ideas: &[Idea]) {
    if ideas.is_empty() {
        println!("Working set is empty. Run `idea-forge generate` first.");
        return;
    }
    for idea in ideas {
        print_idea(idea);
    }
}

fn print_idea(idea: &Idea) {
    println!();
    println!("[{}] {}", idea.id, idea.title);
    if !idea.tagline.is_empty() {
        println!("  {}", idea.tagline);
    }
    println!(
        "  {} / {} | degen {} {} | {}",
        idea.ecosystem,
        idea.sector,
        idea.degen_score,
        degen_label(idea.degen_score),
        status_badge(idea)
    );
    if !idea.description.is_empty() {
        println!("  {}", idea.description);
    }
    for feature in &idea.features {
        println!("  * {feature}");
    }
}

fn status_badge(idea: &Idea) -> String {
    match (&idea.status, &idea.verification_result) {
        (IdeaStatus::Verified, Some(result)) if !result.is_unique => "VERIFIED (collision)".to_string(),
        (status, _) => status.to_string(),
    }
}

fn print_blueprint(blueprint: &Blueprint) {
    let sections = [
        ("Overview", blueprint.overview.as_str()),
        ("Tokenomics", blueprint.tokenomics.as_str()),
        ("Roadmap", blueprint.roadmap.as_str()),
        ("Technical architecture", blueprint.technical_architecture.as_str()),
    ];
    for (heading, body) in sections {
        println!("## {heading}\n{body}\n");
    }
    if let Some(code) = &blueprint.contract_code {
        println!("## Contract\n{code}\n");
    }
    if let Some(snippet) = &blueprint.frontend_snippet {
        println!("## Frontend\n{snippet}\n");
    }
    if let Some(url) = &blueprint.deployment_url {
        println!("Deployment: {url}");
    }
}
