//! CLI subcommand handlers.

use crate::output::{self, Format};
use crate::{Commands, ConfigAction};
use factlens_core::FactlensConfig;
use factlens_core::pipeline::{FactChecker, diagnose, load_corpus};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    top_k: Option<usize>,
    format: Format,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace),
        Commands::Doctor => handle_doctor(workspace, top_k, format).await,
        Commands::Index { force } => handle_index(workspace, top_k, force, format).await,
        Commands::Search { query } => {
            let config = load(workspace, top_k)?;
            let checker = FactChecker::from_config(&config, workspace).await?;
            let hits = checker.search(&query, config.retrieval.top_k).await?;
            output::print_evidence(&hits, format)
        }
        Commands::Verify { claim } => {
            let config = load(workspace, top_k)?;
            let checker = FactChecker::from_config(&config, workspace).await?;
            let verdict = checker.verify_claim(&claim).await?;
            output::print_verdict(&verdict, format)
        }
        Commands::Check { text, file } => {
            let text = read_input(text, file).await?;
            let config = load(workspace, top_k)?;
            let checker = FactChecker::from_config(&config, workspace).await?;
            let report = checker.check_text(&text).await?;
            output::print_report(&report, format)
        }
    }
}

/// Load layered configuration and apply command-line overrides.
fn load(workspace: &Path, top_k: Option<usize>) -> anyhow::Result<FactlensConfig> {
    let mut config = factlens_core::config::load_config(Some(workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    if let Some(k) = top_k {
        config.retrieval.top_k = k;
    }
    let problems = config.validate();
    if !problems.is_empty() {
        anyhow::bail!("Invalid configuration:\n  {}", problems.join("\n  "));
    }
    Ok(config)
}

async fn read_input(text: Option<String>, file: Option<PathBuf>) -> anyhow::Result<String> {
    if let Some(text) = text {
        return Ok(text);
    }
    if let Some(path) = file {
        return tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e));
    }
    let mut buf = String::new();
    tokio::io::stdin().read_to_string(&mut buf).await?;
    Ok(buf)
}

async fn handle_index(
    workspace: &Path,
    top_k: Option<usize>,
    force: bool,
    format: Format,
) -> anyhow::Result<()> {
    let config = load(workspace, top_k)?;
    let index_path = config.retrieval.index_path(workspace);
    if force && index_path.exists() {
        tokio::fs::remove_file(&index_path).await?;
        tracing::info!(path = %index_path.display(), "Removed existing index");
    }

    let corpus = load_corpus(&config, workspace)?;
    let embedder = factlens_core::create_embedder(&config.embedding);
    let kb = factlens_core::KnowledgeBase::open_or_build(
        corpus,
        &index_path,
        embedder.as_ref(),
        config.embedding.batch_size,
    )
    .await?;

    let summary = serde_json::json!({
        "index_path": index_path.display().to_string(),
        "documents": kb.len(),
        "dimensions": kb.index().dimensions(),
        "provider": kb.provider(),
        "model": kb.model(),
        "fingerprint": kb.fingerprint(),
    });
    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        Format::Text => println!(
            "Indexed {} documents ({} dimensions, {}) at {}",
            kb.len(),
            kb.index().dimensions(),
            kb.embedder_identity(),
            index_path.display()
        ),
    }
    Ok(())
}

async fn handle_doctor(
    workspace: &Path,
    top_k: Option<usize>,
    format: Format,
) -> anyhow::Result<()> {
    let mut config = factlens_core::config::load_config(Some(workspace), None)
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    if let Some(k) = top_k {
        config.retrieval.top_k = k;
    }
    let results = diagnose(&config, workspace).await;
    output::print_probes(&results, format)?;
    if results.iter().any(|r| !r.ok) {
        anyhow::bail!("One or more checks failed");
    }
    Ok(())
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".factlens");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }

            let toml_str = toml::to_string_pretty(&FactlensConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            let config = factlens_core::config::load_config(Some(workspace), None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        ConfigAction::Set { key, value } => {
            let path =
                factlens_core::config::set_workspace_value(workspace, &key, parse_value(&value))?;
            println!("Set {} in {}", key, path.display());
            Ok(())
        }
        ConfigAction::Validate => {
            let config = factlens_core::config::load_config(Some(workspace), None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            let problems = config.validate();
            if problems.is_empty() {
                println!("Configuration is valid.");
                return Ok(());
            }
            for problem in &problems {
                println!("  - {}", problem);
            }
            anyhow::bail!("{} configuration problem(s)", problems.len())
        }
    }
}

/// Parse a command-line value as a TOML literal, falling back to a string.
fn parse_value(raw: &str) -> toml::Value {
    toml::from_str::<toml::Table>(&format!("v = {}", raw))
        .ok()
        .and_then(|mut t| t.remove("v"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}
