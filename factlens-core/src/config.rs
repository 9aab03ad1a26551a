//! Configuration system for factlens.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> CLI args.
//! Configuration is loaded from `~/.config/factlens/config.toml` and/or `.factlens/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::embeddings::EmbeddingConfig;
use crate::entailment::ClassifierConfig;
use crate::extractor::ExtractorConfig;
use crate::retriever::DEFAULT_TOP_K;
use crate::verifier::VerifierConfig;

/// Top-level configuration for factlens.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactlensConfig {
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub verifier: VerifierConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
}

/// Corpus location and retrieval settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Evidence documents retrieved per claim.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Primary corpus JSON file, relative to the workspace.
    #[serde(default = "default_corpus_path")]
    pub corpus_path: PathBuf,
    /// Further corpus files appended after the primary one, in order.
    #[serde(default)]
    pub additional_corpora: Vec<PathBuf>,
    /// SQLite file holding the persisted index.
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_corpus_path() -> PathBuf {
    PathBuf::from("data/corpus.json")
}

fn default_index_path() -> PathBuf {
    PathBuf::from("data/corpus.index.db")
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            corpus_path: default_corpus_path(),
            additional_corpora: Vec::new(),
            index_path: default_index_path(),
        }
    }
}

impl RetrievalConfig {
    /// Every corpus file resolved against `workspace`, primary first.
    pub fn corpus_paths(&self, workspace: &Path) -> Vec<PathBuf> {
        std::iter::once(&self.corpus_path)
            .chain(self.additional_corpora.iter())
            .map(|p| workspace.join(p))
            .collect()
    }

    pub fn index_path(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.index_path)
    }
}

const EMBEDDING_PROVIDERS: &[&str] = &["local", "fastembed", "openai", "ollama"];

impl FactlensConfig {
    /// Check the configuration and return human-readable problems.
    ///
    /// Returns an empty Vec if the config is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        if self.retrieval.top_k == 0 {
            problems.push("retrieval.top_k must be at least 1".to_string());
        }

        let cap = self.verifier.numeric_confidence_cap;
        if !(0.0..=1.0).contains(&cap) {
            problems.push(format!(
                "verifier.numeric_confidence_cap is {} but must be within [0, 1]",
                cap
            ));
        }
        if self.verifier.confidence_decimals > 15 {
            problems.push(format!(
                "verifier.confidence_decimals is {}; at most 15 decimals are meaningful",
                self.verifier.confidence_decimals
            ));
        }

        if !EMBEDDING_PROVIDERS.contains(&self.embedding.provider.as_str()) {
            problems.push(format!(
                "embedding.provider '{}' is unknown (expected one of: {})",
                self.embedding.provider,
                EMBEDDING_PROVIDERS.join(", ")
            ));
        }
        if self.embedding.batch_size == 0 {
            problems.push("embedding.batch_size must be at least 1".to_string());
        }

        match self.classifier.provider.as_str() {
            "http" => {
                if self.classifier.endpoint.trim().is_empty() {
                    problems.push("classifier.endpoint is empty".to_string());
                }
                if self.classifier.model.trim().is_empty() {
                    problems.push("classifier.model is empty".to_string());
                }
            }
            "mock" => {}
            other => problems.push(format!(
                "classifier.provider '{}' is unknown (expected http or mock)",
                other
            )),
        }
        if self.classifier.timeout_secs == 0 {
            problems.push("classifier.timeout_secs must be at least 1".to_string());
        }

        if self.extractor.keywords.is_empty() && !self.extractor.include_numeric {
            problems.push(
                "extractor has no keywords and include_numeric is off; no claims will be extracted"
                    .to_string(),
            );
        }

        problems
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "factlens", "factlens")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `FACTLENS_`)
/// 3. Workspace-local config (`.factlens/config.toml`)
/// 4. User config (`~/.config/factlens/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&FactlensConfig>,
) -> Result<FactlensConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(FactlensConfig::default()));

    if let Some(dirs) = project_dirs() {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".factlens").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // FACTLENS_RETRIEVAL__TOP_K, FACTLENS_CLASSIFIER__ENDPOINT, etc.
    figment = figment.merge(Env::prefixed("FACTLENS_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Check whether any factlens configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if let Some(dirs) = project_dirs()
        && dirs.config_dir().join("config.toml").exists()
    {
        return true;
    }

    if let Some(ws) = workspace
        && ws.join(".factlens").join("config.toml").exists()
    {
        return true;
    }

    false
}

/// Set a dotted key (e.g. `retrieval.top_k`) in the workspace config file.
///
/// Loads the existing `.factlens/config.toml` (or defaults), replaces the
/// value, checks that the result still deserializes, and writes it back.
/// Returns the path to the config file.
pub fn set_workspace_value(
    workspace: &Path,
    key: &str,
    value: toml::Value,
) -> anyhow::Result<PathBuf> {
    let config_dir = workspace.join(".factlens");
    std::fs::create_dir_all(&config_dir)?;
    let config_path = config_dir.join("config.toml");

    let config: FactlensConfig = if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)?;
        toml::from_str(&content)?
    } else {
        FactlensConfig::default()
    };

    let mut table = toml::Value::try_from(&config)?;
    let segments: Vec<&str> = key.split('.').collect();
    let (last, parents) = segments
        .split_last()
        .ok_or_else(|| anyhow::anyhow!("empty configuration key"))?;

    let mut cursor = &mut table;
    for segment in parents {
        cursor = cursor
            .as_table_mut()
            .ok_or_else(|| anyhow::anyhow!("'{}' is not a table", segment))?
            .get_mut(*segment)
            .ok_or_else(|| anyhow::anyhow!("unknown configuration section '{}'", segment))?;
    }
    let section = cursor
        .as_table_mut()
        .ok_or_else(|| anyhow::anyhow!("'{}' does not name a configuration value", key))?;
    if !section.contains_key(*last) && parents.is_empty() {
        anyhow::bail!("unknown configuration section '{}'", last);
    }
    section.insert(last.to_string(), value);

    let updated: FactlensConfig = table.try_into()?;
    std::fs::write(&config_path, toml::to_string_pretty(&updated)?)?;

    Ok(config_path)
}
