use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::task::TaskSet;
use crate::core::template::TemplateValues;
use crate::crew::worker::{
    CommandWorker, WorkerProfile, WorkerRegistry, DEFAULT_COMMAND, DEFAULT_TIMEOUT_SECS,
};
use crate::deploy::DuplicatePolicy;
use crate::{slog_debug, Error, Result};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_OUTPUT_DIR: &str = "output/redesigned_site";

/// Directory below a project that holds its configuration files.
pub const PROJECT_CONFIG_DIR: &str = "config";

/// User settings from `~/.sitecrew/sitecrew.toml`. Every field is optional.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub host: Option<IpAddr>,
    pub port: Option<u16>,
    pub output_dir: Option<String>,
    pub command: Option<String>,
    pub worker_timeout_secs: Option<u64>,
    #[serde(default)]
    pub strict_paths: bool,
}

impl Settings {
    pub fn sitecrew_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir()
            .ok_or(Error::NoHomeDir)?
            .join(".sitecrew"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::sitecrew_dir()?.join("sitecrew.toml"))
    }

    pub fn effective_addr(&self) -> SocketAddr {
        SocketAddr::new(
            self.host.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST)),
            self.port.unwrap_or(DEFAULT_PORT),
        )
    }

    pub fn effective_output_dir(&self) -> PathBuf {
        expand_tilde(self.output_dir.as_deref().unwrap_or(DEFAULT_OUTPUT_DIR))
    }

    pub fn effective_command(&self) -> &str {
        self.command.as_deref().unwrap_or(DEFAULT_COMMAND)
    }

    pub fn effective_timeout(&self) -> Duration {
        Duration::from_secs(self.worker_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        if self.strict_paths {
            DuplicatePolicy::Reject
        } else {
            DuplicatePolicy::LastWriteWins
        }
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load settings from `path`, falling back to defaults when it is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        slog_debug!("Settings::load path={}", path.display());
        if !path.exists() {
            slog_debug!("Settings file not found, using defaults");
            return Ok(Self::default());
        }
        let settings: Self = toml::from_str(&fs::read_to_string(path)?)?;
        slog_debug!(
            "Settings loaded: addr={}, output_dir={:?}, command={:?}",
            settings.effective_addr(),
            settings.output_dir,
            settings.command
        );
        Ok(settings)
    }
}

/// Inputs describing the site being redesigned, from `config/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteConfig {
    pub current_website_url: String,
    pub industry: String,
    pub target_audience: String,
    /// Kept in file order.
    #[serde(default)]
    pub brand_guidelines: toml::Table,
    /// Extra tool names per worker identifier.
    #[serde(default)]
    pub tools: BTreeMap<String, Vec<String>>,
    /// Additional placeholder values for task descriptions.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

impl SiteConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut config: Self = toml::from_str(s)?;
        config.current_website_url = normalize_website_url(&config.current_website_url);
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_toml_str(&read_required(path)?)
    }

    /// Placeholder values available to task descriptions.
    ///
    /// Free-form `variables` never shadow the four named inputs.
    pub fn template_values(&self) -> TemplateValues {
        let mut values = self.variables.clone();
        values.insert(
            "current_website_url".to_string(),
            self.current_website_url.clone(),
        );
        values.insert("industry".to_string(), self.industry.clone());
        values.insert("target_audience".to_string(), self.target_audience.clone());
        values.insert("brand_guidelines".to_string(), self.brand_summary());
        values
    }

    /// Brand guidelines as `key: value` pairs separated by `; `.
    pub fn brand_summary(&self) -> String {
        self.brand_guidelines
            .iter()
            .map(|(key, value)| match value {
                toml::Value::String(s) => format!("{}: {}", key, s),
                other => format!("{}: {}", key, other),
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Normalize a website address: drop a leading `www.` from the host and
/// add `https://` when no scheme is given. Empty input stays empty.
pub fn normalize_website_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }
    let (scheme, rest) = match url.split_once("://") {
        Some((scheme, rest)) => (scheme, rest),
        None => ("https", url),
    };
    let host = rest.strip_prefix("www.").unwrap_or(rest);
    format!("{}://{}", scheme, host)
}

/// A project directory with its three configuration files.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub site: SiteConfig,
    pub tasks: TaskSet,
    pub workers: Vec<(String, WorkerProfile)>,
}

impl Project {
    pub fn config_dir(root: &Path) -> PathBuf {
        root.join(PROJECT_CONFIG_DIR)
    }

    /// Load `config.toml`, `tasks.toml` and `workers.toml` from
    /// `<root>/config/`.
    pub fn load(root: &Path) -> Result<Self> {
        let dir = Self::config_dir(root);
        slog_debug!("Project::load dir={}", dir.display());
        let site = SiteConfig::load(&dir.join("config.toml"))?;
        let tasks = TaskSet::from_toml_str(&read_required(&dir.join("tasks.toml"))?)?;
        let workers = WorkerProfile::parse_all(&read_required(&dir.join("workers.toml"))?)?;
        slog_debug!(
            "Project loaded: {} tasks, {} workers",
            tasks.len(),
            workers.len()
        );
        Ok(Self {
            root: root.to_path_buf(),
            site,
            tasks,
            workers,
        })
    }

    /// Command workers for every declared profile.
    pub fn worker_registry(&self, settings: &Settings) -> WorkerRegistry {
        WorkerRegistry::from_profiles(
            &self.workers,
            &self.site.tools,
            settings.effective_command(),
            settings.effective_timeout(),
        )
    }

    /// Worker binaries that cannot be found on `PATH`, deduplicated.
    pub fn unavailable_commands(&self, settings: &Settings) -> Vec<String> {
        let mut missing: Vec<String> = Vec::new();
        for (id, profile) in &self.workers {
            let command = profile
                .command
                .as_deref()
                .unwrap_or(settings.effective_command());
            let worker = CommandWorker::new(id, profile.clone(), command);
            if !worker.is_available() && !missing.iter().any(|m| m == worker.binary()) {
                missing.push(worker.binary().to_string());
            }
        }
        missing
    }
}

fn read_required(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(Error::ConfigNotFound(path.to_path_buf()));
    }
    Ok(fs::read_to_string(path)?)
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
