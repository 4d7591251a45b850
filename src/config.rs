use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

/// Where uploaded sound files and job results live on disk
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root for `<id>/meeting.wav`
    #[serde(default = "default_sound_root")]
    pub sound_root: PathBuf,

    /// Root for `<id>/` marker files, `status.json` and job outputs
    #[serde(default = "default_results_root")]
    pub results_root: PathBuf,

    /// Maximum accepted request body size in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sound_root: default_sound_root(),
            results_root: default_results_root(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

/// External analysis job settings
///
/// The defaults reproduce the container invocations the diarizer and
/// transcriber images expect.
#[derive(Debug, Clone, Deserialize)]
pub struct JobsConfig {
    /// Container runner executable
    #[serde(default = "default_program")]
    pub program: String,

    /// `host:container` volume mapping handed to the runner
    #[serde(default = "default_volume")]
    pub volume: String,

    /// Mount point of the shared volume inside the containers
    #[serde(default = "default_container_root")]
    pub container_root: String,

    #[serde(default = "default_diarizer_image")]
    pub diarizer_image: String,

    #[serde(default = "default_transcriber_image")]
    pub transcriber_image: String,

    /// Upper bound on a single job's runtime; unbounded when absent
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            volume: default_volume(),
            container_root: default_container_root(),
            diarizer_image: default_diarizer_image(),
            transcriber_image: default_transcriber_image(),
            timeout_secs: None,
        }
    }
}

fn default_sound_root() -> PathBuf {
    PathBuf::from("/var/blabbertabber/soundFiles")
}

fn default_results_root() -> PathBuf {
    PathBuf::from("/var/blabbertabber/diarizationResults")
}

fn default_max_upload_bytes() -> usize {
    1024 * 1024 * 1024 // 1 GiB
}

fn default_program() -> String {
    "docker".to_string()
}

fn default_volume() -> String {
    "/var/blabbertabber:/blabbertabber".to_string()
}

fn default_container_root() -> String {
    "/blabbertabber".to_string()
}

fn default_diarizer_image() -> String {
    "blabbertabber/aalto-speech-diarizer".to_string()
}

fn default_transcriber_image() -> String {
    "blabbertabber/cmu-sphinx4-transcriber".to_string()
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .build()
            .with_context(|| format!("Failed to read config {}", path))?;

        Self::from_settings(settings)
    }

    /// Parse configuration from an in-memory TOML document
    pub fn from_toml(toml: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?;

        Self::from_settings(settings)
    }

    fn from_settings(settings: config::Config) -> Result<Self> {
        let mut cfg: Self = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        cfg.storage.expand_roots();
        Ok(cfg)
    }
}

impl StorageConfig {
    /// Expand a leading `~` in both storage roots
    pub fn expand_roots(&mut self) {
        self.sound_root = expand(&self.sound_root);
        self.results_root = expand(&self.results_root);
    }
}

fn expand(path: &std::path::Path) -> PathBuf {
    match path.to_str() {
        Some(s) => PathBuf::from(shellexpand::tilde(s).into_owned()),
        None => path.to_path_buf(),
    }
}
