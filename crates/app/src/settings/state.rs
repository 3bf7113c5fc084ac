use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use saathi_llm::{
    Credential, DEFAULT_GEMINI_MODEL, DEFAULT_TEMPERATURE, GatewayConfig, RIG_GEMINI_PROVIDER_ID,
    clamp_temperature,
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

pub const SETTINGS_DIRECTORY_NAME: &str = "saathi";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const ENV_PREFIX: &str = "SAATHI_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Stored key. Left empty, the key is looked up in the environment on every call.
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    /// Product default is 0.7; operators may override it from the file or `SAATHI_TEMPERATURE`.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub endpoint: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model_id: default_model_id(),
            temperature: default_temperature(),
            endpoint: String::new(),
        }
    }
}

impl Settings {
    pub fn normalized(mut self) -> Self {
        self.api_key = self.api_key.trim().to_string();
        self.model_id = if self.model_id.trim().is_empty() {
            default_model_id()
        } else {
            self.model_id.trim().to_string()
        };
        self.temperature = clamp_temperature(self.temperature);
        self.endpoint = self.endpoint.trim().to_string();
        self
    }

    pub fn has_stored_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn credential(&self) -> Credential {
        if self.has_stored_key() {
            Credential::Key(self.api_key.trim().to_string())
        } else {
            Credential::from_default_environment()
        }
    }

    pub fn to_gateway_config(&self) -> GatewayConfig {
        let mut config = GatewayConfig::new(self.credential())
            .with_model(self.model_id.as_str())
            .with_temperature(self.temperature)
            .with_endpoint(self.endpoint.as_str());
        config.provider_id = RIG_GEMINI_PROVIDER_ID.to_string();
        config
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("failed to read settings from {path:?} on `{stage}`: {source}"))]
    Extract {
        stage: &'static str,
        path: PathBuf,
        source: Box<figment::Error>,
    },
}

pub struct SettingsStore {
    settings: Settings,
    config_path: PathBuf,
}

impl SettingsStore {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".saathi"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    /// Loads settings, falling back to defaults when the file cannot be parsed.
    pub fn new(config_path: PathBuf) -> Self {
        let settings = match Self::extract(&config_path) {
            Ok(settings) => settings,
            Err(error) => {
                tracing::warn!(error = %error, "failed to load settings; using defaults");
                Settings::default()
            }
        };

        Self {
            settings,
            config_path,
        }
    }

    pub fn load() -> Self {
        Self::new(Self::default_config_path())
    }

    /// Layers defaults, the JSON file (if present), and `SAATHI_*` variables, in that order.
    pub fn extract(path: &Path) -> Result<Settings, SettingsError> {
        if !path.exists() {
            tracing::info!("settings file not found at {:?}, using defaults", path);
        }

        let figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Json::file(path))
            .merge(Env::prefixed(ENV_PREFIX));

        figment
            .extract::<Settings>()
            .map(Settings::normalized)
            .map_err(Box::new)
            .context(ExtractSnafu {
                stage: "extract-settings",
                path: path.to_path_buf(),
            })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

fn default_model_id() -> String {
    DEFAULT_GEMINI_MODEL.to_string()
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}
