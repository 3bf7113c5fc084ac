use futures::future::BoxFuture;
use snafu::Snafu;

use super::model::{DEFAULT_GEMINI_MODEL, DEFAULT_TEMPERATURE};

/// Environment variables consulted, in order, when no key is configured explicitly.
pub const CREDENTIAL_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "API_KEY"];

/// Speaker role as the provider sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderMessage {
    pub role: Role,
    pub content: String,
}

impl ProviderMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self::new(Role::Model, content)
    }
}

/// Where the gateway finds its API key.
///
/// The key is resolved on every call, so an operator can export it after startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Key(String),
    Environment(Vec<String>),
}

impl Credential {
    pub fn from_default_environment() -> Self {
        Self::Environment(CREDENTIAL_ENV_VARS.iter().map(|name| name.to_string()).collect())
    }

    /// Returns the first non-blank key, or `None` when the credential is absent.
    pub fn resolve(&self) -> Option<String> {
        match self {
            Self::Key(key) => Some(key.trim().to_string()).filter(|key| !key.is_empty()),
            Self::Environment(names) => names.iter().find_map(|name| {
                std::env::var(name)
                    .ok()
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
            }),
        }
    }
}

impl Default for Credential {
    fn default() -> Self {
        Self::from_default_environment()
    }
}

/// Per-gateway configuration. Model and temperature are fixed for every call.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayConfig {
    pub provider_id: String,
    pub credential: Credential,
    pub model_id: String,
    pub temperature: f64,
    pub endpoint: Option<String>,
}

impl GatewayConfig {
    pub fn new(credential: Credential) -> Self {
        Self {
            provider_id: "gemini".to_string(),
            credential,
            model_id: DEFAULT_GEMINI_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            endpoint: None,
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        let model_id = model_id.into().trim().to_string();
        if !model_id.is_empty() {
            self.model_id = model_id;
        }
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        let endpoint = endpoint.into().trim().to_string();
        self.endpoint = Some(endpoint).filter(|endpoint| !endpoint.is_empty());
        self
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new(Credential::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GatewayErrorKind {
    MissingCredential,
    CallFailed,
}

/// The only failures a gateway reports to its caller.
///
/// Provider specific causes are logged where they happen and never carried here.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum GatewayError {
    #[snafu(display("missing API key for provider '{provider_id}'"))]
    MissingCredential {
        stage: &'static str,
        provider_id: String,
    },
    #[snafu(display("call to provider '{provider_id}' failed on `{stage}`"))]
    CallFailed {
        stage: &'static str,
        provider_id: String,
    },
}

impl GatewayError {
    pub fn missing_credential(stage: &'static str, provider_id: impl Into<String>) -> Self {
        Self::MissingCredential {
            stage,
            provider_id: provider_id.into(),
        }
    }

    pub fn call_failed(stage: &'static str, provider_id: impl Into<String>) -> Self {
        Self::CallFailed {
            stage,
            provider_id: provider_id.into(),
        }
    }

    pub fn kind(&self) -> GatewayErrorKind {
        match self {
            Self::MissingCredential { .. } => GatewayErrorKind::MissingCredential,
            Self::CallFailed { .. } => GatewayErrorKind::CallFailed,
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Self::MissingCredential { stage, .. } | Self::CallFailed { stage, .. } => stage,
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// One request/response round trip to a hosted model.
///
/// `history` is the conversation before `new_text` was submitted; `new_text` is sent as the
/// final user turn.
pub trait ModelGateway: Send + Sync {
    fn id(&self) -> &str;

    fn complete<'a>(
        &'a self,
        history: &'a [ProviderMessage],
        new_text: &'a str,
    ) -> BoxFuture<'a, GatewayResult<String>>;
}
