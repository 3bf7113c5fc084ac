use futures::FutureExt;
use futures::future::BoxFuture;
use rig::completion::{
    AssistantContent, CompletionModel, CompletionRequest, Message as RigMessage,
};
use rig::prelude::CompletionClient;
use rig::providers::gemini;
use snafu::{ResultExt, Snafu};

use super::model::{EMPTY_RESPONSE_FALLBACK, clamp_temperature};
use super::persona::SYSTEM_INSTRUCTION;
use super::provider::{
    CallFailedSnafu, GatewayConfig, GatewayResult, MissingCredentialSnafu, ModelGateway,
    ProviderMessage, Role,
};

pub const RIG_GEMINI_PROVIDER_ID: &str = "gemini";

/// Provider failures as rig reports them. These stay inside the adapter: they are logged
/// and then collapsed into `GatewayError::CallFailed`.
#[derive(Debug, Snafu)]
enum ProviderError {
    #[snafu(display("http client failed on `{stage}`, {source}"))]
    HttpClient {
        stage: &'static str,
        source: rig::http_client::Error,
    },
    #[snafu(display("completions failed on `{stage}`, {source}"))]
    CompletionsFailed {
        stage: &'static str,
        source: rig::completion::CompletionError,
    },
}

impl ProviderError {
    fn stage(&self) -> &'static str {
        match self {
            Self::HttpClient { stage, .. } | Self::CompletionsFailed { stage, .. } => stage,
        }
    }
}

/// Gemini-backed gateway. Holds only configuration; a client is built per call.
pub struct GeminiGateway {
    config: GatewayConfig,
}

impl GeminiGateway {
    pub fn new(mut config: GatewayConfig) -> Self {
        if config.provider_id.trim().is_empty() {
            config.provider_id = RIG_GEMINI_PROVIDER_ID.to_string();
        }
        config.temperature = clamp_temperature(config.temperature);

        Self { config }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn build_client(
        config: &GatewayConfig,
        api_key: &str,
    ) -> Result<gemini::Client, ProviderError> {
        let mut builder = gemini::Client::builder().api_key(api_key);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.base_url(endpoint.as_str());
        }
        builder.build().context(HttpClientSnafu {
            stage: "build-client",
        })
    }

    fn to_rig_message(message: &ProviderMessage) -> RigMessage {
        match message.role {
            Role::User => RigMessage::user(message.content.clone()),
            Role::Model => RigMessage::assistant(message.content.clone()),
        }
    }

    /// Concatenates every text part of the reply. Tool calls and reasoning are ignored.
    fn collect_text<'a>(
        choice: impl IntoIterator<Item = &'a AssistantContent>,
    ) -> Option<String> {
        let text = choice
            .into_iter()
            .filter_map(|content| match content {
                AssistantContent::Text(text) => Some(text.text.as_str()),
                _ => None,
            })
            .collect::<String>();

        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    fn build_model(
        config: &GatewayConfig,
        api_key: &str,
    ) -> Result<gemini::CompletionModel, ProviderError> {
        let client = Self::build_client(config, api_key)?;
        Ok(client.completion_model(config.model_id.clone()))
    }

    /// History goes first in order, then the new text as the final user turn.
    fn build_request(
        model: &gemini::CompletionModel,
        config: &GatewayConfig,
        history: &[ProviderMessage],
        new_text: &str,
    ) -> CompletionRequest {
        let transcript = history
            .iter()
            .map(Self::to_rig_message)
            .collect::<Vec<_>>();

        model
            .completion_request(RigMessage::user(new_text.to_string()))
            .messages(transcript)
            .preamble(SYSTEM_INSTRUCTION.to_string())
            .temperature(config.temperature)
            .build()
    }

    async fn send_request(
        config: &GatewayConfig,
        api_key: &str,
        history: &[ProviderMessage],
        new_text: &str,
    ) -> Result<Option<String>, ProviderError> {
        let model = Self::build_model(config, api_key)?;
        let request = Self::build_request(&model, config, history, new_text);

        let response = model
            .completion(request)
            .await
            .context(CompletionsFailedSnafu {
                stage: "send-request",
            })?;

        Ok(Self::collect_text(response.choice.iter()))
    }
}

impl ModelGateway for GeminiGateway {
    fn id(&self) -> &str {
        &self.config.provider_id
    }

    fn complete<'a>(
        &'a self,
        history: &'a [ProviderMessage],
        new_text: &'a str,
    ) -> BoxFuture<'a, GatewayResult<String>> {
        async move {
            let Some(api_key) = self.config.credential.resolve() else {
                tracing::error!(
                    provider_id = %self.config.provider_id,
                    "no API key available; set GEMINI_API_KEY or API_KEY, or add api_key to settings"
                );
                return MissingCredentialSnafu {
                    stage: "resolve-credential",
                    provider_id: self.config.provider_id.as_str(),
                }
                .fail();
            };

            tracing::debug!(
                provider_id = %self.config.provider_id,
                model_id = %self.config.model_id,
                history_len = history.len(),
                "sending completion request"
            );

            match Self::send_request(&self.config, &api_key, history, new_text).await {
                Ok(Some(text)) => Ok(text),
                Ok(None) => {
                    tracing::warn!(
                        provider_id = %self.config.provider_id,
                        model_id = %self.config.model_id,
                        "provider returned no usable text; using fallback reply"
                    );
                    Ok(EMPTY_RESPONSE_FALLBACK.to_string())
                }
                Err(error) => {
                    tracing::error!(
                        provider_id = %self.config.provider_id,
                        model_id = %self.config.model_id,
                        stage = error.stage(),
                        error = %error,
                        "completion request failed"
                    );
                    CallFailedSnafu {
                        stage: error.stage(),
                        provider_id: self.config.provider_id.as_str(),
                    }
                    .fail()
                }
            }
        }
        .boxed()
    }
}
