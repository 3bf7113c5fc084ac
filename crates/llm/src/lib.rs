//! Model gateway: turns a transcript plus one new message into a single model reply.

mod model;
pub mod persona;
mod provider;
mod rig_adapter;

pub use model::{
    DEFAULT_GEMINI_MODEL, DEFAULT_TEMPERATURE, EMPTY_RESPONSE_FALLBACK, MAX_TEMPERATURE,
    MIN_TEMPERATURE, clamp_temperature,
};
pub use persona::{ASSISTANT_NAME, SYSTEM_INSTRUCTION};
pub use provider::{
    CREDENTIAL_ENV_VARS, Credential, GatewayConfig, GatewayError, GatewayErrorKind,
    GatewayResult, ModelGateway, ProviderMessage, Role,
};
pub use rig_adapter::{GeminiGateway, RIG_GEMINI_PROVIDER_ID};
