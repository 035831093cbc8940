use crate::AssistantError;
use commune_sdk::{
    google::{GoogleModel, GoogleModelOptions},
    openai::{OpenAIChatModel, OpenAIChatModelOptions},
    ModelProvider,
};
use config::{Config, Environment, File};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::{path::Path, sync::Arc, time::Duration};

/// Gemini's OpenAI-compatible endpoint, used by the chat binding unless
/// another base URL is configured.
pub const GEMINI_OPENAI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";

const STANDARD_KEY: &str = "GOOGLE_API_KEY";
const ELEVATED_KEY: &str = "GOOGLE_API_KEY_VIP";

/// Which binding serves a flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "openai-compatible")]
    OpenAICompatible,
    #[serde(rename = "google")]
    Google,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub knowledge_base_path: String,
    pub secrets_path: String,
    pub chat_provider: ProviderKind,
    pub chat_model: String,
    pub chat_base_url: Option<String>,
    pub image_model: String,
    pub image_base_url: Option<String>,
    /// Origin allowed to call the API from a browser. Same-origin only when unset.
    pub allowed_origin: Option<String>,
    pub request_timeout_secs: u64,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 4000,
            knowledge_base_path: "knowledge_base.txt".to_string(),
            secrets_path: "secrets.toml".to_string(),
            chat_provider: ProviderKind::OpenAICompatible,
            chat_model: "gemini-2.5-flash".to_string(),
            chat_base_url: None,
            image_model: "gemini-2.5-flash-image".to_string(),
            image_base_url: None,
            allowed_origin: None,
            request_timeout_secs: 120,
            log_filter: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load `.env`, then `assistant.toml` if present, then `ASSISTANT__*`
    /// environment variables.
    pub fn load() -> Result<Self, AssistantError> {
        dotenvy::dotenv().ok();
        Self::from_sources(Some(Path::new("assistant.toml")), environment())
    }

    fn from_sources(file: Option<&Path>, env: Environment) -> Result<Self, AssistantError> {
        let mut builder = Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(File::from(file).required(false));
        }
        let config = builder.add_source(env).build()?;
        Ok(config.try_deserialize()?)
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Shared HTTP client for both bindings.
    pub fn http_client(&self) -> Result<reqwest::Client, AssistantError> {
        Ok(reqwest::Client::builder()
            .timeout(Duration::from_secs(self.request_timeout_secs))
            .build()?)
    }
}

fn environment() -> Environment {
    Environment::with_prefix("ASSISTANT")
        .separator("__")
        .try_parsing(true)
}

/// Keys as they appear in the deployment secret store.
#[derive(Debug, Default, Deserialize)]
struct SecretStore {
    #[serde(alias = "GOOGLE_API_KEY")]
    google_api_key: Option<String>,
    #[serde(alias = "GOOGLE_API_KEY_VIP")]
    google_api_key_vip: Option<String>,
}

impl SecretStore {
    fn read(path: &Path) -> Result<Option<Self>, AssistantError> {
        if !path.exists() {
            return Ok(None);
        }
        let config = Config::builder()
            .add_source(File::from(path).format(config::FileFormat::Toml))
            .build()?;
        Ok(Some(config.try_deserialize()?))
    }
}

/// The two API keys. The standard key serves chat, the elevated key serves
/// image generation.
pub struct Credentials {
    pub standard: SecretString,
    pub elevated: SecretString,
}

impl Credentials {
    /// Read the secret store at `path`, falling back to the process environment.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AssistantError> {
        let store = SecretStore::read(path.as_ref())?;
        Ok(Self::resolve(store, |name| std::env::var(name).ok()))
    }

    /// The secret store is used only when it holds both keys; otherwise each
    /// key comes from `env`. A missing key is left empty so the failure
    /// surfaces on the first call that needs it.
    fn resolve(store: Option<SecretStore>, env: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(SecretStore {
            google_api_key: Some(standard),
            google_api_key_vip: Some(elevated),
        }) = store
        {
            tracing::info!("credentials loaded from secret store");
            return Self {
                standard: SecretString::new(standard),
                elevated: SecretString::new(elevated),
            };
        }

        let lookup = |name: &str| {
            env(name).unwrap_or_else(|| {
                tracing::warn!(key = name, "API key not configured");
                String::new()
            })
        };
        Self {
            standard: SecretString::new(lookup(STANDARD_KEY)),
            elevated: SecretString::new(lookup(ELEVATED_KEY)),
        }
    }
}

/// Construct the binding for `kind`.
#[must_use]
pub fn build_provider(
    kind: ProviderKind,
    model_id: &str,
    base_url: Option<String>,
    api_key: &SecretString,
    client: reqwest::Client,
) -> Arc<dyn ModelProvider> {
    let api_key = api_key.expose_secret().clone();
    match kind {
        ProviderKind::OpenAICompatible => Arc::new(OpenAIChatModel::new(
            model_id,
            OpenAIChatModelOptions {
                base_url: Some(base_url.unwrap_or_else(|| GEMINI_OPENAI_BASE_URL.to_string())),
                api_key,
                headers: None,
                client: Some(client),
            },
        )),
        ProviderKind::Google => Arc::new(GoogleModel::new(
            model_id,
            GoogleModelOptions {
                api_key,
                base_url,
                headers: None,
                client: Some(client),
            },
        )),
    }
}
