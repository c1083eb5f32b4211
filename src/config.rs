use crate::error::{Error, Result};
use crate::prompt::FewShotExample;
use crate::splitter::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, DEFAULT_SEPARATOR};
use crate::template_validator::{TemplateKind, TemplateValidator};
use crate::token::LengthFunction;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_LANGUAGE: &str = "Dutch";
const DEFAULT_API_VERSION: &str = "2024-02-01";
const DEFAULT_TEMPERATURE: f32 = 0.7;
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Environment variable naming the chat deployment.
pub const DEPLOYMENT_ENV: &str = "AZURE_DEPLOYMENT_NAME";
/// Environment variable holding the resource endpoint.
pub const ENDPOINT_ENV: &str = "AZURE_OPENAI_ENDPOINT";
/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "AZURE_OPENAI_API_KEY";
/// Environment variable overriding the API version.
pub const API_VERSION_ENV: &str = "OPENAI_API_VERSION";

/// Configuration for splitting documents and building prompts.
///
/// Use [`Config::builder()`] to construct a new configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct Config {
    /// Maximum chunk length
    pub chunk_size: usize,

    /// Overlap between consecutive chunks
    pub chunk_overlap: usize,

    /// Separator the text is split on
    pub separator: String,

    /// How chunk length is measured
    pub length_function: LengthFunction,

    /// Record each chunk's offset as `start_index` metadata
    pub add_start_index: bool,

    /// Language the model should write topics in
    pub language: String,

    /// External system message template
    pub system_template_path: Option<PathBuf>,

    /// External human message template
    pub human_template_path: Option<PathBuf>,

    /// Few-shot examples replacing the built-in ones
    pub examples: Option<Vec<FewShotExample>>,

    /// Custom data available to templates as `ctx.custom`
    pub custom_data: HashMap<String, serde_json::Value>,

    /// Upper bound on concurrent model calls; `None` uses
    /// [`DEFAULT_MAX_CONCURRENCY`](crate::DEFAULT_MAX_CONCURRENCY)
    pub max_concurrency: Option<usize>,
}

impl Config {
    /// Creates a new configuration builder.
    ///
    /// # Examples
    ///
    /// ```
    /// use doctopics::Config;
    ///
    /// let config = Config::builder()
    ///     .chunk_size(500)
    ///     .chunk_overlap(50)
    ///     .build()
    ///     .expect("valid configuration");
    /// ```
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Chunk sizes are invalid
    /// - `max_concurrency` is zero
    /// - The output language is blank
    /// - An external template is missing or invalid
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::config("chunk_size must be greater than 0"));
        }

        if self.chunk_overlap > self.chunk_size {
            return Err(Error::config(format!(
                "chunk_overlap ({}) must not exceed chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }

        if self.max_concurrency == Some(0) {
            return Err(Error::config("max_concurrency must be greater than 0"));
        }

        if self.language.trim().is_empty() {
            return Err(Error::config("language must not be empty"));
        }

        if let Some(ref path) = self.system_template_path {
            TemplateValidator::validate_template(path, TemplateKind::System)?;
        }

        if let Some(ref path) = self.human_template_path {
            TemplateValidator::validate_template(path, TemplateKind::Human)?;
        }

        if let Some(ref examples) = self.examples {
            for example in examples {
                example.output.validate()?;
            }
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separator: DEFAULT_SEPARATOR.to_string(),
            length_function: LengthFunction::Characters,
            add_start_index: false,
            language: DEFAULT_LANGUAGE.to_string(),
            system_template_path: None,
            human_template_path: None,
            examples: None,
            custom_data: HashMap::new(),
            max_concurrency: None,
        }
    }
}

/// Builder for creating a [`Config`].
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    separator: Option<String>,
    length_function: Option<LengthFunction>,
    add_start_index: bool,
    language: Option<String>,
    system_template_path: Option<PathBuf>,
    human_template_path: Option<PathBuf>,
    examples: Option<Vec<FewShotExample>>,
    custom_data: HashMap<String, serde_json::Value>,
    max_concurrency: Option<usize>,
}

impl ConfigBuilder {
    /// Sets the maximum chunk length.
    #[must_use]
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }

    /// Sets the overlap between consecutive chunks.
    #[must_use]
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.chunk_overlap = Some(overlap);
        self
    }

    /// Sets the separator text is split on.
    #[must_use]
    pub fn separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    /// Sets how chunk length is measured.
    #[must_use]
    pub fn length_function(mut self, kind: LengthFunction) -> Self {
        self.length_function = Some(kind);
        self
    }

    /// Records `start_index` metadata on chunks.
    #[must_use]
    pub fn add_start_index(mut self, enabled: bool) -> Self {
        self.add_start_index = enabled;
        self
    }

    /// Sets the language topics are written in.
    #[must_use]
    pub fn language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Sets an external system message template.
    ///
    /// The file must contain valid Tera syntax.
    #[must_use]
    pub fn system_template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.system_template_path = Some(path.into());
        self
    }

    /// Sets an external human message template.
    ///
    /// The file must contain valid Tera syntax and reference `ctx.input`.
    #[must_use]
    pub fn human_template_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.human_template_path = Some(path.into());
        self
    }

    /// Replaces the built-in few-shot examples.
    #[must_use]
    pub fn examples(mut self, examples: Vec<FewShotExample>) -> Self {
        self.examples = Some(examples);
        self
    }

    /// Sets custom data to be passed to templates as `ctx.custom`.
    #[must_use]
    pub fn custom_data(mut self, data: HashMap<String, serde_json::Value>) -> Self {
        self.custom_data = data;
        self
    }

    /// Bounds the number of concurrent model calls.
    #[must_use]
    pub fn max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = Some(limit);
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn build(self) -> Result<Config> {
        let config = Config {
            chunk_size: self.chunk_size.unwrap_or(DEFAULT_CHUNK_SIZE),
            chunk_overlap: self.chunk_overlap.unwrap_or(DEFAULT_CHUNK_OVERLAP),
            separator: self
                .separator
                .unwrap_or_else(|| DEFAULT_SEPARATOR.to_string()),
            length_function: self.length_function.unwrap_or_default(),
            add_start_index: self.add_start_index,
            language: self
                .language
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            system_template_path: self.system_template_path,
            human_template_path: self.human_template_path,
            examples: self.examples,
            custom_data: self.custom_data,
            max_concurrency: self.max_concurrency,
        };

        config.validate()?;
        Ok(config)
    }
}

/// Connection settings for the hosted chat deployment.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`
    pub endpoint: String,
    /// Deployment name
    pub deployment: String,
    /// API key
    pub api_key: String,
    /// API version query parameter
    pub api_version: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Response token cap
    pub max_tokens: Option<u32>,
    /// Request timeout
    pub timeout: Duration,
}

impl LlmConfig {
    /// Creates a configuration with default tuning values.
    #[must_use]
    pub fn new(
        endpoint: impl Into<String>,
        deployment: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            deployment: deployment.into(),
            api_key: api_key.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Reads the configuration from process environment variables.
    ///
    /// Required: `AZURE_DEPLOYMENT_NAME`, `AZURE_OPENAI_ENDPOINT`,
    /// `AZURE_OPENAI_API_KEY`. Optional: `OPENAI_API_VERSION`,
    /// `DOCTOPICS_TEMPERATURE`, `DOCTOPICS_MAX_TOKENS`,
    /// `DOCTOPICS_TIMEOUT_SECS`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first missing or
    /// unparsable variable.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`LlmConfig::from_env`] with a custom variable source.
    ///
    /// # Errors
    ///
    /// See [`LlmConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let require = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| Error::config(format!("environment variable {key} is not set")))
        };

        let mut config = Self::new(
            require(ENDPOINT_ENV)?,
            require(DEPLOYMENT_ENV)?,
            require(API_KEY_ENV)?,
        );

        if let Some(version) = lookup(API_VERSION_ENV) {
            config.api_version = version;
        }

        if let Some(value) = lookup("DOCTOPICS_TEMPERATURE") {
            config.temperature = parse_var("DOCTOPICS_TEMPERATURE", &value)?;
        }

        if let Some(value) = lookup("DOCTOPICS_MAX_TOKENS") {
            config.max_tokens = Some(parse_var("DOCTOPICS_MAX_TOKENS", &value)?);
        }

        if let Some(value) = lookup("DOCTOPICS_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(parse_var("DOCTOPICS_TIMEOUT_SECS", &value)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the connection settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not an http(s) URL or the
    /// temperature is outside `0.0..=2.0`.
    pub fn validate(&self) -> Result<()> {
        if !(self.endpoint.starts_with("https://") || self.endpoint.starts_with("http://")) {
            return Err(Error::config(format!(
                "endpoint must be an http(s) URL, got '{}'",
                self.endpoint
            )));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(Error::config(format!(
                "temperature must be between 0.0 and 2.0, got {}",
                self.temperature
            )));
        }

        Ok(())
    }

    /// Full chat-completions URL for the deployment.
    #[must_use]
    pub fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        )
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("environment variable {key} has invalid value '{value}'")))
}
