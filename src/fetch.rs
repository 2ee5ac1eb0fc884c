//! Client for the generative-text completion API.
//!
//! One request per subject asks the upstream for a semicolon-delimited
//! table of startups in the fixed eleven-column layout (see
//! [`crate::parse::Column`]). The reply's `choices[0].message.content`
//! string is the table.
//!
//! # Failure policy
//!
//! The client never propagates upstream trouble. A timeout, a connection
//! failure, a non-success status, or an envelope without content all log a
//! warning and yield an empty string, which the pipeline reads as "zero
//! records for this subject". Nothing is retried.
//!
//! Every response body, success or failure, is logged at `info`.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::UpstreamConfig;
use crate::error::{ConfigError, FetchError};
use crate::normalize::UNKNOWN;
use crate::parse::{header_line, strip_code_fences};

const SYSTEM_PROMPT: &str =
    "Você é um assistente especializado em fornecer dados estruturados de startups.";

/// Source of raw table text for a subject.
///
/// Implementations absorb their own failures and return an empty string
/// when nothing usable was obtained.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, subject: &str) -> String;
}

/// [`Fetcher`] backed by an OpenAI-compatible `/chat/completions` endpoint.
pub struct CompletionClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    rows: usize,
}

impl CompletionClient {
    /// Builds the client from configuration.
    ///
    /// # Errors
    ///
    /// Fails with [`ConfigError::MissingCredential`] when no API key is
    /// configured; callers treat this as fatal.
    pub fn new(config: &UpstreamConfig) -> Result<Self, ConfigError> {
        let api_key = config.resolve_api_key()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            api_key,
            rows: config.rows,
        })
    }

    /// Issues the request and returns the fence-stripped table text.
    pub async fn try_fetch(&self, subject: &str) -> Result<String, FetchError> {
        let body = request_body(&self.model, subject, self.rows);

        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        info!(
            subject,
            status = status.as_u16(),
            bytes = text.len(),
            body = %text,
            "upstream response"
        );

        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let content = extract_content(&text)?;
        Ok(strip_code_fences(&content))
    }
}

#[async_trait]
impl Fetcher for CompletionClient {
    async fn fetch(&self, subject: &str) -> String {
        match self.try_fetch(subject).await {
            Ok(text) => text,
            Err(e) => {
                warn!(subject, error = %e, "fetch failed; treating as zero records");
                String::new()
            }
        }
    }
}

/// JSON request body for one subject.
pub fn request_body(model: &str, subject: &str, rows: usize) -> serde_json::Value {
    serde_json::json!({
        "model": model,
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            { "role": "user", "content": user_prompt(subject, rows) },
        ],
    })
}

/// Instruction embedding the subject and the table contract.
pub fn user_prompt(subject: &str, rows: usize) -> String {
    let header = header_line();
    format!(
        "Liste exatamente {rows} startups investidas por {subject} (ou relacionadas a {subject}) em formato CSV.\n\
         \n\
         As colunas devem ser exatamente, nesta ordem:\n\
         {header}\n\
         \n\
         Regras:\n\
         - Nunca deixe nenhum campo vazio. Se não houver informação, escreva '{UNKNOWN}'.\n\
         - Use sempre ponto e vírgula (;) como separador de colunas.\n\
         - Retorne apenas a tabela em CSV puro, sem markdown, sem cabeçalho extra e sem comentários.\n\
         - A tabela deve conter exatamente {total} linhas: 1 cabeçalho + {rows} startups.\n\
         \n\
         Exemplo de formato (ilustrativo, substitua pelos dados corretos):\n\
         {header}\n\
         Startup A; www.startupa.com; Fintech; 2018; 5.000.000; Série A; 2021-06-15; {subject}; Plataforma de pagamentos digitais; linkedin.com/in/fundadorA; Brasil\n\
         Startup B; www.startupb.com; Healthtech; 2019; 2.500.000; Seed; 2020-11-20; {subject}; App de consultas médicas; linkedin.com/in/fundadorB; EUA\n",
        total = rows + 1,
    )
}

/// Pulls `choices[0].message.content` out of a response envelope.
pub fn extract_content(body: &str) -> Result<String, FetchError> {
    let json: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| FetchError::MalformedPayload(format!("invalid JSON: {}", e)))?;

    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            FetchError::MalformedPayload("missing choices[0].message.content".to_string())
        })
}
