use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::error::{JimengError, Result};
use crate::params::DurationTier;

/// Authorization credential for one generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    /// Session supplied directly by the user
    Manual(String),
    /// Every session in the remote pool; the service picks one with enough credit
    Pool(Vec<String>),
}

impl Credential {
    pub fn header_value(&self) -> String {
        match self {
            Credential::Manual(token) => token.clone(),
            Credential::Pool(tokens) => tokens.join(","),
        }
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credential::Manual(_) => f.write_str("manual session"),
            Credential::Pool(tokens) => write!(f, "session pool ({} sessions)", tokens.len()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SessionPoolResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<SessionPoolData>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionPoolData {
    #[serde(rename = "sessionUSList", default)]
    session_us_list: Vec<String>,
}

/// Resolves the bearer credential from a manual override or the session pool
#[derive(Debug, Clone)]
pub struct CredentialResolver {
    client: reqwest::Client,
    timeout: Duration,
}

impl CredentialResolver {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub async fn resolve(
        &self,
        manual_session: Option<&str>,
        duration: DurationTier,
        api_url: &str,
    ) -> Result<Credential> {
        if let Some(session) = manual_session.map(str::trim).filter(|s| !s.is_empty()) {
            info!("🔑 Using manually supplied session");
            return Ok(Credential::Manual(session.to_string()));
        }

        let min_credits = duration.min_credits();
        let url = format!("{}/admin/session-pool", api_url);
        info!("🔗 Reading session pool from {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| {
                error!("❌ Cannot reach API service at {}: {}", api_url, e);
                JimengError::from_transport(e, "Session pool lookup", api_url, self.timeout)
            })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(JimengError::RemoteRejected(format!(
                "API returned status {}",
                status.as_u16()
            )));
        }

        let body = response.text().await?;
        debug!("Session pool response: {} bytes", body.len());
        let pool: SessionPoolResponse = serde_json::from_str(&body)?;

        if !pool.success {
            let message = pool
                .message
                .unwrap_or_else(|| "failed to read session pool".to_string());
            error!("❌ {}", message);
            return Err(JimengError::RemoteRejected(message));
        }

        let sessions = pool.data.unwrap_or_default().session_us_list;
        if sessions.is_empty() {
            return Err(JimengError::EmptyPool);
        }

        info!(
            "✅ Session pool loaded ({} sessions, service picks one with >= {} credits)",
            sessions.len(),
            min_credits
        );
        Ok(Credential::Pool(sessions))
    }
}
