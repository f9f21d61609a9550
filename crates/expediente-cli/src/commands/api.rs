//! Authenticated API calls.

use super::open_session;
use crate::output::{self, OutputFormat};
use anyhow::{Context, Result};
use expediente_config::{Config, Paths};
use serde::Serialize;
use std::fmt;
use themis::{ApiRequest, ApiResponse, Method};

#[derive(Serialize)]
struct RequestOutcome {
    status: u16,
    body: serde_json::Value,
}

impl RequestOutcome {
    fn from_response(response: &ApiResponse) -> Self {
        let body = response
            .json::<serde_json::Value>()
            .unwrap_or_else(|_| serde_json::Value::String(response.text()));
        Self {
            status: response.status().as_u16(),
            body,
        }
    }
}

impl fmt::Display for RequestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "HTTP {}", self.status)?;
        match &self.body {
            serde_json::Value::String(text) => write!(f, "{}", text),
            other => match serde_json::to_string_pretty(other) {
                Ok(pretty) => write!(f, "{}", pretty),
                Err(_) => write!(f, "{}", other),
            },
        }
    }
}

/// Build a request from command-line arguments.
fn build_request(method: &str, path: &str, data: Option<&str>) -> Result<ApiRequest> {
    let method: Method = method
        .to_uppercase()
        .parse()
        .with_context(|| format!("Invalid HTTP method: {}", method))?;
    let mut request = ApiRequest::new(method, path);
    if let Some(data) = data {
        let body = serde_json::from_str(data).context("--data must be valid JSON")?;
        request = request.json(body);
    }
    Ok(request)
}

/// Send one request through the session's gateway.
pub async fn request(
    config: &Config,
    paths: &Paths,
    method: &str,
    path: &str,
    data: Option<&str>,
    format: &OutputFormat,
) -> Result<()> {
    let request = build_request(method, path, data)?;
    let session = open_session(config, paths).await?;

    if !session.snapshot().is_authenticated() {
        output::print_error("Not signed in. Run 'expediente login' first", format);
        return Ok(());
    }

    let response = session.request(&request).await?;
    output::print(&RequestOutcome::from_response(&response), format);
    Ok(())
}
