//! Output formatting helpers for CLI commands

use crate::config::EndpointConfig;
use crate::dispatch::Completion;
use crate::health::{EndpointState, HealthSnapshot};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use serde_json::json;

/// View model for endpoint display
///
/// Carries whether a credential is configured, never the credential itself.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EndpointView {
    pub id: String,
    pub name: String,
    pub dialect: String,
    pub url: String,
    pub model: String,
    pub credential: bool,
    pub timeout_seconds: u64,
    pub tls_verify: bool,
    pub proxy: bool,
    pub default: bool,
    pub enabled: bool,
}

impl From<&EndpointConfig> for EndpointView {
    fn from(endpoint: &EndpointConfig) -> Self {
        Self {
            id: endpoint.id.clone(),
            name: endpoint.display_name().to_string(),
            dialect: endpoint.dialect.to_string(),
            url: endpoint.url.clone(),
            model: endpoint.model.clone(),
            credential: endpoint.credential().is_some(),
            timeout_seconds: endpoint.timeout_seconds,
            tls_verify: endpoint.tls_verify,
            proxy: endpoint.proxy.as_ref().is_some_and(|p| !p.is_empty()),
            default: endpoint.default,
            enabled: endpoint.enabled,
        }
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "set"
    } else {
        "-"
    }
}

/// Format endpoints as a table
pub fn format_endpoints_table(endpoints: &[EndpointView]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "ID", "Name", "Dialect", "URL", "Model", "Key", "Timeout", "Status",
    ]);

    for e in endpoints {
        let status_str = match (e.enabled, e.default) {
            (false, _) => "disabled".dimmed().to_string(),
            (true, true) => "default".green().to_string(),
            (true, false) => "enabled".to_string(),
        };
        let url = if e.tls_verify {
            e.url.clone()
        } else {
            format!("{} {}", e.url, "(no tls verify)".yellow())
        };

        table.add_row(vec![
            Cell::new(&e.id),
            Cell::new(&e.name),
            Cell::new(&e.dialect),
            Cell::new(url),
            Cell::new(&e.model),
            Cell::new(yes_no(e.credential)),
            Cell::new(format!("{}s", e.timeout_seconds)),
            Cell::new(status_str),
        ]);
    }

    table.to_string()
}

/// Format endpoints as JSON
pub fn format_endpoints_json(endpoints: &[EndpointView]) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&json!({
        "endpoints": endpoints
    }))
}

/// Colored label for a circuit state
pub fn state_label(state: EndpointState) -> String {
    match state {
        EndpointState::Healthy => "healthy".green().to_string(),
        EndpointState::Degraded => "degraded".yellow().to_string(),
        EndpointState::CircuitOpen => "circuit open".red().to_string(),
    }
}

/// Format endpoint health as a table
pub fn format_health_table(health: &[HealthSnapshot]) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        "Endpoint",
        "State",
        "Success Rate",
        "Requests",
        "Failures",
        "Consecutive",
        "Last Failure",
    ]);

    for h in health {
        let last_failure = h
            .last_failure
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());

        table.add_row(vec![
            Cell::new(&h.endpoint_id),
            Cell::new(state_label(h.state)),
            Cell::new(format!("{:.0}%", h.success_rate * 100.0)),
            Cell::new(h.total_requests),
            Cell::new(h.total_failures),
            Cell::new(h.consecutive_failures),
            Cell::new(last_failure),
        ]);
    }

    table.to_string()
}

/// Format a completion, optionally with endpoint health, as JSON
pub fn format_completion_json(
    completion: &Completion,
    health: Option<&[HealthSnapshot]>,
) -> Result<String, serde_json::Error> {
    let mut value = json!({ "completion": completion });
    if let Some(health) = health {
        value["health"] = json!(health);
    }
    serde_json::to_string_pretty(&value)
}
