//! Endpoints command implementation

use crate::cli::output::{format_endpoints_json, format_endpoints_table, EndpointView};
use crate::cli::EndpointsArgs;
use crate::config::RelayConfig;

/// Handle `relay endpoints` command
///
/// Lists every configured endpoint in file order, disabled ones included.
pub fn handle_endpoints(
    args: &EndpointsArgs,
    config: &RelayConfig,
) -> Result<String, Box<dyn std::error::Error>> {
    let views: Vec<EndpointView> = config.endpoints.iter().map(EndpointView::from).collect();

    if views.is_empty() {
        return Ok("No endpoints configured.".to_string());
    }

    if args.json {
        Ok(format_endpoints_json(&views)?)
    } else {
        Ok(format_endpoints_table(&views))
    }
}
