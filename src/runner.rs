use log::{debug, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::AppConfig;
use crate::error::{ErrorResponse, SaveError};
use crate::logic::{SaveEndpoint, SaveOrchestrator};
use crate::model::{SaveRequest, SaveResponse};
use crate::store::ModelResolver;

/// Build one orchestrator per configured endpoint.
pub fn build_orchestrators(
    config: &AppConfig,
    resolver: Arc<dyn ModelResolver>,
) -> Result<HashMap<String, SaveOrchestrator>, SaveError> {
    let mut orchestrators = HashMap::new();
    for (entity, endpoint_config) in &config.endpoints {
        let endpoint = SaveEndpoint::from_config(entity.clone(), endpoint_config, resolver.as_ref())?;
        orchestrators.insert(entity.clone(), SaveOrchestrator::new(endpoint, resolver.clone()));
    }
    Ok(orchestrators)
}

/// Dispatch one JSON-encoded request to the orchestrator of its entity.
pub async fn handle_line(
    orchestrators: &HashMap<String, SaveOrchestrator>,
    line: &str,
) -> Result<SaveResponse, SaveError> {
    let request: SaveRequest = serde_json::from_str(line)
        .map_err(|e| SaveError::invalid_request(format!("Malformed request: {}", e)))?;

    let orchestrator = orchestrators.get(&request.entity).ok_or_else(|| {
        SaveError::invalid_entity(format!("Model '{}' does not exist", request.entity))
    })?;

    orchestrator.handle(request).await
}

/// Read save requests as JSON lines from `reader` and write one JSON line
/// per request to `writer`: the save response, or the error response.
pub async fn run_requests<R, W>(
    orchestrators: &HashMap<String, SaveOrchestrator>,
    reader: R,
    mut writer: W,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let output = match handle_line(orchestrators, line).await {
            Ok(response) => {
                debug!("Request handled with status {}", response.status);
                serde_json::to_string(&response)?
            }
            Err(err) => {
                warn!("Save request failed ({}): {}", err.code().as_str(), err);
                serde_json::to_string(&ErrorResponse::from(&err))?
            }
        };

        writer.write_all(output.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }

    Ok(())
}
