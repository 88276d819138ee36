use crate::cli::{
    actions::{broker, legacy, Action},
    telemetry,
};
use anyhow::Result;

/// Execute the provided action.
// Single dispatch point for all CLI actions.
/// # Errors
/// Returns an error if the action fails.
pub async fn execute(action: Action) -> Result<()> {
    let result = match action {
        Action::Broker(args) => broker::execute(args).await,
        Action::Legacy(args) => legacy::execute(args).await,
    };

    telemetry::shutdown_tracer();

    result
}
