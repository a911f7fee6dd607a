//! Handling of asynchronous delivery outcomes.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::ports::DeliveryOutcome;

/// Receives the outcome of every asynchronous delivery made by a consumer.
pub trait CompletionHandler: Send + Sync {
    fn handle(&self, outcome: DeliveryOutcome);
}

/// Logs failures as warnings and successes at trace level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCompletionHandler;

impl CompletionHandler for LoggingCompletionHandler {
    fn handle(&self, outcome: DeliveryOutcome) {
        let DeliveryOutcome {
            assignment_id,
            kind,
            result,
        } = outcome;
        match result {
            Ok(event) => {
                tracing::trace!(assignment = %assignment_id, %kind, event = %event.id, "event stored");
            }
            Err(error) => {
                tracing::warn!(assignment = %assignment_id, %kind, %error, "event delivery failed");
            }
        }
    }
}

/// Feed outcomes to `handler` until every sender is gone.
pub(crate) async fn drain_outcomes(
    mut outcomes: mpsc::UnboundedReceiver<DeliveryOutcome>,
    handler: Arc<dyn CompletionHandler>,
) {
    while let Some(outcome) = outcomes.recv().await {
        handler.handle(outcome);
    }
}
