//! Message: the cooperative half of the update protocol.

use crate::message::WorkerMessage;
use crate::scope::WorkerScope;

pub(super) fn run(scope: &WorkerScope, message: &WorkerMessage) {
    match message {
        WorkerMessage::SkipWaiting => {
            tracing::info!(generation = scope.generation_tag(), "skip waiting requested by page");
            scope.skip_waiting();
        }
        WorkerMessage::Unknown => {
            tracing::debug!(generation = scope.generation_tag(), "ignoring unknown message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::Clients;
    use std::sync::Arc;

    #[test]
    fn test_skip_waiting_message() {
        let scope = WorkerScope::new("v2", Arc::new(Clients::new()));
        run(&scope, &WorkerMessage::SkipWaiting);
        assert!(scope.skip_waiting_requested());
    }

    #[test]
    fn test_unknown_message_ignored() {
        let scope = WorkerScope::new("v2", Arc::new(Clients::new()));
        run(&scope, &WorkerMessage::Unknown);
        assert!(!scope.skip_waiting_requested());
    }
}
