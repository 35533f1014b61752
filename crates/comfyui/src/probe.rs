//! Bounded wait for the engine to start answering HTTP.

use std::time::Duration;

use comfyrun_core::clock::Sleeper;

use crate::engine::RenderEngine;

/// Probe the engine until it answers or `max_retries` attempts spaced
/// `interval` apart have failed.
///
/// Never fails: transport errors count as "not ready yet" and the
/// caller decides what exhaustion means.
pub async fn wait_for_engine(
    engine: &dyn RenderEngine,
    max_retries: u32,
    interval: Duration,
    sleeper: &dyn Sleeper,
) -> bool {
    for attempt in 1..=max_retries {
        if engine.is_available().await {
            tracing::info!(url = engine.base_url(), attempt, "ComfyUI API is reachable");
            return true;
        }
        if attempt < max_retries {
            sleeper.sleep(interval).await;
        }
    }

    tracing::warn!(
        url = engine.base_url(),
        attempts = max_retries,
        "Failed to connect to ComfyUI",
    );
    false
}

#[cfg(test)]
mod tests {
    use comfyrun_core::clock::RecordingSleeper;

    use super::*;
    use crate::scripted::{EngineCall, ScriptedEngine};

    #[tokio::test]
    async fn returns_on_first_success() {
        let engine = ScriptedEngine::new().available_after(2);
        let clock = RecordingSleeper::new();

        assert!(wait_for_engine(&engine, 10, Duration::from_millis(50), &clock).await);

        let probes = engine
            .calls()
            .into_iter()
            .filter(|c| matches!(c, EngineCall::Probe))
            .count();
        assert_eq!(probes, 3);
        assert_eq!(clock.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn exhausts_budget_without_raising() {
        let engine = ScriptedEngine::new().unavailable();
        let clock = RecordingSleeper::new();

        assert!(!wait_for_engine(&engine, 5, Duration::from_millis(50), &clock).await);
        assert_eq!(engine.calls().len(), 5);
        assert_eq!(clock.calls(), 4);
    }

    #[tokio::test]
    async fn zero_budget_never_probes() {
        let engine = ScriptedEngine::new();
        let clock = RecordingSleeper::new();

        assert!(!wait_for_engine(&engine, 0, Duration::from_millis(50), &clock).await);
        assert!(engine.calls().is_empty());
    }
}
