//! End-to-end job handler.
//!
//! [`JobHandler::handle`] runs one job through every stage in order:
//! validate, probe, upload, submit, poll, resolve, materialize,
//! assemble. The first terminal error short-circuits the rest and is
//! mapped onto the external output shape.

use std::sync::Arc;

use comfyrun_comfyui::api::ComfyUIApi;
use comfyrun_comfyui::engine::RenderEngine;
use comfyrun_comfyui::poll::wait_for_outputs;
use comfyrun_comfyui::probe::wait_for_engine;
use comfyrun_comfyui::upload::upload_assets;
use comfyrun_core::artifact::resolve_artifacts;
use comfyrun_core::clock::{Sleeper, TokioSleeper};
use comfyrun_core::config::WorkerConfig;
use comfyrun_core::error::JobError;
use comfyrun_core::job::{validate_input, JobEnvelope};
use comfyrun_core::result::{assemble, JobOutput};
use comfyrun_storage::{HttpObjectStore, ObjectStore};
use tracing::Instrument;

use crate::events::{EventSink, Outcome, Stage, StageEvent, TracingSink};
use crate::materialize::{materialize_all, MaterializeContext};

/// Runs jobs against one render engine with one configuration.
pub struct JobHandler {
    config: Arc<WorkerConfig>,
    engine: Arc<dyn RenderEngine>,
    store: Option<Arc<dyn ObjectStore>>,
    sleeper: Arc<dyn Sleeper>,
    events: Arc<dyn EventSink>,
}

impl JobHandler {
    /// Handler with no object store, the tokio clock and tracing events.
    pub fn new(config: Arc<WorkerConfig>, engine: Arc<dyn RenderEngine>) -> Self {
        Self {
            config,
            engine,
            store: None,
            sleeper: Arc::new(TokioSleeper),
            events: Arc::new(TracingSink),
        }
    }

    /// Production wiring: HTTP engine client, and the HTTP object store
    /// when storage is configured.
    pub fn from_config(config: Arc<WorkerConfig>) -> Self {
        let engine: Arc<dyn RenderEngine> = Arc::new(ComfyUIApi::new(config.engine_url()));
        let store = config
            .storage
            .clone()
            .map(|storage| Arc::new(HttpObjectStore::new(storage)) as Arc<dyn ObjectStore>);
        Self::new(config, engine).with_store(store)
    }

    pub fn with_store(mut self, store: Option<Arc<dyn ObjectStore>>) -> Self {
        self.store = store;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Process one job to completion or failure.
    pub async fn handle(&self, job: &JobEnvelope) -> JobOutput {
        let job_id = job
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let span = tracing::info_span!("job", job_id = %job_id);

        async {
            match self.run(job, &job_id).await {
                Ok(output) => output,
                Err(e) => {
                    tracing::error!(error = %e, "Job failed");
                    JobOutput::from_error(e, self.config.refresh_worker)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, job: &JobEnvelope, job_id: &str) -> Result<JobOutput, JobError> {
        let config = self.config.as_ref();
        let engine = self.engine.as_ref();
        let sleeper = self.sleeper.as_ref();

        let request = self.stage(Stage::Validate, validate_input(job.input.as_ref()))?;
        self.emit(
            Stage::Validate,
            Outcome::Success,
            format!("{} input image(s)", request.assets.len()),
        );

        let reachable = wait_for_engine(
            engine,
            config.probe_max_retries,
            config.probe_interval,
            sleeper,
        )
        .await;
        self.probe_outcome(reachable)?;

        let report = upload_assets(engine, &request.assets).await;
        self.emit(Stage::Upload, outcome(report.is_success()), report.message.clone());
        report.into_result()?;

        let prompt_id = engine
            .submit_workflow(&request.workflow)
            .await
            .map_err(|e| JobError::Submission(e.to_string()));
        let prompt_id = self.stage(Stage::Submit, prompt_id)?;
        tracing::info!(prompt_id = %prompt_id, "Queued workflow");
        self.emit(Stage::Submit, Outcome::Success, prompt_id.clone());

        let outputs = wait_for_outputs(
            engine,
            &prompt_id,
            config.poll_max_retries,
            config.poll_interval,
            sleeper,
        )
        .await;
        let outputs = self.stage(Stage::Poll, outputs)?;
        self.emit(Stage::Poll, Outcome::Success, prompt_id.clone());

        let descriptors = resolve_artifacts(&outputs);
        if descriptors.is_empty() {
            return Err(self.fail(Stage::Resolve, JobError::NoArtifacts));
        }
        self.emit(
            Stage::Resolve,
            Outcome::Success,
            format!("{} artifact(s)", descriptors.len()),
        );

        let ctx = MaterializeContext {
            output_dir: &config.output_dir,
            job_id,
            store: self.store.as_deref(),
        };
        let artifacts = materialize_all(&descriptors, &ctx).await;
        for artifact in &artifacts {
            let ok = !artifact.is_failed();
            let detail = if ok {
                artifact.descriptor.filename.clone()
            } else {
                artifact.message().to_string()
            };
            self.emit(Stage::Materialize, outcome(ok), detail);
        }

        let output = assemble(&artifacts, config.refresh_worker);
        self.emit(
            Stage::Assemble,
            outcome(output.is_success()),
            format!("{} artifact(s)", artifacts.len()),
        );
        Ok(output)
    }

    /// The probe result only ends the job when the config demands a
    /// reachable engine; otherwise submission is attempted regardless.
    fn probe_outcome(&self, reachable: bool) -> Result<(), JobError> {
        if reachable {
            self.emit(Stage::Probe, Outcome::Success, self.engine.base_url().to_string());
            return Ok(());
        }
        let err = JobError::EngineUnavailable(self.engine.base_url().to_string());
        if self.config.require_engine {
            return Err(self.fail(Stage::Probe, err));
        }
        self.emit(Stage::Probe, Outcome::Failure, format!("{err}; submitting anyway"));
        Ok(())
    }

    fn stage<T>(&self, stage: Stage, result: Result<T, JobError>) -> Result<T, JobError> {
        result.map_err(|e| self.fail(stage, e))
    }

    fn fail(&self, stage: Stage, err: JobError) -> JobError {
        self.emit(stage, Outcome::Failure, err.to_string());
        err
    }

    fn emit(&self, stage: Stage, outcome: Outcome, detail: String) {
        self.events.record(StageEvent {
            stage,
            outcome,
            detail,
        });
    }
}

fn outcome(ok: bool) -> Outcome {
    if ok {
        Outcome::Success
    } else {
        Outcome::Failure
    }
}
