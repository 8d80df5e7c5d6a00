//! Job context: where a job gets its arguments and reports its outcome

use async_trait::async_trait;
use chrono::Utc;
use opendal::Operator;
use serde::Serialize;
use std::collections::HashMap;

use crate::job::{JobError, JobRun, JobSummary, OutputFile};

/// Host services available to a running job
#[async_trait]
pub trait JobContext: Send + Sync {
    /// Look up a named argument supplied by whoever launched the job
    fn resolve_argument(&self, name: &str) -> Result<String, JobError>;

    /// Record a successful run. Called at most once per run.
    async fn commit(&self, summary: &JobSummary) -> Result<(), JobError>;

    /// Record a failed run. `run` is `None` when the job name never resolved.
    async fn fail(&self, run: Option<&JobRun>, error: &JobError);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Succeeded,
    Failed,
}

/// Run record persisted under the state prefix
#[derive(Debug, Serialize)]
struct RunRecord<'a> {
    job_name: &'a str,
    run_id: String,
    status: RunStatus,
    started_at: String,
    finished_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rows: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    files: Option<&'a [OutputFile]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> RunRecord<'a> {
    fn new(run: &'a JobRun, status: RunStatus) -> Self {
        Self {
            job_name: &run.job_name,
            run_id: run.run_id.to_string(),
            status,
            started_at: run.started_at.to_rfc3339(),
            finished_at: Utc::now().to_rfc3339(),
            source: None,
            rows: None,
            files: None,
            total_bytes: None,
            error: None,
        }
    }
}

/// Job context backed by CLI arguments and run records in object storage
pub struct StorageJobContext {
    args: HashMap<String, String>,
    operator: Operator,
    state_prefix: String,
}

impl StorageJobContext {
    pub fn new(
        args: HashMap<String, String>,
        operator: Operator,
        state_prefix: impl Into<String>,
    ) -> Self {
        let mut state_prefix = state_prefix.into();
        if !state_prefix.is_empty() && !state_prefix.ends_with('/') {
            state_prefix.push('/');
        }
        Self {
            args,
            operator,
            state_prefix,
        }
    }

    /// `{state_prefix}{job_name}/{run_id}.json`
    pub fn record_path(&self, run: &JobRun) -> String {
        format!("{}{}/{}.json", self.state_prefix, run.job_name, run.run_id)
    }

    async fn write_record(&self, run: &JobRun, record: &RunRecord<'_>) -> Result<String, String> {
        let path = self.record_path(run);
        let body = serde_json::to_vec_pretty(record).map_err(|e| e.to_string())?;
        self.operator
            .write(&path, body)
            .await
            .map_err(|e| format!("failed to write run record '{}': {}", path, e))?;
        Ok(path)
    }
}

#[async_trait]
impl JobContext for StorageJobContext {
    fn resolve_argument(&self, name: &str) -> Result<String, JobError> {
        self.args
            .get(name)
            .cloned()
            .ok_or_else(|| JobError::MissingArgument(name.to_string()))
    }

    async fn commit(&self, summary: &JobSummary) -> Result<(), JobError> {
        let mut record = RunRecord::new(&summary.run, RunStatus::Succeeded);
        record.source = Some(summary.source.to_string());
        record.rows = Some(summary.rows);
        record.files = Some(summary.files.as_slice());
        record.total_bytes = Some(summary.total_bytes);

        let path = self
            .write_record(&summary.run, &record)
            .await
            .map_err(JobError::Commit)?;
        tracing::debug!("Committed run record '{}'", path);
        Ok(())
    }

    async fn fail(&self, run: Option<&JobRun>, error: &JobError) {
        let Some(run) = run else {
            tracing::error!("Job failed before it started: {}", error);
            return;
        };

        tracing::error!(
            job_name = %run.job_name,
            run_id = %run.run_id,
            "Job failed: {}",
            error
        );

        let mut record = RunRecord::new(run, RunStatus::Failed);
        record.error = Some(error.to_string());

        if let Err(e) = self.write_record(run, &record).await {
            tracing::warn!("Could not record failed run: {}", e);
        }
    }
}
