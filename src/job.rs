//! Batch conversion job
//!
//! Reads one catalog table and writes it to the sink as Parquet. The job
//! signals completion through its [`JobContext`] exactly once on success and
//! never on failure.

use catalog2parquet_config::{ReaderConfig, RuntimeConfig, SinkFormat as SinkFormatSetting};
use catalog2parquet_core::{
    Catalog, CatalogReference, CoreError, DatasetReader, SinkFormat, SinkLocation,
};
use catalog2parquet_writer::{write_dataset, ParquetOptions, WriterError, WrittenFile};
use chrono::{DateTime, Utc};
use opendal::Operator;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::JobContext;

/// Name of the argument carrying the job name
pub const JOB_NAME_ARG: &str = "JOB_NAME";

#[derive(Debug, Error)]
pub enum JobError {
    #[error("required job argument '{0}' was not provided")]
    MissingArgument(String),

    #[error("job argument '{0}' must not be empty")]
    EmptyArgument(String),

    #[error("job argument '{name}' is invalid: {reason}")]
    InvalidArgument { name: String, reason: String },

    #[error("catalog error: {0}")]
    Catalog(#[from] CoreError),

    #[error("write error: {0}")]
    Write(#[from] WriterError),

    #[error("commit failed: {0}")]
    Commit(String),
}

/// One execution of a named job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRun {
    pub job_name: String,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
}

impl JobRun {
    pub fn new(job_name: impl Into<String>) -> Self {
        Self {
            job_name: job_name.into(),
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputFile {
    pub path: String,
    pub rows: usize,
    pub bytes: usize,
}

impl From<WrittenFile> for OutputFile {
    fn from(file: WrittenFile) -> Self {
        Self {
            path: file.path,
            rows: file.rows,
            bytes: file.bytes,
        }
    }
}

/// What a successful run produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub run: JobRun,
    pub source: CatalogReference,
    pub rows: usize,
    pub files: Vec<OutputFile>,
    pub total_bytes: usize,
}

/// Converts one catalog table into Parquet files under a sink prefix
pub struct ConversionJob {
    catalog: Arc<dyn Catalog>,
    reader: DatasetReader,
    operator: Operator,
    source: CatalogReference,
    sink_prefix: String,
    sink_format: SinkFormat,
    options: ParquetOptions,
}

impl ConversionJob {
    pub fn new(catalog: Arc<dyn Catalog>, operator: Operator, source: CatalogReference) -> Self {
        Self {
            catalog,
            reader: DatasetReader::new(operator.clone(), ReaderConfig::default().batch_size),
            operator,
            source,
            sink_prefix: catalog2parquet_config::DEFAULT_OUTPUT_PREFIX.to_string(),
            sink_format: SinkFormat::Parquet,
            options: ParquetOptions::default(),
        }
    }

    /// Build a job from the `source`, `sink` and `reader` config sections
    pub fn from_config(
        catalog: Arc<dyn Catalog>,
        operator: Operator,
        config: &RuntimeConfig,
    ) -> Result<Self, JobError> {
        let source = CatalogReference::new(&config.source.database, &config.source.table)?;

        Ok(Self::new(catalog, operator, source)
            .with_sink_prefix(&config.sink.prefix)
            .with_sink_format(sink_format_from(config.sink.format))
            .with_options(ParquetOptions::from(&config.sink))
            .with_batch_size(config.reader.batch_size))
    }

    pub fn with_sink_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.sink_prefix = prefix.into();
        self
    }

    pub fn with_sink_format(mut self, format: SinkFormat) -> Self {
        self.sink_format = format;
        self
    }

    pub fn with_options(mut self, options: ParquetOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.reader = DatasetReader::new(self.operator.clone(), batch_size);
        self
    }

    pub fn source(&self) -> &CatalogReference {
        &self.source
    }

    pub fn sink_format(&self) -> SinkFormat {
        self.sink_format
    }

    /// Run the job once.
    ///
    /// The job name is resolved before the catalog or storage is touched. On
    /// success `commit` is called exactly once; any later failure is reported
    /// through `fail` and returned.
    pub async fn run(&self, context: &dyn JobContext) -> Result<JobSummary, JobError> {
        let job_name = match resolve_job_name(context) {
            Ok(name) => name,
            Err(err) => {
                context.fail(None, &err).await;
                return Err(err);
            }
        };

        let run = JobRun::new(job_name);
        info!(
            job_name = %run.job_name,
            run_id = %run.run_id,
            "Starting conversion of {}",
            self.source
        );

        let result = match self.execute(&run).await {
            Ok(summary) => context.commit(&summary).await.map(|()| summary),
            Err(err) => Err(err),
        };

        match &result {
            Ok(summary) => info!(
                job_name = %run.job_name,
                run_id = %run.run_id,
                "✓ Converted {} rows from {} into {} files ({} bytes)",
                summary.rows,
                summary.source,
                summary.files.len(),
                summary.total_bytes
            ),
            Err(err) => context.fail(Some(&run), err).await,
        }

        result
    }

    async fn execute(&self, run: &JobRun) -> Result<JobSummary, JobError> {
        let table = self.catalog.resolve(&self.source).await?;
        let dataset = self.reader.read(&self.source, &table).await?;

        let rows = dataset.num_rows();
        if rows == 0 {
            warn!(
                "Source {} at '{}' has no rows; no files will be written",
                self.source, table.location
            );
        }

        let sink = SinkLocation::new(self.sink_prefix.as_str(), self.sink_format);
        let written = write_dataset(&self.operator, dataset, sink, &self.options).await?;
        let total_bytes = written.total_bytes();

        Ok(JobSummary {
            run: run.clone(),
            source: self.source.clone(),
            rows,
            files: written.files.into_iter().map(OutputFile::from).collect(),
            total_bytes,
        })
    }
}

fn sink_format_from(setting: SinkFormatSetting) -> SinkFormat {
    match setting {
        SinkFormatSetting::Parquet => SinkFormat::Parquet,
    }
}

/// The job name becomes one segment of the run record path, so it is trimmed
/// and must not contain path separators or `..`.
fn resolve_job_name(context: &dyn JobContext) -> Result<String, JobError> {
    let job_name = context.resolve_argument(JOB_NAME_ARG)?;
    let job_name = job_name.trim();

    if job_name.is_empty() {
        return Err(JobError::EmptyArgument(JOB_NAME_ARG.to_string()));
    }
    if job_name.contains(['/', '\\']) || job_name.contains("..") {
        return Err(JobError::InvalidArgument {
            name: JOB_NAME_ARG.to_string(),
            reason: format!("'{}' must not contain '/', '\\' or '..'", job_name),
        });
    }
    Ok(job_name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use catalog2parquet_core::{ManifestCatalog, SourceFormat, TableDefinition};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingContext {
        args: HashMap<String, String>,
        fail_commit: bool,
        commits: Mutex<Vec<JobSummary>>,
        failures: Mutex<Vec<(Option<String>, String)>>,
    }

    impl RecordingContext {
        fn with_job_name(name: &str) -> Self {
            Self {
                args: HashMap::from([(JOB_NAME_ARG.to_string(), name.to_string())]),
                ..Self::default()
            }
        }

        fn commit_count(&self) -> usize {
            self.commits.lock().unwrap().len()
        }

        fn failure_count(&self) -> usize {
            self.failures.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl JobContext for RecordingContext {
        fn resolve_argument(&self, name: &str) -> Result<String, JobError> {
            self.args
                .get(name)
                .cloned()
                .ok_or_else(|| JobError::MissingArgument(name.to_string()))
        }

        async fn commit(&self, summary: &JobSummary) -> Result<(), JobError> {
            if self.fail_commit {
                return Err(JobError::Commit("state store unavailable".to_string()));
            }
            self.commits.lock().unwrap().push(summary.clone());
            Ok(())
        }

        async fn fail(&self, run: Option<&JobRun>, error: &JobError) {
            self.failures
                .lock()
                .unwrap()
                .push((run.map(|r| r.job_name.clone()), error.to_string()));
        }
    }

    struct CountingCatalog {
        inner: ManifestCatalog,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Catalog for CountingCatalog {
        async fn resolve(
            &self,
            reference: &CatalogReference,
        ) -> catalog2parquet_core::Result<TableDefinition> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.resolve(reference).await
        }
    }

    fn reference() -> CatalogReference {
        CatalogReference::new("etl_data_catalog", "your_table").unwrap()
    }

    fn memory_operator() -> Operator {
        Operator::new(opendal::services::Memory::default())
            .unwrap()
            .finish()
    }

    async fn seeded_job(rows: usize) -> (ConversionJob, Arc<CountingCatalog>, Operator) {
        let op = memory_operator();
        let body: String = (0..rows)
            .map(|i| format!("{{\"id\": {}, \"name\": \"user-{}\"}}\n", i, i))
            .collect();
        if rows > 0 {
            op.write("input/your_table/part-0.json", body.into_bytes())
                .await
                .unwrap();
        }

        let catalog = Arc::new(CountingCatalog {
            inner: ManifestCatalog::default().with_table(
                &reference(),
                TableDefinition {
                    location: "input/your_table/".to_string(),
                    format: SourceFormat::Json,
                    columns: vec![],
                },
            ),
            calls: AtomicUsize::new(0),
        });

        let job = ConversionJob::new(catalog.clone(), op.clone(), reference());
        (job, catalog, op)
    }

    #[tokio::test]
    async fn successful_run_commits_once() {
        let (job, catalog, op) = seeded_job(100).await;
        let context = RecordingContext::with_job_name("daily-etl");

        let summary = job.run(&context).await.unwrap();

        assert_eq!(summary.rows, 100);
        assert_eq!(summary.run.job_name, "daily-etl");
        assert!(!summary.files.is_empty());
        assert!(summary.files.iter().all(|f| f.path.starts_with("output/")));
        assert_eq!(context.commit_count(), 1);
        assert_eq!(context.failure_count(), 0);
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 1);

        for file in &summary.files {
            assert!(op.exists(&file.path).await.unwrap());
        }
    }

    #[tokio::test]
    async fn missing_job_name_fails_before_catalog() {
        let (job, catalog, _op) = seeded_job(10).await;
        let context = RecordingContext::default();

        let err = job.run(&context).await.unwrap_err();

        assert!(matches!(err, JobError::MissingArgument(ref name) if name == "JOB_NAME"));
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 0);
        assert_eq!(context.commit_count(), 0);
        assert_eq!(context.failures.lock().unwrap()[0].0, None);
    }

    #[tokio::test]
    async fn empty_job_name_fails_before_catalog() {
        let (job, catalog, _op) = seeded_job(10).await;
        let context = RecordingContext::with_job_name("  ");

        let err = job.run(&context).await.unwrap_err();

        assert!(matches!(err, JobError::EmptyArgument(_)));
        assert_eq!(catalog.calls.load(Ordering::SeqCst), 0);
        assert_eq!(context.commit_count(), 0);
    }

    #[tokio::test]
    async fn job_name_with_path_segments_is_rejected() {
        for name in ["../output/x", "nightly/2024", "a\\b", ".."] {
            let (job, catalog, _op) = seeded_job(10).await;
            let context = RecordingContext::with_job_name(name);

            let err = job.run(&context).await.unwrap_err();

            assert!(matches!(err, JobError::InvalidArgument { .. }), "{}", name);
            assert_eq!(catalog.calls.load(Ordering::SeqCst), 0);
            assert_eq!(context.commit_count(), 0);
        }
    }

    #[tokio::test]
    async fn job_name_is_trimmed() {
        let (job, _catalog, _op) = seeded_job(3).await;
        let context = RecordingContext::with_job_name("  daily-etl \n");

        let summary = job.run(&context).await.unwrap();
        assert_eq!(summary.run.job_name, "daily-etl");
    }

    #[tokio::test]
    async fn unknown_table_never_commits() {
        let (_job, catalog, op) = seeded_job(10).await;
        let job = ConversionJob::new(
            catalog,
            op,
            CatalogReference::new("etl_data_catalog", "missing").unwrap(),
        );
        let context = RecordingContext::with_job_name("daily-etl");

        let err = job.run(&context).await.unwrap_err();

        assert!(matches!(
            err,
            JobError::Catalog(CoreError::TableNotFound { .. })
        ));
        assert_eq!(context.commit_count(), 0);
        let failures = context.failures.lock().unwrap();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0.as_deref(), Some("daily-etl"));
    }

    #[tokio::test]
    async fn empty_source_commits_without_files() {
        let (job, _catalog, _op) = seeded_job(0).await;
        let context = RecordingContext::with_job_name("daily-etl");

        let summary = job.run(&context).await.unwrap();

        assert_eq!(summary.rows, 0);
        assert!(summary.files.is_empty());
        assert_eq!(context.commit_count(), 1);
    }

    #[tokio::test]
    async fn commit_failure_is_reported() {
        let (job, _catalog, _op) = seeded_job(5).await;
        let context = RecordingContext {
            fail_commit: true,
            ..RecordingContext::with_job_name("daily-etl")
        };

        let err = job.run(&context).await.unwrap_err();

        assert!(matches!(err, JobError::Commit(_)));
        assert_eq!(context.commit_count(), 0);
        assert_eq!(context.failure_count(), 1);
    }

    #[tokio::test]
    async fn output_is_split_by_configured_limit() {
        let (job, _catalog, _op) = seeded_job(25).await;
        let job = job.with_sink_prefix("converted").with_options(ParquetOptions {
            max_rows_per_file: 10,
            ..ParquetOptions::default()
        });
        let context = RecordingContext::with_job_name("daily-etl");

        let summary = job.run(&context).await.unwrap();

        let rows: Vec<usize> = summary.files.iter().map(|f| f.rows).collect();
        assert_eq!(rows, vec![10, 10, 5]);
        assert!(summary
            .files
            .iter()
            .all(|f| f.path.starts_with("converted/part-")));
    }

    #[test]
    fn from_config_uses_configured_source() {
        let mut config = RuntimeConfig::default();
        config.source.table = "events".to_string();
        let job = ConversionJob::from_config(
            Arc::new(ManifestCatalog::default()),
            memory_operator(),
            &config,
        )
        .unwrap();
        assert_eq!(job.source().to_string(), "etl_data_catalog.events");
        assert_eq!(job.sink_format(), SinkFormat::Parquet);
    }
}
