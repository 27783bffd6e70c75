//! Bulk data imports.
//!
//! Every job is validated before any import process runs. Parallel batches
//! launch all processes first and join them in launch order. When one
//! fails, every import still outstanding is killed and reaped.

use std::path::PathBuf;
use std::time::Duration;

use embedmongo_config::ImportJobConfig;
use embedmongo_engine::{ImportProcess, ImportSpec};
use tracing::{debug, warn};

use super::{PIPELINE_TARGET, PipelineTarget};
use crate::errors::{ConfigurationError, ImportError};

/// A validated import job with its effective database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportTask {
    /// Source file of JSON-array documents.
    pub file: PathBuf,
    /// Effective database name.
    pub database: String,
    /// Target collection.
    pub collection: String,
    /// Drop the collection before importing.
    pub drop: bool,
    /// Upsert instead of inserting.
    pub upsert: bool,
    /// Per-job timeout.
    pub timeout: Duration,
}

/// Validates `jobs` and resolves each job's database.
///
/// A job-level database overrides `default_database`.
///
/// # Errors
///
/// Returns the first [`ConfigurationError`] found, naming the job by index
/// and file.
pub fn plan_imports(
    jobs: &[ImportJobConfig],
    default_database: Option<&str>,
) -> Result<Vec<ImportTask>, ConfigurationError> {
    let default_database = non_blank(default_database);
    jobs.iter()
        .enumerate()
        .map(|(index, job)| -> Result<ImportTask, ConfigurationError> {
            let file = non_blank(job.file.as_deref())
                .ok_or(ConfigurationError::MissingImportFile { index })?;
            let database = non_blank(job.database.as_deref())
                .or(default_database)
                .ok_or_else(|| ConfigurationError::MissingImportDatabase {
                    index,
                    file: file.to_owned(),
                })?;
            let collection = non_blank(job.collection.as_deref()).ok_or_else(|| {
                ConfigurationError::MissingImportCollection {
                    index,
                    file: file.to_owned(),
                }
            })?;
            Ok(ImportTask {
                file: PathBuf::from(file),
                database: database.to_owned(),
                collection: collection.to_owned(),
                drop: job.drop_on_import,
                upsert: job.upsert_on_import,
                timeout: Duration::from_millis(job.timeout),
            })
        })
        .collect()
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Runs `tasks`, concurrently when `parallel` is set.
///
/// # Errors
///
/// Returns [`ImportError`] naming the first file, in launch order, whose
/// import could not run or exited with a non-zero status.
pub(crate) fn run_imports(
    target: &PipelineTarget<'_>,
    tasks: &[ImportTask],
    parallel: bool,
) -> Result<(), ImportError> {
    if parallel {
        let mut launched = Vec::with_capacity(tasks.len());
        for task in tasks {
            match launch(target, task) {
                Ok(process) => launched.push((task, process)),
                Err(error) => {
                    abort(launched);
                    return Err(error);
                }
            }
        }
        debug!(target: PIPELINE_TARGET, count = launched.len(), "joining parallel imports");
        let mut pending = launched.into_iter();
        let failure = pending
            .by_ref()
            .find_map(|(task, process)| join(target, task, process).err());
        if let Some(error) = failure {
            abort(pending);
            return Err(error);
        }
    } else {
        for task in tasks {
            let process = launch(target, task)?;
            join(target, task, process)?;
        }
    }
    Ok(())
}

fn launch(
    target: &PipelineTarget<'_>,
    task: &ImportTask,
) -> Result<Box<dyn ImportProcess>, ImportError> {
    let spec = ImportSpec {
        net: target.net.clone(),
        database: task.database.clone(),
        collection: task.collection.clone(),
        file: task.file.clone(),
        json_array: true,
        drop: task.drop,
        upsert: task.upsert,
        timeout: task.timeout,
    };
    let process = target
        .engine
        .import_bulk(target.distribution, &spec)
        .map_err(|source| ImportError::Engine {
            file: task.file.display().to_string(),
            source,
        })?;
    target
        .reporter
        .import_started(&task.file, &task.database, &task.collection);
    Ok(process)
}

fn join(
    target: &PipelineTarget<'_>,
    task: &ImportTask,
    mut process: Box<dyn ImportProcess>,
) -> Result<(), ImportError> {
    let file = || task.file.display().to_string();
    let code = process
        .wait()
        .map_err(|source| ImportError::Engine { file: file(), source })?;
    if code != 0 {
        return Err(ImportError::Failed { file: file(), code });
    }
    target.reporter.import_finished(&task.file, code);
    Ok(())
}

fn abort<'t>(outstanding: impl IntoIterator<Item = (&'t ImportTask, Box<dyn ImportProcess>)>) {
    for (task, mut process) in outstanding {
        if let Err(error) = process.kill() {
            warn!(
                target: PIPELINE_TARGET,
                file = %task.file.display(),
                %error,
                "failed to kill outstanding import"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn job(file: &str, database: Option<&str>, collection: &str) -> ImportJobConfig {
        ImportJobConfig {
            database: database.map(str::to_owned),
            collection: Some(collection.to_owned()),
            file: Some(file.to_owned()),
            ..ImportJobConfig::default()
        }
    }

    #[rstest]
    #[case(None)]
    #[case(Some(""))]
    #[case(Some("  "))]
    fn blank_file_fails_validation(#[case] file: Option<&str>) {
        let jobs = [ImportJobConfig {
            file: file.map(str::to_owned),
            database: Some("db".to_owned()),
            collection: Some("c".to_owned()),
            ..ImportJobConfig::default()
        }];

        assert!(matches!(
            plan_imports(&jobs, None),
            Err(ConfigurationError::MissingImportFile { index: 0 })
        ));
    }

    #[rstest]
    fn blank_database_without_default_fails() {
        let jobs = [job("a.json", Some(""), "things")];

        let error = plan_imports(&jobs, None).expect_err("no database");

        assert!(matches!(
            error,
            ConfigurationError::MissingImportDatabase { index: 0, ref file } if file == "a.json"
        ));
    }

    #[rstest]
    fn blank_database_uses_batch_default() {
        let jobs = [job("a.json", None, "things")];

        let tasks = plan_imports(&jobs, Some("fixtures")).expect("valid");

        assert_eq!(tasks[0].database, "fixtures");
    }

    #[rstest]
    fn job_database_overrides_default() {
        let jobs = [job("a.json", Some("own"), "things")];

        let tasks = plan_imports(&jobs, Some("fixtures")).expect("valid");

        assert_eq!(tasks[0].database, "own");
    }

    #[rstest]
    fn blank_collection_names_job() {
        let jobs = [job("a.json", Some("db"), "things"), job("b.json", Some("db"), " ")];

        let error = plan_imports(&jobs, None).expect_err("no collection");

        assert_eq!(
            error.to_string(),
            "import job 1 ('b.json'): collection is required"
        );
    }

    #[rstest]
    fn job_flags_and_timeout_carry_over() {
        let jobs = [ImportJobConfig {
            drop_on_import: false,
            upsert_on_import: true,
            timeout: 1500,
            ..job("a.json", Some("db"), "things")
        }];

        let task = plan_imports(&jobs, None).expect("valid").remove(0);

        assert!(!task.drop);
        assert!(task.upsert);
        assert_eq!(task.timeout, Duration::from_millis(1500));
    }
}
