//! Server-side evaluation of initialization scripts.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use embedmongo_config::InitializationConfig;
use embedmongo_engine::AdminSession;
use tracing::debug;

use super::{PIPELINE_TARGET, PipelineTarget};
use crate::errors::ScriptError;

/// Runs every initialization job in order, one script at a time.
///
/// # Errors
///
/// Returns [`ScriptError`] for the first job or script that fails; later
/// scripts are not attempted.
pub(crate) fn run_initializations(
    target: &PipelineTarget<'_>,
    jobs: &[InitializationConfig],
) -> Result<(), ScriptError> {
    for (index, job) in jobs.iter().enumerate() {
        let database = job
            .database
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .ok_or(ScriptError::MissingDatabase { index })?;
        let session = target
            .engine
            .admin(target.distribution, target.net, database)
            .map_err(|source| ScriptError::Connect {
                database: database.to_owned(),
                source,
            })?;
        for entry in &job.scripts {
            for file in expand(entry.as_std_path())? {
                evaluate(target, session.as_ref(), database, &file)?;
            }
        }
    }
    Ok(())
}

/// Expands a directory into its immediate files in listing order.
fn expand(entry: &Path) -> Result<Vec<PathBuf>, ScriptError> {
    if !entry.is_dir() {
        return Ok(vec![entry.to_path_buf()]);
    }
    let read_error = |error| ScriptError::Read {
        file: entry.display().to_string(),
        source: Arc::new(error),
    };
    let mut files = Vec::new();
    for dir_entry in fs::read_dir(entry).map_err(read_error)? {
        let path = dir_entry.map_err(read_error)?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    debug!(target: PIPELINE_TARGET, dir = %entry.display(), count = files.len(), "expanded script directory");
    Ok(files)
}

fn evaluate(
    target: &PipelineTarget<'_>,
    session: &dyn AdminSession,
    database: &str,
    file: &Path,
) -> Result<(), ScriptError> {
    let source = fs::read_to_string(file).map_err(|error| ScriptError::Read {
        file: file.display().to_string(),
        source: Arc::new(error),
    })?;
    let name = display_name(file);
    let result = session
        .eval(&wrap_script(&source))
        .map_err(|source| ScriptError::Submit {
            file: name.clone(),
            source,
        })?;
    if !result.ok {
        return Err(ScriptError::Evaluation {
            file: name,
            message: result.error_message.unwrap_or_default(),
        });
    }
    target.reporter.script_evaluated(database, file);
    Ok(())
}

/// Wraps a script in an immediately invoked function.
#[must_use]
pub fn wrap_script(source: &str) -> String {
    format!("(function() {{\n{source}\n}})();")
}

fn display_name(file: &Path) -> String {
    file.file_name().map_or_else(
        || file.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn scripts_are_wrapped_in_function() {
        assert_eq!(
            wrap_script("db.things.insert({a: 1});"),
            "(function() {\ndb.things.insert({a: 1});\n})();"
        );
    }

    #[rstest]
    fn single_files_are_not_expanded() {
        let files = expand(Path::new("/no/such/script.js")).expect("plain file");
        assert_eq!(files, [PathBuf::from("/no/such/script.js")]);
    }

    #[rstest]
    fn directories_expand_to_files_only() {
        let dir = tempfile::tempdir().expect("dir");
        fs::write(dir.path().join("a.js"), "").expect("write");
        fs::create_dir(dir.path().join("nested")).expect("mkdir");
        fs::write(dir.path().join("nested").join("b.js"), "").expect("write");

        let files = expand(dir.path()).expect("expand");

        assert_eq!(files, [dir.path().join("a.js")]);
    }
}
