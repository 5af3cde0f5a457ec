use std::{
    fs,
    path::{Path, PathBuf},
};

use sqlx::PgPool;
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{error::DomainError, text::safe_file_name};

use super::{
    embedded::{script_names, unpack_embedded_script},
    script::{Batch, parse_scripts},
};

const SOURCE: &str = "lectern::install::installer";

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("no bundled script named `{0}`")]
    Unknown(String),
    #[error("script `{0}` contains no batches")]
    Empty(String),
}

#[derive(Debug, Error)]
pub enum InstallError {
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error("batch {index} of `{script}` failed")]
    Batch {
        script: String,
        index: usize,
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to write batch file `{path}`")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid batch file name")]
    FileName(#[from] DomainError),
}

/// Batches of the bundled script called `name`.
pub fn script_batches(name: &str) -> Result<Vec<Batch>, ScriptError> {
    let text =
        unpack_embedded_script(name).ok_or_else(|| ScriptError::Unknown(name.to_string()))?;
    let batches = parse_scripts(text);
    if batches.is_empty() {
        return Err(ScriptError::Empty(name.to_string()));
    }
    Ok(batches)
}

/// Run every bundled script against `pool`, batch by batch, in name order.
///
/// Returns the number of batches executed.
pub async fn install(pool: &PgPool) -> Result<usize, InstallError> {
    let mut executed = 0;

    for name in script_names() {
        let batches = script_batches(name)?;
        info!(
            target = SOURCE,
            script = name,
            batches = batches.len(),
            "running installation script"
        );

        for (index, batch) in batches.iter().enumerate() {
            sqlx::raw_sql(batch.text())
                .execute(pool)
                .await
                .map_err(|source| InstallError::Batch {
                    script: name.to_string(),
                    index: index + 1,
                    source,
                })?;
            debug!(
                target = SOURCE,
                script = name,
                batch = index + 1,
                "batch applied"
            );
            executed += 1;
        }
    }

    info!(target = SOURCE, executed, "installation complete");
    Ok(executed)
}

/// Write each batch of script `name` to `out` as `<stem>.<NNN>.sql`.
pub fn split_to_dir(name: &str, out: &Path) -> Result<Vec<PathBuf>, InstallError> {
    let batches = script_batches(name)?;
    let stem = safe_file_name(name.trim_end_matches(".sql"))?;

    fs::create_dir_all(out).map_err(|source| InstallError::Write {
        path: out.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(batches.len());
    for (index, batch) in batches.into_iter().enumerate() {
        let path = out.join(format!("{stem}.{:03}.sql", index + 1));
        let mut text = batch.into_text();
        text.push('\n');
        fs::write(&path, text).map_err(|source| InstallError::Write {
            path: path.clone(),
            source,
        })?;
        written.push(path);
    }

    Ok(written)
}
