use crate::domain::FdtdError;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("failed to copy '{}' to '{}': {source}", source_path.display(), destination.display())]
    Copy {
        source_path: PathBuf,
        destination: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl From<WorkspaceError> for FdtdError {
    fn from(error: WorkspaceError) -> Self {
        let message = error.to_string();
        match error {
            WorkspaceError::Copy { .. } => FdtdError::io_system("IO.WORKSPACE_STAGE", message),
            WorkspaceError::Read { .. } => FdtdError::io_system("IO.WORKSPACE_READ", message),
        }
    }
}

/// Copies `source` into `dir` under the same file name and returns the copy's
/// path. Used to place excitation files next to a case configuration.
pub fn stage_file(
    source: impl AsRef<Path>,
    dir: impl AsRef<Path>,
) -> Result<PathBuf, WorkspaceError> {
    let source = source.as_ref();
    let dir = dir.as_ref();
    let copy_error = |destination: PathBuf, error: std::io::Error| WorkspaceError::Copy {
        source_path: source.to_path_buf(),
        destination,
        source: error,
    };

    let Some(file_name) = source.file_name() else {
        return Err(copy_error(
            dir.to_path_buf(),
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "source has no file name"),
        ));
    };
    let destination = dir.join(file_name);
    fs::create_dir_all(dir).map_err(|error| copy_error(destination.clone(), error))?;
    // Copying a file onto itself truncates it before reading.
    if is_same_file(source, &destination) {
        tracing::debug!(path = %destination.display(), "input already staged");
        return Ok(destination);
    }
    fs::copy(source, &destination).map_err(|error| copy_error(destination.clone(), error))?;
    tracing::debug!(
        source = %source.display(),
        destination = %destination.display(),
        "staged input file"
    );
    Ok(destination)
}

fn is_same_file(left: &Path, right: &Path) -> bool {
    match (fs::canonicalize(left), fs::canonicalize(right)) {
        (Ok(left), Ok(right)) => left == right,
        _ => false,
    }
}

/// Number of lines in a text file. A final line without a trailing newline
/// still counts.
pub fn count_lines(path: impl AsRef<Path>) -> Result<usize, WorkspaceError> {
    let path = path.as_ref();
    let read_error = |source: std::io::Error| WorkspaceError::Read {
        path: path.to_path_buf(),
        source,
    };
    let file = fs::File::open(path).map_err(read_error)?;
    let mut reader = BufReader::new(file);
    let mut buffer = Vec::new();
    let mut lines = 0;
    loop {
        buffer.clear();
        let read = reader.read_until(b'\n', &mut buffer).map_err(read_error)?;
        if read == 0 {
            return Ok(lines);
        }
        lines += 1;
    }
}
