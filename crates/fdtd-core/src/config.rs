//! Read/modify/write access to the solver's JSON case description.
//!
//! Only the handful of fields the adapter needs are interpreted; every other
//! key is carried through `save` untouched.

use crate::domain::FdtdError;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_EXTENSION: &str = ".json";
pub const CASE_CONFIG_SUFFIX: &str = ".fdtd.json";

const NUMBER_OF_STEPS_POINTER: &str = "/general/numberOfSteps";
const NUMBER_OF_STEPS_FIELD: &str = "general.numberOfSteps";

#[derive(Debug, thiserror::Error)]
pub enum RunConfigError {
    #[error("failed to read run configuration '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse run configuration '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to write run configuration '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("run configuration is missing '{field}'")]
    MissingField { field: String },
    #[error("run configuration field '{field}' is invalid: {reason}")]
    InvalidValue { field: String, reason: String },
}

impl From<RunConfigError> for FdtdError {
    fn from(error: RunConfigError) -> Self {
        let message = error.to_string();
        match error {
            RunConfigError::Read { .. } => FdtdError::io_system("IO.RUN_CONFIG_READ", message),
            RunConfigError::Write { .. } => FdtdError::io_system("IO.RUN_CONFIG_WRITE", message),
            RunConfigError::Parse { .. } => {
                FdtdError::input_validation("INPUT.RUN_CONFIG_PARSE", message)
            }
            RunConfigError::MissingField { .. } | RunConfigError::InvalidValue { .. } => {
                FdtdError::input_validation("INPUT.RUN_CONFIG_FIELD", message)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    document: Value,
}

impl RunConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RunConfigError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| RunConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&source, path)
    }

    pub fn from_json_str(source: &str) -> Result<Self, RunConfigError> {
        Self::parse(source, Path::new("<inline-config>"))
    }

    fn parse(source: &str, path: &Path) -> Result<Self, RunConfigError> {
        let document: Value =
            serde_json::from_str(source).map_err(|source| RunConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        if !document.is_object() {
            return Err(invalid("<root>", "expected a JSON object"));
        }
        Ok(Self { document })
    }

    /// Writes the document back as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), RunConfigError> {
        let path = path.as_ref();
        let write_error = |source: std::io::Error| RunConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut text = serde_json::to_string_pretty(&self.document)
            .map_err(|source| write_error(source.into()))?;
        text.push('\n');
        fs::write(path, text).map_err(write_error)?;
        tracing::debug!(path = %path.display(), "saved run configuration");
        Ok(())
    }

    pub fn as_value(&self) -> &Value {
        &self.document
    }

    pub fn number_of_steps(&self) -> Result<u64, RunConfigError> {
        let value = self
            .document
            .pointer(NUMBER_OF_STEPS_POINTER)
            .ok_or_else(|| missing(NUMBER_OF_STEPS_FIELD))?;
        value
            .as_u64()
            .ok_or_else(|| invalid(NUMBER_OF_STEPS_FIELD, "expected a non-negative integer"))
    }

    /// Sets `general.numberOfSteps`, creating `general` when absent.
    pub fn set_number_of_steps(&mut self, steps: u64) -> Result<(), RunConfigError> {
        if steps == 0 {
            return Err(invalid(NUMBER_OF_STEPS_FIELD, "must be at least 1"));
        }
        let general = object_entry(root_object(&mut self.document)?, "general", "general")?;
        general.insert("numberOfSteps".to_string(), Value::from(steps));
        Ok(())
    }

    pub fn probe_count(&self) -> usize {
        self.probes().map_or(0, Vec::len)
    }

    /// Names of the probes that carry one, in document order.
    pub fn probe_names(&self) -> Vec<&str> {
        self.probes()
            .into_iter()
            .flatten()
            .filter_map(|probe| probe.get("name").and_then(Value::as_str))
            .collect()
    }

    /// `probes[index].domain.numberOfFrequencies`, or `None` when the probe
    /// has no such field.
    pub fn number_of_frequencies(&self, index: usize) -> Result<Option<u64>, RunConfigError> {
        let probe = self
            .probes()
            .and_then(|probes| probes.get(index))
            .ok_or_else(|| missing(&format!("probes[{index}]")))?;
        let Some(value) = probe.pointer("/domain/numberOfFrequencies") else {
            return Ok(None);
        };
        value.as_u64().map(Some).ok_or_else(|| {
            invalid(
                &format!("probes[{index}].domain.numberOfFrequencies"),
                "expected a non-negative integer",
            )
        })
    }

    pub fn set_number_of_frequencies(
        &mut self,
        index: usize,
        frequencies: u64,
    ) -> Result<(), RunConfigError> {
        let field = format!("probes[{index}].domain.numberOfFrequencies");
        if frequencies == 0 {
            return Err(invalid(&field, "must be at least 1"));
        }
        let probe = self
            .document
            .get_mut("probes")
            .and_then(Value::as_array_mut)
            .and_then(|probes| probes.get_mut(index))
            .ok_or_else(|| missing(&format!("probes[{index}]")))?;
        let probe = probe
            .as_object_mut()
            .ok_or_else(|| invalid(&format!("probes[{index}]"), "expected a JSON object"))?;
        let domain = object_entry(probe, "domain", &format!("probes[{index}].domain"))?;
        domain.insert("numberOfFrequencies".to_string(), Value::from(frequencies));
        Ok(())
    }

    fn probes(&self) -> Option<&Vec<Value>> {
        self.document.get("probes").and_then(Value::as_array)
    }
}

/// Case name of a configuration path: `cases/sphere.fdtd.json` -> `sphere`.
pub fn case_name_from_path(path: impl AsRef<Path>) -> Option<String> {
    let file_name = path.as_ref().file_name()?.to_str()?;
    let case_name = file_name
        .strip_suffix(CASE_CONFIG_SUFFIX)
        .or_else(|| file_name.strip_suffix(CONFIG_EXTENSION))?;
    (!case_name.is_empty()).then(|| case_name.to_string())
}

fn root_object(document: &mut Value) -> Result<&mut Map<String, Value>, RunConfigError> {
    document
        .as_object_mut()
        .ok_or_else(|| invalid("<root>", "expected a JSON object"))
}

fn object_entry<'a>(
    parent: &'a mut Map<String, Value>,
    key: &str,
    field: &str,
) -> Result<&'a mut Map<String, Value>, RunConfigError> {
    parent
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .ok_or_else(|| invalid(field, "expected a JSON object"))
}

fn missing(field: &str) -> RunConfigError {
    RunConfigError::MissingField {
        field: field.to_string(),
    }
}

fn invalid(field: &str, reason: &str) -> RunConfigError {
    RunConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
