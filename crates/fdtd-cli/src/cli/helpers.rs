use super::CliError;
use anyhow::Context;
use fdtd_core::domain::FdtdError;
use fdtd_core::probes::ProbeRecord;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub(super) fn current_working_dir() -> Result<PathBuf, CliError> {
    std::env::current_dir().map_err(|source| {
        CliError::Compute(FdtdError::io_system(
            "IO.CLI_CURRENT_DIR",
            format!("failed to read current working directory: {}", source),
        ))
    })
}

pub(super) fn resolve_cli_path(working_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_dir.join(path)
    }
}

pub(super) fn write_json_report<T: Serialize>(path: &Path, report: &T) -> Result<(), CliError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create report directory '{}'", parent.display()))?;
    }
    let mut content =
        serde_json::to_string_pretty(report).context("failed to serialize JSON report")?;
    content.push('\n');
    fs::write(path, content)
        .with_context(|| format!("failed to write JSON report '{}'", path.display()))?;
    Ok(())
}

pub(super) fn render_record_summary(record: &ProbeRecord) -> String {
    let mut lines = vec![
        format!("file: {}", record.file_name()),
        format!("case: {}", record.case_name()),
        format!("probe: {}", record.name()),
        format!("kind: {}", record.kind()),
    ];
    if let Some(cell) = record.cell() {
        lines.push(format!("cell: {}", cell));
    }
    lines.push(format!("segment: {}", record.segment_tag()));
    if let Some(cell_init) = record.cell_init() {
        lines.push(format!("cellInit: {}", cell_init));
    }
    lines.push(format!("samples: {}", record.sample_count()));
    for (name, values) in record.series().columns() {
        match (values.first(), values.last()) {
            (Some(first), Some(last)) => {
                lines.push(format!("  {}: first={:e} last={:e}", name, first, last))
            }
            _ => lines.push(format!("  {}: (empty)", name)),
        }
    }
    lines.join("\n")
}
