use super::ProcessError;
use crate::probes::ProbeFileName;
use std::fs;
use std::path::{Path, PathBuf};

/// A probe output file found in a solver working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredProbe {
    pub path: PathBuf,
    pub file_name: ProbeFileName,
}

/// Lists the probe files in `dir` whose probe name equals `probe_name`.
///
/// Paths come back in directory-listing order. Files that do not follow the
/// probe filename grammar are skipped, as are directories.
pub fn discover_probe_files(
    dir: impl AsRef<Path>,
    probe_name: &str,
) -> Result<Vec<PathBuf>, ProcessError> {
    Ok(list_probe_files(dir.as_ref())?
        .into_iter()
        .filter(|probe| probe.file_name.matches_probe(probe_name))
        .map(|probe| probe.path)
        .collect())
}

/// Every file in `dir` that follows the probe filename grammar.
pub fn list_probe_files(dir: &Path) -> Result<Vec<DiscoveredProbe>, ProcessError> {
    let discovery_error = |source: std::io::Error| ProcessError::Discovery {
        path: dir.to_path_buf(),
        source,
    };

    let mut probes = Vec::new();
    for entry in fs::read_dir(dir).map_err(discovery_error)? {
        let entry = entry.map_err(discovery_error)?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
            continue;
        };
        match ProbeFileName::parse(name) {
            Ok(file_name) => probes.push(DiscoveredProbe { path, file_name }),
            Err(error) => {
                tracing::trace!(file = name, reason = error.reason(), "skipping non-probe file");
            }
        }
    }

    tracing::debug!(
        dir = %dir.display(),
        count = probes.len(),
        "scanned solver directory for probe files"
    );
    Ok(probes)
}

#[cfg(test)]
mod tests {
    use super::{discover_probe_files, list_probe_files};
    use crate::solver::ProcessError;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn keeps_only_parseable_files_for_the_requested_probe() {
        let temp = TempDir::new().expect("tempdir should be created");
        for name in [
            "holland1981.fdtd_mid_point_Wz_11_11_12_s2.dat",
            "holland1981.fdtd_mid_point_extra_Wz_11_11_13_s2.dat",
            "holland1981.fdtd_Far_s0.dat",
            "holland1981.fdtd.json",
            "mid_point.dat",
        ] {
            fs::write(temp.path().join(name), "0.0 0.0\n").expect("file should be written");
        }
        fs::create_dir(temp.path().join("holland1981.fdtd_mid_point_Wz_1_1_1_s0.dat"))
            .expect("directory should be created");

        let found = discover_probe_files(temp.path(), "mid_point").expect("scan should succeed");
        let names: Vec<_> = found
            .iter()
            .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
            .collect();
        assert_eq!(names, vec!["holland1981.fdtd_mid_point_Wz_11_11_12_s2.dat"]);

        let all = list_probe_files(temp.path()).expect("scan should succeed");
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn empty_directory_yields_no_matches() {
        let temp = TempDir::new().expect("tempdir should be created");
        let found = discover_probe_files(temp.path(), "Far").expect("scan should succeed");
        assert!(found.is_empty());
    }

    #[test]
    fn missing_directory_is_a_discovery_error() {
        let temp = TempDir::new().expect("tempdir should be created");
        let error = discover_probe_files(temp.path().join("absent"), "Far")
            .expect_err("missing directory should fail");
        assert!(matches!(error, ProcessError::Discovery { .. }));
    }
}
