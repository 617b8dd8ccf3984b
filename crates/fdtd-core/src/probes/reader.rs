use super::filename::{FormatError, ProbeFileName};
use super::record::{Column, ProbeRecord, ProbeSeries};
use crate::domain::{FdtdError, GridCell, ProbeKind};
use std::fs;
use std::path::{Path, PathBuf};

const WIRE_ARITY: usize = 2;
const CELL_INIT_KEYS: [&str; 2] = ["cellinit", "cell_init"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParseErrorKind {
    BadName,
    Malformed,
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("failed to read probe file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    BadName(#[from] FormatError),
    #[error("malformed probe file '{file_name}': {reason}")]
    Malformed { file_name: String, reason: String },
}

impl ParseError {
    pub const fn kind(&self) -> ParseErrorKind {
        match self {
            Self::Io { .. } => ParseErrorKind::Io,
            Self::BadName(_) => ParseErrorKind::BadName,
            Self::Malformed { .. } => ParseErrorKind::Malformed,
        }
    }
}

impl From<ParseError> for FdtdError {
    fn from(error: ParseError) -> Self {
        let message = error.to_string();
        match error.kind() {
            ParseErrorKind::BadName => FdtdError::input_validation("INPUT.PROBE_FILENAME", message),
            ParseErrorKind::Io => FdtdError::io_system("IO.PROBE_READ", message),
            ParseErrorKind::Malformed => FdtdError::computation("RUN.PROBE_PARSE", message),
        }
    }
}

/// Reads and parses one probe output file.
///
/// The file name is validated before the file is opened, so a misnamed file
/// fails with [`ParseErrorKind::BadName`] even when it does not exist.
pub fn read_probe(path: impl AsRef<Path>) -> Result<ProbeRecord, ParseError> {
    let path = path.as_ref();
    let file_name = ProbeFileName::from_path(path)?;
    let source = fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let record = parse_source(file_name, &source)?;
    tracing::debug!(
        path = %path.display(),
        kind = %record.kind(),
        samples = record.sample_count(),
        "parsed probe file"
    );
    Ok(record)
}

pub fn parse_probe_source(file_name: &str, source: &str) -> Result<ProbeRecord, ParseError> {
    let file_name = ProbeFileName::parse(file_name)?;
    parse_source(file_name, source)
}

struct DataRow {
    line: usize,
    values: Vec<f64>,
}

fn parse_source(file_name: ProbeFileName, source: &str) -> Result<ProbeRecord, ParseError> {
    let mut header = Vec::new();
    let mut title: Option<Vec<String>> = None;
    let mut cell_init: Option<GridCell> = None;
    let mut rows: Vec<DataRow> = Vec::new();
    // A far-field `x y z` line is only the origin cell if the rows after it
    // have a different arity; until then it may still be the first sample.
    let mut positional: Option<PositionalCellInit> = None;

    for (index, raw_line) in source.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        let line_number = index + 1;

        if !rows.is_empty() {
            let values = parse_data_row(line).map_err(|token| {
                malformed(
                    &file_name,
                    format!(
                        "line {}: token '{}' is not a floating-point number",
                        line_number, token
                    ),
                )
            })?;
            rows.push(DataRow {
                line: line_number,
                values,
            });
            continue;
        }

        if let Some(cell) = parse_cell_init_line(line)
            .map_err(|reason| malformed(&file_name, format!("line {}: {}", line_number, reason)))?
        {
            if let Some(candidate) = positional.take() {
                header.push(candidate.text);
            }
            cell_init = Some(cell);
            header.push(line.to_string());
            continue;
        }

        if file_name.kind() == ProbeKind::FarField
            && cell_init.is_none()
            && positional.is_none()
            && let Some(candidate) = PositionalCellInit::parse(line, line_number)
        {
            positional = Some(candidate);
            continue;
        }

        match parse_data_row(line) {
            Ok(values) => {
                if let Some(candidate) = positional.take() {
                    if values.len() == candidate.row.values.len() {
                        rows.push(candidate.row);
                    } else {
                        cell_init = Some(candidate.cell);
                        header.push(candidate.text);
                    }
                }
                rows.push(DataRow {
                    line: line_number,
                    values,
                });
            }
            Err(_) => {
                if let Some(candidate) = positional.take() {
                    cell_init = Some(candidate.cell);
                    header.push(candidate.text);
                }
                title = Some(line.split_whitespace().map(str::to_string).collect());
                header.push(line.to_string());
            }
        }
    }
    if let Some(candidate) = positional.take() {
        rows.push(candidate.row);
    }

    let arity = rows
        .first()
        .map(|row| row.values.len())
        .ok_or_else(|| malformed(&file_name, "file contains no numeric data rows"))?;
    if let Some(row) = rows.iter().find(|row| row.values.len() != arity) {
        return Err(malformed(
            &file_name,
            format!(
                "line {} has {} columns but the first data row has {}",
                row.line,
                row.values.len(),
                arity
            ),
        ));
    }

    let mut columns = transpose(&rows, arity);
    let series = match file_name.kind() {
        ProbeKind::Wire => {
            if arity != WIRE_ARITY {
                return Err(malformed(
                    &file_name,
                    format!(
                        "wire probes carry {} columns (time, current) but found {}",
                        WIRE_ARITY, arity
                    ),
                ));
            }
            let current = columns.pop().unwrap_or_default();
            let time = columns.pop().unwrap_or_default();
            if let Some(offset) = time.windows(2).position(|pair| pair[1] < pair[0]) {
                return Err(malformed(
                    &file_name,
                    format!(
                        "time decreases at line {} ({} after {})",
                        rows[offset + 1].line,
                        time[offset + 1],
                        time[offset]
                    ),
                ));
            }
            ProbeSeries::Wire { time, current }
        }
        ProbeKind::FarField => {
            if cell_init.is_none() {
                return Err(malformed(
                    &file_name,
                    "far-field header is missing the 'cellInit' field",
                ));
            }
            if arity < 2 {
                return Err(malformed(
                    &file_name,
                    "far-field rows need a frequency and at least one field component",
                ));
            }
            let names = column_names(title.as_deref(), arity, "component", 1);
            let mut values = columns.into_iter();
            let frequency = values.next().unwrap_or_default();
            let components = names
                .into_iter()
                .skip(1)
                .zip(values)
                .map(|(name, values)| Column::new(name, values))
                .collect();
            ProbeSeries::FarField {
                frequency,
                components,
            }
        }
        ProbeKind::Other => {
            let names = column_names(title.as_deref(), arity, "column", 0);
            ProbeSeries::Other {
                columns: names
                    .into_iter()
                    .zip(columns)
                    .map(|(name, values)| Column::new(name, values))
                    .collect(),
            }
        }
    };

    Ok(ProbeRecord::new(file_name, cell_init, header, series))
}

fn transpose(rows: &[DataRow], arity: usize) -> Vec<Vec<f64>> {
    let mut columns: Vec<Vec<f64>> = (0..arity).map(|_| Vec::with_capacity(rows.len())).collect();
    for row in rows {
        for (column, value) in columns.iter_mut().zip(&row.values) {
            column.push(*value);
        }
    }
    columns
}

fn column_names(title: Option<&[String]>, arity: usize, prefix: &str, first: usize) -> Vec<String> {
    match title {
        Some(tokens) if tokens.len() == arity => tokens.to_vec(),
        _ => (0..arity)
            .map(|index| format!("{}_{}", prefix, index + first))
            .collect(),
    }
}

fn malformed(file_name: &ProbeFileName, reason: impl Into<String>) -> ParseError {
    ParseError::Malformed {
        file_name: file_name.to_string(),
        reason: reason.into(),
    }
}

fn parse_data_row(line: &str) -> Result<Vec<f64>, &str> {
    line.split_whitespace()
        .map(|token| parse_numeric_token(token).ok_or(token))
        .collect()
}

fn parse_numeric_token(token: &str) -> Option<f64> {
    if token.contains(['D', 'd']) {
        return token.replace(['D', 'd'], "E").parse().ok();
    }
    token.parse().ok()
}

fn parse_cell_init_line(line: &str) -> Result<Option<GridCell>, String> {
    let mut tokens = line
        .split(|character: char| character.is_whitespace() || matches!(character, ':' | '=' | ','))
        .filter(|token| !token.is_empty());
    let Some(key) = tokens.next() else {
        return Ok(None);
    };
    if !CELL_INIT_KEYS
        .iter()
        .any(|candidate| key.eq_ignore_ascii_case(candidate))
    {
        return Ok(None);
    }

    let indices: Vec<&str> = tokens.collect();
    match indices.as_slice() {
        [x, y, z] => match (x.parse::<i64>(), y.parse::<i64>(), z.parse::<i64>()) {
            (Ok(x), Ok(y), Ok(z)) => Ok(Some(GridCell::new(x, y, z))),
            _ => Err(format!(
                "'{}' must be followed by three integer cell indices",
                key
            )),
        },
        _ => Err(format!(
            "'{}' must be followed by three integer cell indices",
            key
        )),
    }
}

struct PositionalCellInit {
    cell: GridCell,
    text: String,
    row: DataRow,
}

impl PositionalCellInit {
    fn parse(line: &str, line_number: usize) -> Option<Self> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let [x, y, z] = tokens.as_slice() else {
            return None;
        };
        if !(is_cell_index(x) && is_cell_index(y) && is_cell_index(z)) {
            return None;
        }
        let cell = GridCell::new(x.parse().ok()?, y.parse().ok()?, z.parse().ok()?);
        let values = parse_data_row(line).ok()?;
        Some(Self {
            cell,
            text: line.to_string(),
            row: DataRow {
                line: line_number,
                values,
            },
        })
    }
}

fn is_cell_index(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|byte| byte.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::{ParseErrorKind, parse_probe_source};
    use crate::domain::{GridCell, ProbeKind};
    use crate::probes::ProbeSeries;

    const WIRE_NAME: &str = "holland1981.fdtd_mid_point_Wz_11_11_12_s2.dat";
    const FAR_NAME: &str = "sphere.fdtd_Far_s0.dat";

    #[test]
    fn wire_probe_source_yields_time_and_current() {
        let source = "\
 t                         I
  0.00000000000000000E+000  0.00000000000000000E+000
  0.99999999600419720E-012  0.125000000E-003
  0.19999999920083944E-011 -0.228888888E-021
";
        let record = parse_probe_source(WIRE_NAME, source).expect("wire probe should parse");

        assert_eq!(record.kind(), ProbeKind::Wire);
        assert_eq!(record.sample_count(), 3);
        assert_eq!(record.header().len(), 1);
        let time = record.time().expect("wire probe should expose time");
        let current = record.current().expect("wire probe should expose current");
        assert_eq!(time[0], 0.0);
        assert_eq!(time[2], 0.19999999920083944E-011);
        assert_eq!(current[1], 0.125e-3);
        assert_eq!(current[2], -0.228888888E-021);
        assert_eq!(record.column("time"), Some(time));
        assert!(record.frequency().is_none());
    }

    #[test]
    fn fortran_double_exponents_are_normalized() {
        let source = "t I\n0.0D+00 1.5D-03\n1.0D-12 -2.0d-03\n";
        let record = parse_probe_source(WIRE_NAME, source).expect("D exponents should parse");
        assert_eq!(record.current(), Some(&[1.5e-3, -2.0e-3][..]));
    }

    #[test]
    fn far_field_source_reads_cell_init_and_named_components() {
        let source = "\
cellInit: 2 2 2
cellEnd: 77 77 77
Freq Theta Phi Etheta Ephi
1.0E+06 0.0 0.0 1.5E-02 0.0
2.0E+06 0.0 0.0 1.25E-02 0.0
";
        let record = parse_probe_source(FAR_NAME, source).expect("far field should parse");

        assert_eq!(record.kind(), ProbeKind::FarField);
        assert_eq!(record.cell_init(), Some(GridCell::new(2, 2, 2)));
        assert_eq!(record.frequency(), Some(&[1.0e6, 2.0e6][..]));
        assert_eq!(record.column("Etheta"), Some(&[1.5e-2, 1.25e-2][..]));
        match record.series() {
            ProbeSeries::FarField { components, .. } => {
                let names: Vec<&str> = components.iter().map(|c| c.name.as_str()).collect();
                assert_eq!(names, vec!["Theta", "Phi", "Etheta", "Ephi"]);
            }
            other => panic!("expected far-field series, got {:?}", other),
        }
    }

    #[test]
    fn far_field_accepts_positional_cell_init_and_default_names() {
        let source = "2 2 2\n1.0E+06 0.5 0.25 0.1\n2.0E+06 0.4 0.2 0.1\n";
        let record = parse_probe_source(FAR_NAME, source).expect("far field should parse");
        assert_eq!(record.cell_init(), Some(GridCell::new(2, 2, 2)));
        assert_eq!(record.sample_count(), 2);
        assert_eq!(record.header(), &["2 2 2".to_string()][..]);
        assert_eq!(record.column("component_2"), Some(&[0.25, 0.2][..]));
    }

    #[test]
    fn integer_first_row_with_matching_arity_stays_data() {
        let source = "Freq Etheta Ephi\n1 2 3\n4 5 6\n7 8 9\n";
        let error = parse_probe_source(FAR_NAME, source)
            .expect_err("three-column rows without cellInit should fail");
        assert_eq!(error.kind(), ParseErrorKind::Malformed);
        assert!(error.to_string().contains("cellInit"));

        let keyed = parse_probe_source(FAR_NAME, &format!("cellInit: 2 2 2\n{source}"))
            .expect("keyed cellInit should keep every row");
        assert_eq!(keyed.frequency(), Some(&[1.0, 4.0, 7.0][..]));
    }

    #[test]
    fn lone_integer_row_is_a_sample_not_a_cell() {
        let error = parse_probe_source(FAR_NAME, "1 2 3\n")
            .expect_err("single row without cellInit should fail");
        assert_eq!(error.kind(), ParseErrorKind::Malformed);
    }

    #[test]
    fn far_field_without_cell_init_is_malformed() {
        let source = "Freq E\n1.0E+06 0.5\n";
        let error = parse_probe_source(FAR_NAME, source).expect_err("cellInit is required");
        assert_eq!(error.kind(), ParseErrorKind::Malformed);
        assert!(error.to_string().contains("cellInit"));
    }

    #[test]
    fn ragged_rows_are_malformed() {
        let source = "t I\n0.0 0.0\n1.0 2.0 3.0\n";
        let error = parse_probe_source(WIRE_NAME, source).expect_err("ragged rows should fail");
        assert_eq!(error.kind(), ParseErrorKind::Malformed);
        assert!(error.to_string().contains("line 3"));
    }

    #[test]
    fn non_numeric_data_tokens_are_malformed() {
        let source = "t I\n0.0 0.0\n1.0 oops\n";
        let error = parse_probe_source(WIRE_NAME, source).expect_err("bad token should fail");
        assert_eq!(error.kind(), ParseErrorKind::Malformed);
        assert!(error.to_string().contains("'oops'"));
    }

    #[test]
    fn wire_arity_and_time_order_are_enforced() {
        let three_columns = "t I V\n0.0 0.0 0.0\n";
        assert_eq!(
            parse_probe_source(WIRE_NAME, three_columns)
                .expect_err("wire arity should be enforced")
                .kind(),
            ParseErrorKind::Malformed
        );

        let backwards = "t I\n2.0 0.0\n1.0 0.0\n";
        let error = parse_probe_source(WIRE_NAME, backwards).expect_err("time must not decrease");
        assert!(error.to_string().contains("time decreases"));
    }

    #[test]
    fn header_only_file_is_malformed() {
        let error = parse_probe_source(WIRE_NAME, "t I\n\n").expect_err("no rows should fail");
        assert_eq!(error.kind(), ParseErrorKind::Malformed);
    }

    #[test]
    fn bad_file_name_is_reported_before_content() {
        let error = parse_probe_source("holland1981.dat", "t I\n0.0 0.0\n")
            .expect_err("bad name should fail");
        assert_eq!(error.kind(), ParseErrorKind::BadName);
    }

    #[test]
    fn other_probes_use_title_names_when_arity_matches() {
        let record = parse_probe_source(
            "box.fdtd_center_Ex_5_6_7_s1.dat",
            "t Ex\n0.0 1.0\n1.0 2.0\n",
        )
        .expect("point probe should parse");
        assert_eq!(record.kind(), ProbeKind::Other);
        assert_eq!(record.column("Ex"), Some(&[1.0, 2.0][..]));

        let untitled = parse_probe_source("box.fdtd_center_Ex_5_6_7_s1.dat", "0.0 1.0 4.0\n")
            .expect("untitled point probe should parse");
        assert_eq!(untitled.column("column_2"), Some(&[4.0][..]));
    }
}
