use super::filename::ProbeFileName;
use crate::domain::{GridCell, ProbeKind};
use serde::Serialize;

pub const TIME_COLUMN: &str = "time";
pub const CURRENT_COLUMN: &str = "current";
pub const FREQUENCY_COLUMN: &str = "frequency";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<f64>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// Sample columns, shaped by probe kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeSeries {
    Wire {
        time: Vec<f64>,
        current: Vec<f64>,
    },
    FarField {
        frequency: Vec<f64>,
        components: Vec<Column>,
    },
    Other {
        columns: Vec<Column>,
    },
}

impl ProbeSeries {
    pub fn sample_count(&self) -> usize {
        match self {
            Self::Wire { time, .. } => time.len(),
            Self::FarField { frequency, .. } => frequency.len(),
            Self::Other { columns } => columns.first().map_or(0, |column| column.values.len()),
        }
    }

    pub fn column_count(&self) -> usize {
        match self {
            Self::Wire { .. } => 2,
            Self::FarField { components, .. } => components.len() + 1,
            Self::Other { columns } => columns.len(),
        }
    }

    pub fn column_names(&self) -> Vec<&str> {
        match self {
            Self::Wire { .. } => vec![TIME_COLUMN, CURRENT_COLUMN],
            Self::FarField { components, .. } => std::iter::once(FREQUENCY_COLUMN)
                .chain(components.iter().map(|column| column.name.as_str()))
                .collect(),
            Self::Other { columns } => columns.iter().map(|column| column.name.as_str()).collect(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        match self {
            Self::Wire { time, current } => match name {
                TIME_COLUMN => Some(time.as_slice()),
                CURRENT_COLUMN => Some(current.as_slice()),
                _ => None,
            },
            Self::FarField {
                frequency,
                components,
            } => {
                if name == FREQUENCY_COLUMN {
                    return Some(frequency.as_slice());
                }
                find_column(components, name)
            }
            Self::Other { columns } => find_column(columns, name),
        }
    }

    /// Columns in file order, paired with their names.
    pub fn columns(&self) -> Vec<(&str, &[f64])> {
        match self {
            Self::Wire { time, current } => vec![
                (TIME_COLUMN, time.as_slice()),
                (CURRENT_COLUMN, current.as_slice()),
            ],
            Self::FarField {
                frequency,
                components,
            } => std::iter::once((FREQUENCY_COLUMN, frequency.as_slice()))
                .chain(
                    components
                        .iter()
                        .map(|column| (column.name.as_str(), column.values.as_slice())),
                )
                .collect(),
            Self::Other { columns } => columns
                .iter()
                .map(|column| (column.name.as_str(), column.values.as_slice()))
                .collect(),
        }
    }
}

fn find_column<'a>(columns: &'a [Column], name: &str) -> Option<&'a [f64]> {
    columns
        .iter()
        .find(|column| column.name == name)
        .map(|column| column.values.as_slice())
}

/// One fully parsed probe output file.
///
/// Only [`read_probe`](super::read_probe) and
/// [`parse_probe_source`](super::parse_probe_source) build records, so every
/// record already satisfies the equal-length column invariant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeRecord {
    file_name: ProbeFileName,
    cell_init: Option<GridCell>,
    header: Vec<String>,
    series: ProbeSeries,
}

impl ProbeRecord {
    pub(super) fn new(
        file_name: ProbeFileName,
        cell_init: Option<GridCell>,
        header: Vec<String>,
        series: ProbeSeries,
    ) -> Self {
        Self {
            file_name,
            cell_init,
            header,
            series,
        }
    }

    pub fn file_name(&self) -> &ProbeFileName {
        &self.file_name
    }

    pub fn case_name(&self) -> &str {
        self.file_name.case_name()
    }

    pub fn name(&self) -> &str {
        self.file_name.probe_name()
    }

    pub const fn kind(&self) -> ProbeKind {
        self.file_name.kind()
    }

    pub const fn cell(&self) -> Option<GridCell> {
        self.file_name.cell()
    }

    pub const fn segment_tag(&self) -> u32 {
        self.file_name.segment_tag()
    }

    pub const fn cell_init(&self) -> Option<GridCell> {
        self.cell_init
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn series(&self) -> &ProbeSeries {
        &self.series
    }

    pub fn sample_count(&self) -> usize {
        self.series.sample_count()
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.series.column(name)
    }

    pub fn time(&self) -> Option<&[f64]> {
        match &self.series {
            ProbeSeries::Wire { time, .. } => Some(time.as_slice()),
            _ => None,
        }
    }

    pub fn current(&self) -> Option<&[f64]> {
        match &self.series {
            ProbeSeries::Wire { current, .. } => Some(current.as_slice()),
            _ => None,
        }
    }

    pub fn frequency(&self) -> Option<&[f64]> {
        match &self.series {
            ProbeSeries::FarField { frequency, .. } => Some(frequency.as_slice()),
            _ => None,
        }
    }
}
