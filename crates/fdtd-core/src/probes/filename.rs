//! Solver output file naming convention.
//!
//! ```text
//! <case>.fdtd_<probe>_<kind>_<x>_<y>_<z>_s<tag>.dat   near-field probes
//! <case>.fdtd_Far_s<tag>.dat                          far-field probes
//! ```
//!
//! Probe names may contain underscores, so the body after `.fdtd_` is read
//! backwards from the fixed suffix structure.

use crate::domain::{FdtdError, GridCell, ProbeKind};
use serde::Serialize;
use std::fmt::{Display, Formatter};
use std::path::Path;

pub const CASE_SEPARATOR: &str = ".fdtd_";
pub const PROBE_FILE_EXTENSION: &str = ".dat";
pub const FAR_FIELD_PROBE_NAME: &str = "Far";
pub const FAR_FIELD_KIND_TOKEN: &str = "FF";
pub const WIRE_KIND_TOKENS: [&str; 3] = ["Wx", "Wy", "Wz"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid probe file name '{file_name}': {reason}")]
pub struct FormatError {
    file_name: String,
    reason: String,
}

impl FormatError {
    fn new(file_name: &str, reason: impl Into<String>) -> Self {
        Self {
            file_name: file_name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl From<FormatError> for FdtdError {
    fn from(error: FormatError) -> Self {
        FdtdError::input_validation("INPUT.PROBE_FILENAME", error.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ProbeFileName {
    case_name: String,
    probe_name: String,
    kind: ProbeKind,
    kind_token: Option<String>,
    cell: Option<GridCell>,
    segment_tag: u32,
}

impl ProbeFileName {
    pub fn parse(file_name: &str) -> Result<Self, FormatError> {
        let stem = file_name
            .strip_suffix(PROBE_FILE_EXTENSION)
            .ok_or_else(|| FormatError::new(file_name, "missing '.dat' extension"))?;
        let (case_name, body) = stem.split_once(CASE_SEPARATOR).ok_or_else(|| {
            FormatError::new(file_name, "missing '.fdtd_' case separator")
        })?;
        if case_name.is_empty() {
            return Err(FormatError::new(file_name, "case name is empty"));
        }

        let mut tokens = SuffixTokens::new(body);
        let segment_tag = tokens
            .pop()
            .and_then(parse_segment_tag)
            .ok_or_else(|| FormatError::new(file_name, "missing trailing 's<N>' segment tag"))?;

        if let Some((kind_token, cell)) = tokens.pop_kind_and_cell() {
            let probe_name = tokens.joined();
            if probe_name.is_empty() {
                return Err(FormatError::new(
                    file_name,
                    format!("probe name before '{}' is empty", kind_token),
                ));
            }

            return Ok(Self {
                case_name: case_name.to_string(),
                probe_name,
                kind: kind_for_token(kind_token),
                kind_token: Some(kind_token.to_string()),
                cell: Some(cell),
                segment_tag,
            });
        }

        if tokens.joined() == FAR_FIELD_PROBE_NAME {
            return Ok(Self {
                case_name: case_name.to_string(),
                probe_name: FAR_FIELD_PROBE_NAME.to_string(),
                kind: ProbeKind::FarField,
                kind_token: None,
                cell: None,
                segment_tag,
            });
        }

        Err(FormatError::new(
            file_name,
            format!(
                "expected '<probe>_<kind>_<x>_<y>_<z>' or '{}' before the segment tag",
                FAR_FIELD_PROBE_NAME
            ),
        ))
    }

    /// Parses the base name of `path`.
    pub fn from_path(path: &Path) -> Result<Self, FormatError> {
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                FormatError::new(
                    &path.to_string_lossy(),
                    "path has no UTF-8 file name component",
                )
            })?;
        Self::parse(file_name)
    }

    pub fn near_field(
        case_name: &str,
        probe_name: &str,
        kind_token: &str,
        cell: GridCell,
        segment_tag: u32,
    ) -> Result<Self, FormatError> {
        let candidate = format!(
            "{}{}{}_{}_{}_{}_{}_s{}{}",
            case_name,
            CASE_SEPARATOR,
            probe_name,
            kind_token,
            cell.x,
            cell.y,
            cell.z,
            segment_tag,
            PROBE_FILE_EXTENSION
        );
        let parsed = Self::parse(&candidate)?;
        if parsed.case_name != case_name || parsed.probe_name != probe_name {
            return Err(FormatError::new(
                &candidate,
                "case or probe name does not survive the naming convention",
            ));
        }
        Ok(parsed)
    }

    pub fn far_field(case_name: &str, segment_tag: u32) -> Result<Self, FormatError> {
        let candidate = format!(
            "{}{}{}_s{}{}",
            case_name, CASE_SEPARATOR, FAR_FIELD_PROBE_NAME, segment_tag, PROBE_FILE_EXTENSION
        );
        let parsed = Self::parse(&candidate)?;
        if parsed.case_name != case_name {
            return Err(FormatError::new(
                &candidate,
                "case name does not survive the naming convention",
            ));
        }
        Ok(parsed)
    }

    pub fn case_name(&self) -> &str {
        &self.case_name
    }

    pub fn probe_name(&self) -> &str {
        &self.probe_name
    }

    pub const fn kind(&self) -> ProbeKind {
        self.kind
    }

    pub fn kind_token(&self) -> Option<&str> {
        self.kind_token.as_deref()
    }

    pub const fn cell(&self) -> Option<GridCell> {
        self.cell
    }

    pub const fn segment_tag(&self) -> u32 {
        self.segment_tag
    }

    pub fn matches_probe(&self, probe_name: &str) -> bool {
        self.probe_name == probe_name
    }
}

impl Display for ProbeFileName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.case_name, CASE_SEPARATOR, self.probe_name)?;
        if let (Some(kind_token), Some(cell)) = (&self.kind_token, self.cell) {
            write!(f, "_{}_{}_{}_{}", kind_token, cell.x, cell.y, cell.z)?;
        }
        write!(f, "_s{}{}", self.segment_tag, PROBE_FILE_EXTENSION)
    }
}

/// `_`-separated tokens consumed from the end.
struct SuffixTokens<'a> {
    tokens: Vec<&'a str>,
}

impl<'a> SuffixTokens<'a> {
    fn new(body: &'a str) -> Self {
        Self {
            tokens: body.split('_').collect(),
        }
    }

    fn pop(&mut self) -> Option<&'a str> {
        self.tokens.pop()
    }

    fn pop_kind_and_cell(&mut self) -> Option<(&'a str, GridCell)> {
        let len = self.tokens.len();
        if len < 4 {
            return None;
        }

        let tail = &self.tokens[len - 4..];
        if !is_kind_token(tail[0]) {
            return None;
        }
        let x = parse_cell_index(tail[1])?;
        let y = parse_cell_index(tail[2])?;
        let z = parse_cell_index(tail[3])?;
        let kind_token = tail[0];

        self.tokens.truncate(len - 4);
        Some((kind_token, GridCell::new(x, y, z)))
    }

    fn joined(&self) -> String {
        self.tokens.join("_")
    }
}

fn parse_segment_tag(token: &str) -> Option<u32> {
    let digits = token.strip_prefix('s')?;
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn parse_cell_index(token: &str) -> Option<i64> {
    let digits = token.strip_prefix('-').unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    token.parse().ok()
}

fn is_kind_token(token: &str) -> bool {
    let bytes = token.as_bytes();
    (2..=3).contains(&bytes.len())
        && bytes[0].is_ascii_uppercase()
        && bytes[1..].iter().all(|byte| byte.is_ascii_alphabetic())
}

fn kind_for_token(token: &str) -> ProbeKind {
    if WIRE_KIND_TOKENS.contains(&token) {
        ProbeKind::Wire
    } else if token == FAR_FIELD_KIND_TOKEN {
        ProbeKind::FarField
    } else {
        ProbeKind::Other
    }
}

#[cfg(test)]
mod tests {
    use super::{FormatError, ProbeFileName};
    use crate::domain::{GridCell, ProbeKind};

    #[test]
    fn wire_probe_name_exposes_all_fields() {
        let parsed = ProbeFileName::parse("holland1981.fdtd_mid_point_Wz_11_11_12_s2.dat")
            .expect("wire probe name should parse");

        assert_eq!(parsed.case_name(), "holland1981");
        assert_eq!(parsed.probe_name(), "mid_point");
        assert_eq!(parsed.kind(), ProbeKind::Wire);
        assert_eq!(parsed.kind_token(), Some("Wz"));
        assert_eq!(parsed.cell(), Some(GridCell::new(11, 11, 12)));
        assert_eq!(parsed.segment_tag(), 2);
    }

    #[test]
    fn far_field_name_has_no_cell() {
        let parsed =
            ProbeFileName::parse("sphere.fdtd_Far_s0.dat").expect("far-field name should parse");

        assert_eq!(parsed.case_name(), "sphere");
        assert_eq!(parsed.probe_name(), "Far");
        assert_eq!(parsed.kind(), ProbeKind::FarField);
        assert_eq!(parsed.cell(), None);
        assert_eq!(parsed.kind_token(), None);
    }

    #[test]
    fn far_field_token_with_coordinates_is_far_field() {
        let parsed = ProbeFileName::parse("sphere.fdtd_Far_FF_2_2_2_s0.dat")
            .expect("coordinate far-field name should parse");
        assert_eq!(parsed.kind(), ProbeKind::FarField);
        assert_eq!(parsed.probe_name(), "Far");
        assert_eq!(parsed.cell(), Some(GridCell::new(2, 2, 2)));
    }

    #[test]
    fn unknown_kind_tokens_classify_as_other() {
        let parsed = ProbeFileName::parse("box.fdtd_center_Ex_5_6_7_s1.dat")
            .expect("point probe name should parse");
        assert_eq!(parsed.kind(), ProbeKind::Other);
        assert_eq!(parsed.kind_token(), Some("Ex"));
    }

    #[test]
    fn probe_names_may_contain_underscores_and_digits() {
        let parsed = ProbeFileName::parse("towelHanger.fdtd_wire_end_2_Wz_43_25_30_s4.dat")
            .expect("underscored name should parse");
        assert_eq!(parsed.probe_name(), "wire_end_2");
        assert_eq!(parsed.cell(), Some(GridCell::new(43, 25, 30)));
        assert!(parsed.matches_probe("wire_end_2"));
        assert!(!parsed.matches_probe("wire_end"));
    }

    #[test]
    fn formatting_round_trips_through_parse() {
        let names = [
            "holland1981.fdtd_mid_point_Wz_11_11_12_s2.dat",
            "towelHanger.fdtd_wire_start_Wz_27_25_30_s1.dat",
            "towelHanger.fdtd_wire_end_Wz_43_25_30_s4.dat",
            "sphere.fdtd_Far_s0.dat",
            "sphere.fdtd_Far_FF_2_2_2_s0.dat",
            "case.v2.fdtd_a_b_c_Hx_0_-1_3_s10.dat",
        ];

        for name in names {
            let parsed = ProbeFileName::parse(name).expect("name should parse");
            assert_eq!(parsed.to_string(), name);
            assert_eq!(
                ProbeFileName::parse(&parsed.to_string()).expect("formatted name should parse"),
                parsed
            );
        }
    }

    #[test]
    fn constructors_build_conforming_names() {
        let wire = ProbeFileName::near_field(
            "holland1981",
            "mid_point",
            "Wz",
            GridCell::new(11, 11, 12),
            2,
        )
        .expect("wire name should build");
        assert_eq!(
            wire.to_string(),
            "holland1981.fdtd_mid_point_Wz_11_11_12_s2.dat"
        );

        let far = ProbeFileName::far_field("sphere", 0).expect("far-field name should build");
        assert_eq!(far.to_string(), "sphere.fdtd_Far_s0.dat");

        assert!(
            ProbeFileName::near_field("a", "", "Wz", GridCell::new(1, 2, 3), 0).is_err(),
            "empty probe name should be rejected"
        );
    }

    #[test]
    fn non_conforming_names_fail_with_format_error() {
        let invalid = [
            "holland1981.fdtd_mid_point_Wz_11_11_12_s2.txt",
            "holland1981_mid_point_Wz_11_11_12_s2.dat",
            ".fdtd_mid_point_Wz_11_11_12_s2.dat",
            "holland1981.fdtd_mid_point_Wz_11_11_12.dat",
            "holland1981.fdtd_mid_point_Wz_11_11_12_sX.dat",
            "holland1981.fdtd_mid_point_Wz_11_11_s2.dat",
            "holland1981.fdtd_Wz_11_11_12_s2.dat",
            "holland1981.fdtd_mid_point_s2.dat",
            "sphere.fdtd_Farfield_s0.dat",
            "holland1981.fdtd_mid_point_wz_11_11_12_s2.dat",
            "holland1981.fdtd_mid_point_Wz_1a_11_12_s2.dat",
            "holland1981.fdtd_mid_point_Wz_11_11_12_s.dat",
        ];

        for name in invalid {
            let error: FormatError = ProbeFileName::parse(name)
                .expect_err("non-conforming name should be rejected");
            assert_eq!(error.file_name(), name);
            assert!(
                error.to_string().contains(name),
                "error should name the offending file: {}",
                error
            );
        }
    }
}
