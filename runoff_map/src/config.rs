// ********* Input data structures ***********

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;
use std::str::FromStr;

use geo::MultiPolygon;

/// One line of the vote file: the nominal votes of one candidate in one
/// electoral zone of a municipality, for one round.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoteRecord {
    pub state: String,
    /// Municipality code in the electoral authority numbering.
    pub municipality_code: u32,
    pub municipality_name: String,
    pub round: u32,
    /// Kept as text: it is only interpreted when the winner gets flagged.
    pub candidate_number: String,
    pub candidate_name: String,
    pub votes: u64,
}

/// A line of the correspondence table between the electoral authority codes
/// and the census bureau codes.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct CorrespondenceRecord {
    pub election_code: u32,
    /// Raw census code, as found in the file.
    pub census_code: String,
    /// All the other columns of the table, by column name.
    pub auxiliary: BTreeMap<String, String>,
}

/// A municipality polygon.
#[derive(PartialEq, Debug, Clone)]
pub struct GeometryFeature {
    /// Raw census code, as found in the file.
    pub census_code: String,
    /// None when the feature has no geometry attached.
    pub geometry: Option<MultiPolygon<f64>>,
    /// The other cadastral properties. None is a missing value.
    pub properties: BTreeMap<String, Option<String>>,
}

/// A municipality code in the census bureau numbering.
///
/// The two source tables do not agree on the type of this code (text in one,
/// integer in the other). Both sides are parsed into this type before being
/// compared, so that `"0420005"` and `"420005"` designate the same place.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct CensusCode(u64);

impl CensusCode {
    pub fn new(code: u64) -> CensusCode {
        CensusCode(code)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl FromStr for CensusCode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<CensusCode, PipelineError> {
        let trimmed = s.trim();
        let parse_error = || PipelineError::Parse {
            field: "census code".to_string(),
            value: s.to_string(),
        };
        // u64::from_str accepts a leading '+', which is not a valid code.
        if trimmed.is_empty() || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(parse_error());
        }
        trimmed.parse::<u64>().map(CensusCode).map_err(|_| parse_error())
    }
}

impl Display for CensusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ******** Output data structures *********

/// The winner of the selected round in one municipality.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct MunicipalityResult {
    pub state: String,
    pub municipality_code: u32,
    pub municipality_name: String,
    pub candidate_number: u32,
    pub candidate_name: String,
    pub votes: u64,
    /// True if the winner is the reference candidate.
    pub result: bool,
}

/// A municipality that could be fully resolved: it has a geometry, a winner
/// and no missing attribute.
#[derive(PartialEq, Debug, Clone)]
pub struct JoinedMapRow {
    pub census_code: CensusCode,
    pub geometry: MultiPolygon<f64>,
    pub properties: BTreeMap<String, String>,
    pub result: MunicipalityResult,
    /// The auxiliary columns of the correspondence table, without the
    /// adjustment column.
    pub auxiliary: BTreeMap<String, String>,
}

/// Errors that prevent the pipeline from completing successfully.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum PipelineError {
    /// A value that should be an integer is not one.
    Parse { field: String, value: String },
    /// The correspondence table and the normalized results do not have the
    /// same number of rows. No map is produced in this case.
    CardinalityMismatch {
        correspondence: usize,
        results: usize,
    },
    /// Some municipality codes have no entry in the correspondence table.
    UnmatchedCodes { codes: Vec<u32> },
    /// The same electoral code appears several times in the correspondence table.
    DuplicateCorrespondence { code: u32 },
}

impl Error for PipelineError {}

impl Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::Parse { field, value } => {
                write!(f, "could not parse {} {:?} as an integer", field, value)
            }
            PipelineError::CardinalityMismatch {
                correspondence,
                results,
            } => write!(
                f,
                "the correspondence table has {} rows but there are {} municipality results",
                correspondence, results
            ),
            PipelineError::UnmatchedCodes { codes } => write!(
                f,
                "{} municipality codes are missing from the correspondence table: {:?}",
                codes.len(),
                codes
            ),
            PipelineError::DuplicateCorrespondence { code } => write!(
                f,
                "municipality code {} appears more than once in the correspondence table",
                code
            ),
        }
    }
}

// ********* Configuration **********

/// The parameters of the normalization and of the join.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PipelineParams {
    /// Only the records of this round are kept.
    pub round: u32,
    /// State code used for the votes cast abroad.
    pub invalid_state: String,
    /// The result flag is set when this candidate wins.
    pub reference_candidate: u32,
    /// Column of the correspondence table dropped before the missing values check.
    pub adjustment_column: String,
    /// If set, every municipality result must have a correspondence entry.
    /// Otherwise only the row counts are compared.
    pub strict_keys: bool,
}

impl PipelineParams {
    pub const DEFAULT_ROUND: u32 = 2;
    pub const DEFAULT_INVALID_STATE: &'static str = "ZZ";
    pub const DEFAULT_REFERENCE_CANDIDATE: u32 = 17;
    pub const DEFAULT_ADJUSTMENT_COLUMN: &'static str = "AJUSTE";
}

impl Default for PipelineParams {
    fn default() -> PipelineParams {
        PipelineParams {
            round: PipelineParams::DEFAULT_ROUND,
            invalid_state: PipelineParams::DEFAULT_INVALID_STATE.to_string(),
            reference_candidate: PipelineParams::DEFAULT_REFERENCE_CANDIDATE,
            adjustment_column: PipelineParams::DEFAULT_ADJUSTMENT_COLUMN.to_string(),
            strict_keys: false,
        }
    }
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct LegendEntry {
    pub color: String,
    pub label: String,
}

/// How the map is decorated.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct MapStyle {
    pub title: String,
    pub source_note: String,
    /// Municipalities where the reference candidate lost.
    pub flag_false: LegendEntry,
    /// Municipalities where the reference candidate won.
    pub flag_true: LegendEntry,
}

impl MapStyle {
    pub fn entry(&self, flag: bool) -> &LegendEntry {
        if flag {
            &self.flag_true
        } else {
            &self.flag_false
        }
    }
}

impl Default for MapStyle {
    fn default() -> MapStyle {
        MapStyle {
            title: "Resultado Eleição 2018 / Município / 2 Turno".to_string(),
            source_note: "Fonte: IBGE, 2014; TSE, 2019; Jornal Estado de SP, 2019".to_string(),
            flag_false: LegendEntry {
                color: "red".to_string(),
                label: "Os bandidos".to_string(),
            },
            flag_true: LegendEntry {
                color: "green".to_string(),
                label: "Bolsomito".to_string(),
            },
        }
    }
}

/// Anything that can draw the final map.
pub trait MapRenderer {
    type Error;

    fn render(&mut self, rows: &[JoinedMapRow], style: &MapStyle) -> Result<(), Self::Error>;
}
