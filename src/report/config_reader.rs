use crate::report::*;

use serde::{Deserialize, Serialize};
use serde_json::Value as JSValue;

/// Name of the geometry property holding the census code, when not configured.
pub const DEFAULT_CODE_PROPERTY: &str = "CD_MUN";

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct InputFiles {
    #[serde(rename = "geometryFile")]
    pub geometry_file: String,
    #[serde(rename = "votesFile")]
    pub votes_file: String,
    #[serde(rename = "correspondenceFile")]
    pub correspondence_file: String,
    #[serde(rename = "geometryCodeProperty")]
    pub geometry_code_property: Option<String>,
}

impl InputFiles {
    pub fn code_property(&self) -> String {
        self.geometry_code_property
            .clone()
            .unwrap_or_else(|| DEFAULT_CODE_PROPERTY.to_string())
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReportRules {
    pub round: Option<u32>,
    #[serde(rename = "invalidStateCode")]
    pub invalid_state_code: Option<String>,
    #[serde(rename = "referenceCandidate")]
    pub reference_candidate: Option<u32>,
    #[serde(rename = "adjustmentColumn")]
    pub adjustment_column: Option<String>,
    #[serde(rename = "strictKeyCheck")]
    pub strict_key_check: Option<bool>,
}

impl ReportRules {
    pub fn pipeline_params(&self) -> ReportResult<PipelineParams> {
        let defaults = PipelineParams::default();
        let round = self.round.unwrap_or(defaults.round);
        ensure!(
            round > 0,
            InvalidConfigSnafu {
                message: "round must be at least 1"
            }
        );
        let invalid_state = self
            .invalid_state_code
            .clone()
            .unwrap_or(defaults.invalid_state);
        ensure!(
            !invalid_state.trim().is_empty(),
            InvalidConfigSnafu {
                message: "invalidStateCode cannot be empty"
            }
        );
        Ok(PipelineParams {
            round,
            invalid_state,
            reference_candidate: self
                .reference_candidate
                .unwrap_or(defaults.reference_candidate),
            adjustment_column: self
                .adjustment_column
                .clone()
                .unwrap_or(defaults.adjustment_column),
            strict_keys: self.strict_key_check.unwrap_or(defaults.strict_keys),
        })
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputSettings {
    pub title: Option<String>,
    #[serde(rename = "sourceNote")]
    pub source_note: Option<String>,
    #[serde(rename = "outputPath")]
    pub output_path: Option<String>,
    #[serde(rename = "summaryPath")]
    pub summary_path: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct LegendEntryConfig {
    pub color: String,
    pub label: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Default, Serialize, Deserialize)]
pub struct LegendConfig {
    #[serde(rename = "flagFalse")]
    pub flag_false: Option<LegendEntryConfig>,
    #[serde(rename = "flagTrue")]
    pub flag_true: Option<LegendEntryConfig>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub inputs: InputFiles,
    #[serde(default)]
    pub rules: ReportRules,
    #[serde(rename = "outputSettings", default)]
    pub output_settings: OutputSettings,
    #[serde(default)]
    pub legend: LegendConfig,
}

impl ReportConfig {
    pub fn pipeline_params(&self) -> ReportResult<PipelineParams> {
        self.rules.pipeline_params()
    }

    pub fn map_style(&self) -> ReportResult<MapStyle> {
        let defaults = MapStyle::default();
        Ok(MapStyle {
            title: self
                .output_settings
                .title
                .clone()
                .unwrap_or(defaults.title),
            source_note: self
                .output_settings
                .source_note
                .clone()
                .unwrap_or(defaults.source_note),
            flag_false: legend_entry(&self.legend.flag_false, defaults.flag_false)?,
            flag_true: legend_entry(&self.legend.flag_true, defaults.flag_true)?,
        })
    }
}

fn legend_entry(
    config: &Option<LegendEntryConfig>,
    default: LegendEntry,
) -> ReportResult<LegendEntry> {
    match config {
        Some(c) => {
            ensure!(
                is_valid_color(&c.color),
                InvalidConfigSnafu {
                    message: format!("invalid legend color {:?}", c.color)
                }
            );
            Ok(LegendEntry {
                color: c.color.clone(),
                label: c.label.clone(),
            })
        }
        None => Ok(default),
    }
}

// Color names, #rrggbb and rgb(...) notations. Anything else could break the SVG attribute.
fn is_valid_color(color: &str) -> bool {
    !color.trim().is_empty()
        && color
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "#(),.% ".contains(c))
}

pub fn read_config(path: &str) -> ReportResult<ReportConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    parse_config(path, &contents)
}

pub fn parse_config(path: &str, contents: &str) -> ReportResult<ReportConfig> {
    serde_json::from_str(contents).context(ParsingJsonSnafu { path })
}

pub fn read_summary(path: &str) -> ReportResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })
}
