use log::{info, warn};

use runoff_map::*;
use snafu::{prelude::*, Snafu};

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::report::config_reader::*;
use crate::report::io_common::resolve_path;
use crate::report::render_svg::SvgRenderer;

pub mod config_reader;
pub mod io_common;
pub mod io_csv;
pub mod io_geojson;
pub mod render_svg;

/// Where the map goes when neither the command line nor the configuration say otherwise.
pub const DEFAULT_OUTPUT_PATH: &str = "runoff_map.svg";

#[derive(Debug, Snafu)]
pub enum ReportError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON file {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Invalid configuration: {message}"))]
    InvalidConfig { message: String },
    #[snafu(display("Cannot find the directory of the configuration file {path}"))]
    MissingParentDir { path: String },

    #[snafu(display("Error opening input file {path}"))]
    OpeningInput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error reading CSV file {path}"))]
    CsvParse { source: csv::Error, path: String },
    #[snafu(display("Missing column {column} in {path}"))]
    MissingColumn { path: String, column: String },
    #[snafu(display("Line {lineno} of {path} is too short"))]
    CsvLineTooShort { path: String, lineno: usize },
    #[snafu(display("Line {lineno} of {path}: invalid value {value:?} in column {column}"))]
    InvalidField {
        path: String,
        lineno: usize,
        column: String,
        value: String,
    },
    #[snafu(display("Error parsing GeoJSON file {path}"))]
    GeoJsonParse {
        source: geojson::Error,
        path: String,
    },
    #[snafu(display("{path} does not contain a feature collection"))]
    NotFeatureCollection { path: String },
    #[snafu(display("Feature {index} of {path} has no usable property {property}"))]
    MissingProperty {
        path: String,
        index: usize,
        property: String,
    },
    #[snafu(display("Feature {index} of {path} has an invalid geometry"))]
    ConvertingGeometry {
        source: geojson::Error,
        path: String,
        index: usize,
    },
    #[snafu(display("Feature {index} of {path}: unsupported geometry type {kind}"))]
    UnsupportedGeometry {
        path: String,
        index: usize,
        kind: String,
    },

    #[snafu(display("Pipeline error: {source}"))]
    Pipeline { source: PipelineError },

    #[snafu(display("Error writing {path}"))]
    WritingOutput {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error serializing the summary"))]
    SerializingSummary { source: serde_json::Error },
    #[snafu(display("Difference detected between calculated summary and reference summary {path}"))]
    ReferenceMismatch { path: String },
}

pub type ReportResult<T> = Result<T, ReportError>;

fn result_to_json(r: &MunicipalityResult) -> JSValue {
    json!({
        "state": r.state,
        "municipalityCode": r.municipality_code,
        "municipality": r.municipality_name,
        "candidate": r.candidate_number,
        "candidateName": r.candidate_name,
        "votes": r.votes.to_string(),
        "result": r.result,
    })
}

fn build_summary_js(config: &ReportConfig, params: &PipelineParams, out: &PipelineOutput) -> JSValue {
    let reference_wins = out.rows.iter().filter(|r| r.result.result).count();
    let results: Vec<JSValue> = out.results.iter().map(result_to_json).collect();
    json!({
        "config": {
            "title": config.output_settings.title,
            "round": params.round,
            "referenceCandidate": params.reference_candidate,
        },
        "summary": {
            "municipalities": out.results.len().to_string(),
            "mapped": out.rows.len().to_string(),
            "referenceWins": reference_wins.to_string(),
        },
        "results": results
    })
}

fn write_text(path: &str, contents: &str) -> ReportResult<()> {
    if path == "stdout" {
        println!("{}", contents);
        return Ok(());
    }
    info!("Writing summary to {:?}", path);
    fs::write(path, contents).context(WritingOutputSnafu { path })
}

fn check_reference(reference_path: &str, pretty_js_stats: &str) -> ReportResult<()> {
    let summary_ref = read_summary(reference_path)?;
    let pretty_js_summary_ref =
        serde_json::to_string_pretty(&summary_ref).context(SerializingSummarySnafu {})?;
    if pretty_js_summary_ref != pretty_js_stats {
        warn!("Found differences with the reference string");
        print_diff(pretty_js_summary_ref.as_str(), pretty_js_stats, "\n");
        return ReferenceMismatchSnafu {
            path: reference_path,
        }
        .fail();
    }
    info!("Summary matches the reference {:?}", reference_path);
    Ok(())
}

fn draw<W: Write>(out: W, path: &str, rows: &[JoinedMapRow], style: &MapStyle) -> ReportResult<()> {
    let mut renderer = SvgRenderer::new(out);
    renderer
        .render(rows, style)
        .context(WritingOutputSnafu { path })
}

fn render_map(path: &str, rows: &[JoinedMapRow], style: &MapStyle) -> ReportResult<()> {
    info!("Drawing {} municipalities to {:?}", rows.len(), path);
    if path == "stdout" {
        let stdout = io::stdout();
        draw(stdout.lock(), path, rows, style)
    } else {
        let f = File::create(path).context(WritingOutputSnafu { path })?;
        draw(BufWriter::new(f), path, rows, style)
    }
}

/// Runs the whole report described by the configuration file.
///
/// The paths given as arguments take precedence over the paths of the
/// configuration file. They are not resolved against its directory.
pub fn run_report(
    config_path: String,
    out_path: Option<String>,
    summary_path: Option<String>,
    reference_path: Option<String>,
) -> ReportResult<()> {
    let config_p = Path::new(config_path.as_str());
    let config = read_config(&config_path)?;
    info!("config: {:?}", config);

    let params = config.pipeline_params()?;
    let style = config.map_style()?;

    let root_p = config_p.parent().context(MissingParentDirSnafu {
        path: config_path.clone(),
    })?;
    let inputs = &config.inputs;

    let votes = io_csv::read_votes(&resolve_path(root_p, &inputs.votes_file))?;
    let correspondence =
        io_csv::read_correspondence(&resolve_path(root_p, &inputs.correspondence_file))?;
    let geometry = io_geojson::read_geometry(
        &resolve_path(root_p, &inputs.geometry_file),
        &inputs.code_property(),
    )?;

    let output =
        run_pipeline(&votes, &correspondence, &geometry, &params).context(PipelineSnafu {})?;

    let result_js = build_summary_js(&config, &params, &output);
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(SerializingSummarySnafu {})?;

    let summary_p = summary_path.or_else(|| {
        config
            .output_settings
            .summary_path
            .as_ref()
            .map(|p| resolve_path(root_p, p))
    });
    if let Some(p) = summary_p {
        write_text(&p, &pretty_js_stats)?;
    }

    // The reference summary, if provided for comparison
    if let Some(p) = reference_path {
        check_reference(&p, &pretty_js_stats)?;
    }

    let map_p = out_path
        .or_else(|| {
            config
                .output_settings
                .output_path
                .as_ref()
                .map(|p| resolve_path(root_p, p))
        })
        .unwrap_or_else(|| resolve_path(root_p, DEFAULT_OUTPUT_PATH));
    render_map(&map_p, &output.rows, &style)
}
