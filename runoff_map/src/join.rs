use log::{debug, info};

use std::collections::{BTreeMap, HashMap};

use crate::config::*;

// A municipality result, with its census code when the correspondence table knows it.
#[derive(Debug, Clone)]
struct CodedResult<'a> {
    result: &'a MunicipalityResult,
    census: Option<(CensusCode, &'a CorrespondenceRecord)>,
}

// A geometry feature, with the result that matched it if any.
#[derive(Debug, Clone)]
struct GeometryMatch<'a> {
    feature: &'a GeometryFeature,
    census_code: CensusCode,
    matched: Option<&'a CodedResult<'a>>,
}

/// Attaches the geometry to the municipality results.
///
/// The results are keyed by the electoral authority codes, the geometry by the
/// census bureau codes. The correspondence table translates between the two.
///
/// The correspondence table must have exactly as many rows as there are
/// results, otherwise nothing is joined and
/// [`PipelineError::CardinalityMismatch`] is returned. With
/// `params.strict_keys`, each result must also find its own entry in the table.
///
/// Every geometry feature is kept through the join. The rows that end up with
/// a missing value (no result, no geometry, an empty attribute) are then
/// dropped: only the municipalities that are fully resolved are returned.
pub fn join_geometry(
    results: &[MunicipalityResult],
    correspondence: &[CorrespondenceRecord],
    geometry: &[GeometryFeature],
    params: &PipelineParams,
) -> Result<Vec<JoinedMapRow>, PipelineError> {
    info!(
        "join_geometry: {} results, {} correspondence rows, {} geometry features",
        results.len(),
        correspondence.len(),
        geometry.len()
    );
    let by_election_code = index_correspondence(results, correspondence, params)?;

    let coded = attach_census_codes(results, &by_election_code)?;
    let matches = attach_geometry(geometry, &coded)?;
    let rows = drop_incomplete(&matches, &params.adjustment_column);
    info!(
        "join_geometry: {} municipalities resolved, {} rows dropped",
        rows.len(),
        matches.len() - rows.len()
    );
    Ok(rows)
}

// Checks the correspondence table against the results and indexes it by electoral code.
fn index_correspondence<'a>(
    results: &[MunicipalityResult],
    correspondence: &'a [CorrespondenceRecord],
    params: &PipelineParams,
) -> Result<HashMap<u32, &'a CorrespondenceRecord>, PipelineError> {
    if correspondence.len() != results.len() {
        return Err(PipelineError::CardinalityMismatch {
            correspondence: correspondence.len(),
            results: results.len(),
        });
    }

    let mut index: HashMap<u32, &CorrespondenceRecord> = HashMap::new();
    for c in correspondence.iter() {
        if index.insert(c.election_code, c).is_some() {
            return Err(PipelineError::DuplicateCorrespondence {
                code: c.election_code,
            });
        }
    }

    if params.strict_keys {
        let mut codes: Vec<u32> = results
            .iter()
            .map(|r| r.municipality_code)
            .filter(|code| !index.contains_key(code))
            .collect();
        if !codes.is_empty() {
            codes.sort_unstable();
            codes.dedup();
            return Err(PipelineError::UnmatchedCodes { codes });
        }
    }
    Ok(index)
}

// Left join: every result is kept, with or without a census code.
fn attach_census_codes<'a>(
    results: &'a [MunicipalityResult],
    by_election_code: &HashMap<u32, &'a CorrespondenceRecord>,
) -> Result<Vec<CodedResult<'a>>, PipelineError> {
    let mut res: Vec<CodedResult<'a>> = Vec::new();
    for r in results.iter() {
        let census = match by_election_code.get(&r.municipality_code) {
            Some(c) => Some((c.census_code.parse::<CensusCode>()?, *c)),
            None => {
                debug!(
                    "attach_census_codes: no census code for {} {}/{}",
                    r.municipality_code, r.state, r.municipality_name
                );
                None
            }
        };
        res.push(CodedResult { result: r, census });
    }
    Ok(res)
}

// Left join driven by the geometry: a feature matched by several results
// appears several times, an unmatched feature appears once without a result.
fn attach_geometry<'a>(
    geometry: &'a [GeometryFeature],
    coded: &'a [CodedResult<'a>],
) -> Result<Vec<GeometryMatch<'a>>, PipelineError> {
    let mut by_census_code: HashMap<CensusCode, Vec<&CodedResult>> = HashMap::new();
    for cr in coded.iter() {
        if let Some((code, _)) = cr.census {
            by_census_code.entry(code).or_default().push(cr);
        }
    }

    let mut res: Vec<GeometryMatch<'a>> = Vec::new();
    let mut unmatched: usize = 0;
    for feature in geometry.iter() {
        let census_code = feature.census_code.parse::<CensusCode>()?;
        match by_census_code.get(&census_code) {
            Some(crs) => {
                for cr in crs.iter() {
                    res.push(GeometryMatch {
                        feature,
                        census_code,
                        matched: Some(*cr),
                    });
                }
            }
            None => {
                unmatched += 1;
                res.push(GeometryMatch {
                    feature,
                    census_code,
                    matched: None,
                })
            }
        }
    }
    debug!(
        "attach_geometry: {} geometry features without a municipality result",
        unmatched
    );
    Ok(res)
}

fn drop_incomplete(matches: &[GeometryMatch], adjustment_column: &str) -> Vec<JoinedMapRow> {
    matches
        .iter()
        .filter_map(|m| {
            let row = complete_row(m, adjustment_column);
            if row.is_none() {
                debug!(
                    "drop_incomplete: dropping municipality {}: missing values",
                    m.census_code
                );
            }
            row
        })
        .collect()
}

fn complete_row(m: &GeometryMatch, adjustment_column: &str) -> Option<JoinedMapRow> {
    let coded = m.matched?;
    let (_, correspondence) = coded.census?;
    let geometry = m.feature.geometry.clone()?;

    let auxiliary: BTreeMap<String, String> = correspondence
        .auxiliary
        .iter()
        .filter(|(name, _)| name.as_str() != adjustment_column)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();
    if auxiliary.values().any(|v| v.trim().is_empty()) {
        return None;
    }

    let mut properties: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in m.feature.properties.iter() {
        properties.insert(name.clone(), value.clone()?);
    }

    Some(JoinedMapRow {
        census_code: m.census_code,
        geometry,
        properties,
        result: coded.result.clone(),
        auxiliary,
    })
}
