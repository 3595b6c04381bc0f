// Readers for the semicolon separated tables of the electoral authority.

use log::{debug, info};

use std::collections::BTreeMap;
use std::io::Read;
use std::str::FromStr;

use csv::{StringRecord, Trim};

use crate::report::{
    io_common::{read_latin1_file, simplify_file_name},
    *,
};

const STATE_COLUMN: &str = "SG_UF";
const MUNICIPALITY_CODE_COLUMN: &str = "CD_MUNICIPIO";
const MUNICIPALITY_NAME_COLUMN: &str = "NM_MUNICIPIO";
const ROUND_COLUMN: &str = "NR_TURNO";
const CANDIDATE_NUMBER_COLUMN: &str = "NR_CANDIDATO";
const CANDIDATE_NAME_COLUMN: &str = "NM_URNA_CANDIDATO";
const VOTES_COLUMN: &str = "QT_VOTOS_NOMINAIS";

const ELECTION_CODE_COLUMN: &str = "COD_TSE";
const CENSUS_CODE_COLUMN: &str = "GEOCOD_IBGE";

pub fn read_votes(path: &str) -> ReportResult<Vec<VoteRecord>> {
    info!("Attempting to read vote file {:?}", path);
    let contents = read_latin1_file(path)?;
    let res = parse_votes(path, contents.as_bytes())?;
    info!(
        "Read {} vote records from {}",
        res.len(),
        simplify_file_name(path)
    );
    Ok(res)
}

pub fn read_correspondence(path: &str) -> ReportResult<Vec<CorrespondenceRecord>> {
    info!("Attempting to read correspondence file {:?}", path);
    let contents = read_latin1_file(path)?;
    let res = parse_correspondence(path, contents.as_bytes())?;
    info!(
        "Read {} correspondence records from {}",
        res.len(),
        simplify_file_name(path)
    );
    Ok(res)
}

/// Parses the vote table. Extra columns are ignored.
pub fn parse_votes<R: Read>(path: &str, reader: R) -> ReportResult<Vec<VoteRecord>> {
    let mut rdr = table_reader(reader);
    let headers = rdr.headers().context(CsvParseSnafu { path })?.clone();
    let state_idx = column_index(path, &headers, STATE_COLUMN)?;
    let code_idx = column_index(path, &headers, MUNICIPALITY_CODE_COLUMN)?;
    let name_idx = column_index(path, &headers, MUNICIPALITY_NAME_COLUMN)?;
    let round_idx = column_index(path, &headers, ROUND_COLUMN)?;
    let number_idx = column_index(path, &headers, CANDIDATE_NUMBER_COLUMN)?;
    let candidate_idx = column_index(path, &headers, CANDIDATE_NAME_COLUMN)?;
    let votes_idx = column_index(path, &headers, VOTES_COLUMN)?;

    let mut res: Vec<VoteRecord> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        // The header is the first line.
        let lineno = idx + 2;
        let line = line_r.context(CsvParseSnafu { path })?;
        debug!("parse_votes: lineno: {:?} row: {:?}", lineno, line);
        res.push(VoteRecord {
            state: field(path, &line, state_idx, lineno)?.to_string(),
            municipality_code: parse_field(path, &line, code_idx, lineno, MUNICIPALITY_CODE_COLUMN)?,
            municipality_name: field(path, &line, name_idx, lineno)?.to_string(),
            round: parse_field(path, &line, round_idx, lineno, ROUND_COLUMN)?,
            candidate_number: field(path, &line, number_idx, lineno)?.to_string(),
            candidate_name: field(path, &line, candidate_idx, lineno)?.to_string(),
            votes: parse_field(path, &line, votes_idx, lineno, VOTES_COLUMN)?,
        });
    }
    Ok(res)
}

/// Parses the correspondence table. The columns other than the two codes are
/// kept as auxiliary values.
pub fn parse_correspondence<R: Read>(
    path: &str,
    reader: R,
) -> ReportResult<Vec<CorrespondenceRecord>> {
    let mut rdr = table_reader(reader);
    let headers = rdr.headers().context(CsvParseSnafu { path })?.clone();
    let election_idx = column_index(path, &headers, ELECTION_CODE_COLUMN)?;
    let census_idx = column_index(path, &headers, CENSUS_CODE_COLUMN)?;

    let mut res: Vec<CorrespondenceRecord> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        let lineno = idx + 2;
        let line = line_r.context(CsvParseSnafu { path })?;
        debug!("parse_correspondence: lineno: {:?} row: {:?}", lineno, line);
        let mut auxiliary: BTreeMap<String, String> = BTreeMap::new();
        for (col_idx, name) in headers.iter().enumerate() {
            if col_idx != election_idx && col_idx != census_idx {
                auxiliary.insert(
                    name.to_string(),
                    field(path, &line, col_idx, lineno)?.to_string(),
                );
            }
        }
        res.push(CorrespondenceRecord {
            election_code: parse_field(path, &line, election_idx, lineno, ELECTION_CODE_COLUMN)?,
            census_code: field(path, &line, census_idx, lineno)?.to_string(),
            auxiliary,
        });
    }
    Ok(res)
}

fn table_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader)
}

fn column_index(path: &str, headers: &StringRecord, column: &str) -> ReportResult<usize> {
    headers
        .iter()
        .position(|h| h == column)
        .context(MissingColumnSnafu { path, column })
}

fn field<'a>(
    path: &str,
    line: &'a StringRecord,
    idx: usize,
    lineno: usize,
) -> ReportResult<&'a str> {
    line.get(idx).context(CsvLineTooShortSnafu { path, lineno })
}

fn parse_field<T: FromStr>(
    path: &str,
    line: &StringRecord,
    idx: usize,
    lineno: usize,
    column: &str,
) -> ReportResult<T> {
    let value = field(path, line, idx, lineno)?;
    value.parse::<T>().ok().context(InvalidFieldSnafu {
        path,
        lineno,
        column,
        value,
    })
}
