mod config;
mod join;
use log::{debug, info, warn};

use std::{
    collections::{BTreeMap, HashSet},
    fmt::{self, Display, Formatter},
    ops::AddAssign,
};

pub use crate::config::*;
pub use crate::join::join_geometry;

// **** Private structures ****

#[derive(Eq, PartialEq, Debug, Clone, Copy, PartialOrd, Ord)]
struct VoteCount(u64);

impl VoteCount {
    const EMPTY: VoteCount = VoteCount(0);
}

impl AddAssign for VoteCount {
    fn add_assign(&mut self, rhs: VoteCount) {
        self.0 += rhs.0;
    }
}

// Numbers that parse are grouped by value ("017" is candidate 17). The other
// ones are kept as read and fail when the winner is flagged.
#[derive(Eq, PartialEq, Debug, Clone, PartialOrd, Ord)]
enum CandidateNumber {
    Valid(u32),
    Malformed(String),
}

impl CandidateNumber {
    fn parse(raw: &str) -> CandidateNumber {
        match raw.trim().parse::<u32>() {
            Ok(n) => CandidateNumber::Valid(n),
            Err(_) => CandidateNumber::Malformed(raw.to_string()),
        }
    }
}

impl Display for CandidateNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            CandidateNumber::Valid(n) => write!(f, "{}", n),
            CandidateNumber::Malformed(raw) => write!(f, "{:?}", raw),
        }
    }
}

// (state, municipality code, municipality name, candidate number, candidate name)
type TallyKey = (String, u32, String, CandidateNumber, String);

// The total of one candidate in one municipality, all zones merged.
#[derive(Eq, PartialEq, Debug, Clone)]
struct CandidateTally {
    state: String,
    municipality_code: u32,
    municipality_name: String,
    candidate_number: CandidateNumber,
    candidate_name: String,
    votes: VoteCount,
}

/// Everything produced by a run of the pipeline.
#[derive(PartialEq, Debug, Clone)]
pub struct PipelineOutput {
    /// The winner in each municipality, before the join.
    pub results: Vec<MunicipalityResult>,
    /// The municipalities that can be drawn.
    pub rows: Vec<JoinedMapRow>,
}

/// Finds the winner of the selected round in each municipality.
///
/// The records of other rounds and the records cast abroad are dropped, the
/// electoral zones are merged, and the candidate with the most votes is kept
/// for each (state, municipality name) pair.
///
/// Candidate numbers are compared by value, so "017" and "17" are the same
/// candidate. When two candidates have exactly the same number of votes, the
/// winner is the first of them in (municipality code, candidate number,
/// candidate name) order. This is an arbitrary choice and it is reported in the logs.
///
/// ```
/// use runoff_map::{normalize_votes, PipelineParams, VoteRecord};
///
/// let record = |candidate: &str, votes: u64| VoteRecord {
///     state: "SP".to_string(),
///     municipality_code: 71072,
///     municipality_name: "SÃO PAULO".to_string(),
///     round: 2,
///     candidate_number: candidate.to_string(),
///     candidate_name: format!("CANDIDATE {}", candidate),
///     votes,
/// };
/// let records = vec![record("17", 60), record("13", 90), record("17", 40)];
///
/// let results = normalize_votes(&records, &PipelineParams::default())?;
/// assert_eq!(results.len(), 1);
/// assert_eq!(results[0].candidate_number, 17);
/// assert_eq!(results[0].votes, 100);
/// assert!(results[0].result);
/// # Ok::<(), runoff_map::PipelineError>(())
/// ```
pub fn normalize_votes(
    records: &[VoteRecord],
    params: &PipelineParams,
) -> Result<Vec<MunicipalityResult>, PipelineError> {
    info!(
        "normalize_votes: processing {} vote records, round: {}",
        records.len(),
        params.round
    );

    let selected: Vec<&VoteRecord> = records
        .iter()
        .filter(|r| r.round == params.round)
        .filter(|r| r.state != params.invalid_state)
        .collect();
    debug!(
        "normalize_votes: {} records left after dropping other rounds and state {:?}",
        selected.len(),
        params.invalid_state
    );

    let mut tallies = aggregate_votes(&selected);
    debug!(
        "normalize_votes: {} candidate tallies after merging the zones",
        tallies.len()
    );

    // Stable sort: the tallies of equal vote counts keep the aggregation order.
    tallies.sort_by(|a, b| {
        b.state
            .cmp(&a.state)
            .then_with(|| b.municipality_name.cmp(&a.municipality_name))
            .then_with(|| b.votes.cmp(&a.votes))
    });

    let winners = pick_winners(tallies);
    info!(
        "normalize_votes: found a winner in {} municipalities",
        winners.len()
    );

    winners
        .into_iter()
        .map(|t| flag_winner(t, params.reference_candidate))
        .collect()
}

/// Runs the normalization and then the join with the geometry.
pub fn run_pipeline(
    votes: &[VoteRecord],
    correspondence: &[CorrespondenceRecord],
    geometry: &[GeometryFeature],
    params: &PipelineParams,
) -> Result<PipelineOutput, PipelineError> {
    let results = normalize_votes(votes, params)?;
    let rows = join_geometry(&results, correspondence, geometry, params)?;
    Ok(PipelineOutput { results, rows })
}

// The tallies are returned in increasing key order.
fn aggregate_votes(records: &[&VoteRecord]) -> Vec<CandidateTally> {
    let mut tally: BTreeMap<TallyKey, VoteCount> = BTreeMap::new();
    for r in records.iter() {
        let key: TallyKey = (
            r.state.clone(),
            r.municipality_code,
            r.municipality_name.clone(),
            CandidateNumber::parse(&r.candidate_number),
            r.candidate_name.clone(),
        );
        let e = tally.entry(key).or_insert(VoteCount::EMPTY);
        *e += VoteCount(r.votes);
    }
    tally
        .into_iter()
        .map(
            |((state, municipality_code, municipality_name, candidate_number, candidate_name), votes)| {
                CandidateTally {
                    state,
                    municipality_code,
                    municipality_name,
                    candidate_number,
                    candidate_name,
                    votes,
                }
            },
        )
        .collect()
}

// Keeps the first tally of each (state, municipality name) pair.
fn pick_winners(sorted_tallies: Vec<CandidateTally>) -> Vec<CandidateTally> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut winners: Vec<CandidateTally> = Vec::new();
    for t in sorted_tallies {
        let key = (t.state.clone(), t.municipality_name.clone());
        if !seen.contains(&key) {
            seen.insert(key);
            winners.push(t);
            continue;
        }
        if let Some(w) = winners.last() {
            if w.state == t.state && w.municipality_name == t.municipality_name && w.votes == t.votes
            {
                warn!(
                    "pick_winners: tie in {}/{} between candidates {} and {} ({} votes), keeping {}",
                    t.state,
                    t.municipality_name,
                    w.candidate_number,
                    t.candidate_number,
                    t.votes.0,
                    w.candidate_number
                );
            }
        }
    }
    winners
}

fn flag_winner(
    tally: CandidateTally,
    reference_candidate: u32,
) -> Result<MunicipalityResult, PipelineError> {
    let candidate_number = match tally.candidate_number {
        CandidateNumber::Valid(n) => n,
        CandidateNumber::Malformed(value) => {
            return Err(PipelineError::Parse {
                field: "candidate number".to_string(),
                value,
            })
        }
    };
    Ok(MunicipalityResult {
        state: tally.state,
        municipality_code: tally.municipality_code,
        municipality_name: tally.municipality_name,
        candidate_number,
        candidate_name: tally.candidate_name,
        votes: tally.votes.0,
        result: candidate_number == reference_candidate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn init() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn vote(
        state: &str,
        code: u32,
        name: &str,
        round: u32,
        candidate: &str,
        votes: u64,
    ) -> VoteRecord {
        VoteRecord {
            state: state.to_string(),
            municipality_code: code,
            municipality_name: name.to_string(),
            round,
            candidate_number: candidate.to_string(),
            candidate_name: format!("CANDIDATE {}", candidate),
            votes,
        }
    }

    #[test]
    fn winner_across_zones() {
        init();
        let records = vec![
            vote("SP", 1, "Alpha", 2, "17", 60),
            vote("SP", 1, "Alpha", 2, "17", 40),
            vote("SP", 1, "Alpha", 2, "13", 90),
        ];
        let res = normalize_votes(&records, &PipelineParams::default()).unwrap();
        assert_eq!(
            res,
            vec![MunicipalityResult {
                state: "SP".to_string(),
                municipality_code: 1,
                municipality_name: "Alpha".to_string(),
                candidate_number: 17,
                candidate_name: "CANDIDATE 17".to_string(),
                votes: 100,
                result: true,
            }]
        );
    }

    #[test]
    fn other_candidate_wins() {
        init();
        let records = vec![
            vote("MG", 2, "Beta", 2, "17", 10),
            vote("MG", 2, "Beta", 2, "13", 25),
        ];
        let res = normalize_votes(&records, &PipelineParams::default()).unwrap();
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].candidate_number, 13);
        assert_eq!(res[0].votes, 25);
        assert!(!res[0].result);
    }

    #[test]
    fn abroad_votes_are_dropped() {
        init();
        let records = vec![
            vote("ZZ", 9, "Paris", 2, "17", 500),
            vote("ZZ", 9, "Paris", 1, "13", 500),
            vote("RJ", 3, "Gamma", 2, "13", 5),
        ];
        let res = normalize_votes(&records, &PipelineParams::default()).unwrap();
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].state, "RJ");
    }

    #[test]
    fn first_round_only_is_dropped() {
        init();
        let records = vec![
            vote("BA", 4, "Delta", 1, "17", 100),
            vote("BA", 4, "Delta", 1, "13", 50),
            vote("BA", 5, "Epsilon", 1, "13", 50),
            vote("BA", 5, "Epsilon", 2, "13", 70),
        ];
        let res = normalize_votes(&records, &PipelineParams::default()).unwrap();
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].municipality_name, "Epsilon");
        assert_eq!(res[0].votes, 70);
    }

    #[test]
    fn one_result_per_municipality() {
        init();
        let records = vec![
            vote("SP", 1, "Alpha", 2, "17", 3),
            vote("SP", 1, "Alpha", 2, "13", 4),
            vote("SP", 2, "Beta", 2, "17", 8),
            vote("SP", 2, "Beta", 2, "13", 1),
            // Same name, different state.
            vote("PR", 7, "Alpha", 2, "17", 2),
            vote("PR", 7, "Alpha", 2, "13", 1),
        ];
        let res = normalize_votes(&records, &PipelineParams::default()).unwrap();
        let keys: Vec<(String, String)> = res
            .iter()
            .map(|r| (r.state.clone(), r.municipality_name.clone()))
            .collect();
        // Descending state, then descending name.
        assert_eq!(
            keys,
            vec![
                ("SP".to_string(), "Beta".to_string()),
                ("SP".to_string(), "Alpha".to_string()),
                ("PR".to_string(), "Alpha".to_string()),
            ]
        );
        let flags: Vec<bool> = res.iter().map(|r| r.result).collect();
        assert_eq!(flags, vec![true, false, true]);
    }

    #[test]
    fn sums_are_preserved() {
        init();
        let records = vec![
            vote("CE", 6, "Zeta", 2, "13", 11),
            vote("CE", 6, "Zeta", 2, "13", 22),
            vote("CE", 6, "Zeta", 2, "13", 33),
            vote("CE", 6, "Zeta", 2, "17", 1),
            vote("CE", 6, "Zeta", 1, "13", 1000),
        ];
        let res = normalize_votes(&records, &PipelineParams::default()).unwrap();
        assert_eq!(res[0].votes, 66);
    }

    #[test]
    fn empty_input() {
        init();
        let res = normalize_votes(&[], &PipelineParams::default()).unwrap();
        assert!(res.is_empty());
    }

    #[test]
    fn malformed_candidate_number() {
        init();
        let records = vec![vote("SP", 1, "Alpha", 2, "XVII", 10)];
        let res = normalize_votes(&records, &PipelineParams::default());
        assert_eq!(
            res,
            Err(PipelineError::Parse {
                field: "candidate number".to_string(),
                value: "XVII".to_string(),
            })
        );
    }

    #[test]
    fn malformed_loser_is_not_parsed() {
        init();
        let records = vec![
            vote("SP", 1, "Alpha", 2, "17", 10),
            vote("SP", 1, "Alpha", 2, "??", 1),
        ];
        let res = normalize_votes(&records, &PipelineParams::default()).unwrap();
        assert_eq!(res[0].candidate_number, 17);
    }

    #[test]
    fn normalization_is_idempotent() {
        init();
        let records = vec![
            vote("SP", 1, "Alpha", 2, "17", 3),
            vote("SP", 1, "Alpha", 2, "13", 4),
            vote("AC", 2, "Beta", 2, "17", 8),
            vote("AC", 3, "Gamma", 2, "13", 8),
        ];
        let params = PipelineParams::default();
        let first = normalize_votes(&records, &params).unwrap();
        let second = normalize_votes(&records, &params).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn custom_parameters() {
        init();
        let records = vec![
            vote("SP", 1, "Alpha", 1, "13", 30),
            vote("SP", 1, "Alpha", 1, "17", 20),
            vote("XX", 2, "Abroad", 1, "13", 30),
        ];
        let params = PipelineParams {
            round: 1,
            invalid_state: "XX".to_string(),
            reference_candidate: 13,
            ..PipelineParams::default()
        };
        let res = normalize_votes(&records, &params).unwrap();
        assert_eq!(res.len(), 1);
        assert!(res[0].result);
    }

    #[test]
    fn tie_keeps_a_single_winner() {
        init();
        let records = vec![
            vote("SP", 1, "Alpha", 2, "17", 50),
            vote("SP", 1, "Alpha", 2, "13", 50),
        ];
        let res = normalize_votes(&records, &PipelineParams::default()).unwrap();
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].votes, 50);
        assert!([13, 17].contains(&res[0].candidate_number));
    }

    #[test]
    fn zero_padded_candidate_number() {
        init();
        let padded = VoteRecord {
            candidate_name: "CANDIDATE 17".to_string(),
            ..vote("SP", 1, "Alpha", 2, "017", 40)
        };
        let records = vec![
            vote("SP", 1, "Alpha", 2, "17", 60),
            padded,
            vote("SP", 1, "Alpha", 2, "13", 90),
        ];
        let res = normalize_votes(&records, &PipelineParams::default()).unwrap();
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].candidate_number, 17);
        assert_eq!(res[0].votes, 100);
        assert!(res[0].result);
    }

    #[test]
    fn tie_follows_numeric_order() {
        init();
        let records = vec![
            vote("SP", 1, "Alpha", 2, "13", 50),
            vote("SP", 1, "Alpha", 2, "9", 50),
        ];
        let res = normalize_votes(&records, &PipelineParams::default()).unwrap();
        assert_eq!(res.len(), 1);
        assert_eq!(res[0].candidate_number, 9);
    }
}
