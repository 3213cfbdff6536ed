use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::path::Path;

use tracing::debug;

use crate::error::StatsError;
use crate::ontology::normalize_id;
use crate::reader::open_text;

/// Evidence codes that never contribute usage, whatever the evidence policy.
const NO_DATA_EVIDENCE: [&str; 2] = ["ND", "NR"];

/// Parses a GOA-style annotation corpus into raw per-term usage counts.
///
/// Full GAF rows (more than five columns) are filtered: negated rows
/// (qualifier starting with `NOT`), no-data evidence, and — unless
/// `use_all_evidence` — evidence codes outside `valid_evidence` are
/// skipped, and the term comes from column 4. Narrower pre-purged rows
/// take the term from column 1. Ids are normalized but NOT alias-resolved;
/// the ontology graph owns the secondary-id map and resolves on use.
pub fn parse_usage_counts(
    path: &Path,
    use_all_evidence: bool,
    valid_evidence: &HashSet<String>,
) -> Result<HashMap<String, u64>, StatsError> {
    let reader = open_text(path)?;
    let mut counts: HashMap<String, u64> = HashMap::new();
    let mut rows = 0u64;

    for line in reader.lines() {
        let line = line.map_err(|e| StatsError::io(path, e))?;
        if line.starts_with('!') || line.trim().is_empty() {
            continue;
        }
        let data: Vec<&str> = line.trim_end_matches('\n').split('\t').collect();

        let term = if data.len() > 5 {
            if data[3].starts_with("NOT") {
                continue;
            }
            let Some(&evidence) = data.get(6) else {
                return Err(StatsError::malformed(
                    "annotation corpus",
                    path,
                    0,
                    format!("gaf row without an evidence column: {line:?}"),
                ));
            };
            if NO_DATA_EVIDENCE.contains(&evidence) {
                continue;
            }
            if !use_all_evidence && !valid_evidence.contains(evidence) {
                continue;
            }
            data[4]
        } else if data.len() > 1 {
            data[1]
        } else {
            return Err(StatsError::malformed(
                "annotation corpus",
                path,
                0,
                format!("row with a single column: {line:?}"),
            ));
        };

        *counts.entry(normalize_id(term)).or_insert(0) += 1;
        rows += 1;
    }

    debug!(rows, terms = counts.len(), path = %path.display(), "parsed annotation corpus");
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const GAF: &str = "\
!gaf-version: 2.2
UniProtKB\tP00001\tGENE1\tenables\tGO:0000001\tGO_REF:0000001\tIDA\t\tF\tsome protein\t\tprotein\ttaxon:9606\t20240101\tUniProt
UniProtKB\tP00002\tGENE2\tNOT|enables\tGO:0000001\tGO_REF:0000001\tIDA\t\tF\tsome protein\t\tprotein\ttaxon:9606\t20240101\tUniProt
UniProtKB\tP00003\tGENE3\tenables\tGO:0000002\tGO_REF:0000001\tND\t\tF\tsome protein\t\tprotein\ttaxon:9606\t20240101\tUniProt
UniProtKB\tP00004\tGENE4\tenables\tGO:0000001\tGO_REF:0000001\tIEA\t\tF\tsome protein\t\tprotein\ttaxon:9606\t20240101\tUniProt
";

    const PURGED: &str = "\
!purged corpus
P00001\tGO:0000001
P00002\tGO:0000001
P00003\tGO:0000002
";

    fn write_corpus(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".gaf").tempfile().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    fn evidence(codes: &[&str]) -> HashSet<String> {
        codes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn counts_gaf_rows_skipping_not_and_no_data() {
        let f = write_corpus(GAF);
        let counts = parse_usage_counts(f.path(), true, &evidence(&[])).unwrap();
        // NOT row and ND row dropped; IEA kept because every evidence counts.
        assert_eq!(counts["GO_0000001"], 2);
        assert!(!counts.contains_key("GO_0000002"));
    }

    #[test]
    fn evidence_filter_applies_when_requested() {
        let f = write_corpus(GAF);
        let counts = parse_usage_counts(f.path(), false, &evidence(&["IDA"])).unwrap();
        assert_eq!(counts["GO_0000001"], 1, "only the IDA row survives");
    }

    #[test]
    fn narrow_rows_use_the_second_column() {
        let f = write_corpus(PURGED);
        let counts = parse_usage_counts(f.path(), true, &evidence(&[])).unwrap();
        assert_eq!(counts["GO_0000001"], 2);
        assert_eq!(counts["GO_0000002"], 1);
    }
}
