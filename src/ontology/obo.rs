use std::io::BufRead;
use std::path::Path;

use tracing::debug;

use super::normalize_id;
use super::record::{TermEdge, TermRecord};
use crate::error::StatsError;
use crate::reader::open_text;

/// Loads a plain-text stanza ontology (`[Term]` blocks of `key: value`
/// lines) into normalized term records, in file order.
pub fn load_obo(path: &Path) -> Result<Vec<TermRecord>, StatsError> {
    let reader = open_text(path)?;
    let mut records: Vec<TermRecord> = Vec::new();
    let mut stanza: Option<Stanza> = None;
    let mut in_term = false;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| StatsError::io(path, e))?;
        let trimmed = line.trim();

        if trimmed == "[Term]" {
            if let Some(s) = stanza.take() {
                records.push(s.finish(path)?);
            }
            stanza = Some(Stanza::default());
            in_term = true;
            continue;
        }
        if trimmed.starts_with('[') {
            // [Typedef] and friends end term reading until the next [Term].
            if let Some(s) = stanza.take() {
                records.push(s.finish(path)?);
            }
            in_term = false;
            continue;
        }
        if !in_term || trimmed.is_empty() {
            continue;
        }

        let Some((key, value)) = trimmed.split_once(": ") else {
            continue;
        };
        let stanza = stanza.as_mut().expect("inside a [Term] stanza");
        stanza.field(key, value, path, line_no + 1)?;
    }

    if let Some(s) = stanza.take() {
        records.push(s.finish(path)?);
    }

    debug!(terms = records.len(), path = %path.display(), "parsed stanza ontology");
    Ok(records)
}

#[derive(Default)]
struct Stanza {
    record: TermRecord,
    saw_id: bool,
    /// Parent ids already recorded for this stanza; a term citing the same
    /// father through both `is_a` and `relationship` keeps the first edge.
    parents_seen: std::collections::HashSet<String>,
}

impl Stanza {
    fn field(
        &mut self,
        key: &str,
        value: &str,
        path: &Path,
        line: usize,
    ) -> Result<(), StatsError> {
        match key {
            "id" => {
                self.record.id = normalize_id(value);
                self.saw_id = true;
            }
            "name" => self.record.name = value.trim().to_string(),
            "namespace" => self.record.namespace = value.trim().to_string(),
            "def" => {
                // def: "quoted definition" [refs] — keep the quoted part.
                let mut quoted = value.split('"');
                self.record.descr = match (quoted.next(), quoted.next()) {
                    (Some(_), Some(text)) => text.to_string(),
                    _ => {
                        return Err(StatsError::malformed(
                            "obo stanza",
                            path,
                            line,
                            format!("unquoted def: {value:?}"),
                        ))
                    }
                };
            }
            "comment" => self.record.comment = Some(value.trim().to_string()),
            "is_obsolete" => self.record.is_obsolete = value.trim() == "true",
            "alt_id" => self.record.alt_ids.push(normalize_id(value)),
            "consider" => self.record.consider.push(normalize_id(value)),
            "is_a" => {
                let target = value.split('!').next().unwrap_or("").trim();
                let parent = normalize_id(target);
                if self.parents_seen.insert(parent.clone()) {
                    self.record.parents.push(TermEdge {
                        parent,
                        relation: "is a".to_string(),
                    });
                }
            }
            "relationship" => {
                let body = value.split('!').next().unwrap_or("").trim();
                let mut words = body.split_whitespace();
                let (Some(rel), Some(target)) = (words.next(), words.next()) else {
                    return Err(StatsError::malformed(
                        "obo stanza",
                        path,
                        line,
                        format!("relationship needs a type and a target: {value:?}"),
                    ));
                };
                if rel == "has_part" {
                    return Ok(());
                }
                let parent = normalize_id(target);
                if self.parents_seen.insert(parent.clone()) {
                    self.record.parents.push(TermEdge {
                        parent,
                        relation: rel.replace('_', " "),
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn finish(self, path: &Path) -> Result<TermRecord, StatsError> {
        if !self.saw_id {
            return Err(StatsError::malformed(
                "obo stanza",
                path,
                0,
                "stanza without an id",
            ));
        }
        if !self.record.is_obsolete
            && (self.record.name.is_empty() || self.record.namespace.is_empty())
        {
            return Err(StatsError::malformed(
                "obo stanza",
                path,
                0,
                format!("term {} lacks a name or namespace", self.record.id),
            ));
        }
        Ok(self.record)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const TOY: &str = "\
format-version: 1.2

[Term]
id: GO:0000001
name: mitochondrion inheritance
namespace: biological_process
def: \"The distribution of mitochondria.\" [GOC:mcc]
alt_id: GO:0019952
is_a: GO:0048308 ! organelle inheritance
relationship: part_of GO:0048311 ! mitochondrion distribution
relationship: has_part GO:0000002

[Term]
id: GO:0000002
name: mitochondrial genome maintenance
namespace: biological_process
def: \"The maintenance of the structure.\" [GOC:ai]
is_a: GO:0048308
is_a: GO:0048308 ! duplicate father

[Term]
id: GO:0000003
name: obsolete reproduction
is_obsolete: true
consider: GO:0000002
comment: This term was made obsolete.

[Typedef]
id: part_of
name: part of
";

    fn write_toy() -> tempfile::NamedTempFile {
        let mut f = tempfile::Builder::new().suffix(".obo").tempfile().unwrap();
        f.write_all(TOY.as_bytes()).unwrap();
        f
    }

    #[test]
    fn parses_terms_edges_and_aliases() {
        let f = write_toy();
        let records = load_obo(f.path()).unwrap();
        assert_eq!(records.len(), 3, "three stanzas expected");

        let first = &records[0];
        assert_eq!(first.id, "GO_0000001");
        assert_eq!(first.name, "mitochondrion inheritance");
        assert_eq!(first.descr, "The distribution of mitochondria.");
        assert_eq!(first.alt_ids, vec!["GO_0019952".to_string()]);
        // has_part is dropped, is_a and part_of stay
        assert_eq!(first.parents.len(), 2);
        assert_eq!(first.parents[0].relation, "is a");
        assert_eq!(first.parents[1].parent, "GO_0048311");
        assert_eq!(first.parents[1].relation, "part of");
    }

    #[test]
    fn duplicate_fathers_are_kept_once() {
        let f = write_toy();
        let records = load_obo(f.path()).unwrap();
        assert_eq!(records[1].parents.len(), 1);
    }

    #[test]
    fn obsolete_terms_keep_consider_and_comment() {
        let f = write_toy();
        let records = load_obo(f.path()).unwrap();
        let obs = &records[2];
        assert!(obs.is_obsolete);
        assert_eq!(obs.consider, vec!["GO_0000002".to_string()]);
        assert!(obs.comment.as_deref().unwrap().contains("obsolete"));
        assert!(obs.parents.is_empty());
    }
}
