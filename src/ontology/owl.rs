use std::collections::{HashMap, HashSet};
use std::io::BufRead;
use std::path::Path;

use lazy_static::lazy_static;
use tracing::debug;

use super::normalize_id;
use super::record::{ConstraintKind, TaxonConstraint, TermEdge, TermRecord};
use crate::error::StatsError;
use crate::reader::open_text;

lazy_static! {
    /// Restriction properties that become parent edges, keyed by the OBO
    /// property fragment. These are the transitive is-a-like relations the
    /// traversals understand; anything else (has_part included) is dropped.
    static ref EDGE_PROPERTIES: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("BFO_0000050", "part of");
        m.insert("RO_0002211", "regulates");
        m.insert("RO_0002213", "positively regulates");
        m.insert("RO_0002212", "negatively regulates");
        m.insert("BFO_0000066", "occurs in");
        m.insert("RO_0002215", "capable of");
        m.insert("RO_0002216", "capable of part of");
        m
    };
}

const ONLY_IN_TAXON: &str = "RO_0002160";
const NEVER_IN_TAXON: &str = "RO_0002161";

/// Loads a go-plus-style RDF/XML ontology into normalized term records.
///
/// This is a line-oriented extraction of the restricted relation model, not
/// an RDF reasoner: it reads `owl:Class` blocks whose IRI lives under
/// `base_uri`, their annotation fields, plain `rdfs:subClassOf` resources,
/// and `owl:Restriction` blocks over the transitive edge properties and the
/// two taxon-restriction properties.
pub fn load_owl(path: &Path, base_uri: &str) -> Result<Vec<TermRecord>, StatsError> {
    if base_uri.is_empty() {
        return Err(StatsError::NamespaceRequired);
    }

    let reader = open_text(path)?;
    let mut records: Vec<TermRecord> = Vec::new();
    // Labels of NCBITaxon / NCBITaxon_Union classes, harvested in the same
    // pass and patched onto the constraints afterwards.
    let mut taxon_labels: HashMap<String, String> = HashMap::new();

    let mut block = Block::None;
    let mut restriction: Option<Restriction> = None;

    for line in reader.lines() {
        let line = line.map_err(|e| StatsError::io(path, e))?;
        let line = line.trim();

        if line.contains("<owl:Class") && !line.ends_with("/>") {
            // Self-closing <owl:Class rdf:about="…"/> lines are references
            // inside class expressions, not definitions.
            if let Some(about) = extract_attr(line, "rdf:about") {
                let frag = fragment(&about);
                if frag.starts_with("GO_") && about.starts_with(base_uri) {
                    block = Block::Term(Box::new(TermState::new(frag)));
                } else if frag.starts_with("NCBITaxon") {
                    block = Block::Taxon(frag);
                }
            }
            continue;
        }

        if line.contains("</owl:Class>") {
            match std::mem::replace(&mut block, Block::None) {
                Block::Term(state) => records.push(state.finish(path)?),
                Block::Taxon(_) | Block::None => {}
            }
            restriction = None;
            continue;
        }

        match &mut block {
            Block::None => {}
            Block::Taxon(frag) => {
                if line.contains("<rdfs:label") {
                    if let Some(label) = extract_text(line) {
                        taxon_labels.insert(frag.clone(), label);
                    }
                }
            }
            Block::Term(state) => {
                if line.contains("<owl:Restriction") {
                    restriction = Some(Restriction::default());
                } else if line.contains("</owl:Restriction>") {
                    if let Some(r) = restriction.take() {
                        state.apply_restriction(r);
                    }
                } else if let Some(r) = restriction.as_mut() {
                    if line.contains("<owl:onProperty") {
                        r.property = extract_attr(line, "rdf:resource").map(|v| fragment(&v));
                    } else if line.contains("<owl:someValuesFrom") {
                        r.filler = extract_attr(line, "rdf:resource").map(|v| fragment(&v));
                    }
                } else {
                    state.field(line);
                }
            }
        }
    }

    for record in &mut records {
        for constraint in &mut record.taxon_constraints {
            if let Some(label) = taxon_labels.get(&constraint.taxon_id) {
                constraint.taxon_name = label.clone();
            }
        }
    }

    debug!(terms = records.len(), path = %path.display(), "parsed owl ontology");
    Ok(records)
}

enum Block {
    None,
    Term(Box<TermState>),
    Taxon(String),
}

#[derive(Default)]
struct Restriction {
    property: Option<String>,
    filler: Option<String>,
}

struct TermState {
    record: TermRecord,
    parents_seen: HashSet<String>,
}

impl TermState {
    fn new(id: String) -> Self {
        TermState {
            record: TermRecord::new(id),
            parents_seen: HashSet::new(),
        }
    }

    fn field(&mut self, line: &str) {
        if line.contains("<rdfs:label") {
            if let Some(label) = extract_text(line) {
                if label.starts_with("obsolete") {
                    self.record.is_obsolete = true;
                }
                self.record.name = label;
            }
        } else if line.contains("<obo:IAO_0000115") {
            if let Some(descr) = extract_text(line) {
                self.record.descr = descr;
            }
        } else if line.contains("<oboInOwl:hasOBONamespace") {
            if let Some(ns) = extract_text(line) {
                self.record.namespace = ns;
            }
        } else if line.contains("<oboInOwl:hasAlternativeId") {
            if let Some(alt) = extract_text(line) {
                self.record.alt_ids.push(normalize_id(&alt));
            }
        } else if line.contains("<oboInOwl:consider") {
            if let Some(target) = extract_text(line) {
                self.record.consider.push(normalize_id(&target));
            }
        } else if line.contains("<owl:deprecated") {
            if extract_text(line).as_deref() == Some("true") {
                self.record.is_obsolete = true;
            }
        } else if line.contains("<obo:IAO_0100001") {
            // "term replaced by" — annotation resource or literal form.
            let target = extract_attr(line, "rdf:resource")
                .map(|v| fragment(&v))
                .or_else(|| extract_text(line).map(|t| normalize_id(&t)));
            if let Some(target) = target {
                self.record.consider.push(target);
            }
        } else if line.contains("<rdfs:comment") {
            self.record.comment = extract_text(line);
        } else if line.contains("<rdfs:subClassOf") {
            if let Some(resource) = extract_attr(line, "rdf:resource") {
                let parent = fragment(&resource);
                if parent.starts_with("GO_") && self.parents_seen.insert(parent.clone()) {
                    self.record.parents.push(TermEdge {
                        parent,
                        relation: "is a".to_string(),
                    });
                }
            }
        }
    }

    fn apply_restriction(&mut self, r: Restriction) {
        let (Some(property), Some(filler)) = (r.property, r.filler) else {
            return;
        };
        if let Some(relation) = EDGE_PROPERTIES.get(property.as_str()) {
            if filler.starts_with("GO_") && self.parents_seen.insert(filler.clone()) {
                self.record.parents.push(TermEdge {
                    parent: filler,
                    relation: (*relation).to_string(),
                });
            }
        } else if property == ONLY_IN_TAXON || property == NEVER_IN_TAXON {
            if filler.starts_with("NCBITaxon") {
                self.record.taxon_constraints.push(TaxonConstraint {
                    kind: if property == ONLY_IN_TAXON {
                        ConstraintKind::OnlyInTaxon
                    } else {
                        ConstraintKind::NeverInTaxon
                    },
                    taxon_id: filler,
                    taxon_name: String::new(),
                });
            }
        }
    }

    fn finish(self, path: &Path) -> Result<TermRecord, StatsError> {
        if !self.record.is_obsolete
            && (self.record.name.is_empty() || self.record.namespace.is_empty())
        {
            return Err(StatsError::malformed(
                "owl class",
                path,
                0,
                format!("term {} lacks a label or namespace", self.record.id),
            ));
        }
        Ok(self.record)
    }
}

fn extract_attr(line: &str, attr: &str) -> Option<String> {
    let pattern = format!("{attr}=\"");
    let start = line.find(&pattern)? + pattern.len();
    let rest = &line[start..];
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

fn extract_text(line: &str) -> Option<String> {
    let start = line.find('>')? + 1;
    let rest = &line[start..];
    let end = rest.find('<')?;
    let text = rest[..end].trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Final IRI segment: `http://purl.obolibrary.org/obo/GO_0000001` -> `GO_0000001`.
fn fragment(iri: &str) -> String {
    let tail = iri.rsplit('/').next().unwrap_or(iri);
    tail.rsplit('#').next().unwrap_or(tail).to_string()
}
