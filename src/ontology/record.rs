use serde::{Deserialize, Serialize};

/// Direct parent edge of a term, as produced by a loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermEdge {
    /// Normalized parent id.
    pub parent: String,
    /// Relation label with spaces, e.g. `is a`, `part of`, `negatively regulates`.
    pub relation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConstraintKind {
    OnlyInTaxon,
    NeverInTaxon,
}

/// Taxon-applicability restriction attached to a term. `taxon_id` keeps the
/// source form (`NCBITaxon_9606` or a `NCBITaxon_Union_…` placeholder whose
/// name lists the member taxa joined by " or ").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonConstraint {
    pub kind: ConstraintKind,
    pub taxon_id: String,
    pub taxon_name: String,
}

/// Normalized term record. Both loaders emit this and the graph consumes
/// nothing else, so graph construction is format-agnostic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TermRecord {
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub descr: String,
    pub alt_ids: Vec<String>,
    pub parents: Vec<TermEdge>,
    pub is_obsolete: bool,
    /// Candidate replacement ids for an obsolete term (`consider` plus, for
    /// OWL input, the `term replaced by` annotation).
    pub consider: Vec<String>,
    pub comment: Option<String>,
    /// Only populated by the OWL loader; the plain stanza format does not
    /// carry formal restriction axioms.
    pub taxon_constraints: Vec<TaxonConstraint>,
}

impl TermRecord {
    pub fn new(id: impl Into<String>) -> Self {
        TermRecord {
            id: id.into(),
            ..Default::default()
        }
    }
}
