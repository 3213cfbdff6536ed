mod cache;
mod graph;
mod obo;
mod owl;
mod record;


pub use cache::{load_records, save_records};

pub use graph::{
    EdgeDetails, IcEntry, ObsoleteTarget, OntologyGraph, OntologyOptions, TermDetails, BP_ROOT,
    CC_ROOT, MF_ROOT,
};

pub use record::{ConstraintKind, TaxonConstraint, TermEdge, TermRecord};

pub use obo::load_obo;
pub use owl::load_owl;

/// Normalized term identifier: `GO:0000001` and `GO_0000001` key the same node.
pub fn normalize_id(id: &str) -> String {
    id.trim().replace(':', "_")
}
