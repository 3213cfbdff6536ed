pub mod annotations;
pub mod error;
pub mod ontology;
mod reader;
pub mod taxonomy;


pub use error::StatsError;
pub use ontology::{OntologyGraph, OntologyOptions};
pub use taxonomy::TaxonomyTree;
