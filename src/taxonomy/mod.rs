mod tree;


pub use tree::{TaxonomyTree, ROOT_TAXON};
