pub mod goa;


pub use goa::parse_usage_counts;
