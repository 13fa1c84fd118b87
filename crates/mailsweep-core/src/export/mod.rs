//! Report export: CSV files and plain-text summaries.

pub mod csv;
pub mod text;

pub use csv::{write_domain_summary_csv, write_messages_csv};
