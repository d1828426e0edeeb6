pub mod formatting;

pub use formatting::{flow_table_header, format_bytes, format_duration, format_flow_row};
