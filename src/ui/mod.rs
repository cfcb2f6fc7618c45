//! Terminal presentation for the CLI: styles, icons, tables and spinners.

pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    error, header, info, phase, section, skipped, success, summary_row, timing, warn,
};
pub use progress::Spinner;
pub use table::{data_flow_table, entity_table, relationship_table, stats_table, TableBuilder};
pub use theme::{theme, Theme};
