pub mod icons;
pub mod output;
pub mod progress;
pub mod table;
pub mod theme;

pub use icons::Icons;
pub use output::{
    accent, banner, block, deletion, dim, error, header, info, muted, section, status, success,
    summary_row, timing, warn,
};
pub use progress::{RowProgress, Spinner};
pub use table::{grid, record_table, rows_table, stats_table, TableBuilder};
pub use theme::{theme, Theme};
