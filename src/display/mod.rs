pub mod format;
pub mod term;

use anyhow::Result;

use crate::top::aggregate::AggregateRow;

pub const COLUMN_NAMES: [&str; 8] = [
    "Source",
    "Destination",
    "Path",
    "Count",
    "Best",
    "Worst",
    "Last",
    "Success Rate",
];

pub const COLUMN_WIDTHS: [usize; 8] = [23, 23, 55, 6, 6, 6, 6, 3];

/// Rows above the table body: the quit hint, a blank line, and the header.
pub const HEADER_HEIGHT: u16 = 3;

/// Terminal-like output surface.
///
/// `release` must be safe to call more than once and must never fail;
/// it runs on every shutdown path, including error paths.
pub trait Screen: Send {
    fn init(&mut self) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
    fn print(&mut self, x: u16, y: u16, text: &str, bold: bool) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn release(&mut self);
}

/// Repaints the full table: quit hint, bold header row, one row per
/// aggregate entry. The whole frame is drawn before a single flush.
pub fn render<S: Screen + ?Sized>(screen: &mut S, rows: &[AggregateRow]) -> Result<()> {
    screen.clear()?;
    screen.print(0, 0, "(press q to quit)", false)?;

    let mut x = 0u16;
    for (name, width) in COLUMN_NAMES.iter().zip(COLUMN_WIDTHS) {
        screen.print(x, HEADER_HEIGHT - 1, &pad(name, width), true)?;
        x += width as u16 + 1;
    }

    for (i, row) in rows.iter().enumerate() {
        let cells = [
            row.source.clone(),
            row.destination.clone(),
            row.path.clone(),
            row.count.to_string(),
            format::format_latency(row.best),
            format::format_latency(row.worst),
            format::format_latency(row.last),
            format::format_success_rate(row.successes, row.failures),
        ];

        let y = HEADER_HEIGHT + i as u16;
        let mut x = 0u16;
        for (cell, width) in cells.iter().zip(COLUMN_WIDTHS) {
            screen.print(x, y, &pad(cell, width), false)?;
            x += width as u16 + 1;
        }
    }

    screen.flush()
}

/// Pads to the column width without truncating. Overlong cells spill into
/// the gap column instead of losing information.
fn pad(text: &str, width: usize) -> String {
    format!("{text:<width$}")
}
