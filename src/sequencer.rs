//! Replays table grids and style plans as host operations.
//!
//! The host only offers relative cursor moves and cell navigation, so every
//! replay starts from a known position and walks from there.

use std::collections::HashMap;

use hwp_host_core::{DocumentHost, HostCommand, MoveUnit, StyleDefinition, StyleStore};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{EngineError, HostContext, Result};
use crate::style_plan::{StyleMap, StylePlan, StylePlanEntry};
use crate::table_grid::TableGrid;

/// Create a table at the cursor and fill it one row per paste.
pub fn replay_table<H: DocumentHost>(host: &mut H, grid: &TableGrid) -> Result<()> {
    host.create_table(grid.rows(), grid.cols())
        .context("creating table")?;

    if let Err(e) = fill_rows(host, grid) {
        // leave table-edit mode so the document stays usable
        if let Err(exit_err) = host.run(HostCommand::ExitTable) {
            warn!("Could not leave table after failed fill: {}", exit_err);
        }
        return Err(e);
    }

    host.run(HostCommand::ExitTable).context("leaving table")?;
    info!(rows = grid.rows(), cols = grid.cols(), "Inserted table");
    Ok(())
}

fn fill_rows<H: DocumentHost>(host: &mut H, grid: &TableGrid) -> Result<()> {
    for row in 0..grid.rows() {
        let line = grid.row_tsv(row).unwrap_or_default();
        host.run(HostCommand::SelectTableRow)
            .context("selecting table row")?;
        host.set_clipboard(&line).context("setting clipboard")?;
        host.run(HostCommand::Paste).context("pasting row")?;
        if row + 1 < grid.rows() {
            host.run(HostCommand::AdvanceRow)
                .context("advancing to next row")?;
        }
    }
    Ok(())
}

/// Outcome of a style replay.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StyleReport {
    pub applied: usize,
    /// Styles the store does not define; their entries were skipped.
    pub missing_styles: Vec<String>,
    /// Entries the host could not style.
    pub failed: usize,
}

/// Apply each plan entry's style to its line range, in plan order.
///
/// Missing styles and per-entry host failures are skipped. Fails with
/// `NothingApplied` when no entry was styled.
pub fn replay_styles<H: DocumentHost>(
    host: &mut H,
    plan: &StylePlan,
    store: &dyn StyleStore,
    map: &StyleMap,
) -> Result<StyleReport> {
    let mut report = StyleReport::default();
    let mut cache: HashMap<String, Option<StyleDefinition>> = HashMap::new();

    for entry in plan.entries() {
        let style_name = map.resolve(&entry.style_type);
        if !cache.contains_key(&style_name) {
            let loaded = match store.load(&style_name) {
                Ok(style) => style,
                Err(e) => {
                    warn!(style = %style_name, "Failed to load style: {}", e);
                    None
                }
            };
            cache.insert(style_name.clone(), loaded);
        }
        let Some(style) = cache.get(&style_name).and_then(Option::as_ref) else {
            if !report.missing_styles.contains(&style_name) {
                report.missing_styles.push(style_name.clone());
            }
            debug!(style = %style_name, line = entry.start_line, "No such style; skipping entry");
            continue;
        };

        let outcome = select_lines(host, entry).and_then(|selected| {
            if selected {
                apply_style(host, style).map(|()| true)
            } else {
                Ok(false)
            }
        });
        host.cancel_selection();

        match outcome {
            Ok(true) => report.applied += 1,
            Ok(false) => {
                warn!(
                    start = entry.start_line,
                    end = entry.end_line,
                    "Line range is outside the document"
                );
                report.failed += 1;
            }
            Err(e) => {
                warn!(style = %style_name, line = entry.start_line, "Failed to style entry: {}", e);
                report.failed += 1;
            }
        }
    }

    info!(
        applied = report.applied,
        failed = report.failed,
        missing = report.missing_styles.len(),
        "Style replay finished"
    );
    if report.applied == 0 {
        return Err(EngineError::NothingApplied(format!(
            "none of {} style plan entries could be applied",
            plan.len()
        )));
    }
    Ok(report)
}

/// Select from the start of `start_line` to the end of `end_line`.
///
/// Returns `false` when the document has fewer lines than `start_line`. An
/// `end_line` past the last line selects to the end of the document.
fn select_lines<H: DocumentHost>(host: &mut H, entry: &StylePlanEntry) -> Result<bool> {
    let first = entry.start_line.saturating_sub(1);
    let last = entry.end_line.saturating_sub(1).max(first);

    host.cancel_selection();
    host.move_by(MoveUnit::DocStart).context("moving to document start")?;
    if move_down(host, first, "moving down")? < first {
        return Ok(false);
    }

    host.move_by(MoveUnit::LineStart).context("moving to line start")?;
    host.begin_selection().context("starting selection")?;
    move_down(host, last - first, "extending selection")?;
    host.move_by(MoveUnit::LineEnd).context("extending to line end")?;
    Ok(true)
}

/// Move down at most `lines` lines and return how many were actually moved.
///
/// Stops as soon as the cursor stays on the same line, so the walk is bounded
/// by the document length rather than by `lines`.
fn move_down<H: DocumentHost>(host: &mut H, lines: usize, context: &str) -> Result<usize> {
    let mut line = host.position().context("reading position")?.paragraph;
    let mut moved = 0;
    while moved < lines {
        host.move_by(MoveUnit::NextLine).context(context)?;
        let next = host.position().context("reading position")?.paragraph;
        if next == line {
            break;
        }
        line = next;
        moved += 1;
    }
    Ok(moved)
}

fn apply_style<H: DocumentHost>(host: &mut H, style: &StyleDefinition) -> Result<()> {
    if !style.character.is_empty() {
        host.set_char_shape(&style.character)
            .context("applying character shape")?;
    }
    if !style.paragraph.is_empty() {
        host.set_para_shape(&style.paragraph)
            .context("applying paragraph shape")?;
    }
    Ok(())
}
