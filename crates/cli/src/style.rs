//! Terminal styling for check results and script listings.

use comfy_table::{Cell, Color};
use console::Style;

use dbscript_guard_core::dbscript::CollisionSource;
use dbscript_guard_core::guard::RejectReason;

/// Create a success-styled string (green with checkmark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Create a warning-styled string (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Create a header-styled string (bold).
pub fn header(msg: &str) -> String {
    let style = Style::new().bold();
    style.apply_to(msg).to_string()
}

/// Create a dim-styled string.
pub fn dim(msg: &str) -> String {
    let style = Style::new().dim();
    style.apply_to(msg).to_string()
}

/// Short label naming where the colliding script came from.
pub fn source_label(source: CollisionSource) -> &'static str {
    match source {
        CollisionSource::Existing => "already in history",
        CollisionSource::SameChange => "same change",
    }
}

/// A rejection line. Collisions are red with their source; a repository
/// that could not be read is a warning, since nothing was compared.
pub fn rejection(reason: &RejectReason) -> String {
    match reason {
        RejectReason::Collision { source, .. } => format!(
            "{} [{}] {}",
            Style::new().red().apply_to("✗"),
            source_label(*source),
            reason
        ),
        RejectReason::RepositoryAccess { .. } => warn(&reason.to_string()),
    }
}

/// Status cell for an ordinal claimed by `uses` scripts.
pub fn ordinal_status(uses: usize) -> Cell {
    if uses > 1 {
        Cell::new(format!("✗ duplicate ({}x)", uses)).fg(Color::Red)
    } else {
        Cell::new("✓ unique").fg(Color::Green)
    }
}
