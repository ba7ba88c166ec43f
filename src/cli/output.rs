//! Terminal output formatting with colors
//!
//! Respects NO_COLOR, CLICOLOR, CLICOLOR_FORCE automatically.

use colored::{ColoredString, Colorize};

use crate::domain::{ItemError, StyledLabel, TextStyle, Tree, TreeItem};

/// Print error (red bold "error:" prefix) to stderr
pub fn error(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "error".red().bold(), msg);
}

/// Print warning (yellow "Warning:" prefix) to stderr
pub fn warning(msg: &(impl std::fmt::Display + ?Sized)) {
    eprintln!("{}: {}", "Warning".yellow(), msg);
}

/// Print section header (cyan bold)
pub fn header(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg.to_string().cyan().bold());
}

/// Print indented detail (no color)
pub fn detail(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("  {}", msg);
}

/// Print plain output (no color, for data)
pub fn info(msg: &(impl std::fmt::Display + ?Sized)) {
    println!("{}", msg);
}

/// Print a key/value line (green key)
pub fn field(key: &str, value: &(impl std::fmt::Display + ?Sized)) {
    println!("{}: {}", key.green(), value);
}

/// Parse `#rrggbb`.
fn hex_color(color: &str) -> Option<(u8, u8, u8)> {
    let hex = color.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
    Some((channel(0)?, channel(2)?, channel(4)?))
}

fn styled(text: &str, style: &TextStyle) -> ColoredString {
    let mut out = ColoredString::from(text);
    if let Some((r, g, b)) = style.foreground.as_deref().and_then(hex_color) {
        out = out.truecolor(r, g, b);
    }
    if style.bold {
        out = out.bold();
    }
    if style.italic {
        out = out.italic();
    }
    if style.underline {
        out = out.underline();
    }
    out
}

/// Label with every fragment styled.
pub fn label(label: &StyledLabel) -> String {
    label
        .fragments
        .iter()
        .map(|fragment| styled(&fragment.text, &fragment.style).to_string())
        .collect()
}

fn item_line(item: &TreeItem, show_ids: bool) -> String {
    let mut line = label(&item.label);
    if item.error == Some(ItemError::CyclicHierarchy) {
        line.push_str(&format!(" {}", "(cycle)".red()));
    } else if item.has_children && !item.expanded {
        line.push_str(&format!(" {}", "+".dimmed()));
    }
    if show_ids {
        line.push_str(&format!(" {}", item.id.dimmed()));
    }
    line
}

fn item_tree(item: &TreeItem, show_ids: bool) -> termtree::Tree<String> {
    termtree::Tree::new(item_line(item, show_ids))
        .with_leaves(item.children.iter().map(|child| item_tree(child, show_ids)))
}

/// Render a snapshot as an ASCII tree under `title`.
pub fn render_tree(title: &str, tree: &Tree, show_ids: bool) -> String {
    termtree::Tree::new(title.cyan().bold().to_string())
        .with_leaves(tree.children.iter().map(|item| item_tree(item, show_ids)))
        .to_string()
}
