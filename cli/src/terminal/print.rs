use colored::*;
use tracing::info;

use crate::terminal::colors;

pub const TOTAL_WIDTH: usize = 64;

/// Events on this target are printed without a status symbol.
pub const PRINT_TARGET: &str = "posprobe::print";

const KEY_WIDTH: usize = 10;

pub fn print(msg: &str) {
    info!(target: PRINT_TARGET, "{msg}");
}

pub fn blank() {
    print("");
}

fn rule(ch: &str, width: usize) -> ColoredString {
    ch.repeat(width).color(colors::SEPARATOR)
}

pub fn banner(no_banner: bool) {
    if no_banner {
        return;
    }

    let title: String = format!("⟦ POSPROBE v{} ⟧ ", env!("CARGO_PKG_VERSION"));
    let side: usize = TOTAL_WIDTH.saturating_sub(console::measure_text_width(&title)) / 2;
    print(&format!("{}{}{}", rule("═", side), title.bright_green().bold(), rule("═", side)));
}

/// Section title centred in a thin rule.
pub fn header(title: &str) {
    let label: String = format!("⟦ {} ⟧", title.to_uppercase());
    let free: usize = TOTAL_WIDTH.saturating_sub(label.chars().count());
    let left: usize = free / 2;

    print(&format!(
        "{}{}{}",
        rule("─", left),
        label.color(colors::PRIMARY),
        rule("─", free - left)
    ));
}

pub fn fat_separator() {
    print(&rule("═", TOTAL_WIDTH).to_string());
}

/// `> Key.......: value`
pub fn aligned_line(key: &str, value: ColoredString) {
    let dots: ColoredString = rule(".", (KEY_WIDTH + 1).saturating_sub(key.len()));
    print(&format!(
        "{} {}{}{} {}",
        ">".color(colors::SEPARATOR),
        key.color(colors::PRIMARY),
        dots,
        ":".color(colors::SEPARATOR),
        value
    ));
}

pub fn tree_head(idx: usize, name: &str) {
    print(&format!(
        "{}{}{} {}",
        "[".color(colors::SEPARATOR),
        idx.to_string().color(colors::ACCENT),
        "]".color(colors::SEPARATOR),
        name.color(colors::PRIMARY)
    ));
}

pub fn as_tree_one_level(details: Vec<(String, ColoredString)>) {
    let width: usize = details.iter().map(|(key, _)| key.len()).max().unwrap_or(0) + 2;
    let last: usize = details.len().saturating_sub(1);

    for (i, (key, value)) in details.iter().enumerate() {
        let branch: &str = if i == last { "└─" } else { "├─" };
        print(&format!(
            " {} {}{}{} {}",
            branch.color(colors::SEPARATOR),
            key.color(colors::TEXT_DEFAULT),
            rule(".", width - key.len()),
            ":".color(colors::SEPARATOR),
            value
        ));
    }
}

pub fn centerln(msg: &str) {
    let pad: String = " ".repeat(TOTAL_WIDTH.saturating_sub(console::measure_text_width(msg)) / 2);
    print(&format!("{pad}{msg}"));
}

const NO_RESULTS: &str = r#"
          _  _  ___    ___  ___ ___ _  _ _____ ___ ___  ___
         | \| |/ _ \  | _ \| _ \_ _| \| |_   _| __| _ \/ __|
         | .` | (_) | |  _/|   /| || .` | | | | _||   /\__ \
         |_|\_|\___/  |_|  |_|_\___|_|\_| |_| |___|_|_\|___/
"#;

pub fn no_results() {
    print(&NO_RESULTS.red().bold().to_string());
}

pub fn end_of_program() {
    fat_separator();
}
