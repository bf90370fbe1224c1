use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use ckd_cli::pipeline::RunResult;

pub fn print_summary(result: &RunResult) {
    println!("Year: {}", result.year);
    println!("Report: {}", result.report_path.display());
    println!("{}", summary_table(result));
}

fn summary_table(result: &RunResult) -> Table {
    let summary = &result.summary;
    let mut table = Table::new();
    table.set_header(vec![header_cell("Measure"), header_cell("Value")]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);

    table.add_row(vec![Cell::new("Analysis year"), Cell::new(result.year)]);
    table.add_row(vec![Cell::new("Mode"), mode_cell(result)]);
    table.add_row(vec![Cell::new("Members"), Cell::new(summary.members)]);
    table.add_row(vec![Cell::new("Lab-staged members"), Cell::new(summary.lab_staged)]);
    table.add_row(vec![
        Cell::new("Claims-staged members"),
        Cell::new(summary.claims_staged),
    ]);
    table.add_row(vec![
        Cell::new("Stage 3 disambiguations"),
        Cell::new(summary.disambiguated),
    ]);
    table.add_row(vec![
        Cell::new("Unclassified members"),
        count_cell(summary.unclassified, Color::Yellow),
    ]);
    table.add_row(vec![Cell::new("Report tables"), Cell::new(result.tables)]);
    table.add_row(vec![
        Cell::new("Report").add_attribute(Attribute::Bold),
        dim_cell(result.report_path.display()),
    ]);
    table
}

fn mode_cell(result: &RunResult) -> Cell {
    let mode = match (result.test, result.diagnostics) {
        (true, true) => "test, diagnostics",
        (true, false) => "test",
        (false, true) => "production, diagnostics",
        (false, false) => "production",
    };
    if result.test {
        Cell::new(mode).fg(Color::Yellow)
    } else {
        Cell::new(mode)
    }
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(100);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count == 0 {
        dim_cell(count)
    } else {
        Cell::new(count).fg(color)
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
