use std::sync::LazyLock;

use scraper::{ElementRef, Html, Selector};

use super::date::parse_launch_date;
use crate::error::{ExtractError, RowSkip};
use crate::launch::{LaunchRecord, LaunchSet};
use crate::settings::Columns;

static ROW_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").unwrap());

/// Result of one pass over the manifest table.
#[derive(Debug)]
pub struct Extraction {
    pub launches: LaunchSet,
    /// (row index within the table, reason)
    pub skipped: Vec<(usize, RowSkip)>,
}

impl Extraction {
    pub fn shape_mismatches(&self) -> usize {
        self.skipped
            .iter()
            .filter(|(_, s)| matches!(s, RowSkip::ShapeMismatch { .. }))
            .count()
    }

    pub fn bad_dates(&self) -> usize {
        self.skipped.len() - self.shape_mismatches()
    }
}

/// Parse the page and pull launch records out of the table after `#anchor_id`.
pub fn extract_launches(
    html: &str,
    anchor_id: &str,
    columns: &Columns,
) -> Result<Extraction, ExtractError> {
    let doc = Html::parse_document(html);
    extract_from_document(&doc, anchor_id, columns)
}

pub fn extract_from_document(
    doc: &Html,
    anchor_id: &str,
    columns: &Columns,
) -> Result<Extraction, ExtractError> {
    let anchor = doc
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().id() == Some(anchor_id))
        .ok_or_else(|| ExtractError::AnchorNotFound(anchor_id.to_string()))?;

    let table = anchor
        .next_siblings()
        .find_map(ElementRef::wrap)
        .ok_or_else(|| ExtractError::TableNotFound(anchor_id.to_string()))?;

    let mut launches = Vec::new();
    let mut skipped = Vec::new();

    for (i, row) in table.select(&ROW_SEL).enumerate() {
        let cells: Vec<ElementRef> = row.children().filter_map(ElementRef::wrap).collect();
        if !cells.iter().any(|c| c.value().name() == "td") {
            continue; // header
        }
        match build_record(&cells, columns) {
            Ok(record) => launches.push(record),
            Err(reason) => skipped.push((i, reason)),
        }
    }

    Ok(Extraction { launches: LaunchSet::new(launches), skipped })
}

fn build_record(cells: &[ElementRef], columns: &Columns) -> Result<LaunchRecord, RowSkip> {
    let expected = columns.required();
    if cells.len() < expected {
        return Err(RowSkip::ShapeMismatch { found: cells.len(), expected });
    }

    let raw_date = cell_text(&cells[columns.date]);
    let date = parse_launch_date(&raw_date).ok_or(RowSkip::BadDate(raw_date))?;

    Ok(LaunchRecord {
        date,
        payload: cell_text(&cells[columns.payload]).trim().to_string(),
        vehicle: cell_text(&cells[columns.vehicle]).trim().to_string(),
        customer: cell_text(&cells[columns.customer]).trim().to_string(),
    })
}

fn cell_text(cell: &ElementRef) -> String {
    cell.text().collect()
}

// ── Tests ──
