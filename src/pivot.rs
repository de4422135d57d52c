use crate::aggregator::AggregatedRow;
use crate::error::{Result, StatementLayoutError};
use crate::schema::{catalog, StatementId};
use crate::utils::scale_value;
use crate::FiscalYear;
use serde::{Deserialize, Serialize};

/// Left-to-right ordering of the fiscal-year columns. A pass-through
/// presentation option, not a business rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum YearOrder {
    #[default]
    Ascending,
    Descending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum RowKind {
    /// Section title row; carries no values.
    Header,
    Line,
    Subtotal,
    Other,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotRow {
    pub label: String,
    pub section: String,
    pub kind: RowKind,
    /// One cell per matrix year, already scaled. `None` only on headers.
    pub values: Vec<Option<f64>>,
}

impl PivotRow {
    pub fn is_header(&self) -> bool {
        self.kind == RowKind::Header
    }

    pub fn is_subtotal(&self) -> bool {
        self.kind == RowKind::Subtotal
    }

    pub fn is_other(&self) -> bool {
        self.kind == RowKind::Other
    }
}

/// The final per-statement artifact handed to the render boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotMatrix {
    pub statement: StatementId,
    pub years: Vec<FiscalYear>,
    pub rows: Vec<PivotRow>,
    pub scale_factor: f64,
}

#[derive(Debug)]
pub struct PivotBuilder {
    scale_factor: f64,
    year_order: YearOrder,
}

impl PivotBuilder {
    pub fn new(scale_factor: f64, year_order: YearOrder) -> Result<Self> {
        if !(scale_factor.is_finite() && scale_factor > 0.0) {
            return Err(StatementLayoutError::InvalidScaleFactor(scale_factor));
        }
        Ok(Self {
            scale_factor,
            year_order,
        })
    }

    /// Arranges pre-sorted aggregated rows into the year-columned matrix:
    /// scales every cell, drops rows that are zero across the requested
    /// years (subtotals and always-shown rows are retained for layout
    /// continuity), and inserts a header row before each section that
    /// contributes at least one visible row.
    pub fn build(
        &self,
        statement: StatementId,
        rows: &[AggregatedRow],
        years: &[FiscalYear],
    ) -> PivotMatrix {
        let mut ordered_years: Vec<FiscalYear> = years.to_vec();
        ordered_years.sort_unstable();
        if self.year_order == YearOrder::Descending {
            ordered_years.reverse();
        }

        let schema = catalog().schema(statement);
        let mut out = Vec::new();
        let mut open_section: Option<String> = None;

        for row in rows {
            let cell = |year: &FiscalYear| row.values.get(year).copied().unwrap_or(0.0);
            let visible = row.is_subtotal
                || row.always_shown
                || ordered_years.iter().any(|y| cell(y) != 0.0);
            if !visible {
                continue;
            }

            let section_label = schema
                .section(&row.section_id)
                .map(|s| s.display_name.clone())
                .unwrap_or_else(|| row.section_id.clone());

            if open_section.as_deref() != Some(row.section_id.as_str()) {
                out.push(PivotRow {
                    label: section_label.clone(),
                    section: section_label.clone(),
                    kind: RowKind::Header,
                    values: vec![None; ordered_years.len()],
                });
                open_section = Some(row.section_id.clone());
            }

            let kind = if row.is_other {
                RowKind::Other
            } else if row.is_subtotal {
                RowKind::Subtotal
            } else {
                RowKind::Line
            };

            out.push(PivotRow {
                label: row.display_name.clone(),
                section: section_label,
                kind,
                values: ordered_years
                    .iter()
                    .map(|y| Some(scale_value(cell(y), self.scale_factor)))
                    .collect(),
            });
        }

        PivotMatrix {
            statement,
            years: ordered_years,
            rows: out,
            scale_factor: self.scale_factor,
        }
    }
}
