use crate::classifier::{classify, FieldMatch};
use crate::error::{Result, StatementLayoutError};
use crate::schema::{Constituent, Section, StatementId, StatementSchema};
use crate::{FiscalYear, RawStatementFields};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One emitted statement row with dense per-year values. Once a row is
/// emitted, every input year is present in `values` (absent raw data
/// becomes 0.0) so downstream columns stay rectangular.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedRow {
    pub row_id: String,
    pub display_name: String,
    pub section_id: String,
    pub statement: StatementId,
    pub section_order: u32,
    pub order_index: u32,
    pub is_subtotal: bool,
    pub is_other: bool,
    pub always_shown: bool,
    pub values: BTreeMap<FiscalYear, f64>,
}

pub struct Aggregator<'a> {
    schema: &'a StatementSchema,
}

impl<'a> Aggregator<'a> {
    pub fn new(schema: &'a StatementSchema) -> Self {
        Self { schema }
    }

    /// Classifies and accumulates every raw observation, emits canonical
    /// and Other rows, then recomputes subtotals. Output is pre-sorted by
    /// (section order, row order); callers perform no further sorting.
    pub fn aggregate(&self, raw: &RawStatementFields) -> Result<Vec<AggregatedRow>> {
        let years: Vec<FiscalYear> = raw.keys().copied().collect();

        let mut line_totals: BTreeMap<String, BTreeMap<FiscalYear, f64>> = BTreeMap::new();
        let mut other_totals: BTreeMap<String, BTreeMap<FiscalYear, f64>> = BTreeMap::new();

        for (&year, fields) in raw {
            for (field_name, &value) in fields {
                let classification = classify(field_name, self.schema.statement);
                match classification.result {
                    FieldMatch::Line(id) => {
                        *line_totals
                            .entry(id)
                            .or_default()
                            .entry(year)
                            .or_insert(0.0) += value;
                    }
                    FieldMatch::Unclassified => {
                        debug!(
                            "Unclassified {} field '{}' (FY{}) routed to section '{}'",
                            self.schema.statement.display_name(),
                            field_name,
                            year,
                            classification.section_id
                        );
                        *other_totals
                            .entry(classification.section_id)
                            .or_default()
                            .entry(year)
                            .or_insert(0.0) += value;
                    }
                }
            }
        }

        let mut rows = Vec::new();
        for section in &self.schema.sections {
            for item in &section.items {
                let accumulated = line_totals.get(&item.id);
                let has_value = accumulated
                    .map(|m| m.values().any(|v| *v != 0.0))
                    .unwrap_or(false);
                if !(has_value || item.always_shown) {
                    continue;
                }

                rows.push(AggregatedRow {
                    row_id: item.id.clone(),
                    display_name: item.display_name.clone(),
                    section_id: section.id.clone(),
                    statement: self.schema.statement,
                    section_order: section.order_index,
                    order_index: item.order_index,
                    is_subtotal: item.is_subtotal(),
                    is_other: false,
                    always_shown: item.always_shown,
                    values: densify(accumulated, &years),
                });
            }

            if let Some(accumulated) = other_totals.get(&section.id) {
                rows.push(self.other_row(section, accumulated, &years));
            }
        }

        self.recompute_subtotals(&mut rows)?;

        Ok(rows)
    }

    fn other_row(
        &self,
        section: &Section,
        accumulated: &BTreeMap<FiscalYear, f64>,
        years: &[FiscalYear],
    ) -> AggregatedRow {
        AggregatedRow {
            row_id: section.other_row_id(),
            display_name: section.other_display_name(),
            section_id: section.id.clone(),
            statement: self.schema.statement,
            section_order: section.order_index,
            order_index: section.other_order_index(),
            is_subtotal: false,
            is_other: true,
            always_shown: false,
            values: densify(Some(accumulated), years),
        }
    }

    /// Replaces every subtotal row's values with the sum of its declared
    /// constituents' current values, walking rows in layout order so a
    /// formula may reference subtotals laid out earlier in the statement.
    /// A vendor-reported total accumulated onto a subtotal row is
    /// overwritten here; the local recomputation always wins.
    fn recompute_subtotals(&self, rows: &mut [AggregatedRow]) -> Result<()> {
        let index: HashMap<String, usize> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| (row.row_id.clone(), i))
            .collect();

        for i in 0..rows.len() {
            if !rows[i].is_subtotal {
                continue;
            }

            let row_id = rows[i].row_id.clone();
            let (_, item) = self
                .schema
                .find_item(&row_id)
                .expect("subtotal rows are emitted from the schema");
            let formula = item
                .formula
                .as_ref()
                .expect("is_subtotal implies a formula");

            let mut totals: BTreeMap<FiscalYear, f64> = BTreeMap::new();
            for part in formula {
                let constituent_id = match part {
                    Constituent::Line(id) => {
                        if self.schema.find_item(id).is_none() {
                            return Err(StatementLayoutError::UnknownConstituent {
                                subtotal: row_id.clone(),
                                constituent: id.clone(),
                            });
                        }
                        id.clone()
                    }
                    Constituent::SectionOther(section_id) => {
                        let section = self.schema.section(section_id).ok_or_else(|| {
                            StatementLayoutError::UnknownConstituent {
                                subtotal: row_id.clone(),
                                constituent: format!("{}.other", section_id),
                            }
                        })?;
                        section.other_row_id()
                    }
                };

                // A constituent absent from the output contributes zero.
                if let Some(&j) = index.get(&constituent_id) {
                    for (&year, &value) in &rows[j].values {
                        *totals.entry(year).or_insert(0.0) += value;
                    }
                }
            }

            for (&year, &value) in &rows[i].values {
                totals.entry(year).or_insert(0.0);
                if value != 0.0 && (totals[&year] - value).abs() > f64::EPSILON {
                    debug!(
                        "Vendor-reported '{}' for FY{} ({}) replaced by recomputed {}",
                        row_id, year, value, totals[&year]
                    );
                }
            }

            rows[i].values = totals;
        }

        Ok(())
    }
}

fn densify(
    accumulated: Option<&BTreeMap<FiscalYear, f64>>,
    years: &[FiscalYear],
) -> BTreeMap<FiscalYear, f64> {
    years
        .iter()
        .map(|&year| {
            let value = accumulated
                .and_then(|m| m.get(&year))
                .copied()
                .unwrap_or(0.0);
            (year, value)
        })
        .collect()
}
