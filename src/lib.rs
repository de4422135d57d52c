//! # Statement Layout Builder
//!
//! A library for normalizing raw, vendor-specific financial-statement
//! fields into ordered, multi-year statement layouts (Income Statement,
//! Balance Sheet, Cash Flow Statement) ready for spreadsheet rendering.
//!
//! ## Core Concepts
//!
//! - **Raw fields**: per-fiscal-year `{field name -> value}` maps as a
//!   data vendor reports them, with inconsistent naming across years
//! - **Canonical catalog**: the static, ordered section/line-item
//!   structure of each statement, including subtotal formulas
//! - **Classification**: alias table plus keyword heuristics mapping each
//!   raw name onto a canonical line item, or marking it unclassified
//! - **Other rows**: per-section catch-alls absorbing unclassified fields
//!   so no reported value is ever dropped
//! - **Pivot**: the (row, year) matrix with scaled values and header /
//!   subtotal / other row metadata for the render layer
//!
//! ## Example
//!
//! ```rust,ignore
//! use statement_layout_builder::*;
//!
//! let income = parse_vendor_payload(&income_json)?;
//! let balance = parse_vendor_payload(&balance_json)?;
//! let cash_flow = parse_vendor_payload(&cash_flow_json)?;
//!
//! let financials = CompanyFinancials {
//!     company: "ACME Corp".to_string(),
//!     income,
//!     balance,
//!     cash_flow,
//! };
//!
//! let layout = build_statement_layout(&financials, &LayoutOptions::default())?;
//! for row in &layout.income.rows {
//!     println!("{:?} {} {:?}", row.kind, row.label, row.values);
//! }
//! ```

pub mod aggregator;
pub mod classifier;
pub mod error;
pub mod ingestion;
pub mod pivot;
pub mod schema;
pub mod utils;

pub use aggregator::{AggregatedRow, Aggregator};
pub use classifier::{classify, normalize_field_name, Classification, FieldMatch};
pub use error::{Result, StatementLayoutError};
pub use ingestion::parse_vendor_payload;
pub use pivot::{PivotBuilder, PivotMatrix, PivotRow, RowKind, YearOrder};
pub use schema::{
    catalog, CashflowGroup, Catalog, Constituent, LineItem, Section, StatementId, StatementSchema,
};
pub use utils::{prettify_label, scale_value};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type FiscalYear = i32;
pub type RawFieldMap = BTreeMap<String, f64>;
/// Per-statement input contract: fiscal year -> raw field -> value.
pub type RawStatementFields = BTreeMap<FiscalYear, RawFieldMap>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompanyFinancials {
    pub company: String,
    pub income: RawStatementFields,
    pub balance: RawStatementFields,
    pub cash_flow: RawStatementFields,
}

impl CompanyFinancials {
    pub fn statement(&self, statement: StatementId) -> &RawStatementFields {
        match statement {
            StatementId::Income => &self.income,
            StatementId::Balance => &self.balance,
            StatementId::CashFlow => &self.cash_flow,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutOptions {
    /// Display divisor, e.g. 1000.0 for $000s, 1_000_000.0 for $MM.
    pub scale_factor: f64,
    pub year_order: YearOrder,
    /// Keep only the N most recent fiscal years, if set.
    pub max_years: Option<usize>,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            scale_factor: 1000.0,
            year_order: YearOrder::Ascending,
            max_years: None,
        }
    }
}

impl LayoutOptions {
    pub fn validate(&self) -> Result<()> {
        if !(self.scale_factor.is_finite() && self.scale_factor > 0.0) {
            return Err(StatementLayoutError::InvalidScaleFactor(self.scale_factor));
        }
        if self.max_years == Some(0) {
            return Err(StatementLayoutError::InvalidYearCount(0));
        }
        Ok(())
    }
}

/// The three pivot matrices for one company, one per statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialLayout {
    pub company: String,
    pub income: PivotMatrix,
    pub balance: PivotMatrix,
    pub cash_flow: PivotMatrix,
}

impl FinancialLayout {
    pub fn matrix(&self, statement: StatementId) -> &PivotMatrix {
        match statement {
            StatementId::Income => &self.income,
            StatementId::Balance => &self.balance,
            StatementId::CashFlow => &self.cash_flow,
        }
    }
}

pub struct StatementLayoutProcessor;

impl StatementLayoutProcessor {
    pub fn process(
        financials: &CompanyFinancials,
        options: &LayoutOptions,
    ) -> Result<FinancialLayout> {
        Self::run(financials, options, None)
    }

    /// Like [`process`](Self::process), but additionally asserts the
    /// conservation property per statement and year: the sum of raw
    /// values (excluding those classified onto subtotal rows, which
    /// recomputation replaces) must equal the sum of non-subtotal
    /// aggregated row values within `tolerance`.
    pub fn process_with_verification(
        financials: &CompanyFinancials,
        options: &LayoutOptions,
        tolerance: f64,
    ) -> Result<FinancialLayout> {
        Self::run(financials, options, Some(tolerance))
    }

    fn run(
        financials: &CompanyFinancials,
        options: &LayoutOptions,
        tolerance: Option<f64>,
    ) -> Result<FinancialLayout> {
        options.validate()?;
        catalog().validate()?;
        classifier::validate_rules()?;

        info!("Building statement layout for {}", financials.company);

        let mut matrices = Vec::with_capacity(3);
        for statement in StatementId::all() {
            let raw = financials.statement(statement);
            let schema = catalog().schema(statement);
            let rows = Aggregator::new(schema).aggregate(raw)?;

            debug!(
                "{}: {} aggregated rows over {} years",
                statement.display_name(),
                rows.len(),
                raw.len()
            );

            if let Some(tolerance) = tolerance {
                verify_conservation(statement, raw, &rows, tolerance)?;
            }

            let years = select_years(raw, options.max_years);
            let matrix = PivotBuilder::new(options.scale_factor, options.year_order)?
                .build(statement, &rows, &years);
            matrices.push(matrix);
        }

        let cash_flow = matrices.pop().expect("three statements queued");
        let balance = matrices.pop().expect("three statements queued");
        let income = matrices.pop().expect("three statements queued");

        Ok(FinancialLayout {
            company: financials.company.clone(),
            income,
            balance,
            cash_flow,
        })
    }
}

pub fn build_statement_layout(
    financials: &CompanyFinancials,
    options: &LayoutOptions,
) -> Result<FinancialLayout> {
    StatementLayoutProcessor::process(financials, options)
}

/// Builds the pivot matrix for a single statement.
pub fn build_statement_matrix(
    statement: StatementId,
    raw: &RawStatementFields,
    options: &LayoutOptions,
) -> Result<PivotMatrix> {
    options.validate()?;
    let schema = catalog().schema(statement);
    let rows = Aggregator::new(schema).aggregate(raw)?;
    let years = select_years(raw, options.max_years);
    Ok(PivotBuilder::new(options.scale_factor, options.year_order)?
        .build(statement, &rows, &years))
}

/// Checks that no reported value was created or lost between the raw
/// input and the aggregated rows. Raw values classified onto subtotal
/// rows are excluded; recomputation replaces those.
pub fn verify_conservation(
    statement: StatementId,
    raw: &RawStatementFields,
    rows: &[AggregatedRow],
    tolerance: f64,
) -> Result<()> {
    let schema = catalog().schema(statement);

    for (&year, fields) in raw {
        let mut raw_total = 0.0;
        for (field_name, &value) in fields {
            let classification = classify(field_name, statement);
            let counted = match &classification.result {
                FieldMatch::Line(id) => schema
                    .find_item(id)
                    .map(|(_, item)| !item.is_subtotal())
                    .unwrap_or(false),
                FieldMatch::Unclassified => true,
            };
            if counted {
                raw_total += value;
            }
        }

        let row_total: f64 = rows
            .iter()
            .filter(|r| !r.is_subtotal)
            .map(|r| r.values.get(&year).copied().unwrap_or(0.0))
            .sum();

        if (raw_total - row_total).abs() > tolerance {
            return Err(StatementLayoutError::ConservationViolation {
                statement: statement.display_name().to_string(),
                year,
                raw_total,
                row_total,
            });
        }
    }

    Ok(())
}

fn select_years(raw: &RawStatementFields, max_years: Option<usize>) -> Vec<FiscalYear> {
    let mut years: Vec<FiscalYear> = raw.keys().copied().collect();
    if let Some(limit) = max_years {
        if years.len() > limit {
            years = years.split_off(years.len() - limit);
        }
    }
    years
}
