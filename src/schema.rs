use crate::error::{Result, StatementLayoutError};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum StatementId {
    Income,
    Balance,
    CashFlow,
}

impl StatementId {
    /// Resolves a vendor endpoint-style statement name. Accepts the
    /// long API forms ("income-statement") as well as short forms.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "income" | "income-statement" | "income_statement" => Ok(Self::Income),
            "balance" | "balance-sheet" | "balance-sheet-statement" | "balance_sheet" => {
                Ok(Self::Balance)
            }
            "cashflow" | "cash-flow" | "cash-flow-statement" | "cash_flow" => Ok(Self::CashFlow),
            other => Err(StatementLayoutError::UnknownStatement(other.to_string())),
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Income => "Income Statement",
            Self::Balance => "Balance Sheet",
            Self::CashFlow => "Cash Flow Statement",
        }
    }

    pub fn all() -> [StatementId; 3] {
        [Self::Income, Self::Balance, Self::CashFlow]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum CashflowGroup {
    Cfo,
    Cfi,
    Cff,
}

/// One term of a subtotal formula: either a canonical line item or a
/// section's implicit Other row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constituent {
    Line(String),
    SectionOther(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    pub display_name: String,
    pub order_index: u32,
    /// Retained in the pivot even when every year is zero.
    pub always_shown: bool,
    /// Present for subtotal rows; the value is recomputed each run as the
    /// sum of these constituents, in statement layout order.
    pub formula: Option<Vec<Constituent>>,
}

impl LineItem {
    pub fn is_subtotal(&self) -> bool {
        self.formula.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: String,
    pub display_name: String,
    pub order_index: u32,
    pub cashflow_group: Option<CashflowGroup>,
    /// The statement's default destination for unclassified fields.
    /// Exactly one section per statement carries this flag.
    pub catch_all: bool,
    pub items: Vec<LineItem>,
}

impl Section {
    /// Identifier of this section's implicit Other row.
    pub fn other_row_id(&self) -> String {
        format!("{}.other", self.id)
    }

    pub fn other_display_name(&self) -> String {
        if self.catch_all {
            self.display_name.clone()
        } else {
            format!("Other {}", self.display_name)
        }
    }

    /// Order slot for the Other row: after every regular row.
    pub fn other_order_index(&self) -> u32 {
        self.items.iter().map(|i| i.order_index).max().unwrap_or(0) + 1
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementSchema {
    pub statement: StatementId,
    pub sections: Vec<Section>,
}

impl StatementSchema {
    pub fn section(&self, section_id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id == section_id)
    }

    pub fn find_item(&self, item_id: &str) -> Option<(&Section, &LineItem)> {
        for section in &self.sections {
            if let Some(item) = section.items.iter().find(|i| i.id == item_id) {
                return Some((section, item));
            }
        }
        None
    }

    pub fn catch_all_section(&self) -> &Section {
        self.sections
            .iter()
            .find(|s| s.catch_all)
            .expect("catalog validation guarantees a catch-all section")
    }

    pub fn validate(&self) -> Result<()> {
        let name = self.statement.display_name();
        let defect = |details: String| StatementLayoutError::SchemaDefect {
            statement: name.to_string(),
            details,
        };

        let catch_all_count = self.sections.iter().filter(|s| s.catch_all).count();
        if catch_all_count != 1 {
            return Err(defect(format!(
                "expected exactly one catch-all section, found {}",
                catch_all_count
            )));
        }

        let mut prev_section_order = None;
        for section in &self.sections {
            if prev_section_order.is_some_and(|prev| section.order_index <= prev) {
                return Err(defect(format!(
                    "section '{}' breaks strict section ordering",
                    section.id
                )));
            }
            prev_section_order = Some(section.order_index);

            if section.catch_all && !section.items.is_empty() {
                return Err(defect(format!(
                    "catch-all section '{}' must not declare line items",
                    section.id
                )));
            }

            let mut prev_item_order = None;
            for item in &section.items {
                if prev_item_order.is_some_and(|prev| item.order_index <= prev) {
                    return Err(defect(format!(
                        "item '{}' breaks strict row ordering in section '{}'",
                        item.id, section.id
                    )));
                }
                prev_item_order = Some(item.order_index);
            }
        }

        let mut seen_sections = std::collections::HashSet::new();
        for section in &self.sections {
            if !seen_sections.insert(section.id.as_str()) {
                return Err(defect(format!("duplicate section id '{}'", section.id)));
            }
        }

        let mut seen_items = std::collections::HashSet::new();
        for section in &self.sections {
            for item in &section.items {
                if !seen_items.insert(item.id.as_str()) {
                    return Err(defect(format!("duplicate line item id '{}'", item.id)));
                }
            }
        }

        for section in &self.sections {
            for item in &section.items {
                let Some(formula) = &item.formula else {
                    continue;
                };
                for part in formula {
                    match part {
                        Constituent::Line(id) => {
                            if self.find_item(id).is_none() {
                                return Err(StatementLayoutError::UnknownConstituent {
                                    subtotal: item.id.clone(),
                                    constituent: id.clone(),
                                });
                            }
                        }
                        Constituent::SectionOther(section_id) => {
                            if self.section(section_id).is_none() {
                                return Err(StatementLayoutError::UnknownConstituent {
                                    subtotal: item.id.clone(),
                                    constituent: format!("{}.other", section_id),
                                });
                            }
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    pub income: StatementSchema,
    pub balance: StatementSchema,
    pub cash_flow: StatementSchema,
}

impl Catalog {
    pub fn schema(&self, statement: StatementId) -> &StatementSchema {
        match statement {
            StatementId::Income => &self.income,
            StatementId::Balance => &self.balance,
            StatementId::CashFlow => &self.cash_flow,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.income.validate()?;
        self.balance.validate()?;
        self.cash_flow.validate()?;
        Ok(())
    }

    fn build() -> Self {
        Self {
            income: income_schema(),
            balance: balance_schema(),
            cash_flow: cash_flow_schema(),
        }
    }
}

/// The process-wide canonical statement structure. Built once on first
/// access and shared by read-only reference across statement pipelines.
pub fn catalog() -> &'static Catalog {
    static CATALOG: OnceLock<Catalog> = OnceLock::new();
    CATALOG.get_or_init(Catalog::build)
}

fn leaf(id: &str, display_name: &str, order_index: u32) -> LineItem {
    LineItem {
        id: id.to_string(),
        display_name: display_name.to_string(),
        order_index,
        always_shown: false,
        formula: None,
    }
}

fn top_line(id: &str, display_name: &str, order_index: u32) -> LineItem {
    LineItem {
        always_shown: true,
        ..leaf(id, display_name, order_index)
    }
}

fn subtotal(id: &str, display_name: &str, order_index: u32, parts: &[Constituent]) -> LineItem {
    LineItem {
        id: id.to_string(),
        display_name: display_name.to_string(),
        order_index,
        always_shown: true,
        formula: Some(parts.to_vec()),
    }
}

fn line(id: &str) -> Constituent {
    Constituent::Line(id.to_string())
}

fn section(id: &str, display_name: &str, order_index: u32, items: Vec<LineItem>) -> Section {
    Section {
        id: id.to_string(),
        display_name: display_name.to_string(),
        order_index,
        cashflow_group: None,
        catch_all: false,
        items,
    }
}

fn cf_section(
    id: &str,
    display_name: &str,
    order_index: u32,
    group: CashflowGroup,
    items: Vec<LineItem>,
) -> Section {
    Section {
        cashflow_group: Some(group),
        ..section(id, display_name, order_index, items)
    }
}

fn catch_all_section(id: &str, display_name: &str, order_index: u32) -> Section {
    Section {
        catch_all: true,
        ..section(id, display_name, order_index, Vec::new())
    }
}

fn income_schema() -> StatementSchema {
    StatementSchema {
        statement: StatementId::Income,
        sections: vec![
            section(
                "revenue",
                "Revenue",
                10,
                vec![top_line("revenue", "Revenue", 10)],
            ),
            section(
                "cost_of_revenue",
                "Cost Of Revenue",
                20,
                vec![leaf("cost_of_revenue", "Cost Of Revenue", 10)],
            ),
            section(
                "gross_profit",
                "Gross Profit",
                30,
                vec![subtotal(
                    "gross_profit",
                    "Gross Profit",
                    10,
                    &[line("revenue"), line("cost_of_revenue")],
                )],
            ),
            section(
                "operating_expenses",
                "Operating Expenses",
                40,
                vec![
                    leaf("research_and_development", "Research & Development", 10),
                    leaf(
                        "selling_general_and_admin",
                        "Selling, General & Administrative",
                        20,
                    ),
                    leaf("selling_and_marketing", "Selling & Marketing", 30),
                    leaf("other_operating_expenses", "Other Operating Expenses", 40),
                    subtotal(
                        "total_operating_expenses",
                        "Total Operating Expenses",
                        50,
                        &[
                            line("research_and_development"),
                            line("selling_general_and_admin"),
                            line("selling_and_marketing"),
                            line("other_operating_expenses"),
                        ],
                    ),
                ],
            ),
            section(
                "operating_income",
                "Operating Income",
                50,
                vec![subtotal(
                    "operating_income",
                    "Operating Income",
                    10,
                    &[line("gross_profit"), line("total_operating_expenses")],
                )],
            ),
            section(
                "other_income_expense",
                "Other Income / Expense",
                60,
                vec![
                    leaf("interest_income", "Interest Income", 10),
                    leaf("interest_expense", "Interest Expense", 20),
                    leaf("other_non_operating_income", "Other Non-Operating Income", 30),
                ],
            ),
            section(
                "pretax_income",
                "Pre-Tax Income",
                70,
                vec![subtotal(
                    "pretax_income",
                    "Pre-Tax Income",
                    10,
                    &[
                        line("operating_income"),
                        line("interest_income"),
                        line("interest_expense"),
                        line("other_non_operating_income"),
                    ],
                )],
            ),
            section(
                "taxes",
                "Taxes",
                80,
                vec![leaf("income_tax_expense", "Income Tax Expense", 10)],
            ),
            section(
                "net_income",
                "Net Income",
                90,
                vec![subtotal(
                    "net_income",
                    "Net Income",
                    10,
                    &[line("pretax_income"), line("income_tax_expense")],
                )],
            ),
            section(
                "supplemental",
                "Supplemental",
                100,
                vec![
                    leaf(
                        "depreciation_and_amortization",
                        "Depreciation & Amortization",
                        10,
                    ),
                    subtotal(
                        "ebitda",
                        "EBITDA",
                        20,
                        &[line("operating_income"), line("depreciation_and_amortization")],
                    ),
                    leaf("eps", "EPS", 30),
                    leaf("eps_diluted", "EPS (Diluted)", 40),
                    leaf("weighted_average_shares", "Weighted Average Shares", 50),
                    leaf(
                        "weighted_average_shares_diluted",
                        "Weighted Average Shares (Diluted)",
                        60,
                    ),
                ],
            ),
            catch_all_section("other_income_items", "Other Income Statement Items", 110),
        ],
    }
}

fn balance_schema() -> StatementSchema {
    StatementSchema {
        statement: StatementId::Balance,
        sections: vec![
            section(
                "current_assets",
                "Current Assets",
                10,
                vec![
                    top_line("cash_and_equivalents", "Cash & Equivalents", 10),
                    leaf("short_term_investments", "Short-Term Investments", 20),
                    leaf("net_receivables", "Net Receivables", 30),
                    leaf("inventory", "Inventory", 40),
                    leaf("other_current_assets", "Other Current Assets", 50),
                    subtotal(
                        "total_current_assets",
                        "Total Current Assets",
                        60,
                        &[
                            line("cash_and_equivalents"),
                            line("short_term_investments"),
                            line("net_receivables"),
                            line("inventory"),
                            line("other_current_assets"),
                        ],
                    ),
                ],
            ),
            section(
                "non_current_assets",
                "Non-Current Assets",
                20,
                vec![
                    leaf("property_plant_equipment", "Property, Plant & Equipment", 10),
                    leaf("goodwill", "Goodwill", 20),
                    leaf("intangible_assets", "Intangible Assets", 30),
                    leaf("long_term_investments", "Long-Term Investments", 40),
                    leaf("other_non_current_assets", "Other Non-Current Assets", 50),
                    subtotal(
                        "total_non_current_assets",
                        "Total Non-Current Assets",
                        60,
                        &[
                            line("property_plant_equipment"),
                            line("goodwill"),
                            line("intangible_assets"),
                            line("long_term_investments"),
                            line("other_non_current_assets"),
                        ],
                    ),
                    subtotal(
                        "total_assets",
                        "Total Assets",
                        70,
                        &[line("total_current_assets"), line("total_non_current_assets")],
                    ),
                ],
            ),
            section(
                "current_liabilities",
                "Current Liabilities",
                30,
                vec![
                    leaf("accounts_payable", "Accounts Payable", 10),
                    leaf("short_term_debt", "Short-Term Debt", 20),
                    leaf("deferred_revenue", "Deferred Revenue", 30),
                    leaf("other_current_liabilities", "Other Current Liabilities", 40),
                    subtotal(
                        "total_current_liabilities",
                        "Total Current Liabilities",
                        50,
                        &[
                            line("accounts_payable"),
                            line("short_term_debt"),
                            line("deferred_revenue"),
                            line("other_current_liabilities"),
                        ],
                    ),
                ],
            ),
            section(
                "non_current_liabilities",
                "Non-Current Liabilities",
                40,
                vec![
                    leaf("long_term_debt", "Long-Term Debt", 10),
                    leaf("deferred_tax_liabilities", "Deferred Tax Liabilities", 20),
                    leaf(
                        "other_non_current_liabilities",
                        "Other Non-Current Liabilities",
                        30,
                    ),
                    subtotal(
                        "total_non_current_liabilities",
                        "Total Non-Current Liabilities",
                        40,
                        &[
                            line("long_term_debt"),
                            line("deferred_tax_liabilities"),
                            line("other_non_current_liabilities"),
                        ],
                    ),
                    subtotal(
                        "total_liabilities",
                        "Total Liabilities",
                        50,
                        &[
                            line("total_current_liabilities"),
                            line("total_non_current_liabilities"),
                        ],
                    ),
                ],
            ),
            section(
                "equity",
                "Equity",
                50,
                vec![
                    leaf("common_stock", "Common Stock", 10),
                    leaf("retained_earnings", "Retained Earnings", 20),
                    leaf("accumulated_oci", "Accumulated OCI", 30),
                    leaf("treasury_stock", "Treasury Stock", 40),
                    subtotal(
                        "total_equity",
                        "Total Equity",
                        50,
                        &[
                            line("common_stock"),
                            line("retained_earnings"),
                            line("accumulated_oci"),
                            line("treasury_stock"),
                        ],
                    ),
                ],
            ),
            catch_all_section("other_balance_items", "Other Balance Sheet Items", 60),
        ],
    }
}

fn cash_flow_schema() -> StatementSchema {
    StatementSchema {
        statement: StatementId::CashFlow,
        sections: vec![
            cf_section(
                "operating_activities",
                "Cash Flow From Operations",
                10,
                CashflowGroup::Cfo,
                vec![
                    top_line("net_income", "Net Income", 10),
                    leaf(
                        "depreciation_and_amortization",
                        "Depreciation & Amortization",
                        20,
                    ),
                    leaf("stock_based_compensation", "Stock-Based Compensation", 30),
                    leaf("deferred_income_tax", "Deferred Income Tax", 40),
                    leaf("change_in_working_capital", "Change In Working Capital", 50),
                    leaf("other_non_cash_items", "Other Non-Cash Items", 60),
                    subtotal(
                        "net_cash_from_operations",
                        "Net Cash From Operating Activities",
                        70,
                        &[
                            line("net_income"),
                            line("depreciation_and_amortization"),
                            line("stock_based_compensation"),
                            line("deferred_income_tax"),
                            line("change_in_working_capital"),
                            line("other_non_cash_items"),
                        ],
                    ),
                ],
            ),
            cf_section(
                "investing_activities",
                "Cash Flow From Investing",
                20,
                CashflowGroup::Cfi,
                vec![
                    leaf("capital_expenditure", "Capital Expenditure", 10),
                    leaf("acquisitions_net", "Acquisitions (Net)", 20),
                    leaf("purchases_of_investments", "Purchases Of Investments", 30),
                    leaf("sales_of_investments", "Sales Of Investments", 40),
                    leaf("other_investing_activities", "Other Investing Activities", 50),
                    subtotal(
                        "net_cash_from_investing",
                        "Net Cash From Investing Activities",
                        60,
                        &[
                            line("capital_expenditure"),
                            line("acquisitions_net"),
                            line("purchases_of_investments"),
                            line("sales_of_investments"),
                            line("other_investing_activities"),
                        ],
                    ),
                ],
            ),
            cf_section(
                "financing_activities",
                "Cash Flow From Financing",
                30,
                CashflowGroup::Cff,
                vec![
                    leaf("debt_repayment", "Debt Repayment", 10),
                    leaf("common_stock_issued", "Common Stock Issued", 20),
                    leaf("common_stock_repurchased", "Common Stock Repurchased", 30),
                    leaf("dividends_paid", "Dividends Paid", 40),
                    leaf("other_financing_activities", "Other Financing Activities", 50),
                    subtotal(
                        "net_cash_from_financing",
                        "Net Cash From Financing Activities",
                        60,
                        &[
                            line("debt_repayment"),
                            line("common_stock_issued"),
                            line("common_stock_repurchased"),
                            line("dividends_paid"),
                            line("other_financing_activities"),
                        ],
                    ),
                ],
            ),
            section(
                "cash_reconciliation",
                "Cash Reconciliation",
                40,
                vec![
                    leaf("effect_of_forex_on_cash", "Effect Of Forex On Cash", 10),
                    subtotal(
                        "net_change_in_cash",
                        "Net Change In Cash",
                        20,
                        &[
                            line("net_cash_from_operations"),
                            line("net_cash_from_investing"),
                            line("net_cash_from_financing"),
                            line("effect_of_forex_on_cash"),
                            Constituent::SectionOther("other_cash_flow_items".to_string()),
                        ],
                    ),
                    leaf(
                        "cash_at_beginning_of_period",
                        "Cash At Beginning Of Period",
                        30,
                    ),
                    leaf("cash_at_end_of_period", "Cash At End Of Period", 40),
                ],
            ),
            catch_all_section("other_cash_flow_items", "Other Cash Flow Items", 50),
        ],
    }
}
