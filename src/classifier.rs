use crate::error::{Result, StatementLayoutError};
use crate::schema::{catalog, StatementId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Outcome of classifying one raw field name. Unclassified is a valid
/// result, not an error; the aggregator routes it to an Other row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldMatch {
    Line(String),
    Unclassified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub field_name: String,
    pub result: FieldMatch,
    pub statement: StatementId,
    pub section_id: String,
}

/// Lowercases and strips everything that is not a letter or digit, so
/// vendor casing, spacing and punctuation cannot defeat alias matching.
pub fn normalize_field_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// Maps one raw field name onto a canonical line item of `statement`.
///
/// Exact alias lookup wins; otherwise the statement's ordered keyword
/// heuristics are tried (a heuristic fires when every keyword occurs in
/// the normalized name). Heuristics never cross statements. Pure function
/// of its inputs and the static rule tables.
pub fn classify(field_name: &str, statement: StatementId) -> Classification {
    let normalized = normalize_field_name(field_name);
    let schema = catalog().schema(statement);
    let rules = ruleset(statement);

    let target = rules
        .aliases
        .get(normalized.as_str())
        .copied()
        .or_else(|| {
            rules
                .heuristics
                .iter()
                .find(|h| h.keywords.iter().all(|kw| normalized.contains(kw)))
                .map(|h| h.target)
        });

    match target {
        Some(id) => {
            let (section, _) = schema
                .find_item(id)
                .expect("rule tables are audited against the catalog");
            Classification {
                field_name: field_name.to_string(),
                result: FieldMatch::Line(id.to_string()),
                statement,
                section_id: section.id.clone(),
            }
        }
        None => Classification {
            field_name: field_name.to_string(),
            result: FieldMatch::Unclassified,
            statement,
            section_id: schema.catch_all_section().id.clone(),
        },
    }
}

/// Audits the static rule tables against the catalog: every alias target
/// must exist, and heuristic targets must exist and must not be subtotal
/// rows (a fuzzy match must never cause a reported value to be discarded
/// by subtotal recomputation).
pub fn validate_rules() -> Result<()> {
    for statement in StatementId::all() {
        let schema = catalog().schema(statement);
        let rules = ruleset(statement);

        for (alias, target) in &rules.aliases {
            if schema.find_item(target).is_none() {
                return Err(StatementLayoutError::SchemaDefect {
                    statement: statement.display_name().to_string(),
                    details: format!("alias '{}' targets unknown line item '{}'", alias, target),
                });
            }
        }

        for heuristic in rules.heuristics {
            match schema.find_item(heuristic.target) {
                None => {
                    return Err(StatementLayoutError::SchemaDefect {
                        statement: statement.display_name().to_string(),
                        details: format!(
                            "heuristic {:?} targets unknown line item '{}'",
                            heuristic.keywords, heuristic.target
                        ),
                    })
                }
                Some((_, item)) if item.is_subtotal() => {
                    return Err(StatementLayoutError::SchemaDefect {
                        statement: statement.display_name().to_string(),
                        details: format!(
                            "heuristic {:?} targets subtotal row '{}'",
                            heuristic.keywords, heuristic.target
                        ),
                    })
                }
                Some(_) => {}
            }
        }
    }
    Ok(())
}

struct Ruleset {
    aliases: HashMap<&'static str, &'static str>,
    heuristics: &'static [Heuristic],
}

struct Heuristic {
    keywords: &'static [&'static str],
    target: &'static str,
}

fn ruleset(statement: StatementId) -> &'static Ruleset {
    static RULES: OnceLock<[Ruleset; 3]> = OnceLock::new();
    let rules = RULES.get_or_init(|| {
        [
            Ruleset {
                aliases: INCOME_ALIASES.iter().copied().collect(),
                heuristics: INCOME_HEURISTICS,
            },
            Ruleset {
                aliases: BALANCE_ALIASES.iter().copied().collect(),
                heuristics: BALANCE_HEURISTICS,
            },
            Ruleset {
                aliases: CASH_FLOW_ALIASES.iter().copied().collect(),
                heuristics: CASH_FLOW_HEURISTICS,
            },
        ]
    });
    match statement {
        StatementId::Income => &rules[0],
        StatementId::Balance => &rules[1],
        StatementId::CashFlow => &rules[2],
    }
}

// Alias keys are pre-normalized (lowercase, alphanumeric only). Vendor
// totals alias onto the matching subtotal rows, where recomputation
// replaces them.
const INCOME_ALIASES: &[(&str, &str)] = &[
    ("revenue", "revenue"),
    ("totalrevenue", "revenue"),
    ("netsales", "revenue"),
    ("totalsales", "revenue"),
    ("sales", "revenue"),
    ("costofrevenue", "cost_of_revenue"),
    ("costofgoodssold", "cost_of_revenue"),
    ("costofsales", "cost_of_revenue"),
    ("cogs", "cost_of_revenue"),
    ("cogstotal", "cost_of_revenue"),
    ("grossprofit", "gross_profit"),
    ("researchanddevelopmentexpenses", "research_and_development"),
    ("researchanddevelopment", "research_and_development"),
    (
        "sellinggeneralandadministrativeexpenses",
        "selling_general_and_admin",
    ),
    (
        "generalandadministrativeexpenses",
        "selling_general_and_admin",
    ),
    ("sgaexpense", "selling_general_and_admin"),
    ("sellingandmarketingexpenses", "selling_and_marketing"),
    ("otheroperatingexpenses", "other_operating_expenses"),
    ("otherexpenses", "other_operating_expenses"),
    ("operatingexpenses", "total_operating_expenses"),
    ("totaloperatingexpenses", "total_operating_expenses"),
    ("costandexpenses", "total_operating_expenses"),
    ("operatingincome", "operating_income"),
    ("ebit", "operating_income"),
    ("interestincome", "interest_income"),
    ("netinterestincome", "interest_income"),
    ("interestexpense", "interest_expense"),
    ("totalotherincomeexpensesnet", "other_non_operating_income"),
    ("otherincome", "other_non_operating_income"),
    (
        "nonoperatingincomeexcludinginterest",
        "other_non_operating_income",
    ),
    ("incomebeforetax", "pretax_income"),
    ("pretaxincome", "pretax_income"),
    ("incometaxexpense", "income_tax_expense"),
    ("netincome", "net_income"),
    ("netearnings", "net_income"),
    ("depreciationandamortization", "depreciation_and_amortization"),
    ("ebitda", "ebitda"),
    ("eps", "eps"),
    ("earningspershare", "eps"),
    ("epsdiluted", "eps_diluted"),
    ("dilutedeps", "eps_diluted"),
    ("weightedaverageshsout", "weighted_average_shares"),
    ("weightedaveragesharesoutstanding", "weighted_average_shares"),
    ("weightedaverageshsoutdil", "weighted_average_shares_diluted"),
    (
        "weightedaveragesharesoutstandingdiluted",
        "weighted_average_shares_diluted",
    ),
];

const INCOME_HEURISTICS: &[Heuristic] = &[
    Heuristic {
        keywords: &["depreciation", "amortization"],
        target: "depreciation_and_amortization",
    },
    Heuristic {
        keywords: &["research", "development"],
        target: "research_and_development",
    },
    Heuristic {
        keywords: &["selling", "marketing"],
        target: "selling_and_marketing",
    },
    Heuristic {
        keywords: &["general", "administrative"],
        target: "selling_general_and_admin",
    },
    Heuristic {
        keywords: &["cost", "goods"],
        target: "cost_of_revenue",
    },
    Heuristic {
        keywords: &["cost", "revenue"],
        target: "cost_of_revenue",
    },
    Heuristic {
        keywords: &["interest", "expense"],
        target: "interest_expense",
    },
    Heuristic {
        keywords: &["interest", "income"],
        target: "interest_income",
    },
    Heuristic {
        keywords: &["revenue"],
        target: "revenue",
    },
    Heuristic {
        keywords: &["tax"],
        target: "income_tax_expense",
    },
];

const BALANCE_ALIASES: &[(&str, &str)] = &[
    ("cashandcashequivalents", "cash_and_equivalents"),
    ("cashandequivalents", "cash_and_equivalents"),
    ("shortterminvestments", "short_term_investments"),
    ("netreceivables", "net_receivables"),
    ("accountsreceivables", "net_receivables"),
    ("accountsreceivable", "net_receivables"),
    ("receivables", "net_receivables"),
    ("inventory", "inventory"),
    ("inventories", "inventory"),
    ("othercurrentassets", "other_current_assets"),
    ("prepaidexpenses", "other_current_assets"),
    ("totalcurrentassets", "total_current_assets"),
    ("propertyplantequipmentnet", "property_plant_equipment"),
    ("propertyplantandequipmentnet", "property_plant_equipment"),
    ("propertyplantandequipment", "property_plant_equipment"),
    ("netppe", "property_plant_equipment"),
    ("goodwill", "goodwill"),
    ("intangibleassets", "intangible_assets"),
    ("goodwillandintangibleassets", "intangible_assets"),
    ("longterminvestments", "long_term_investments"),
    ("othernoncurrentassets", "other_non_current_assets"),
    ("otherassets", "other_non_current_assets"),
    ("totalnoncurrentassets", "total_non_current_assets"),
    ("totalassets", "total_assets"),
    ("accountspayable", "accounts_payable"),
    ("accountpayables", "accounts_payable"),
    ("shorttermdebt", "short_term_debt"),
    ("currentportionoflongtermdebt", "short_term_debt"),
    ("deferredrevenue", "deferred_revenue"),
    ("othercurrentliabilities", "other_current_liabilities"),
    ("accruedexpenses", "other_current_liabilities"),
    ("taxpayables", "other_current_liabilities"),
    ("totalcurrentliabilities", "total_current_liabilities"),
    ("longtermdebt", "long_term_debt"),
    ("deferredtaxliabilities", "deferred_tax_liabilities"),
    ("deferredtaxliabilitiesnoncurrent", "deferred_tax_liabilities"),
    (
        "othernoncurrentliabilities",
        "other_non_current_liabilities",
    ),
    ("otherliabilities", "other_non_current_liabilities"),
    ("capitalleaseobligations", "other_non_current_liabilities"),
    ("totalnoncurrentliabilities", "total_non_current_liabilities"),
    ("totalliabilities", "total_liabilities"),
    ("commonstock", "common_stock"),
    ("additionalpaidincapital", "common_stock"),
    ("retainedearnings", "retained_earnings"),
    (
        "accumulatedothercomprehensiveincomeloss",
        "accumulated_oci",
    ),
    ("accumulatedothercomprehensiveincome", "accumulated_oci"),
    ("treasurystock", "treasury_stock"),
    ("totalequity", "total_equity"),
    ("totalstockholdersequity", "total_equity"),
    ("totalshareholdersequity", "total_equity"),
];

const BALANCE_HEURISTICS: &[Heuristic] = &[
    Heuristic {
        keywords: &["deferredtax", "asset"],
        target: "other_non_current_assets",
    },
    Heuristic {
        keywords: &["deferredtax", "liabilit"],
        target: "deferred_tax_liabilities",
    },
    Heuristic {
        keywords: &["property", "equipment"],
        target: "property_plant_equipment",
    },
    Heuristic {
        keywords: &["receivable"],
        target: "net_receivables",
    },
    Heuristic {
        keywords: &["inventor"],
        target: "inventory",
    },
    Heuristic {
        keywords: &["prepaid"],
        target: "other_current_assets",
    },
    Heuristic {
        keywords: &["goodwill"],
        target: "goodwill",
    },
    Heuristic {
        keywords: &["intangible"],
        target: "intangible_assets",
    },
    Heuristic {
        keywords: &["cash"],
        target: "cash_and_equivalents",
    },
    Heuristic {
        keywords: &["payable"],
        target: "accounts_payable",
    },
    Heuristic {
        keywords: &["accrued"],
        target: "other_current_liabilities",
    },
    Heuristic {
        keywords: &["longtermdebt"],
        target: "long_term_debt",
    },
    Heuristic {
        keywords: &["lease", "liabilit"],
        target: "other_non_current_liabilities",
    },
    Heuristic {
        keywords: &["pension"],
        target: "other_non_current_liabilities",
    },
    Heuristic {
        keywords: &["retained"],
        target: "retained_earnings",
    },
    Heuristic {
        keywords: &["treasury"],
        target: "treasury_stock",
    },
    Heuristic {
        keywords: &["paidincapital"],
        target: "common_stock",
    },
    Heuristic {
        keywords: &["comprehensiveincome"],
        target: "accumulated_oci",
    },
    Heuristic {
        keywords: &["investment"],
        target: "long_term_investments",
    },
];

const CASH_FLOW_ALIASES: &[(&str, &str)] = &[
    ("netincome", "net_income"),
    ("depreciationandamortization", "depreciation_and_amortization"),
    ("stockbasedcompensation", "stock_based_compensation"),
    ("deferredincometax", "deferred_income_tax"),
    ("changeinworkingcapital", "change_in_working_capital"),
    ("changesinworkingcapital", "change_in_working_capital"),
    ("otherworkingcapital", "change_in_working_capital"),
    ("accountsreceivables", "change_in_working_capital"),
    ("inventory", "change_in_working_capital"),
    ("accountspayables", "change_in_working_capital"),
    ("othernoncashitems", "other_non_cash_items"),
    (
        "netcashprovidedbyoperatingactivities",
        "net_cash_from_operations",
    ),
    ("operatingcashflow", "net_cash_from_operations"),
    ("cashfromoperations", "net_cash_from_operations"),
    ("capitalexpenditure", "capital_expenditure"),
    ("capex", "capital_expenditure"),
    (
        "investmentsinpropertyplantandequipment",
        "capital_expenditure",
    ),
    ("acquisitionsnet", "acquisitions_net"),
    ("netacquisitions", "acquisitions_net"),
    ("purchasesofinvestments", "purchases_of_investments"),
    ("salesmaturitiesofinvestments", "sales_of_investments"),
    ("salesofinvestments", "sales_of_investments"),
    // FMP ships this field name with the typo
    ("otherinvestingactivites", "other_investing_activities"),
    ("otherinvestingactivities", "other_investing_activities"),
    (
        "netcashusedforinvestingactivites",
        "net_cash_from_investing",
    ),
    (
        "netcashprovidedbyinvestingactivities",
        "net_cash_from_investing",
    ),
    ("investingcashflow", "net_cash_from_investing"),
    ("debtrepayment", "debt_repayment"),
    ("netdebtissuance", "debt_repayment"),
    ("issuanceofdebt", "debt_repayment"),
    ("repaymentofdebt", "debt_repayment"),
    ("commonstockissued", "common_stock_issued"),
    ("issuanceofcommonstock", "common_stock_issued"),
    ("commonstockrepurchased", "common_stock_repurchased"),
    ("repurchaseofcommonstock", "common_stock_repurchased"),
    ("dividendspaid", "dividends_paid"),
    ("commondividendspaid", "dividends_paid"),
    ("otherfinancingactivites", "other_financing_activities"),
    ("otherfinancingactivities", "other_financing_activities"),
    (
        "netcashusedprovidedbyfinancingactivities",
        "net_cash_from_financing",
    ),
    (
        "netcashprovidedbyfinancingactivities",
        "net_cash_from_financing",
    ),
    ("financingcashflow", "net_cash_from_financing"),
    ("effectofforexchangesoncash", "effect_of_forex_on_cash"),
    ("netchangeincash", "net_change_in_cash"),
    ("cashatbeginningofperiod", "cash_at_beginning_of_period"),
    ("cashatendofperiod", "cash_at_end_of_period"),
];

const CASH_FLOW_HEURISTICS: &[Heuristic] = &[
    Heuristic {
        keywords: &["depreciation"],
        target: "depreciation_and_amortization",
    },
    Heuristic {
        keywords: &["amortization"],
        target: "depreciation_and_amortization",
    },
    Heuristic {
        keywords: &["stockbased"],
        target: "stock_based_compensation",
    },
    Heuristic {
        keywords: &["sharebased"],
        target: "stock_based_compensation",
    },
    Heuristic {
        keywords: &["workingcapital"],
        target: "change_in_working_capital",
    },
    Heuristic {
        keywords: &["deferredtax"],
        target: "deferred_income_tax",
    },
    Heuristic {
        keywords: &["capitalexpenditure"],
        target: "capital_expenditure",
    },
    Heuristic {
        keywords: &["acquisition"],
        target: "acquisitions_net",
    },
    Heuristic {
        keywords: &["purchase", "investment"],
        target: "purchases_of_investments",
    },
    Heuristic {
        keywords: &["sale", "investment"],
        target: "sales_of_investments",
    },
    Heuristic {
        keywords: &["dividend"],
        target: "dividends_paid",
    },
    Heuristic {
        keywords: &["repurchase"],
        target: "common_stock_repurchased",
    },
    Heuristic {
        keywords: &["buyback"],
        target: "common_stock_repurchased",
    },
    Heuristic {
        keywords: &["repayment"],
        target: "debt_repayment",
    },
    Heuristic {
        keywords: &["borrow"],
        target: "debt_repayment",
    },
    Heuristic {
        keywords: &["forex"],
        target: "effect_of_forex_on_cash",
    },
    Heuristic {
        keywords: &["exchangerate"],
        target: "effect_of_forex_on_cash",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_field_name() {
        assert_eq!(normalize_field_name("Cost of Revenue"), "costofrevenue");
        assert_eq!(normalize_field_name("cogs_total"), "cogstotal");
        assert_eq!(normalize_field_name("  SG&A Expense "), "sgaexpense");
    }

    #[test]
    fn test_exact_alias_match() {
        let c = classify("costOfRevenue", StatementId::Income);
        assert_eq!(c.result, FieldMatch::Line("cost_of_revenue".to_string()));
        assert_eq!(c.section_id, "cost_of_revenue");

        let c = classify("cogs_total", StatementId::Income);
        assert_eq!(c.result, FieldMatch::Line("cost_of_revenue".to_string()));
    }

    #[test]
    fn test_vendor_total_aliases_to_subtotal() {
        let c = classify("grossProfit", StatementId::Income);
        assert_eq!(c.result, FieldMatch::Line("gross_profit".to_string()));

        let c = classify("totalAssets", StatementId::Balance);
        assert_eq!(c.result, FieldMatch::Line("total_assets".to_string()));
    }

    #[test]
    fn test_keyword_heuristic() {
        // Not in the alias table; both keywords must be present
        let c = classify(
            "depreciationAndAmortizationOfIntangibles",
            StatementId::Income,
        );
        assert_eq!(
            c.result,
            FieldMatch::Line("depreciation_and_amortization".to_string())
        );

        let c = classify("provisionForIncomeTaxes", StatementId::Income);
        assert_eq!(c.result, FieldMatch::Line("income_tax_expense".to_string()));
    }

    #[test]
    fn test_heuristics_never_cross_statements() {
        // An income-statement-only name under the cash flow statement
        // must not resolve through income rules.
        let c = classify("grossProfit", StatementId::CashFlow);
        assert_eq!(c.result, FieldMatch::Unclassified);
        assert_eq!(c.section_id, "other_cash_flow_items");
    }

    #[test]
    fn test_unclassified_targets_catch_all() {
        let c = classify("weirdVendorSpecificCharge", StatementId::Income);
        assert_eq!(c.result, FieldMatch::Unclassified);
        assert_eq!(c.section_id, "other_income_items");
    }

    #[test]
    fn test_classification_is_idempotent() {
        let a = classify("weightedAverageShsOut", StatementId::Income);
        let b = classify("weightedAverageShsOut", StatementId::Income);
        assert_eq!(a, b);
    }

    #[test]
    fn test_rule_tables_audit_clean() {
        validate_rules().unwrap();
    }

    #[test]
    fn test_working_capital_components_merge() {
        for field in ["accountsReceivables", "inventory", "accountsPayables"] {
            let c = classify(field, StatementId::CashFlow);
            assert_eq!(
                c.result,
                FieldMatch::Line("change_in_working_capital".to_string()),
                "{} should fold into working capital",
                field
            );
        }
    }
}
