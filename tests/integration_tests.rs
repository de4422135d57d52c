use serde_json::json;
use statement_layout_builder::*;

fn visa_like_financials() -> CompanyFinancials {
    let income = parse_vendor_payload(&json!([
        {
            "symbol": "V",
            "date": "2022-09-30",
            "fiscalYear": "2022",
            "period": "FY",
            "reportedCurrency": "USD",
            "revenue": 29_310_000_000.0,
            "costOfRevenue": -5_930_000_000.0,
            "researchAndDevelopmentExpenses": -900_000_000.0,
            "sellingGeneralAndAdministrativeExpenses": -1_300_000_000.0,
            "interestExpense": -540_000_000.0,
            "incomeTaxExpense": -3_900_000_000.0,
            "grossProfit": 23_380_000_000.0,
            "link": "https://example.test/v-2022-10-K"
        },
        {
            "symbol": "V",
            "date": "2023-09-30",
            "fiscalYear": "2023",
            "period": "FY",
            "reportedCurrency": "USD",
            "revenue": 32_653_000_000.0,
            // renamed by the vendor this year, still cost of revenue
            "cogs_total": -6_930_000_000.0,
            "researchAndDevelopmentExpenses": -1_000_000_000.0,
            "sellingGeneralAndAdministrativeExpenses": -1_500_000_000.0,
            "interestExpense": -640_000_000.0,
            "incomeTaxExpense": -4_200_000_000.0,
            "clientIncentivesAccrual": -250_000_000.0,
            "grossProfit": 1.0
        }
    ]))
    .unwrap();

    let balance = parse_vendor_payload(&json!([
        {
            "date": "2022-09-30",
            "fiscalYear": 2022,
            "period": "FY",
            "cashAndCashEquivalents": 15_700_000_000.0,
            "shortTermInvestments": 3_800_000_000.0,
            "netReceivables": 2_000_000_000.0,
            "goodwill": 17_800_000_000.0,
            "longTermDebt": 20_200_000_000.0,
            "retainedEarnings": 16_100_000_000.0,
            "totalAssets": 85_500_000_000.0
        },
        {
            "date": "2023-09-30",
            "fiscalYear": 2023,
            "period": "FY",
            "cashAndCashEquivalents": 16_300_000_000.0,
            "shortTermInvestments": 5_400_000_000.0,
            "netReceivables": 2_300_000_000.0,
            "goodwill": 17_900_000_000.0,
            "longTermDebt": 20_500_000_000.0,
            "retainedEarnings": 18_000_000_000.0,
            "totalAssets": 90_500_000_000.0
        }
    ]))
    .unwrap();

    let cash_flow = parse_vendor_payload(&json!([
        {
            "date": "2022-09-30",
            "fiscalYear": 2022,
            "period": "FY",
            "netIncome": 14_960_000_000.0,
            "depreciationAndAmortization": 860_000_000.0,
            "stockBasedCompensation": 600_000_000.0,
            "capitalExpenditure": -970_000_000.0,
            "dividendsPaid": -3_200_000_000.0,
            "commonStockRepurchased": -11_600_000_000.0
        },
        {
            "date": "2023-09-30",
            "fiscalYear": 2023,
            "period": "FY",
            "netIncome": 17_270_000_000.0,
            "depreciationAndAmortization": 940_000_000.0,
            "stockBasedCompensation": 770_000_000.0,
            "capitalExpenditure": -1_060_000_000.0,
            "dividendsPaid": -3_750_000_000.0,
            "commonStockRepurchased": -12_100_000_000.0,
            "settlementGuaranteeAdjustment": 90_000_000.0
        }
    ]))
    .unwrap();

    CompanyFinancials {
        company: "Visa Inc".to_string(),
        income,
        balance,
        cash_flow,
    }
}

fn find_row<'m>(matrix: &'m PivotMatrix, label: &str) -> &'m PivotRow {
    matrix
        .rows
        .iter()
        .find(|r| r.label == label && !r.is_header())
        .unwrap_or_else(|| panic!("row '{}' missing from {:?}", label, matrix.statement))
}

#[test]
fn test_comprehensive_three_statement_layout() {
    let financials = visa_like_financials();
    let options = LayoutOptions {
        scale_factor: 1_000_000.0,
        ..LayoutOptions::default()
    };

    let layout =
        StatementLayoutProcessor::process_with_verification(&financials, &options, 0.01).unwrap();

    assert_eq!(layout.income.years, vec![2022, 2023]);

    // Vendor renames merge onto one canonical row
    let cogs = find_row(&layout.income, "Cost Of Revenue");
    assert_eq!(cogs.values, vec![Some(-5930.0), Some(-6930.0)]);

    // Recomputed gross profit wins over the bogus vendor figure
    let gross = find_row(&layout.income, "Gross Profit");
    assert!(gross.is_subtotal());
    assert_eq!(gross.values, vec![Some(23380.0), Some(25723.0)]);

    // The company-specific field survives in the catch-all row, dense in
    // the year it was not reported
    let other = find_row(&layout.income, "Other Income Statement Items");
    assert!(other.is_other());
    assert_eq!(other.values, vec![Some(0.0), Some(-250.0)]);

    // Balance sheet totals are recomputed, not copied from totalAssets
    let total_assets = find_row(&layout.balance, "Total Assets");
    let expected_2023 = 16_300.0 + 5_400.0 + 2_300.0 + 17_900.0;
    assert_eq!(total_assets.values[1], Some(expected_2023));

    // Unclassified cash flow item flows into the declared net change
    let net_change = find_row(&layout.cash_flow, "Net Change In Cash");
    let expected = 17_270.0 + 940.0 + 770.0 - 1_060.0 - 3_750.0 - 12_100.0 + 90.0;
    assert_eq!(net_change.values[1], Some(expected));
}

#[test]
fn test_section_headers_precede_rows() {
    let financials = visa_like_financials();
    let layout = build_statement_layout(&financials, &LayoutOptions::default()).unwrap();

    let first = &layout.income.rows[0];
    assert!(first.is_header());
    assert_eq!(first.label, "Revenue");
    assert!(first.values.iter().all(|v| v.is_none()));

    // every non-header row sits under the header of its own section
    let mut current_section = None;
    for row in &layout.income.rows {
        if row.is_header() {
            current_section = Some(row.label.clone());
        } else {
            assert_eq!(Some(row.section.clone()), current_section);
        }
    }
}

#[test]
fn test_output_is_idempotent() {
    let financials = visa_like_financials();
    let options = LayoutOptions::default();

    let first = build_statement_layout(&financials, &options).unwrap();
    let second = build_statement_layout(&financials, &options).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn test_row_order_ignores_input_iteration_order() {
    let fields: Vec<(&str, f64)> = vec![
        ("revenue", 1000.0),
        ("incomeTaxExpense", -90.0),
        ("costOfRevenue", -400.0),
        ("interestExpense", -20.0),
        ("oddballFee", -5.0),
    ];

    let forward: RawFieldMap = fields
        .iter()
        .map(|(k, v)| (k.to_string(), *v))
        .collect();
    let reversed: RawFieldMap = fields
        .iter()
        .rev()
        .map(|(k, v)| (k.to_string(), *v))
        .collect();

    let mut raw_a = RawStatementFields::new();
    raw_a.insert(2023, forward);
    let mut raw_b = RawStatementFields::new();
    raw_b.insert(2023, reversed);

    let options = LayoutOptions::default();
    let a = build_statement_matrix(StatementId::Income, &raw_a, &options).unwrap();
    let b = build_statement_matrix(StatementId::Income, &raw_b, &options).unwrap();

    assert_eq!(a, b);
}

#[test]
fn test_conservation_against_hand_summed_raw() {
    let financials = visa_like_financials();
    let schema_rows = Aggregator::new(catalog().schema(StatementId::CashFlow))
        .aggregate(&financials.cash_flow)
        .unwrap();

    // all 2023 cash flow fields are leaf-classified, so the plain raw sum
    // must be conserved
    let raw_sum: f64 = financials.cash_flow[&2023].values().sum();
    let row_sum: f64 = schema_rows
        .iter()
        .filter(|r| !r.is_subtotal)
        .map(|r| r.values[&2023])
        .sum();
    assert!((raw_sum - row_sum).abs() < 0.01);

    verify_conservation(StatementId::CashFlow, &financials.cash_flow, &schema_rows, 0.01).unwrap();
}

#[test]
fn test_other_row_absent_when_all_fields_classify() {
    let financials = visa_like_financials();
    let layout = build_statement_layout(&financials, &LayoutOptions::default()).unwrap();

    // the balance payload is fully canonical; no Other row may appear
    assert!(layout.balance.rows.iter().all(|r| !r.is_other()));
    // income carries one vendor-specific charge
    assert!(layout.income.rows.iter().any(|r| r.is_other()));
}

#[test]
fn test_descending_years_with_limit() {
    let financials = visa_like_financials();
    let options = LayoutOptions {
        year_order: YearOrder::Descending,
        max_years: Some(1),
        ..LayoutOptions::default()
    };

    let layout = build_statement_layout(&financials, &options).unwrap();
    assert_eq!(layout.income.years, vec![2023]);

    let revenue = find_row(&layout.income, "Revenue");
    assert_eq!(revenue.values, vec![Some(32_653_000.0)]);
}

#[test]
fn test_thousands_scaling_rounds_like_reference() {
    let mut raw = RawStatementFields::new();
    raw.insert(
        2023,
        [("revenue".to_string(), 1_234_567.0)].into_iter().collect(),
    );

    let matrix =
        build_statement_matrix(StatementId::Income, &raw, &LayoutOptions::default()).unwrap();
    assert_eq!(find_row(&matrix, "Revenue").values, vec![Some(1235.0)]);
}

#[test]
fn test_layout_serializes_for_renderer() {
    let financials = visa_like_financials();
    let layout = build_statement_layout(&financials, &LayoutOptions::default()).unwrap();

    let encoded = serde_json::to_string(&layout).unwrap();
    let decoded: FinancialLayout = serde_json::from_str(&encoded).unwrap();
    assert_eq!(layout, decoded);
    assert_eq!(decoded.cash_flow.statement, StatementId::CashFlow);
}
