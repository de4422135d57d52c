use crate::error::{Result, StatementLayoutError};
use crate::{FiscalYear, RawStatementFields};
use log::debug;
use serde_json::{Map, Value};

/// Non-numeric bookkeeping columns vendors attach to every statement row.
const METADATA_FIELDS: &[&str] = &[
    "symbol",
    "reportedCurrency",
    "cik",
    "fillingDate",
    "filingDate",
    "acceptedDate",
    "calendarYear",
    "fiscalYear",
    "period",
    "date",
    "link",
    "finalLink",
];

/// Converts a vendor statement payload (a JSON array of per-year objects,
/// FMP style) into the per-year raw field mapping the core consumes.
///
/// Keeps annual rows only when a `period` discriminator is present,
/// resolves the fiscal year from `fiscalYear`/`calendarYear`/`date`, and
/// drops metadata columns. Null or non-numeric values are treated as
/// absent, never as zero.
pub fn parse_vendor_payload(payload: &Value) -> Result<RawStatementFields> {
    let entries = payload.as_array().ok_or_else(|| {
        // FMP signals errors as a JSON object instead of the row array
        StatementLayoutError::MalformedPayload(format!(
            "expected an array of per-year objects, got: {}",
            payload
        ))
    })?;

    let mut out = RawStatementFields::new();

    for entry in entries {
        let record = entry.as_object().ok_or_else(|| {
            StatementLayoutError::MalformedPayload(format!(
                "expected a per-year object, got: {}",
                entry
            ))
        })?;

        if let Some(period) = record.get("period").and_then(Value::as_str) {
            let period = period.to_lowercase();
            if period != "annual" && period != "fy" {
                debug!("Skipping non-annual period '{}'", period);
                continue;
            }
        }

        let year = resolve_fiscal_year(record).ok_or_else(|| {
            StatementLayoutError::MalformedPayload(
                "row has no resolvable fiscal year (fiscalYear/calendarYear/date)".to_string(),
            )
        })?;

        let fields = out.entry(year).or_default();
        for (key, value) in record {
            if METADATA_FIELDS.contains(&key.as_str()) {
                continue;
            }
            if let Some(number) = value.as_f64() {
                fields.insert(key.clone(), number);
            }
        }
    }

    Ok(out)
}

fn resolve_fiscal_year(record: &Map<String, Value>) -> Option<FiscalYear> {
    for key in ["fiscalYear", "calendarYear"] {
        match record.get(key) {
            Some(Value::Number(n)) => {
                if let Some(year) = n.as_i64() {
                    return Some(year as FiscalYear);
                }
            }
            Some(Value::String(s)) => {
                if let Ok(year) = s.trim().parse() {
                    return Some(year);
                }
            }
            _ => {}
        }
    }

    record
        .get("date")
        .and_then(Value::as_str)
        .and_then(|date| date.get(..4))
        .and_then(|year| year.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_fmp_style_payload() {
        let payload = json!([
            {
                "symbol": "V",
                "date": "2023-09-30",
                "fiscalYear": "2023",
                "period": "FY",
                "reportedCurrency": "USD",
                "revenue": 32653000000.0,
                "costOfRevenue": 6930000000.0,
                "link": "https://example.test/10-K"
            },
            {
                "symbol": "V",
                "date": "2022-09-30",
                "fiscalYear": "2022",
                "period": "FY",
                "revenue": 29310000000.0,
                "costOfRevenue": null
            }
        ]);

        let raw = parse_vendor_payload(&payload).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[&2023]["revenue"], 32653000000.0);
        assert_eq!(raw[&2023]["costOfRevenue"], 6930000000.0);
        // null is absent, not zero
        assert!(!raw[&2022].contains_key("costOfRevenue"));
        // metadata columns never become fields
        assert!(!raw[&2023].contains_key("symbol"));
        assert!(!raw[&2023].contains_key("link"));
        assert!(!raw[&2023].contains_key("date"));
    }

    #[test]
    fn test_non_annual_rows_skipped() {
        let payload = json!([
            { "fiscalYear": 2023, "period": "Q2", "revenue": 10.0 },
            { "fiscalYear": 2023, "period": "annual", "revenue": 40.0 }
        ]);

        let raw = parse_vendor_payload(&payload).unwrap();
        assert_eq!(raw[&2023]["revenue"], 40.0);
        assert_eq!(raw.len(), 1);
    }

    #[test]
    fn test_year_falls_back_to_date_prefix() {
        let payload = json!([
            { "date": "2021-12-31", "revenue": 7.0 }
        ]);

        let raw = parse_vendor_payload(&payload).unwrap();
        assert_eq!(raw[&2021]["revenue"], 7.0);
    }

    #[test]
    fn test_error_payload_rejected() {
        let payload = json!({ "Error Message": "Invalid API key" });
        let err = parse_vendor_payload(&payload).unwrap_err();
        assert!(matches!(err, StatementLayoutError::MalformedPayload(_)));
    }

    #[test]
    fn test_row_without_year_rejected() {
        let payload = json!([
            { "revenue": 7.0 }
        ]);
        let err = parse_vendor_payload(&payload).unwrap_err();
        assert!(matches!(err, StatementLayoutError::MalformedPayload(_)));
    }
}
