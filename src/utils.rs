/// Turns a vendor field name into a display label.
///
/// Handles snake_case, kebab-case and camelCase inputs:
/// `"weightedAverageShsOut"` becomes `"Weighted Average Shs Out"`,
/// `"cogs_total"` becomes `"Cogs Total"`.
pub fn prettify_label(raw: &str) -> String {
    let spaced = split_words(raw);

    let mut out = String::with_capacity(spaced.len());
    for (i, word) in spaced.split_whitespace().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(chars.as_str());
        }
    }
    out
}

fn split_words(raw: &str) -> String {
    let mut spaced = String::with_capacity(raw.len() + 8);
    let chars: Vec<char> = raw.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' {
            spaced.push(' ');
            continue;
        }

        if c.is_uppercase() && i > 0 {
            let prev_lower = chars[i - 1].is_lowercase();
            // "ABCWord" splits before the final capital of the run
            let upper_run_ends = chars[i - 1].is_uppercase()
                && chars.get(i + 1).map(|n| n.is_lowercase()).unwrap_or(false);
            if prev_lower || upper_run_ends {
                spaced.push(' ');
            }
        }

        spaced.push(c);
    }

    spaced
}

/// Divides `value` by `scale` and rounds half away from zero to the
/// nearest whole unit at the target scale. Sign is preserved.
pub fn scale_value(value: f64, scale: f64) -> f64 {
    (value / scale).round()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prettify_camel_case() {
        assert_eq!(prettify_label("costOfRevenue"), "Cost Of Revenue");
        assert_eq!(
            prettify_label("weirdVendorSpecificCharge"),
            "Weird Vendor Specific Charge"
        );
    }

    #[test]
    fn test_prettify_snake_and_kebab() {
        assert_eq!(prettify_label("cogs_total"), "Cogs Total");
        assert_eq!(prettify_label("net-change-in-cash"), "Net Change In Cash");
    }

    #[test]
    fn test_prettify_acronym_boundary() {
        assert_eq!(prettify_label("EBITDAMargin"), "EBITDA Margin");
        assert_eq!(prettify_label("netPPE"), "Net PPE");
    }

    #[test]
    fn test_scale_value_rounding() {
        assert_eq!(scale_value(1_234_567.0, 1000.0), 1235.0);
        assert_eq!(scale_value(1_234_499.0, 1000.0), 1234.0);
        assert_eq!(scale_value(-1_234_567.0, 1000.0), -1235.0);
        assert_eq!(scale_value(500.0, 1000.0), 1.0);
    }
}
