//! Numeric response parsing.
//!
//! Instruments answer measurement queries either with a bare number
//! (`"-1.000000E-03"`) or a comma-separated list of elements
//! (`"+5.000000E-01,+5.000000E-04,+9.910000E+37,..."`). These helpers turn that
//! text into `f64` and report anything else as [`SmuError::Parse`].

use crate::error::{SmuError, SmuResult};

/// Parse one numeric field.
///
/// Accepts decimal and scientific notation with an optional sign. Rejects
/// empty text and the non-finite spellings Rust would otherwise accept
/// (`nan`, `inf`), since no instrument reports a reading that way.
pub fn parse_number(text: &str) -> SmuResult<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SmuError::parse(trimmed, "empty response"));
    }

    let value = trimmed
        .parse::<f64>()
        .map_err(|e| SmuError::parse(trimmed, e.to_string()))?;

    if !value.is_finite() {
        return Err(SmuError::parse(trimmed, "value is not finite"));
    }
    Ok(value)
}

/// Parse the element at `index` of a comma-separated response.
///
/// A response holding a single element is returned as-is regardless of
/// `index`, matching instruments configured to report only one element.
pub fn parse_field(response: &str, index: usize) -> SmuResult<f64> {
    let fields: Vec<&str> = response.trim().split(',').map(str::trim).collect();

    if fields.len() == 1 {
        return parse_number(fields[0]);
    }

    let field = fields.get(index).ok_or_else(|| {
        SmuError::parse(
            response.trim(),
            format!(
                "expected element {} but response has {} elements",
                index,
                fields.len()
            ),
        )
    })?;

    parse_number(field).map_err(|e| match e {
        SmuError::Parse { reason, .. } => SmuError::parse(response.trim(), reason),
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number_formats() {
        let test_cases = vec![
            ("5E-9", 5e-9),
            ("-1.000000E-03", -1e-3),
            ("+.75E-9", 0.75e-9),
            ("0", 0.0),
            ("  0.0005\r\n", 0.0005),
        ];

        for (input, expected) in test_cases {
            let parsed = parse_number(input);
            assert!(parsed.is_ok(), "Failed to parse: {}", input);
            assert_eq!(parsed.unwrap(), expected);
        }
    }

    #[test]
    fn test_parse_number_rejects_garbage() {
        for input in ["", "   ", "ERR", "-113,\"Undefined header\"", "nan", "inf"] {
            let err = parse_number(input).unwrap_err();
            assert!(matches!(err, SmuError::Parse { .. }), "accepted {:?}", input);
        }
    }

    #[test]
    fn test_parse_field_picks_element() {
        let response = "+5.000000E-01,+5.000000E-04,+9.910000E+37,+1.234E+01,+0.000000E+00";
        assert_eq!(parse_field(response, 0).unwrap(), 0.5);
        assert_eq!(parse_field(response, 1).unwrap(), 5e-4);
    }

    #[test]
    fn test_parse_field_single_element() {
        assert_eq!(parse_field("-1E-3", 1).unwrap(), -1e-3);
    }

    #[test]
    fn test_parse_field_out_of_range() {
        let err = parse_field("1.0,2.0", 4).unwrap_err();
        match err {
            SmuError::Parse { response, reason } => {
                assert_eq!(response, "1.0,2.0");
                assert!(reason.contains("2 elements"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_parse_field_bad_element_reports_whole_response() {
        let err = parse_field("1.0,OVER,3.0", 1).unwrap_err();
        match err {
            SmuError::Parse { response, .. } => assert_eq!(response, "1.0,OVER,3.0"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
