// Built-in aggregate functions and numeric coercion.
//
// All aggregates consume display values (strings). Coercion is lenient for
// SUM/AVERAGE (unparsable text counts as 0) and strict for COUNT/MIN/MAX
// (unparsable text is excluded from the numeric subset).

/// Lenient coercion: empty or unparsable display text becomes 0.
pub fn coerce_number(display: &str) -> f64 {
    display.trim().parse().unwrap_or(0.0)
}

/// Strict coercion: only display text that parses as a number qualifies.
pub fn try_number(display: &str) -> Option<f64> {
    display.trim().parse().ok()
}

/// SUM: lenient coercion over every value.
pub fn sum(values: &[String]) -> f64 {
    values.iter().map(|v| coerce_number(v)).sum()
}

/// AVERAGE: lenient sum divided by the total value count, empty cells
/// included in the denominator. An empty input averages to 0.
pub fn average(values: &[String]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    sum(values) / values.len() as f64
}

/// COUNT: how many values parse as numbers.
pub fn count(values: &[String]) -> f64 {
    values.iter().filter(|v| try_number(v).is_some()).count() as f64
}

/// MIN over the numeric subset; 0 when no value is numeric.
pub fn min(values: &[String]) -> f64 {
    values
        .iter()
        .filter_map(|v| try_number(v))
        .fold(None, |acc: Option<f64>, n| {
            Some(match acc {
                Some(m) => m.min(n),
                None => n,
            })
        })
        .unwrap_or(0.0)
}

/// MAX over the numeric subset; 0 when no value is numeric.
pub fn max(values: &[String]) -> f64 {
    values
        .iter()
        .filter_map(|v| try_number(v))
        .fold(None, |acc: Option<f64>, n| {
            Some(match acc {
                Some(m) => m.max(n),
                None => n,
            })
        })
        .unwrap_or(0.0)
}

/// Format a numeric result for display: integral values drop the fraction,
/// everything else uses the shortest round-trip form.
pub fn fmt_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}
