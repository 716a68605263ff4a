use std::sync::LazyLock;

use regex::{Captures, Regex};

// Tried in order, most specific first. Each number may carry one thousands
// group ("120,000"), captured separately and glued back together.
static PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // $100k - $150k, €90,000 - 110,000
        r"(?i)[$£€](\d+),?(\d+)?k?\s*-\s*[$£€]?(\d+),?(\d+)?k?",
        // 100 - 150k
        r"(?i)(\d+),?(\d+)?\s*-\s*(\d+),?(\d+)?\s*k",
        // $120,000
        r"[$£€](\d+),?(\d+)",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

/// Parse a free-text salary into `(min, max)`.
///
/// A single amount is returned as both bounds. If a `k` appears anywhere in
/// the text every matched number is scaled by 1000. Text with no match, or a
/// match that overflows, yields `(None, None)`.
pub fn parse_salary(text: &str) -> (Option<i64>, Option<i64>) {
    let text = text.trim();
    if text.is_empty() {
        return (None, None);
    }
    let thousands = text.to_lowercase().contains('k');

    for pattern in PATTERNS.iter() {
        let Some(caps) = pattern.captures(text) else {
            continue;
        };
        let parsed = if caps.len() > 3 {
            number(&caps, 1, 2, thousands).zip(number(&caps, 3, 4, thousands))
        } else {
            number(&caps, 1, 2, thousands).map(|n| (n, n))
        };
        if let Some((min, max)) = parsed {
            return (Some(min), Some(max));
        }
    }
    (None, None)
}

fn number(caps: &Captures<'_>, head: usize, tail: usize, thousands: bool) -> Option<i64> {
    let mut digits = caps.get(head)?.as_str().to_string();
    if let Some(rest) = caps.get(tail) {
        digits.push_str(rest.as_str());
    }
    let value: i64 = digits.parse().ok()?;
    if thousands { value.checked_mul(1000) } else { Some(value) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_range_with_k() {
        assert_eq!(parse_salary("$100k - $150k"), (Some(100_000), Some(150_000)));
        assert_eq!(parse_salary("Salary: £45K-£60K per year"), (Some(45_000), Some(60_000)));
    }

    #[test]
    fn bare_range_with_trailing_k() {
        assert_eq!(parse_salary("100-150k"), (Some(100_000), Some(150_000)));
        assert_eq!(parse_salary("80 - 95 K DOE"), (Some(80_000), Some(95_000)));
    }

    #[test]
    fn single_amount_fills_both_bounds() {
        assert_eq!(parse_salary("$120,000"), (Some(120_000), Some(120_000)));
        assert_eq!(parse_salary("€85,500 annually"), (Some(85_500), Some(85_500)));
    }

    #[test]
    fn full_figure_range() {
        assert_eq!(
            parse_salary("$90,000 - $110,000"),
            (Some(90_000), Some(110_000))
        );
    }

    #[test]
    fn nothing_to_parse() {
        assert_eq!(parse_salary(""), (None, None));
        assert_eq!(parse_salary("   "), (None, None));
        assert_eq!(parse_salary("Competitive"), (None, None));
        assert_eq!(parse_salary("Up to 40 hours per week"), (None, None));
    }

    #[test]
    fn overflow_is_not_an_error() {
        assert_eq!(parse_salary("$99999999999999999999k - $1k"), (None, None));
    }
}
