//! Number formatting shared by the narrative, the workbook analysis sheet and
//! the dashboard.

/// `1234567.891` -> `"$1,234,567.89"`, negative values as `"-$12.00"`.
pub fn usd(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    format!("{sign}${}", grouped(value.abs(), 2))
}

/// `2.5` -> `"+2.50%"`, `-1.234` -> `"-1.23%"`.
pub fn percent_change(value: f64) -> String {
    format!("{value:+.2}%")
}

/// Formats a non-negative number with `decimals` places and comma thousands
/// separators.
pub fn grouped(value: f64, decimals: usize) -> String {
    let fixed = format!("{value:.decimals$}");
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let digits = int_part.len();
    let mut out = String::with_capacity(digits + digits / 3 + decimals + 1);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (digits - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}
