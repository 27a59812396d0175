//! Display helpers for KPI values.
//!
//! Total over missing data: absent metrics arrive as zero and format as
//! `0.0%` / `$0` instead of failing.

/// Format a growth rate with one decimal, e.g. `12.4%`.
pub fn format_percent(value: f64) -> String {
    format!("{value:.1}%")
}

/// Format a USD amount compactly, e.g. `$500.0M`, `$900.0B`.
///
/// Scales through K/M/B/T with one decimal; amounts under a thousand render
/// without a suffix.
pub fn format_usd_compact(amount: f64) -> String {
    const SCALES: [(f64, &str); 4] = [
        (1_000_000_000_000.0, "T"),
        (1_000_000_000.0, "B"),
        (1_000_000.0, "M"),
        (1_000.0, "K"),
    ];

    let sign = if amount < 0.0 { "-" } else { "" };
    let magnitude = amount.abs();

    for (scale, suffix) in SCALES {
        if magnitude >= scale {
            return format!("{sign}${:.1}{suffix}", magnitude / scale);
        }
    }
    format!("{sign}${magnitude:.0}")
}
