use std::sync::LazyLock;

use regex::Regex;

pub const DEFAULT_DURATION: &str = "7 days";

struct DurationUnit {
    keyword: &'static str,
    plural: &'static str,
    fallback: &'static str,
    pattern: Regex,
}

fn unit(keyword: &'static str, plural: &'static str, fallback: &'static str) -> DurationUnit {
    DurationUnit {
        keyword,
        plural,
        fallback,
        pattern: Regex::new(&format!(r"(\d+)\s*{}", keyword)).expect("static duration pattern"),
    }
}

// Checked in this order; the first keyword found decides the unit.
static UNITS: LazyLock<[DurationUnit; 4]> = LazyLock::new(|| {
    [
        unit("day", "days", "7 days"),
        unit("week", "weeks", "2 weeks"),
        unit("month", "months", "1 month"),
        unit("year", "years", "1 year"),
    ]
});

static CANONICAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\d+\s+(day|days|week|weeks|month|months|year|years)$")
        .expect("static canonical pattern")
});

/// Reduces a free-text course length (as written by the AI model) to
/// `"<N> <unit>s"`, e.g. `"for about 2 weeks"` becomes `"2 weeks"`.
///
/// A unit keyword without a count yields that unit's default; text with no
/// unit keyword at all becomes `"7 days"`.
pub fn normalize_duration(duration: &str) -> String {
    let lower = duration.to_lowercase();

    if let Some(unit) = UNITS.iter().find(|u| lower.contains(u.keyword)) {
        return match unit.pattern.captures(&lower) {
            Some(caps) => format!("{} {}", &caps[1], unit.plural),
            None => unit.fallback.to_string(),
        };
    }

    let trimmed = duration.trim();
    if CANONICAL.is_match(trimmed) {
        return trimmed.to_string();
    }

    DEFAULT_DURATION.to_string()
}
