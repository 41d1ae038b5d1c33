use chrono::{DateTime, NaiveDate, Utc};
use regex::{Captures, Regex};
use std::sync::LazyLock;
use tracing::debug;

type DateBuilder = fn(&TitleDateParser, &Captures<'_>) -> Option<NaiveDate>;

static SHARED_PARSER: LazyLock<TitleDateParser> = LazyLock::new(TitleDateParser::new);

/// Extracts a calendar date from free-text stream VOD titles.
///
/// Patterns are tried in a fixed priority order and the first one that both
/// matches and yields a valid calendar date wins:
///
/// 1. `YYYY.MM.DD` - `2025.05.07 fanfan - amogus 3d`
/// 2. `[Mon DD(st|nd|rd|th)?, 'YY]` - `[Jan 24th, '25] Tombs of...`
/// 3. `[MM/DD/YY]` - `[10/28/24] Stream VOD`
/// 4. `MM/DD/YYYY` - `10/28/2024 Stream`
/// 5. `YYYY-MM-DD` - `2025-01-15 Stream`
/// 6. `Month DD, YYYY` - `January 15, 2025 Stream`
/// 7. `DD Month YYYY` - `15 January 2025 Stream`
///
/// Two-digit years are read as `2000 + YY`.
pub struct TitleDateParser {
    patterns: Vec<(Regex, DateBuilder)>,
}

impl Default for TitleDateParser {
    fn default() -> Self {
        Self::new()
    }
}

impl TitleDateParser {
    pub fn new() -> Self {
        let table: [(&str, DateBuilder); 7] = [
            (r"(\d{4})\.(\d{1,2})\.(\d{1,2})", Self::ymd),
            (r"(?i)\[([a-z]{3})\s+(\d{1,2})(?:st|nd|rd|th)?,?\s+'(\d{2})\]", Self::month_day_short_year),
            (r"\[(\d{1,2})/(\d{1,2})/(\d{2})\]", Self::mdy_short_year),
            (r"(\d{1,2})/(\d{1,2})/(\d{4})", Self::mdy),
            (r"(\d{4})-(\d{1,2})-(\d{1,2})", Self::ymd),
            (r"(?i)([a-z]+)\s+(\d{1,2}),?\s+(\d{4})", Self::month_day_year),
            (r"(?i)(\d{1,2})\s+([a-z]+)\s+(\d{4})", Self::day_month_year),
        ];

        let patterns = table
            .into_iter()
            .filter_map(|(pattern, build)| Regex::new(pattern).ok().map(|re| (re, build)))
            .collect();

        Self { patterns }
    }

    /// Return the first date found in `title`, or `None` when no pattern applies
    pub fn extract_date(&self, title: &str) -> Option<NaiveDate> {
        for (re, build) in &self.patterns {
            for caps in re.captures_iter(title) {
                match build(self, &caps) {
                    Some(date) => {
                        debug!("Extracted date {} from title: '{}'", date, preview(title));
                        return Some(date);
                    }
                    None => debug!("Pattern {} matched '{}' but gave no valid date", re.as_str(), &caps[0]),
                }
            }
        }

        debug!("No date found in title: '{}'", preview(title));
        None
    }

    fn ymd(&self, caps: &Captures<'_>) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(number(caps, 1)?, number(caps, 2)?, number(caps, 3)?)
    }

    fn mdy(&self, caps: &Captures<'_>) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(number(caps, 3)?, number(caps, 1)?, number(caps, 2)?)
    }

    fn mdy_short_year(&self, caps: &Captures<'_>) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2000 + number::<i32>(caps, 3)?, number(caps, 1)?, number(caps, 2)?)
    }

    fn month_day_short_year(&self, caps: &Captures<'_>) -> Option<NaiveDate> {
        let month = month_number(&caps[1])?;
        NaiveDate::from_ymd_opt(2000 + number::<i32>(caps, 3)?, month, number(caps, 2)?)
    }

    fn month_day_year(&self, caps: &Captures<'_>) -> Option<NaiveDate> {
        let month = month_number(&caps[1])?;
        NaiveDate::from_ymd_opt(number(caps, 3)?, month, number(caps, 2)?)
    }

    fn day_month_year(&self, caps: &Captures<'_>) -> Option<NaiveDate> {
        let month = month_number(&caps[2])?;
        NaiveDate::from_ymd_opt(number(caps, 3)?, month, number(caps, 1)?)
    }
}

/// Extract a date from a title using a lazily built shared parser
pub fn extract_date_from_title(title: &str) -> Option<NaiveDate> {
    SHARED_PARSER.extract_date(title)
}

/// Midnight UTC of a title date, the instant used when scoring sessions
pub fn date_to_instant(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn number<T: std::str::FromStr>(caps: &Captures<'_>, group: usize) -> Option<T> {
    caps.get(group)?.as_str().parse().ok()
}

fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_lowercase().as_str() {
        "jan" | "january" => 1,
        "feb" | "february" => 2,
        "mar" | "march" => 3,
        "apr" | "april" => 4,
        "may" => 5,
        "jun" | "june" => 6,
        "jul" | "july" => 7,
        "aug" | "august" => 8,
        "sep" | "september" => 9,
        "oct" | "october" => 10,
        "nov" | "november" => 11,
        "dec" | "december" => 12,
        _ => return None,
    };
    Some(month)
}

fn preview(title: &str) -> String {
    title.chars().take(50).collect()
}
