//! Date mentions found in page text
//!
//! Recognizes ISO dates, `Month D, YYYY`, `D Month YYYY` and US-style
//! `MM/DD/YYYY`. Years outside a plausible publishing window are ignored.

use chrono::NaiveDate;
use regex::Regex;

const MIN_YEAR: i32 = 1995;
const MAX_YEAR: i32 = 2100;

const MONTHS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Field order of one date pattern's capture groups
#[derive(Debug, Clone, Copy)]
enum Layout {
    YearMonthDay,
    MonthNameDayYear,
    DayMonthNameYear,
    MonthDayYear,
}

const MONTH_NAME: &str =
    r"(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)";

/// Compiled date patterns
#[derive(Debug, Clone)]
pub(crate) struct DateScanner {
    patterns: Vec<(Layout, Regex)>,
}

impl DateScanner {
    pub(crate) fn new() -> Self {
        let sources = [
            (Layout::YearMonthDay, r"\b(\d{4})-(\d{2})-(\d{2})".to_string()),
            (
                Layout::MonthNameDayYear,
                format!(
                    r"(?i)\b{}\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b",
                    MONTH_NAME
                ),
            ),
            (
                Layout::DayMonthNameYear,
                format!(
                    r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+{}\.?,?\s+(\d{{4}})\b",
                    MONTH_NAME
                ),
            ),
            (Layout::MonthDayYear, r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b".to_string()),
        ];

        let patterns = sources
            .into_iter()
            .filter_map(|(layout, pattern)| match Regex::new(&pattern) {
                Ok(re) => Some((layout, re)),
                Err(e) => {
                    tracing::error!(error = %e, "Date pattern failed to compile");
                    None
                }
            })
            .collect();

        Self { patterns }
    }

    /// Most recent plausible date mentioned in `text` or `extra`
    pub(crate) fn latest<'a>(
        &self,
        text: &'a str,
        extra: impl IntoIterator<Item = &'a str>,
    ) -> Option<NaiveDate> {
        let mut latest: Option<NaiveDate> = None;

        for source in extra.into_iter().chain(std::iter::once(text)) {
            for (layout, re) in &self.patterns {
                for caps in re.captures_iter(source) {
                    let date = match layout {
                        Layout::YearMonthDay => ymd(&caps[1], &caps[2], &caps[3]),
                        Layout::MonthNameDayYear => month_name_date(&caps[1], &caps[2], &caps[3]),
                        Layout::DayMonthNameYear => month_name_date(&caps[2], &caps[1], &caps[3]),
                        Layout::MonthDayYear => ymd(&caps[3], &caps[1], &caps[2]),
                    };
                    latest = latest.max(date);
                }
            }
        }

        latest
    }
}

fn ymd(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    let year: i32 = year.parse().ok()?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month.parse().ok()?, day.parse().ok()?)
}

fn month_name_date(month: &str, day: &str, year: &str) -> Option<NaiveDate> {
    let prefix = month.get(..3)?.to_ascii_lowercase();
    let index = MONTHS.iter().position(|m| *m == prefix)?;
    ymd(year, &(index + 1).to_string(), day)
}
