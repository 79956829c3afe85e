//! Date extraction for Lithuanian invoices.

use chrono::NaiveDate;

use super::keywords::DATE_LABELS;
use super::patterns::{DATE_DMY, DATE_YMD};

/// Extract a calendar date from a single line.
///
/// When the line carries a date label, the text after the label is tried
/// first. Year/month/day order is preferred over day/month/year so that
/// ISO-formatted dates are never misread.
pub fn extract_date(line: &str) -> Option<NaiveDate> {
    let lower = line.to_lowercase();
    for label in DATE_LABELS {
        if let Some(pos) = lower.find(label) {
            // Lowercasing preserves byte offsets for this vocabulary.
            if let Some(after) = line.get(pos + label.len()..) {
                if let Some(date) = match_date(after) {
                    return Some(date);
                }
            }
        }
    }
    match_date(line)
}

fn match_date(text: &str) -> Option<NaiveDate> {
    if let Some(caps) = DATE_YMD.captures(text) {
        let year: i32 = caps[1].parse().unwrap_or(0);
        let month: u32 = caps[2].parse().unwrap_or(0);
        let day: u32 = caps[3].parse().unwrap_or(0);
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    if let Some(caps) = DATE_DMY.captures(text) {
        let day: u32 = caps[1].parse().unwrap_or(0);
        let month: u32 = caps[2].parse().unwrap_or(0);
        let year = parse_year(&caps[3]);
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            return Some(date);
        }
    }

    None
}

/// Two-digit years below 50 are 2000s, the rest 1900s.
fn parse_year(s: &str) -> i32 {
    let year: i32 = s.parse().unwrap_or(0);
    if year < 100 {
        if year < 50 { 2000 + year } else { 1900 + year }
    } else {
        year
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_date_dmy() {
        assert_eq!(
            extract_date("15.01.2024"),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
        assert_eq!(
            extract_date("15/01/2024"),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
    }

    #[test]
    fn test_extract_date_ymd() {
        assert_eq!(
            extract_date("2024-01-15"),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
        assert_eq!(
            extract_date("2024.01.15"),
            NaiveDate::from_ymd_opt(2024, 1, 15)
        );
    }

    #[test]
    fn test_labeled_date_preferred() {
        assert_eq!(
            extract_date("Išrašymo data: 2024-03-02"),
            NaiveDate::from_ymd_opt(2024, 3, 2)
        );
    }

    #[test]
    fn test_two_digit_year() {
        assert_eq!(extract_date("15.01.24"), NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(extract_date("15.01.99"), NaiveDate::from_ymd_opt(1999, 1, 15));
    }

    #[test]
    fn test_invalid_date_rejected() {
        assert_eq!(extract_date("32.13.2024"), None);
        assert_eq!(extract_date("jokios datos"), None);
    }
}
