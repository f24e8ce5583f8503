//! Outbound message rendering.
//!
//! Builds the marked-up watchlist and digest texts that go through the
//! chunked delivery engine. Untrusted strings (symbols come from user
//! layouts) are always escaped before they touch markup.

use std::fmt::Write as _;
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeDelta, Utc};
use divvy_core::escape_html;
use regex::Regex;

use crate::dashboard::{DividendEvent, Fundamentals};

/// Plain US equity tickers, as opposed to futures/crypto pairs the
/// tracker has no dividend data for.
static EQUITY_SYMBOL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z/.-]{1,5}$").expect("symbol pattern is valid"));

/// Current trading-day date in New York (YYYY-MM-DD).
pub(crate) fn ny_date_string(now: DateTime<Utc>) -> String {
    let offset_hours = if is_us_eastern_dst(now) { 4 } else { 5 };
    (now - TimeDelta::hours(offset_hours))
        .format("%Y-%m-%d")
        .to_string()
}

/// US Eastern daylight saving: second Sunday of March through first Sunday
/// of November, switching at 2am local.
fn is_us_eastern_dst(now: DateTime<Utc>) -> bool {
    let year = now.date_naive().year();
    let start = nth_sunday(year, 3, 2)
        .and_hms_opt(7, 0, 0)
        .expect("valid time")
        .and_utc();
    let end = nth_sunday(year, 11, 1)
        .and_hms_opt(6, 0, 0)
        .expect("valid time")
        .and_utc();
    now >= start && now < end
}

fn nth_sunday(year: i32, month: u32, nth: u32) -> NaiveDate {
    let first = NaiveDate::from_ymd_opt(year, month, 1).expect("valid calendar date");
    let offset = (7 - first.weekday().num_days_from_sunday()) % 7;
    first + Days::new(u64::from(offset + (nth - 1) * 7))
}

/// Renders the /watchlist reply: dividend payers first with their yield,
/// amount and next ex-dividend date, then the non-dividend equities.
pub(crate) fn watchlist_message(
    symbols: &[String],
    results: &[Fundamentals],
    today: &str,
) -> String {
    let mut dividend_section = String::new();
    let mut non_dividend: Vec<&str> = Vec::new();

    for symbol in symbols {
        let row = results.iter().find(|row| &row.symbol == symbol);
        let Some(row) = row.filter(|row| has_dividend_data(row)) else {
            if EQUITY_SYMBOL_RE.is_match(symbol) {
                non_dividend.push(symbol);
            }
            continue;
        };

        let _ = writeln!(dividend_section, "<b>{}</b>", escape_html(&row.symbol));
        if let Some(div_yield) = row.div_yield {
            let _ = writeln!(dividend_section, "Yield: {div_yield:.2}%");
        }
        if let Some(amount) = row.div_pay_amount {
            let _ = writeln!(dividend_section, "Amount: ${amount}");
        }
        if let Some(date) = upcoming_ex_date(row, today) {
            let _ = writeln!(dividend_section, "Next Ex-Div: {date}");
        }
        dividend_section.push('\n');
    }

    let mut message = String::from("📊 <b>Your Watchlist</b>\n\n");
    if !dividend_section.is_empty() {
        message.push_str(&dividend_section);
    } else if non_dividend.is_empty() {
        message.push_str("No fundamental data available yet. Please wait for the tracker to run.\n\n");
    }

    if !non_dividend.is_empty() {
        message.push_str("\n<b>Non-Dividend Paying / Unknown</b>\n");
        let escaped: Vec<String> = non_dividend.iter().map(|s| escape_html(s)).collect();
        message.push_str(&escaped.join(", "));
        message.push('\n');
    }

    message
}

fn has_dividend_data(row: &Fundamentals) -> bool {
    row.div_yield.is_some()
        || row.div_pay_amount.is_some()
        || row.div_ex_date.is_some()
        || row.next_div_ex_date.is_some()
}

/// Prefers an ex-date that is today or later; falls back to whatever the
/// tracker last reported so the row still shows something.
fn upcoming_ex_date<'a>(row: &'a Fundamentals, today: &str) -> Option<&'a str> {
    let ex_date = row.div_ex_date.as_deref();
    let next_ex_date = row.next_div_ex_date.as_deref();

    if let Some(date) = ex_date.filter(|date| *date >= today) {
        return Some(date);
    }
    if let Some(date) = next_ex_date.filter(|date| *date >= today) {
        return Some(date);
    }
    next_ex_date.or(ex_date)
}

/// Renders the daily digest for one recipient's events.
pub(crate) fn digest_message(events: &[DividendEvent]) -> String {
    let mut message = String::from("🚨 <b>Dividend Events Today</b> 🚨\n\n");
    for event in events {
        let _ = writeln!(message, "<b>{}</b>", escape_html(&event.symbol));
        if let Some(amount) = event.div_pay_amount {
            let _ = writeln!(message, "Amount: ${amount}");
        }
        if event.is_ex_div_today {
            let _ = writeln!(
                message,
                "Ex-Div Date: {}\nPay Date: {}\n",
                event.div_ex_date.as_deref().unwrap_or("N/A"),
                event.div_pay_date.as_deref().unwrap_or("N/A"),
            );
        } else {
            let _ = writeln!(
                message,
                "Pay Date: {}\n",
                event.div_pay_date.as_deref().unwrap_or("N/A"),
            );
        }
    }
    message
}
