//! Read-only access to the Trader Dashboard data drop.
//!
//! An external tracker maintains per-user layout files and a fundamentals
//! snapshot under `<DIVVY_HOME>/dashboard/`; the bot only reads them.
//! Field names follow the tracker's own camelCase convention.

use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::paths;

/// Why a watchlist lookup produced nothing useful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WatchlistError {
    NotLoggedIn,
    EmptyWatchlist,
    NoSymbols,
    ParseError,
}

impl WatchlistError {
    pub(crate) fn user_message(self) -> &'static str {
        match self {
            WatchlistError::NotLoggedIn => {
                "🔒 Please <code>/login &lt;YubiKey OTP&gt;</code> first to view your watchlist."
            }
            WatchlistError::EmptyWatchlist => "Your watchlist is currently empty.",
            WatchlistError::NoSymbols => "No symbols found in your dashboard layout.",
            WatchlistError::ParseError => "Error parsing your watchlist layout.",
        }
    }
}

/// Dividend fields of one symbol, as dropped by the tracker.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct Fundamentals {
    pub symbol: String,
    pub div_yield: Option<f64>,
    pub div_pay_amount: Option<f64>,
    pub div_ex_date: Option<String>,
    pub next_div_ex_date: Option<String>,
    pub div_pay_date: Option<String>,
}

/// A dividend event falling on the current trading day.
#[derive(Debug, Clone)]
pub(crate) struct DividendEvent {
    pub symbol: String,
    pub div_pay_amount: Option<f64>,
    pub div_ex_date: Option<String>,
    pub div_pay_date: Option<String>,
    pub is_ex_div_today: bool,
}

/// One widget in a dashboard layout file.
#[derive(Debug, Deserialize)]
struct LayoutWidget {
    #[serde(default)]
    symbol: Option<String>,
}

#[derive(Debug)]
pub(crate) struct Dashboard {
    dir: PathBuf,
}

impl Dashboard {
    pub(crate) fn open_default() -> Self {
        Self::at(paths::dashboard_dir())
    }

    pub(crate) fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn layout_path(&self, user_id: &str) -> PathBuf {
        self.dir.join("layouts").join(format!("{user_id}.json"))
    }

    /// Whether the account has set up a dashboard at all. Gate for /login.
    pub(crate) fn layout_exists(&self, user_id: &str) -> bool {
        self.layout_path(user_id).exists()
    }

    /// Unique watchlist symbols for an account, in layout order.
    pub(crate) fn user_symbols(&self, user_id: &str) -> Result<Vec<String>, WatchlistError> {
        let path = self.layout_path(user_id);
        if !path.exists() {
            return Err(WatchlistError::EmptyWatchlist);
        }
        let contents = fs::read_to_string(&path).map_err(|_| WatchlistError::ParseError)?;
        let widgets: Vec<LayoutWidget> =
            serde_json::from_str(&contents).map_err(|_| WatchlistError::ParseError)?;

        let mut seen = HashSet::new();
        let symbols: Vec<String> = widgets
            .into_iter()
            .filter_map(|widget| widget.symbol)
            .filter(|symbol| !symbol.is_empty())
            .filter(|symbol| seen.insert(symbol.clone()))
            .collect();

        if symbols.is_empty() {
            Err(WatchlistError::NoSymbols)
        } else {
            Ok(symbols)
        }
    }

    /// Fundamentals rows for the requested symbols, missing ones omitted.
    pub(crate) fn fundamentals_for(&self, symbols: &[String]) -> Result<Vec<Fundamentals>> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        let wanted: HashSet<&str> = symbols.iter().map(String::as_str).collect();
        Ok(self
            .load_fundamentals()?
            .into_iter()
            .filter(|row| wanted.contains(row.symbol.as_str()))
            .collect())
    }

    /// Symbols with an ex-dividend or pay date falling on `today`
    /// (YYYY-MM-DD, New York trading day).
    pub(crate) fn today_dividend_events(
        &self,
        symbols: &[String],
        today: &str,
    ) -> Result<Vec<DividendEvent>> {
        let rows = self.fundamentals_for(symbols)?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let is_ex_div_today = row.div_ex_date.as_deref() == Some(today);
                let is_pay_today = row.div_pay_date.as_deref() == Some(today);
                (is_ex_div_today || is_pay_today).then_some(DividendEvent {
                    symbol: row.symbol,
                    div_pay_amount: row.div_pay_amount,
                    div_ex_date: row.div_ex_date,
                    div_pay_date: row.div_pay_date,
                    is_ex_div_today,
                })
            })
            .collect())
    }

    fn load_fundamentals(&self) -> Result<Vec<Fundamentals>> {
        let path = self.dir.join("fundamentals.json");
        if !path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }
}
