//! Brokerage account abstractions

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

/// Market value of each held instrument, keyed by symbol.
pub type Holdings = HashMap<String, f64>;

/// Last trade price per symbol.
pub type Quotes = HashMap<String, f64>;

/// Read-only view of a brokerage account.
#[async_trait]
pub trait AccountProvider: Send + Sync {
    /// Cash available to invest.
    async fn fetch_cash_balance(&self) -> Result<f64>;

    /// Current market value of every open position.
    async fn fetch_positions(&self) -> Result<Holdings>;
}

/// Current market prices for a set of symbols.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Quotes>;
}
