use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::core::broker::{AccountProvider, Holdings, QuoteProvider, Quotes};

/// Client for the Schwab trader API. Only the read endpoints the planner
/// needs are implemented; the access token is obtained out-of-band.
pub struct SchwabProvider {
    base_url: String,
    account_id: String,
    access_token: Option<String>,
    client: reqwest::Client,
}

impl SchwabProvider {
    pub fn new(base_url: &str, account_id: &str, access_token: Option<&str>) -> Self {
        SchwabProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            account_id: account_id.to_string(),
            access_token: access_token.map(str::to_string),
            client: reqwest::Client::new(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .with_context(|| format!("Request to {url} failed"))?
            .error_for_status()
            .with_context(|| format!("Request to {url} returned an error status"))?;
        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to parse response from {url}"))
    }

    async fn fetch_account(&self) -> Result<AccountResponse> {
        let url = format!(
            "{}/accounts/{}?fields=positions",
            self.base_url, self.account_id
        );
        debug!("Requesting account data from {url}");
        self.get_json(&url).await
    }
}

#[derive(Deserialize, Debug)]
struct AccountResponse {
    #[serde(alias = "securitiesAccount")]
    securities_account: SecuritiesAccount,
}

#[derive(Deserialize, Debug)]
struct SecuritiesAccount {
    #[serde(alias = "currentBalances")]
    current_balances: CurrentBalances,
    #[serde(default)]
    positions: Vec<Position>,
}

#[derive(Deserialize, Debug)]
struct CurrentBalances {
    #[serde(alias = "cashBalance")]
    cash_balance: f64,
}

#[derive(Deserialize, Debug)]
struct Position {
    instrument: Instrument,
    #[serde(alias = "marketValue")]
    market_value: f64,
}

#[derive(Deserialize, Debug)]
struct Instrument {
    symbol: String,
}

#[derive(Deserialize, Debug)]
struct QuoteEnvelope {
    quote: QuoteData,
}

#[derive(Deserialize, Debug)]
struct QuoteData {
    #[serde(alias = "lastPrice")]
    last_price: Option<f64>,
}

#[async_trait]
impl AccountProvider for SchwabProvider {
    #[instrument(name = "SchwabCashBalance", skip(self))]
    async fn fetch_cash_balance(&self) -> Result<f64> {
        let account = self.fetch_account().await?;
        let balance = account.securities_account.current_balances.cash_balance;
        debug!("Available cash: {balance:.2}");
        Ok(balance)
    }

    #[instrument(name = "SchwabPositions", skip(self))]
    async fn fetch_positions(&self) -> Result<Holdings> {
        let account = self.fetch_account().await?;
        let mut holdings = Holdings::new();
        for position in account.securities_account.positions {
            // Long and short lots of the same instrument arrive as
            // separate entries; fold them into one market value.
            *holdings.entry(position.instrument.symbol).or_insert(0.0) += position.market_value;
        }
        debug!("Fetched {} positions", holdings.len());
        Ok(holdings)
    }
}

#[async_trait]
impl QuoteProvider for SchwabProvider {
    #[instrument(name = "SchwabQuotes", skip(self, symbols))]
    async fn fetch_quotes(&self, symbols: &[String]) -> Result<Quotes> {
        if symbols.is_empty() {
            return Ok(Quotes::new());
        }

        let url = format!("{}/quotes?symbols={}", self.base_url, symbols.join(","));
        debug!("Requesting quotes from {url}");
        let response: HashMap<String, QuoteEnvelope> = self.get_json(&url).await?;

        let mut quotes = Quotes::new();
        for symbol in symbols {
            // A symbol without a last trade maps to 0.0; the planner
            // treats it as unbuyable rather than failing the run.
            let price = response
                .get(symbol)
                .and_then(|envelope| envelope.quote.last_price)
                .unwrap_or(0.0);
            quotes.insert(symbol.clone(), price);
        }
        debug!("Current prices: {quotes:?}");
        Ok(quotes)
    }
}
