//! Order tickets derived from a purchase plan.

use crate::core::allocation::PurchasePlan;
use crate::core::broker::Quotes;
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// A single whole-share buy order, limit at the quoted price.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTicket {
    pub symbol: String,
    pub shares: u64,
    pub limit_price: f64,
}

/// Builds one buy ticket per plan entry.
pub fn tickets_from_plan(plan: &PurchasePlan, quotes: &Quotes) -> Vec<OrderTicket> {
    plan.purchases
        .iter()
        .filter_map(|purchase| {
            quotes.get(&purchase.symbol).map(|price| OrderTicket {
                symbol: purchase.symbol.clone(),
                shares: purchase.shares,
                limit_price: *price,
            })
        })
        .collect()
}

/// Hands orders to whatever places them. The planner never calls this
/// itself; the command layer decides whether a run executes at all.
#[async_trait]
pub trait OrderExecutor: Send + Sync {
    async fn submit(&self, ticket: &OrderTicket) -> Result<()>;
}

/// Executor that only logs the order it was handed; nothing leaves the
/// process. Used whenever order submission is switched off.
pub struct LoggingExecutor;

#[async_trait]
impl OrderExecutor for LoggingExecutor {
    async fn submit(&self, ticket: &OrderTicket) -> Result<()> {
        info!(
            "would buy {} x {} at limit {:.2}",
            ticket.shares, ticket.symbol, ticket.limit_price
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::allocation::PlannedPurchase;

    #[test]
    fn test_tickets_carry_quote_as_limit_price() {
        let plan = PurchasePlan {
            purchases: vec![
                PlannedPurchase {
                    symbol: "VTI".to_string(),
                    shares: 2,
                    estimated_cost: 500.0,
                },
                PlannedPurchase {
                    symbol: "VXUS".to_string(),
                    shares: 16,
                    estimated_cost: 960.0,
                },
            ],
            remaining_cash: 40.0,
            skipped: vec![],
        };
        let quotes = Quotes::from([("VTI".to_string(), 250.0), ("VXUS".to_string(), 60.0)]);

        let tickets = tickets_from_plan(&plan, &quotes);

        assert_eq!(
            tickets,
            vec![
                OrderTicket {
                    symbol: "VTI".to_string(),
                    shares: 2,
                    limit_price: 250.0,
                },
                OrderTicket {
                    symbol: "VXUS".to_string(),
                    shares: 16,
                    limit_price: 60.0,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_logging_executor_accepts_any_ticket() {
        let ticket = OrderTicket {
            symbol: "VTI".to_string(),
            shares: 1,
            limit_price: 250.0,
        };
        assert!(LoggingExecutor.submit(&ticket).await.is_ok());
    }
}
