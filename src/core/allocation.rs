//! Whole-share purchase planning toward a target portfolio mix.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// A single line of a purchase plan: whole shares of one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedPurchase {
    pub symbol: String,
    pub shares: u64,
    pub estimated_cost: f64,
}

/// Result of a planning run. Entries are sorted by symbol and contain
/// only symbols with at least one share to buy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PurchasePlan {
    pub purchases: Vec<PlannedPurchase>,
    /// Cash left after every planned purchase.
    pub remaining_cash: f64,
    /// Target symbols without a usable price, excluded from buying.
    pub skipped: Vec<String>,
}

impl PurchasePlan {
    pub fn total_cost(&self) -> f64 {
        self.purchases.iter().map(|p| p.estimated_cost).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.purchases.is_empty()
    }
}

// Deviation improvements closer than this count as a tie.
const TIE_EPS: f64 = 1e-9;

struct Candidate {
    symbol: String,
    weight: f64,
    held: f64,
    price: Option<f64>,
    ideal: f64,
    shares: u64,
}

/// Decides how many whole shares of each target symbol to buy so that the
/// portfolio (existing holdings plus `cash`) lands as close as possible to
/// the target weights.
///
/// Weights are relative and normalized by their sum. A symbol without a
/// positive price is reported in `skipped` and never bought, though its
/// weight and holdings still count toward the portfolio total. Positions
/// already above their target are left alone: the planner only buys.
///
/// Fails on a negative or non-finite target weight. Every other "nothing
/// to buy" condition yields an ordinary empty plan.
pub fn compute_plan(
    holdings: &HashMap<String, f64>,
    targets: &HashMap<String, f64>,
    cash: f64,
    prices: &HashMap<String, f64>,
) -> Result<PurchasePlan> {
    for (symbol, weight) in targets {
        if !weight.is_finite() || *weight < 0.0 {
            bail!("invalid target weight {weight} for {symbol}");
        }
    }

    let total_weight: f64 = targets.values().sum();
    if total_weight <= 0.0 {
        warn!("no positive target weights, nothing to buy");
        return Ok(PurchasePlan {
            remaining_cash: cash.max(0.0),
            ..Default::default()
        });
    }

    let mut candidates: Vec<Candidate> = targets
        .iter()
        .filter(|(_, weight)| **weight > 0.0)
        .map(|(symbol, weight)| Candidate {
            symbol: symbol.clone(),
            weight: *weight,
            held: holdings.get(symbol).copied().unwrap_or(0.0),
            price: prices
                .get(symbol)
                .copied()
                .filter(|p| p.is_finite() && *p > 0.0),
            ideal: 0.0,
            shares: 0,
        })
        .collect();
    candidates.sort_by(|a, b| a.symbol.cmp(&b.symbol));

    let skipped: Vec<String> = candidates
        .iter()
        .filter(|c| c.price.is_none())
        .map(|c| c.symbol.clone())
        .collect();
    for symbol in &skipped {
        warn!("no usable price for {symbol}, excluded from this run");
    }

    if cash <= 0.0 {
        debug!("no investable cash");
        return Ok(PurchasePlan {
            remaining_cash: cash.max(0.0),
            skipped,
            ..Default::default()
        });
    }

    // The portfolio being steered includes the cash about to be invested;
    // ideal values are taken against that post-purchase total.
    let total_value: f64 = cash + candidates.iter().map(|c| c.held).sum::<f64>();
    for candidate in &mut candidates {
        candidate.ideal = candidate.weight / total_weight * total_value;
    }

    let mut remaining = cash;
    loop {
        // (index, improvement, deficit, price) of the best next share. On a
        // tied improvement the larger deficit wins; candidates iterate in
        // symbol order, so a full tie keeps the lexicographically smaller.
        let mut best: Option<(usize, f64, f64, f64)> = None;
        for (i, candidate) in candidates.iter().enumerate() {
            let Some(price) = candidate.price else {
                continue;
            };
            if price > remaining {
                continue;
            }
            let value = candidate.held + candidate.shares as f64 * price;
            let deficit = candidate.ideal - value;
            let improvement = deficit.abs() - (deficit - price).abs();
            if improvement <= TIE_EPS {
                continue;
            }
            let wins = match best {
                None => true,
                Some((_, best_improvement, best_deficit, _)) => {
                    if (improvement - best_improvement).abs() <= TIE_EPS {
                        deficit > best_deficit + TIE_EPS
                    } else {
                        improvement > best_improvement
                    }
                }
            };
            if wins {
                best = Some((i, improvement, deficit, price));
            }
        }

        let Some((i, _, _, price)) = best else {
            break;
        };
        candidates[i].shares += 1;
        remaining -= price;
    }

    let purchases: Vec<PlannedPurchase> = candidates
        .iter()
        .filter_map(|c| {
            let price = c.price?;
            (c.shares > 0).then(|| PlannedPurchase {
                symbol: c.symbol.clone(),
                shares: c.shares,
                estimated_cost: c.shares as f64 * price,
            })
        })
        .collect();

    debug!(?purchases, remaining_cash = remaining, "computed purchase plan");

    Ok(PurchasePlan {
        purchases,
        remaining_cash: remaining,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, f64)]) -> HashMap<String, f64> {
        entries
            .iter()
            .map(|(symbol, value)| (symbol.to_string(), *value))
            .collect()
    }

    #[test]
    fn test_buys_the_most_underweight_symbol() {
        // VXUS sits well below its 35% target; all cash should go there
        // until no further whole share is affordable.
        let plan = compute_plan(
            &map(&[("VTI", 6500.0), ("VXUS", 1500.0)]),
            &map(&[("VTI", 65.0), ("VXUS", 35.0)]),
            1000.0,
            &map(&[("VTI", 250.0), ("VXUS", 60.0)]),
        )
        .unwrap();

        assert_eq!(
            plan.purchases,
            vec![PlannedPurchase {
                symbol: "VXUS".to_string(),
                shares: 16,
                estimated_cost: 960.0,
            }]
        );
        assert_eq!(plan.remaining_cash, 40.0);
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_catches_up_the_empty_position() {
        // A holds everything, B nothing; every affordable share goes to B.
        let plan = compute_plan(
            &map(&[("A", 1000.0), ("B", 0.0)]),
            &map(&[("A", 50.0), ("B", 50.0)]),
            100.0,
            &map(&[("A", 10.0), ("B", 10.0)]),
        )
        .unwrap();

        assert_eq!(
            plan.purchases,
            vec![PlannedPurchase {
                symbol: "B".to_string(),
                shares: 10,
                estimated_cost: 100.0,
            }]
        );
        assert_eq!(plan.remaining_cash, 0.0);
    }

    #[test]
    fn test_zero_cash_yields_empty_plan() {
        let plan = compute_plan(
            &map(&[("VTI", 6500.0)]),
            &map(&[("VTI", 65.0), ("VXUS", 35.0)]),
            0.0,
            &map(&[("VTI", 250.0), ("VXUS", 60.0)]),
        )
        .unwrap();

        assert!(plan.is_empty());
        assert_eq!(plan.remaining_cash, 0.0);
    }

    #[test]
    fn test_cheapest_share_unaffordable_yields_empty_plan() {
        let plan = compute_plan(
            &HashMap::new(),
            &map(&[("VTI", 100.0)]),
            50.0,
            &map(&[("VTI", 100.0)]),
        )
        .unwrap();

        assert!(plan.is_empty());
        assert_eq!(plan.remaining_cash, 50.0);
    }

    #[test]
    fn test_empty_and_all_zero_targets_yield_empty_plan() {
        let prices = map(&[("VTI", 100.0)]);

        let plan = compute_plan(&HashMap::new(), &HashMap::new(), 1000.0, &prices).unwrap();
        assert!(plan.is_empty());

        let plan = compute_plan(&HashMap::new(), &map(&[("VTI", 0.0)]), 1000.0, &prices).unwrap();
        assert!(plan.is_empty());
        assert!(plan.skipped.is_empty());
    }

    #[test]
    fn test_negative_or_nan_weight_is_rejected() {
        let prices = map(&[("VTI", 100.0)]);

        let result = compute_plan(&HashMap::new(), &map(&[("VTI", -5.0)]), 1000.0, &prices);
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("invalid target weight")
        );

        let result = compute_plan(&HashMap::new(), &map(&[("VTI", f64::NAN)]), 1000.0, &prices);
        assert!(result.is_err());
    }

    #[test]
    fn test_unpriced_target_is_skipped_but_keeps_its_weight() {
        // BND has no quote; VTI and VXUS still fill their own targets,
        // which are computed with BND's weight in the denominator.
        let plan = compute_plan(
            &HashMap::new(),
            &map(&[("VTI", 60.0), ("VXUS", 30.0), ("BND", 10.0)]),
            1000.0,
            &map(&[("VTI", 100.0), ("VXUS", 50.0)]),
        )
        .unwrap();

        assert_eq!(plan.skipped, vec!["BND".to_string()]);
        assert_eq!(
            plan.purchases,
            vec![
                PlannedPurchase {
                    symbol: "VTI".to_string(),
                    shares: 6,
                    estimated_cost: 600.0,
                },
                PlannedPurchase {
                    symbol: "VXUS".to_string(),
                    shares: 6,
                    estimated_cost: 300.0,
                },
            ]
        );
        assert_eq!(plan.remaining_cash, 100.0);
    }

    #[test]
    fn test_zero_price_counts_as_unpriced() {
        // A quote feed can answer with 0.0 when there is no last trade.
        let plan = compute_plan(
            &HashMap::new(),
            &map(&[("VTI", 50.0), ("BND", 50.0)]),
            500.0,
            &map(&[("VTI", 100.0), ("BND", 0.0)]),
        )
        .unwrap();

        assert_eq!(plan.skipped, vec!["BND".to_string()]);
        assert_eq!(plan.purchases.len(), 1);
        assert_eq!(plan.purchases[0].symbol, "VTI");
    }

    #[test]
    fn test_does_not_buy_past_target() {
        // One more share of A would overshoot by more than it helps, and
        // B's share price dwarfs its small target.
        let plan = compute_plan(
            &HashMap::new(),
            &map(&[("A", 90.0), ("B", 10.0)]),
            100.0,
            &map(&[("A", 45.0), ("B", 30.0)]),
        )
        .unwrap();

        assert_eq!(
            plan.purchases,
            vec![PlannedPurchase {
                symbol: "A".to_string(),
                shares: 2,
                estimated_cost: 90.0,
            }]
        );
        assert_eq!(plan.remaining_cash, 10.0);
    }

    #[test]
    fn test_tie_breaks_on_larger_deficit() {
        // BND and VTI improve equally per share; VTI is further below its
        // target and must win even though BND sorts first.
        let plan = compute_plan(
            &map(&[("GLD", 100.0)]),
            &map(&[("BND", 32.0), ("VTI", 40.0), ("GLD", 28.0)]),
            15.0,
            &map(&[("BND", 10.0), ("VTI", 10.0), ("GLD", 10.0)]),
        )
        .unwrap();

        assert_eq!(
            plan.purchases,
            vec![PlannedPurchase {
                symbol: "VTI".to_string(),
                shares: 1,
                estimated_cost: 10.0,
            }]
        );
        assert_eq!(plan.remaining_cash, 5.0);
    }

    #[test]
    fn test_full_tie_breaks_lexicographically() {
        // Identical improvement and deficit: the smaller symbol wins.
        let plan = compute_plan(
            &map(&[("GLD", 100.0)]),
            &map(&[("SCHB", 40.0), ("SCHX", 40.0), ("GLD", 20.0)]),
            15.0,
            &map(&[("SCHB", 10.0), ("SCHX", 10.0), ("GLD", 10.0)]),
        )
        .unwrap();

        assert_eq!(
            plan.purchases,
            vec![PlannedPurchase {
                symbol: "SCHB".to_string(),
                shares: 1,
                estimated_cost: 10.0,
            }]
        );
    }

    #[test]
    fn test_deterministic_for_identical_inputs() {
        let holdings = map(&[("VTI", 6500.0), ("VXUS", 1500.0)]);
        let targets = map(&[("VTI", 65.0), ("VXUS", 35.0)]);
        let prices = map(&[("VTI", 250.0), ("VXUS", 60.0)]);

        let first = compute_plan(&holdings, &targets, 1000.0, &prices).unwrap();
        let second = compute_plan(&holdings, &targets, 1000.0, &prices).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_scaling_weights_does_not_change_the_plan() {
        let holdings = map(&[("VTI", 6500.0), ("VXUS", 1500.0)]);
        let prices = map(&[("VTI", 250.0), ("VXUS", 60.0)]);

        let base = compute_plan(
            &holdings,
            &map(&[("VTI", 65.0), ("VXUS", 35.0)]),
            1000.0,
            &prices,
        )
        .unwrap();
        let fractional = compute_plan(
            &holdings,
            &map(&[("VTI", 0.65), ("VXUS", 0.35)]),
            1000.0,
            &prices,
        )
        .unwrap();
        let scaled = compute_plan(
            &holdings,
            &map(&[("VTI", 650.0), ("VXUS", 350.0)]),
            1000.0,
            &prices,
        )
        .unwrap();

        assert_eq!(base, fractional);
        assert_eq!(base, scaled);
    }

    #[test]
    fn test_total_shares_grow_with_budget() {
        let targets = map(&[("A", 50.0), ("B", 50.0)]);
        let prices = map(&[("A", 10.0), ("B", 10.0)]);

        let mut previous = 0;
        for cash in (0..=400).step_by(20) {
            let plan = compute_plan(&HashMap::new(), &targets, cash as f64, &prices).unwrap();
            let total: u64 = plan.purchases.iter().map(|p| p.shares).sum();
            assert!(
                total >= previous,
                "share count dropped from {previous} to {total} at cash {cash}"
            );
            previous = total;
        }
    }

    #[test]
    fn test_never_overspends() {
        // Prices are exact binary fractions so cost arithmetic is exact.
        let cases = [
            (
                map(&[("A", 100.0)]),
                map(&[("A", 70.0), ("B", 30.0)]),
                500.0,
                map(&[("A", 33.25), ("B", 7.75)]),
            ),
            (
                HashMap::new(),
                map(&[("A", 1.0), ("B", 1.0), ("C", 1.0)]),
                99.5,
                map(&[("A", 12.5), ("B", 3.25), ("C", 41.0)]),
            ),
            (
                map(&[("B", 250.0)]),
                map(&[("A", 80.0), ("B", 20.0)]),
                1234.75,
                map(&[("A", 199.5), ("B", 55.25)]),
            ),
        ];

        for (holdings, targets, cash, prices) in &cases {
            let plan = compute_plan(holdings, targets, *cash, prices).unwrap();
            assert!(
                plan.total_cost() <= *cash,
                "plan cost {} exceeds cash {cash}",
                plan.total_cost()
            );
            assert!(plan.remaining_cash >= 0.0);
        }
    }
}
