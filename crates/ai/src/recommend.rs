//! Rule-based recommendation engine.
//!
//! The engine is an ordered list of `(input, decision) -> decision` rules. Each rule
//! sees the decision built so far and may keep it, amend it or replace it, so later
//! rules override earlier ones. Risk is clamped to `[0, 1]` once, after the last rule.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use stockflow_core::BranchId;

use crate::forecast;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    Buy,
    Hold,
    Avoid,
    Promote,
    TransferOrPromote,
}

impl Recommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Recommendation::Buy => "BUY",
            Recommendation::Hold => "HOLD",
            Recommendation::Avoid => "AVOID",
            Recommendation::Promote => "PROMOTE",
            Recommendation::TransferOrPromote => "TRANSFER_OR_PROMOTE",
        }
    }
}

impl core::fmt::Display for Recommendation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which stock a recommendation is made for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum StockView {
    /// One branch only.
    SingleBranch(BranchId),
    /// All branches, with the product's stock at each branch that ever held it.
    AllBranches(BTreeMap<BranchId, i64>),
}

impl StockView {
    pub fn is_all_branches(&self) -> bool {
        matches!(self, StockView::AllBranches(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationInput {
    pub current_stock: i64,
    pub expiring_soon: i64,
    pub final_demand: Option<f64>,
    pub has_sales_history: bool,
    pub view: StockView,
}

impl RecommendationInput {
    fn usable_demand(&self) -> Option<f64> {
        forecast::usable_demand(self.final_demand)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub recommendation: Recommendation,
    pub risk: f64,
    pub explanation: String,
}

impl Default for Decision {
    fn default() -> Self {
        Self {
            recommendation: Recommendation::Hold,
            risk: 0.0,
            explanation: String::new(),
        }
    }
}

impl Decision {
    fn new(recommendation: Recommendation, risk: f64, explanation: impl Into<String>) -> Self {
        Self {
            recommendation,
            risk,
            explanation: explanation.into(),
        }
    }

    /// Override the action, raise risk to at least `floor` and append to the explanation.
    fn escalate(mut self, recommendation: Recommendation, floor: f64, note: &str) -> Self {
        self.recommendation = recommendation;
        self.risk = self.risk.max(floor);
        if !self.explanation.is_empty() {
            self.explanation.push(' ');
        }
        self.explanation.push_str(note);
        self
    }
}

pub type Rule = fn(&RecommendationInput, Decision) -> Decision;

/// Default cascade, in evaluation order.
pub const RULES: [Rule; 5] = [
    no_usable_demand,
    demand_coverage,
    expiry_pressure,
    branch_imbalance,
    dead_stock,
];

fn no_usable_demand(input: &RecommendationInput, decision: Decision) -> Decision {
    if input.usable_demand().is_some() {
        return decision;
    }
    if input.current_stock > 0 {
        Decision::new(
            Recommendation::Avoid,
            0.7,
            format!(
                "No meaningful demand is forecast while {} units are on hand; new orders are risky.",
                input.current_stock
            ),
        )
    } else {
        Decision::new(
            Recommendation::Hold,
            0.3,
            "Demand and stock are both low; more data is needed before deciding.",
        )
    }
}

fn demand_coverage(input: &RecommendationInput, decision: Decision) -> Decision {
    let Some(demand) = input.usable_demand() else {
        return decision;
    };
    let stock = input.current_stock;
    let stock_f = stock as f64;

    if stock == 0 {
        Decision::new(
            Recommendation::Buy,
            0.9,
            format!("Forecast demand is {demand:.1} with no stock; critical shortage."),
        )
    } else if stock_f < demand * 0.8 {
        Decision::new(
            Recommendation::Buy,
            0.8,
            format!("Stock ({stock}) is below forecast demand ({demand:.1}); reorder recommended."),
        )
    } else if stock_f > demand * 1.5 {
        Decision::new(
            Recommendation::Avoid,
            0.8,
            format!("Stock ({stock}) far exceeds forecast demand ({demand:.1}); overstock risk."),
        )
    } else {
        Decision::new(
            Recommendation::Hold,
            0.4,
            format!("Stock ({stock}) is in line with forecast demand ({demand:.1})."),
        )
    }
}

fn expiry_pressure(input: &RecommendationInput, decision: Decision) -> Decision {
    if input.expiring_soon <= 0 {
        return decision;
    }
    let outpaces_demand = match input.usable_demand() {
        None => true,
        Some(demand) => input.expiring_soon as f64 > demand * 0.5,
    };
    if !outpaces_demand {
        return decision;
    }

    let action = if input.view.is_all_branches() {
        Recommendation::TransferOrPromote
    } else {
        Recommendation::Promote
    };
    decision.escalate(
        action,
        0.9,
        &format!(
            "{} units expire soon and demand may not absorb them; consider a promotion or transfer.",
            input.expiring_soon
        ),
    )
}

fn branch_imbalance(input: &RecommendationInput, decision: Decision) -> Decision {
    let StockView::AllBranches(per_branch) = &input.view else {
        return decision;
    };
    if per_branch.len() < 2 {
        return decision;
    }
    let max = per_branch.values().copied().max().unwrap_or(0);
    let min = per_branch.values().copied().min().unwrap_or(0);
    if max > min.saturating_mul(3) && max > 0 {
        decision.escalate(
            Recommendation::TransferOrPromote,
            0.85,
            "Stock is unbalanced across branches; move units from overstocked to understocked branches.",
        )
    } else {
        decision
    }
}

fn dead_stock(input: &RecommendationInput, decision: Decision) -> Decision {
    if input.has_sales_history || input.current_stock != 0 {
        return decision;
    }
    Decision::new(
        Recommendation::Hold,
        0.2,
        "No sales history and no stock; insufficient data for a firm decision.",
    )
}

/// Runs a rule cascade over one product's input.
#[derive(Debug, Clone)]
pub struct RecommendationEngine {
    rules: Vec<Rule>,
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self {
            rules: RULES.to_vec(),
        }
    }
}

impl RecommendationEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a rule after the default cascade.
    pub fn with_rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn decide(&self, input: &RecommendationInput) -> Decision {
        let mut decision = self
            .rules
            .iter()
            .fold(Decision::default(), |acc, rule| rule(input, acc));
        decision.risk = decision.risk.clamp(0.0, 1.0);
        decision
    }
}
