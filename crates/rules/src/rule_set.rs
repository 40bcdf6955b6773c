use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use reconap_core::{DomainError, DomainResult, Money};

/// Fully-resolved matching tolerances and decision thresholds, after
/// layered overrides have been applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub price_tolerance_pct: Decimal,
    pub price_tolerance_abs: Money,
    pub qty_tolerance_pct: Decimal,
    pub qty_tolerance_abs: i64,
    pub date_tolerance_days: i64,
    pub over_delivery_tolerance_pct: Decimal,
    pub auto_approve_threshold: Decimal,
    pub manual_review_threshold: Decimal,
}

impl RuleSet {
    pub fn built_in_default() -> Self {
        Self {
            price_tolerance_pct: Decimal::new(2, 2),  // 0.02
            price_tolerance_abs: Money::from_cents(500),
            qty_tolerance_pct: Decimal::ZERO,
            qty_tolerance_abs: 0,
            date_tolerance_days: 5,
            over_delivery_tolerance_pct: Decimal::ZERO,
            auto_approve_threshold: Decimal::new(85, 2),   // 0.85
            manual_review_threshold: Decimal::new(70, 2),  // 0.70
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        if !(Decimal::ZERO..=Decimal::ONE).contains(&self.manual_review_threshold) {
            return Err(DomainError::invariant("manual_review_threshold must be in [0,1]"));
        }
        if !(Decimal::ZERO..=Decimal::ONE).contains(&self.auto_approve_threshold) {
            return Err(DomainError::invariant("auto_approve_threshold must be in [0,1]"));
        }
        if self.manual_review_threshold > self.auto_approve_threshold {
            return Err(DomainError::invariant(
                "manual_review_threshold must be <= auto_approve_threshold",
            ));
        }
        if self.price_tolerance_pct.is_sign_negative()
            || self.qty_tolerance_pct.is_sign_negative()
            || self.price_tolerance_abs.is_negative()
            || self.qty_tolerance_abs < 0
            || self.date_tolerance_days < 0
            || self.over_delivery_tolerance_pct.is_sign_negative()
        {
            return Err(DomainError::invariant("tolerances must be non-negative"));
        }
        Ok(())
    }
}

/// Sparse override layer: only the fields an operator explicitly set are
/// `Some`; everything else falls through to the next layer down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSetOverride {
    pub price_tolerance_pct: Option<Decimal>,
    pub price_tolerance_abs: Option<Money>,
    pub qty_tolerance_pct: Option<Decimal>,
    pub qty_tolerance_abs: Option<i64>,
    pub date_tolerance_days: Option<i64>,
    pub over_delivery_tolerance_pct: Option<Decimal>,
    pub auto_approve_threshold: Option<Decimal>,
    pub manual_review_threshold: Option<Decimal>,
}

impl RuleSetOverride {
    pub fn apply_over(&self, base: RuleSet) -> RuleSet {
        RuleSet {
            price_tolerance_pct: self.price_tolerance_pct.unwrap_or(base.price_tolerance_pct),
            price_tolerance_abs: self.price_tolerance_abs.unwrap_or(base.price_tolerance_abs),
            qty_tolerance_pct: self.qty_tolerance_pct.unwrap_or(base.qty_tolerance_pct),
            qty_tolerance_abs: self.qty_tolerance_abs.unwrap_or(base.qty_tolerance_abs),
            date_tolerance_days: self.date_tolerance_days.unwrap_or(base.date_tolerance_days),
            over_delivery_tolerance_pct: self.over_delivery_tolerance_pct.unwrap_or(base.over_delivery_tolerance_pct),
            auto_approve_threshold: self.auto_approve_threshold.unwrap_or(base.auto_approve_threshold),
            manual_review_threshold: self.manual_review_threshold.unwrap_or(base.manual_review_threshold),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn built_in_default_is_valid() {
        RuleSet::built_in_default().validate().unwrap();
    }

    #[test]
    fn validate_rejects_inverted_thresholds() {
        let mut rs = RuleSet::built_in_default();
        rs.manual_review_threshold = Decimal::new(90, 2);
        rs.auto_approve_threshold = Decimal::new(80, 2);
        assert!(rs.validate().is_err());
    }

    #[test]
    fn override_only_touches_set_fields() {
        let base = RuleSet::built_in_default();
        let over = RuleSetOverride {
            date_tolerance_days: Some(10),
            ..Default::default()
        };
        let merged = over.apply_over(base);
        assert_eq!(merged.date_tolerance_days, 10);
        assert_eq!(merged.price_tolerance_pct, base.price_tolerance_pct);
    }
}
