//! Bulk adjustment rules shared by price and stock edits.

use serde::{Deserialize, Serialize};

use catalogsync_core::{DomainError, DomainResult};

/// Which price field a price edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceType {
    #[default]
    Regular,
    Sale,
}

/// Direction of an adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustAction {
    /// Replace the current amount with `value`.
    Set,
    Increase,
    Decrease,
}

/// How a category edit combines the given ids with the current ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryAction {
    #[default]
    Replace,
    Add,
    Remove,
}

/// A validated numeric adjustment (fixed amount or percentage).
///
/// `Set` always uses `value`. `Increase`/`Decrease` use `percent_value` when
/// present and fall back to the fixed `value` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Adjustment {
    pub action: AdjustAction,
    #[serde(default)]
    pub value: Option<i64>,
    #[serde(default)]
    pub percent_value: Option<f64>,
}

impl Adjustment {
    pub fn set(value: i64) -> Self {
        Self {
            action: AdjustAction::Set,
            value: Some(value),
            percent_value: None,
        }
    }

    pub fn by_amount(action: AdjustAction, value: i64) -> Self {
        Self {
            action,
            value: Some(value),
            percent_value: None,
        }
    }

    pub fn by_percent(action: AdjustAction, percent: f64) -> Self {
        Self {
            action,
            value: None,
            percent_value: Some(percent),
        }
    }

    /// Check that the adjustment carries the amount its action needs.
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(p) = self.percent_value {
            if !p.is_finite() || p < 0.0 {
                return Err(DomainError::validation("percent_value must be a non-negative number"));
            }
        }
        match self.action {
            AdjustAction::Set => match self.value {
                Some(v) if v >= 0 => Ok(()),
                Some(_) => Err(DomainError::validation("value for 'set' must not be negative")),
                None => Err(DomainError::validation("'set' requires a value")),
            },
            AdjustAction::Increase | AdjustAction::Decrease => {
                if self.percent_value.is_some() || self.value.is_some() {
                    Ok(())
                } else {
                    Err(DomainError::validation(
                        "increase/decrease requires value or percent_value",
                    ))
                }
            }
        }
    }

    /// Percentage factor for increase/decrease, if this is a percent edit.
    pub fn ratio(&self) -> Option<f64> {
        let p = self.percent_value?;
        match self.action {
            AdjustAction::Set => None,
            AdjustAction::Increase => Some(1.0 + p / 100.0),
            AdjustAction::Decrease => Some(1.0 - p / 100.0),
        }
    }

    /// Signed fixed delta for increase/decrease without a percentage.
    pub fn delta(&self) -> Option<i64> {
        if self.percent_value.is_some() {
            return None;
        }
        let v = self.value?;
        match self.action {
            AdjustAction::Set => None,
            AdjustAction::Increase => Some(v),
            AdjustAction::Decrease => Some(-v),
        }
    }

    /// Apply to a single amount. Results are clamped at zero.
    pub fn apply(&self, current: u64) -> u64 {
        let next = match self.action {
            AdjustAction::Set => self.value.unwrap_or(current as i64),
            _ => match (self.ratio(), self.delta()) {
                (Some(ratio), _) => scale(current, ratio),
                (None, Some(delta)) => (current as i64).saturating_add(delta),
                (None, None) => current as i64,
            },
        };
        next.max(0) as u64
    }
}

/// Multiply and round half away from zero.
pub(crate) fn scale(amount: u64, ratio: f64) -> i64 {
    (amount as f64 * ratio).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_amount() {
        assert_eq!(Adjustment::set(1200).apply(999), 1200);
    }

    #[test]
    fn percent_increase_rounds() {
        let adj = Adjustment::by_percent(AdjustAction::Increase, 10.0);
        assert_eq!(adj.apply(1005), 1106); // 1105.5 rounds up
    }

    #[test]
    fn fixed_decrease_clamps_at_zero() {
        let adj = Adjustment::by_amount(AdjustAction::Decrease, 500);
        assert_eq!(adj.apply(300), 0);
    }

    #[test]
    fn percent_takes_precedence_over_value() {
        let adj = Adjustment {
            action: AdjustAction::Decrease,
            value: Some(1),
            percent_value: Some(50.0),
        };
        assert_eq!(adj.apply(1000), 500);
    }

    #[test]
    fn validate_requires_value_for_set() {
        let adj = Adjustment {
            action: AdjustAction::Set,
            value: None,
            percent_value: Some(10.0),
        };
        assert!(matches!(adj.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn validate_rejects_negative_percent() {
        let adj = Adjustment::by_percent(AdjustAction::Increase, -3.0);
        assert!(adj.validate().is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: decreases never produce a negative amount.
            #[test]
            fn decrease_never_negative(current in 0u64..10_000_000, value in 0i64..20_000_000) {
                let adj = Adjustment::by_amount(AdjustAction::Decrease, value);
                let next = adj.apply(current);
                prop_assert!(next <= current);
            }

            /// Property: a percent increase never lowers the amount.
            #[test]
            fn percent_increase_is_monotone(current in 0u64..10_000_000, pct in 0.0f64..500.0) {
                let adj = Adjustment::by_percent(AdjustAction::Increase, pct);
                prop_assert!(adj.apply(current) >= current);
            }
        }
    }
}
