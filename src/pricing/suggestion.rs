//! Rule-based price suggestions for the admin dashboard.
//!
//! This is a decision table, not a model: the first matching rule decides
//! the direction, the size of the change and a fixed confidence score.
//!
//! | rule               | change        | confidence |
//! |--------------------|---------------|------------|
//! | stock = 0          | no suggestion | -          |
//! | stock < very low   | +10%          | 0.80       |
//! | stock < low        | +5%           | 0.70       |
//! | stock > overstock  | -10%          | 0.75       |
//! | high demand        | +5%           | 0.65       |
//! | low demand         | -5%           | 0.60       |
//! | seasonal factor    | factor - 1    | 0.70       |
//! | otherwise          | hold          | 0.50       |

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, PartialEq)]
pub struct PricingRules {
    pub very_low_stock: i32,
    pub low_stock: i32,
    pub overstock: i32,
    /// Units sold within the demand window that count as high demand.
    pub high_demand_units: i64,
    pub low_demand_units: i64,
    pub demand_window_days: i64,
    /// Batch results drop suggestions that move the price less than this.
    pub min_change_percent: f64,
}

impl Default for PricingRules {
    fn default() -> Self {
        Self {
            very_low_stock: 5,
            low_stock: 10,
            overstock: 80,
            high_demand_units: 20,
            low_demand_units: 2,
            demand_window_days: 30,
            min_change_percent: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ReasonType {
    Increase,
    Decrease,
    Hold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionReason {
    VeryLowStock,
    LowStock,
    Overstock,
    HighDemand,
    LowDemand,
    Seasonal,
    Balanced,
}

/// What the heuristic knows about one product.
#[derive(Debug, Clone)]
pub struct SuggestionInput<'a> {
    pub price: i64,
    pub stock: i32,
    pub category: &'a str,
    /// Units sold in the demand window; `None` when the store has no recent
    /// sales to compare against.
    pub units_sold: Option<i64>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PriceSuggestion {
    pub current_price: i64,
    pub suggested_price: i64,
    pub change: i64,
    pub percent_change: f64,
    pub reason: String,
    pub reason_code: SuggestionReason,
    pub reason_type: ReasonType,
    pub confidence: f64,
}

impl PricingRules {
    pub fn is_significant(&self, suggestion: &PriceSuggestion) -> bool {
        suggestion.percent_change.abs() >= self.min_change_percent
    }
}

/// Demand multiplier for a category in a given month (1 = January).
pub fn seasonal_factor(category: &str, month: u32) -> f64 {
    let summer = (6..=8).contains(&month);
    let winter = matches!(month, 12 | 1 | 2);
    let category = category.to_lowercase();
    let mentions = |needles: &[&str]| needles.iter().any(|n| category.contains(n));

    if mentions(&["حوض", "أحواض", "aquarium", "tank"]) {
        if summer {
            1.4
        } else if winter {
            0.8
        } else {
            1.0
        }
    } else if mentions(&["سخان", "heater"]) {
        if winter {
            1.4
        } else if summer {
            0.7
        } else {
            1.0
        }
    } else if mentions(&["فلتر", "فلاتر", "filter", "مضخة", "pump"]) {
        if summer {
            1.2
        } else if winter {
            0.9
        } else {
            1.0
        }
    } else {
        1.0
    }
}

/// Suggest a price for one product. Out-of-stock products get no
/// suggestion at all.
pub fn suggest_price(input: &SuggestionInput<'_>, rules: &PricingRules) -> Option<PriceSuggestion> {
    if input.stock <= 0 {
        return None;
    }

    let stock = input.stock;
    let (delta, reason_code, confidence, reason) = if stock < rules.very_low_stock {
        (
            0.10,
            SuggestionReason::VeryLowStock,
            0.80,
            format!("مخزون منخفض جداً ({stock}) - زيادة السعر بـ 10%"),
        )
    } else if stock < rules.low_stock {
        (
            0.05,
            SuggestionReason::LowStock,
            0.70,
            format!("مخزون منخفض ({stock}) - زيادة السعر بـ 5%"),
        )
    } else if stock > rules.overstock {
        (
            -0.10,
            SuggestionReason::Overstock,
            0.75,
            format!("مخزون زائد ({stock}) - تخفيض السعر بـ 10% لتصريف المخزون"),
        )
    } else if let Some(units) = input
        .units_sold
        .filter(|units| *units >= rules.high_demand_units)
    {
        (
            0.05,
            SuggestionReason::HighDemand,
            0.65,
            format!("طلب مرتفع ({units} قطعة خلال {} يوم) - زيادة السعر بـ 5%", rules.demand_window_days),
        )
    } else if let Some(units) = input
        .units_sold
        .filter(|units| *units <= rules.low_demand_units)
    {
        (
            -0.05,
            SuggestionReason::LowDemand,
            0.60,
            format!("طلب منخفض ({units} قطعة خلال {} يوم) - تخفيض السعر بـ 5%", rules.demand_window_days),
        )
    } else {
        let factor = seasonal_factor(input.category, input.now.month());
        if factor != 1.0 {
            let factor = factor.clamp(0.8, 1.3);
            let percent = ((factor - 1.0) * 100.0).round();
            let reason = if factor > 1.0 {
                format!("موسم الذروة لفئة \"{}\" - زيادة السعر بـ {percent}%", input.category)
            } else {
                format!("خارج موسم الذروة لفئة \"{}\" - تخفيض السعر بـ {}%", input.category, -percent)
            };
            (factor - 1.0, SuggestionReason::Seasonal, 0.70, reason)
        } else {
            (
                0.0,
                SuggestionReason::Balanced,
                0.50,
                "الطلب والمخزون متوازنان - الحفاظ على السعر الحالي".to_string(),
            )
        }
    };

    let current_price = input.price.max(0);
    let suggested_price = ((current_price as f64) * (1.0 + delta)).round().max(0.0) as i64;
    let change = suggested_price - current_price;
    let percent_change = if current_price == 0 {
        0.0
    } else {
        ((change as f64 / current_price as f64) * 1000.0).round() / 10.0
    };
    let reason_type = match change {
        c if c > 0 => ReasonType::Increase,
        c if c < 0 => ReasonType::Decrease,
        _ => ReasonType::Hold,
    };

    Some(PriceSuggestion {
        current_price,
        suggested_price,
        change,
        percent_change,
        reason,
        reason_code,
        reason_type,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn input(stock: i32, units_sold: Option<i64>, month: u32) -> SuggestionInput<'static> {
        SuggestionInput {
            price: 100_000,
            stock,
            category: "طعام",
            units_sold,
            now: Utc.with_ymd_and_hms(2025, month, 15, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn out_of_stock_has_no_suggestion() {
        assert!(suggest_price(&input(0, Some(100), 4), &PricingRules::default()).is_none());
    }

    #[test]
    fn stock_rules_take_precedence_over_demand() {
        let rules = PricingRules::default();

        let s = suggest_price(&input(3, Some(0), 4), &rules).unwrap();
        assert_eq!(s.reason_code, SuggestionReason::VeryLowStock);
        assert_eq!(s.suggested_price, 110_000);
        assert_eq!(s.percent_change, 10.0);
        assert_eq!(s.reason_type, ReasonType::Increase);
        assert_eq!(s.confidence, 0.80);

        let s = suggest_price(&input(7, Some(0), 4), &rules).unwrap();
        assert_eq!(s.reason_code, SuggestionReason::LowStock);
        assert_eq!(s.suggested_price, 105_000);

        let s = suggest_price(&input(120, Some(500), 4), &rules).unwrap();
        assert_eq!(s.reason_code, SuggestionReason::Overstock);
        assert_eq!(s.suggested_price, 90_000);
        assert_eq!(s.reason_type, ReasonType::Decrease);
    }

    #[test]
    fn demand_rules_apply_to_normal_stock() {
        let rules = PricingRules::default();
        let high = suggest_price(&input(40, Some(25), 4), &rules).unwrap();
        assert_eq!(high.reason_code, SuggestionReason::HighDemand);
        assert_eq!(high.suggested_price, 105_000);

        let low = suggest_price(&input(40, Some(1), 4), &rules).unwrap();
        assert_eq!(low.reason_code, SuggestionReason::LowDemand);
        assert_eq!(low.suggested_price, 95_000);
    }

    #[test]
    fn unknown_demand_falls_back_to_hold() {
        let s = suggest_price(&input(40, None, 4), &PricingRules::default()).unwrap();
        assert_eq!(s.reason_code, SuggestionReason::Balanced);
        assert_eq!(s.reason_type, ReasonType::Hold);
        assert_eq!(s.change, 0);
        assert!(!PricingRules::default().is_significant(&s));
    }

    #[test]
    fn seasonal_adjustment_for_tanks() {
        let rules = PricingRules::default();
        let mut summer = input(40, Some(10), 7);
        summer.category = "أحواض زجاجية";
        let s = suggest_price(&summer, &rules).unwrap();
        assert_eq!(s.reason_code, SuggestionReason::Seasonal);
        assert_eq!(s.suggested_price, 130_000);

        let mut winter = input(40, Some(10), 1);
        winter.category = "Aquarium Tanks";
        let s = suggest_price(&winter, &rules).unwrap();
        assert_eq!(s.suggested_price, 80_000);
        assert_eq!(s.reason_type, ReasonType::Decrease);
    }

    #[test]
    fn seasonal_factors() {
        assert_eq!(seasonal_factor("سخانات", 1), 1.4);
        assert_eq!(seasonal_factor("Heaters", 7), 0.7);
        assert_eq!(seasonal_factor("فلاتر", 6), 1.2);
        assert_eq!(seasonal_factor("Filters", 12), 0.9);
        assert_eq!(seasonal_factor("أسماك", 7), 1.0);
        assert_eq!(seasonal_factor("tank", 4), 1.0);
    }

    #[test]
    fn thresholds_come_from_rules() {
        let rules = PricingRules {
            very_low_stock: 2,
            low_stock: 3,
            ..PricingRules::default()
        };
        let s = suggest_price(&input(3, None, 4), &rules).unwrap();
        assert_eq!(s.reason_code, SuggestionReason::Balanced);
    }
}
