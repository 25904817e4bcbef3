use serde::Serialize;
use utoipa::ToSchema;

pub const MIN_TREND_SAMPLES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PriceTrend {
    pub trend: TrendDirection,
    /// 0..=1, a 5% move per sample saturates it.
    pub trend_strength: f64,
    pub avg_price: i64,
    pub min_price: i64,
    pub max_price: i64,
    /// Standard deviation relative to the mean.
    pub volatility: f64,
    pub samples: usize,
}

/// Least-squares slope over chronologically ordered prices.
/// Returns `None` with fewer than [`MIN_TREND_SAMPLES`] points.
pub fn analyze_trend(prices: &[i64]) -> Option<PriceTrend> {
    if prices.len() < MIN_TREND_SAMPLES {
        return None;
    }

    let n = prices.len() as f64;
    let (mut sum_x, mut sum_y, mut sum_xy, mut sum_xx) = (0.0, 0.0, 0.0, 0.0);
    for (i, price) in prices.iter().enumerate() {
        let x = i as f64;
        let y = *price as f64;
        sum_x += x;
        sum_y += y;
        sum_xy += x * y;
        sum_xx += x * x;
    }

    let avg = sum_y / n;
    let slope = (n * sum_xy - sum_x * sum_y) / (n * sum_xx - sum_x * sum_x);
    let slope_percent = if avg == 0.0 { 0.0 } else { slope / avg * 100.0 };

    let trend = if slope_percent > 0.05 {
        TrendDirection::Up
    } else if slope_percent < -0.05 {
        TrendDirection::Down
    } else {
        TrendDirection::Stable
    };

    let variance = prices
        .iter()
        .map(|p| (*p as f64 - avg).powi(2))
        .sum::<f64>()
        / n;
    let volatility = if avg == 0.0 { 0.0 } else { variance.sqrt() / avg };

    Some(PriceTrend {
        trend,
        trend_strength: ((slope_percent.abs() / 5.0).min(1.0) * 100.0).round() / 100.0,
        avg_price: avg.round() as i64,
        min_price: prices.iter().copied().min().unwrap_or_default(),
        max_price: prices.iter().copied().max().unwrap_or_default(),
        volatility: (volatility * 1000.0).round() / 1000.0,
        samples: prices.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_few_points() {
        assert!(analyze_trend(&[1, 2, 3, 4]).is_none());
    }

    #[test]
    fn flat_prices_are_stable() {
        let t = analyze_trend(&[50_000; 8]).unwrap();
        assert_eq!(t.trend, TrendDirection::Stable);
        assert_eq!(t.trend_strength, 0.0);
        assert_eq!(t.volatility, 0.0);
        assert_eq!(t.avg_price, 50_000);
    }

    #[test]
    fn rising_and_falling() {
        let up = analyze_trend(&[10_000, 10_500, 11_000, 11_500, 12_000]).unwrap();
        assert_eq!(up.trend, TrendDirection::Up);
        assert_eq!(up.min_price, 10_000);
        assert_eq!(up.max_price, 12_000);
        assert_eq!(up.avg_price, 11_000);
        assert!(up.trend_strength > 0.0 && up.trend_strength <= 1.0);

        let down = analyze_trend(&[12_000, 11_500, 11_000, 10_500, 10_000]).unwrap();
        assert_eq!(down.trend, TrendDirection::Down);
        assert_eq!(down.trend_strength, up.trend_strength);
    }
}
