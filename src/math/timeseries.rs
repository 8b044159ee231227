//! Return transforms and small-sample statistics used by the forecasting
//! pipeline: log returns, moments, interpolated quantiles, pairwise-complete
//! Pearson correlation, and MAPE backtest scoring.

use crate::core::ModelError;

const MIN_STD: f64 = 1.0e-12;

/// Log returns `ln(p_t) - ln(p_{t-1})` of a strictly positive price series.
pub fn log_returns(prices: &[f64]) -> Result<Vec<f64>, ModelError> {
    if prices.len() < 2 {
        return Err(ModelError::InvalidInput(format!(
            "log returns require at least 2 prices, got {}",
            prices.len()
        )));
    }
    for (i, &p) in prices.iter().enumerate() {
        if !p.is_finite() || p <= 0.0 {
            return Err(ModelError::InvalidInput(format!(
                "price at index {i} must be finite and positive, got {p}"
            )));
        }
    }
    Ok(prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect())
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Unbiased sample standard deviation.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let ss = values.iter().map(|x| (x - m) * (x - m)).sum::<f64>();
    (ss / (values.len() - 1) as f64).sqrt()
}

/// Empirical quantile with linear interpolation between order statistics.
pub fn empirical_quantile(sample: &[f64], p: f64) -> f64 {
    let mut sorted = sample.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    if sorted.len() <= 1 {
        return sorted.first().copied().unwrap_or(f64::NAN);
    }

    let rank = p.clamp(0.0, 1.0) * (sorted.len() as f64 - 1.0);
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let w = rank - lo as f64;
        sorted[lo] + w * (sorted[hi] - sorted[lo])
    }
}

/// Pairwise-complete Pearson correlation.
///
/// Pairs where either value is non-finite are dropped before the estimate.
/// Fails when fewer than two complete pairs remain or when either retained
/// series is constant.
pub fn pearson_correlation(xs: &[f64], ys: &[f64]) -> Result<f64, ModelError> {
    if xs.len() != ys.len() {
        return Err(ModelError::InvalidInput(format!(
            "correlation requires equal-length series, got {} and {}",
            xs.len(),
            ys.len()
        )));
    }

    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys.iter())
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .map(|(&x, &y)| (x, y))
        .collect();

    if pairs.len() < 2 {
        return Err(ModelError::DegenerateCorrelation(format!(
            "only {} complete observation pairs",
            pairs.len()
        )));
    }

    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for &(x, y) in &pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx) * (x - mx);
        syy += (y - my) * (y - my);
    }

    if sxx.sqrt() < MIN_STD || syy.sqrt() < MIN_STD {
        return Err(ModelError::DegenerateCorrelation(
            "zero variance in one of the paired series".to_string(),
        ));
    }

    Ok(sxy / (sxx.sqrt() * syy.sqrt()))
}

/// Mean absolute percentage error, in percent.
///
/// Points where the true value is exactly zero are excluded from the average.
pub fn mape(predicted: &[f64], actual: &[f64]) -> Result<f64, ModelError> {
    if predicted.len() != actual.len() {
        return Err(ModelError::InvalidInput(format!(
            "MAPE requires equal-length series, got {} and {}",
            predicted.len(),
            actual.len()
        )));
    }

    let mut total = 0.0;
    let mut count = 0usize;
    for (&p, &a) in predicted.iter().zip(actual.iter()) {
        if a == 0.0 {
            continue;
        }
        total += ((p - a) / a).abs();
        count += 1;
    }

    if count == 0 {
        return Err(ModelError::NumericalError(
            "MAPE undefined: every true value is zero".to_string(),
        ));
    }
    Ok(100.0 * total / count as f64)
}
