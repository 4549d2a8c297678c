//! Simple returns and the Amihud illiquidity ratio.

/// Simple percentage change of `prices`. The first element is `0.0`.
///
/// A non-finite change (zero or NaN previous price) is clamped to `0.0` so
/// downstream arithmetic stays total.
pub fn simple_returns(prices: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(prices.len());
    if prices.is_empty() {
        return out;
    }
    out.push(0.0);
    for pair in prices.windows(2) {
        let r = (pair[1] - pair[0]) / pair[0];
        out.push(if r.is_finite() { r } else { 0.0 });
    }
    out
}

/// Amihud ratio `|ret| / volume` per row.
///
/// Zero volume or a non-finite quotient yields `0.0`; the result is never negative.
pub fn amihud_illiquidity(returns: &[f64], volumes: &[u64]) -> Vec<f64> {
    debug_assert_eq!(returns.len(), volumes.len());
    returns
        .iter()
        .zip(volumes)
        .map(|(&r, &v)| {
            if v == 0 {
                return 0.0;
            }
            let ratio = r.abs() / v as f64;
            if ratio.is_finite() {
                ratio
            } else {
                0.0
            }
        })
        .collect()
}
