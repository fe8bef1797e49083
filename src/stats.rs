//! Statistical functions for the barometer pipeline.
//!
//! Percentile ranking and exponentially weighted means over series that may
//! contain absent observations (`None`). Both follow pandas conventions so
//! readings match the research notebooks they were calibrated against.
//!
//! # References
//!
//! - pandas `Series.rank(pct=True)`: average ties, missing values kept missing,
//!   percentile denominator is the count of present values.
//! - pandas `Series.ewm(halflife=h).mean()`: `adjust=True`, `ignore_na=False`.

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Compute ranks with average tie-breaking.
///
/// Elements are ranked 1..N. Tied values receive the average of their ranks.
fn rankdata(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return vec![];
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.sort_by(|&a, &b| values[a].total_cmp(&values[b]));

    let mut ranks = vec![0.0_f64; n];
    let mut i = 0;
    while i < n {
        // Find the extent of the tie group
        let mut j = i + 1;
        while j < n && values[indices[j]] == values[indices[i]] {
            j += 1;
        }

        // Average rank for this tie group (1-based)
        let avg_rank = (i + 1 + j) as f64 / 2.0;
        for &idx in &indices[i..j] {
            ranks[idx] = avg_rank;
        }
        i = j;
    }

    ranks
}

/// Percentile rank of every present value within the whole slice.
///
/// Each output is `rank / count` where `count` is the number of present,
/// finite inputs, so results lie in `(0, 1]`. Absent or non-finite inputs
/// stay absent. With fewer than two present values the rank is undefined
/// and every output is `None`.
///
/// The rank of row `i` uses every row, including rows after `i`.
///
/// # Example
///
/// ```
/// use volbarometer::stats::percentile_rank;
///
/// let r = percentile_rank(&[Some(3.0), None, Some(1.0), Some(2.0), Some(2.0)]);
/// assert_eq!(r, vec![Some(1.0), None, Some(0.25), Some(0.625), Some(0.625)]);
/// ```
pub fn percentile_rank(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let present: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.filter(|x| x.is_finite()).map(|x| (i, x)))
        .collect();

    let mut out = vec![None; values.len()];
    if present.len() < 2 {
        return out;
    }

    let raw: Vec<f64> = present.iter().map(|&(_, x)| x).collect();
    let ranks = rankdata(&raw);
    let count = present.len() as f64;
    for (&(i, _), rank) in present.iter().zip(ranks) {
        out[i] = Some(rank / count);
    }
    out
}

// ---------------------------------------------------------------------------
// Exponential smoothing
// ---------------------------------------------------------------------------

/// Smoothing factor for a half-life in periods: `1 - 0.5^(1/halflife)`.
pub fn halflife_alpha(halflife: f64) -> f64 {
    1.0 - (0.5_f64.ln() / halflife).exp()
}

/// Exponentially weighted mean with half-life decay.
///
/// Output `t` equals `Σ (1-α)^k · x[t-k] / Σ (1-α)^k` over present inputs
/// `x[0..=t]`, so each value depends only on the current and earlier rows.
/// Absent inputs contribute nothing but still age older weights; an output
/// on an absent row repeats the previous mean. Rows before the first
/// present input are `None`.
///
/// Returns all `None` if `halflife` is not strictly positive.
pub fn ewm_mean(values: &[Option<f64>], halflife: f64) -> Vec<Option<f64>> {
    let n = values.len();
    let mut out = vec![None; n];
    if n == 0 || halflife.is_nan() || halflife <= 0.0 {
        return out;
    }

    let alpha = halflife_alpha(halflife);
    let decay = 1.0 - alpha;

    let present = |v: Option<f64>| v.filter(|x| !x.is_nan());

    let mut weighted = present(values[0]);
    let mut old_wt = 1.0_f64;
    out[0] = weighted;

    for i in 1..n {
        let cur = present(values[i]);
        match (weighted, cur) {
            (Some(w), Some(x)) => {
                old_wt *= decay;
                if w != x {
                    weighted = Some((old_wt * w + x) / (old_wt + 1.0));
                }
                old_wt += 1.0;
            }
            (Some(_), None) => old_wt *= decay,
            (None, Some(x)) => weighted = Some(x),
            (None, None) => {}
        }
        out[i] = weighted;
    }
    out
}
