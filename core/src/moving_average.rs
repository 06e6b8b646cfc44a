/// Default trailing window used for chart overlays.
pub const DEFAULT_WINDOW: usize = 7;

/// Trailing moving average over a time-ordered series with gaps.
///
/// Positions before the first full window are `None`. From there on each
/// position averages whatever values are present in its trailing `window`
/// slots and is `None` only when every slot is empty. Every position is
/// computed from scratch, so the result depends only on the input slice.
#[must_use]
pub fn moving_average(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; values.len()];
    }

    (0..values.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            window_mean(&values[i + 1 - window..=i])
        })
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn window_mean(slots: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = slots.iter().flatten().copied().collect();
    if present.is_empty() {
        None
    } else {
        Some(present.iter().sum::<f64>() / present.len() as f64)
    }
}
