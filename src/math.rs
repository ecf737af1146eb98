use num_traits::Float;

/// Arithmetic mean, `None` for an empty slice
pub fn mean<T: Float>(values: &[T]) -> Option<T> {
    if values.is_empty() {
        return None;
    }

    let n = T::from(values.len())?;
    let sum = values.iter().fold(T::zero(), |acc, &x| acc + x);

    Some(sum / n)
}

/// Median (mean of the two middle values for even lengths), `None` for an empty slice.
/// NaNs sort last.
pub fn median<T: Float>(values: &[T]) -> Option<T> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or_else(|| a.is_nan().cmp(&b.is_nan())));

    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        let two = T::one() + T::one();
        Some((sorted[mid - 1] + sorted[mid]) / two)
    } else {
        Some(sorted[mid])
    }
}
