//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Clamp a value into the range `[min, max]`.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float,
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Clamp a value into the symmetric range `[-limit, limit]`.
pub fn clip_symmetric<T>(value: T, limit: T) -> T
where
    T: Float,
{
    clamp(value, -limit, limit)
}

/// Arithmetic mean of the values, or `None` if there are no values.
pub fn mean<T>(values: &[T]) -> Option<T>
where
    T: Float + std::iter::Sum,
{
    if values.is_empty() {
        return None;
    }

    let n = T::from(values.len())?;
    Some(values.iter().copied().sum::<T>() / n)
}

/// Round a value to the given number of decimal places.
pub fn round_to<T>(value: T, decimals: i32) -> T
where
    T: Float,
{
    let scale = T::from(10).unwrap_or_else(T::one).powi(decimals);
    (value * scale).round() / scale
}
