//! Numerically stable building blocks for the registered models.
//!
//! The superfluid imaginary-time model contains the term
//!
//! - `s(x, g) = (1 - exp(-g x)) / x`
//!
//! Numerical notes:
//! - For small `u = g x`, `1 - exp(-u)` suffers from catastrophic cancellation.
//!   We use an `expm1`-based form (and a series fallback) to keep precision.
//! - For `x → 0` the analytic limit is `s → g`, so `x = 0` needs no special casing.

/// Threshold below which we switch to a small-u series approximation.
const SMALL_U: f64 = 1e-6;

/// Compute `(1 - exp(-g x)) / x` in a numerically stable way.
pub fn saturation(x: f64, g: f64) -> f64 {
    let u = g * x;

    if u.abs() < SMALL_U {
        // Series: (1 - e^{-u}) / x ≈ g (1 - u/2 + u^2/6)
        return g * (1.0 - u / 2.0 + (u * u) / 6.0);
    }

    // 1 - exp(-u) computed as -expm1(-u).
    -(-u).exp_m1() / x
}

/// Derivative of `saturation(x, g)` with respect to `g`: `exp(-g x)`.
pub fn saturation_dg(x: f64, g: f64) -> f64 {
    (-g * x).exp()
}
