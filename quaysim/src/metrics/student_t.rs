//! Student-t quantiles.
//!
//! The confidence-interval computation needs the inverse CDF of the t
//! distribution for small, varying degrees of freedom. It is evaluated here
//! from first principles: the CDF via the regularized incomplete beta
//! function (continued-fraction expansion) and the quantile by bisection on
//! the CDF, which is monotone. Accuracy is far beyond what batch-means
//! half-widths can resolve.

/// Critical value for a two-sided interval at the given significance level,
/// i.e. the `1 - significance / 2` quantile.
pub(crate) fn two_sided_critical(significance: f64, df: f64) -> f64 {
    quantile(1.0 - significance / 2.0, df)
}

/// The `p`-quantile of the Student-t distribution with `df` degrees of
/// freedom.
pub(crate) fn quantile(p: f64, df: f64) -> f64 {
    assert!(p > 0.0 && p < 1.0, "quantile probability must lie in (0, 1)");
    assert!(df > 0.0, "degrees of freedom must be positive");

    if p == 0.5 {
        return 0.0;
    }
    if p < 0.5 {
        return -quantile(1.0 - p, df);
    }

    // Bracket the quantile, then bisect. The CDF is strictly increasing.
    let mut hi = 1.0;
    while cdf(hi, df) < p {
        hi *= 2.0;
        assert!(hi.is_finite(), "quantile bracket diverged");
    }
    let mut lo = 0.0;
    for _ in 0..200 {
        let mid = 0.5 * (lo + hi);
        if cdf(mid, df) < p {
            lo = mid;
        } else {
            hi = mid;
        }
        if hi - lo <= 1e-12 * hi.max(1.0) {
            break;
        }
    }

    0.5 * (lo + hi)
}

/// CDF of the Student-t distribution, for `t >= 0`.
fn cdf(t: f64, df: f64) -> f64 {
    debug_assert!(t >= 0.0);
    let x = df / (df + t * t);
    1.0 - 0.5 * regularized_beta(0.5 * df, 0.5, x)
}

/// The regularized incomplete beta function `I_x(a, b)`.
fn regularized_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let front = (ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln()
        + b * (1.0 - x).ln())
    .exp();

    // The continued fraction converges fastest below the distribution mode;
    // above it, use the symmetry I_x(a, b) = 1 - I_{1-x}(b, a).
    if x < (a + 1.0) / (a + b + 2.0) {
        front * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - front * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

/// Continued-fraction expansion of the incomplete beta function, evaluated
/// with the modified Lentz algorithm.
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const TINY: f64 = 1e-300;
    const EPS: f64 = 1e-15;

    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..200 {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let delta = d * c;
        h *= delta;

        if (delta - 1.0).abs() < EPS {
            break;
        }
    }

    h
}

/// Natural log of the gamma function (Lanczos approximation, g = 7).
fn ln_gamma(x: f64) -> f64 {
    const COEFFS: [f64; 8] = [
        676.5203681218851,
        -1259.1392167224028,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507343278686905,
        -0.13857109526572012,
        9.984_369_578_019_572e-6,
        1.5056327351493116e-7,
    ];
    const BASE: f64 = 0.999_999_999_999_809_9;

    debug_assert!(x > 0.0);
    let x = x - 1.0;
    let mut sum = BASE;
    for (i, coeff) in COEFFS.iter().enumerate() {
        sum += coeff / (x + (i + 1) as f64);
    }
    let t = x + 7.5;

    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + sum.ln()
}
