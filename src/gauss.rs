/// Standard-normal math used by the quality-perception update.
///
/// The perception posterior needs the normal log-density (prior) and the
/// normal CDF (review-bucket probabilities of the consumer-fit distribution).
/// rand_distr only samples, so the CDF is evaluated with the
/// Abramowitz-Stegun 26.2.17 polynomial approximation (|error| < 7.5e-8).

const LN_SQRT_2PI: f64 = 0.9189385332046727;

/// Log-density of Normal(mean, std) at x. Caller guarantees std > 0.
pub fn normal_log_pdf(x: f64, mean: f64, std: f64) -> f64 {
    let z = (x - mean) / std;
    -0.5 * z * z - LN_SQRT_2PI - std.ln()
}

/// CDF of the standard normal at x
pub fn std_normal_cdf(x: f64) -> f64 {
    let t = 1.0 / (1.0 + 0.2316419 * x.abs());
    let d = 0.3989422804014327; // 1/sqrt(2π)
    let p = d
        * (-x * x / 2.0).exp()
        * t
        * (0.319381530
            + t * (-0.356563782 + t * (1.781477937 + t * (-1.821255978 + t * 1.330274429))));

    if x >= 0.0 {
        1.0 - p
    } else {
        p
    }
}

/// CDF of Normal(0, std) at x
/// std == 0 degenerates to the unit step at zero, which keeps the
/// deterministic-fit configuration well defined
pub fn centered_normal_cdf(x: f64, std: f64) -> f64 {
    if std == 0.0 {
        if x >= 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        std_normal_cdf(x / std)
    }
}
