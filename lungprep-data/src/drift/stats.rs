//! Chi-square and population-stability statistics over category counts.

const EPS: f64 = 1e-14;
const FPMIN: f64 = 1e-300;
const MAX_ITER: usize = 500;

/// Share floor so PSI stays finite when a category is absent on one side.
const PSI_FLOOR: f64 = 1e-4;

const LANCZOS_G: f64 = 7.0;
const LANCZOS: [f64; 9] = [
    0.999_999_999_999_809_9,
    676.520_368_121_885_1,
    -1_259.139_216_722_402_8,
    771.323_428_777_653_1,
    -176.615_029_162_140_6,
    12.507_343_278_686_905,
    -0.138_571_095_265_720_12,
    9.984_369_578_019_572e-6,
    1.505_632_735_149_311_6e-7,
];

/// Natural log of the gamma function (Lanczos approximation).
pub fn ln_gamma(x: f64) -> f64 {
    if x < 0.5 {
        let pi = std::f64::consts::PI;
        return (pi / (pi * x).sin()).ln() - ln_gamma(1.0 - x);
    }
    let x = x - 1.0;
    let t = x + LANCZOS_G + 0.5;
    let mut a = LANCZOS[0];
    for (i, c) in LANCZOS.iter().enumerate().skip(1) {
        a += c / (x + i as f64);
    }
    0.5 * (2.0 * std::f64::consts::PI).ln() + (x + 0.5) * t.ln() - t + a.ln()
}

/// Regularized upper incomplete gamma `Q(a, x)`.
///
/// Series expansion below `a + 1`, continued fraction above.
pub fn gamma_q(a: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 1.0;
    }
    if x < a + 1.0 {
        1.0 - gamma_p_series(a, x)
    } else {
        gamma_q_fraction(a, x)
    }
}

fn gamma_p_series(a: f64, x: f64) -> f64 {
    let mut ap = a;
    let mut del = 1.0 / a;
    let mut sum = del;
    for _ in 0..MAX_ITER {
        ap += 1.0;
        del *= x / ap;
        sum += del;
        if del.abs() < sum.abs() * EPS {
            break;
        }
    }
    sum * (-x + a * x.ln() - ln_gamma(a)).exp()
}

fn gamma_q_fraction(a: f64, x: f64) -> f64 {
    let mut b = x + 1.0 - a;
    let mut c = 1.0 / FPMIN;
    let mut d = 1.0 / b;
    let mut h = d;
    for i in 1..=MAX_ITER {
        let an = -(i as f64) * (i as f64 - a);
        b += 2.0;
        d = an * d + b;
        if d.abs() < FPMIN {
            d = FPMIN;
        }
        c = b + an / c;
        if c.abs() < FPMIN {
            c = FPMIN;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < EPS {
            break;
        }
    }
    (-x + a * x.ln() - ln_gamma(a)).exp() * h
}

/// Upper tail probability of the chi-square distribution.
pub fn chi_square_p_value(statistic: f64, degrees_of_freedom: usize) -> f64 {
    if degrees_of_freedom == 0 {
        return 1.0;
    }
    gamma_q(degrees_of_freedom as f64 / 2.0, statistic / 2.0).clamp(0.0, 1.0)
}

/// Result of a chi-square test of homogeneity on a 2×k table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChiSquare {
    pub statistic: f64,
    pub degrees_of_freedom: usize,
    pub p_value: f64,
}

/// Test whether two count vectors over the same categories come from the
/// same distribution. Categories empty on both sides are ignored; with fewer
/// than two populated categories there is nothing to compare and the test
/// reports `p = 1`.
pub fn chi_square_homogeneity(reference: &[usize], current: &[usize]) -> ChiSquare {
    let ref_total: usize = reference.iter().sum();
    let cur_total: usize = current.iter().sum();
    let total = (ref_total + cur_total) as f64;

    let columns: Vec<(usize, usize)> = reference
        .iter()
        .copied()
        .zip(current.iter().copied())
        .filter(|(r, c)| r + c > 0)
        .collect();

    if columns.len() < 2 || ref_total == 0 || cur_total == 0 {
        return ChiSquare {
            statistic: 0.0,
            degrees_of_freedom: 0,
            p_value: 1.0,
        };
    }

    let mut statistic = 0.0;
    for (r, c) in &columns {
        let col_total = (r + c) as f64;
        for (observed, row_total) in [(*r, ref_total), (*c, cur_total)] {
            let expected = row_total as f64 * col_total / total;
            statistic += (observed as f64 - expected).powi(2) / expected;
        }
    }

    let degrees_of_freedom = columns.len() - 1;
    ChiSquare {
        statistic,
        degrees_of_freedom,
        p_value: chi_square_p_value(statistic, degrees_of_freedom),
    }
}

/// Population stability index between two count vectors.
pub fn population_stability_index(reference: &[usize], current: &[usize]) -> f64 {
    let ref_total: usize = reference.iter().sum();
    let cur_total: usize = current.iter().sum();
    if ref_total == 0 || cur_total == 0 {
        return 0.0;
    }
    reference
        .iter()
        .zip(current)
        .map(|(&r, &c)| {
            let p = (r as f64 / ref_total as f64).max(PSI_FLOOR);
            let q = (c as f64 / cur_total as f64).max(PSI_FLOOR);
            (q - p) * (q / p).ln()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_ln_gamma_known_values() {
        assert!(close(ln_gamma(1.0), 0.0, 1e-12));
        assert!(close(ln_gamma(5.0), 24f64.ln(), 1e-10));
        assert!(close(ln_gamma(0.5), std::f64::consts::PI.sqrt().ln(), 1e-10));
    }

    #[test]
    fn test_chi_square_p_value_known_quantiles() {
        // 95th percentile for one degree of freedom.
        assert!(close(chi_square_p_value(3.841_458_820_694_124, 1), 0.05, 1e-6));
        // With two degrees of freedom the tail is exp(-x / 2).
        assert!(close(chi_square_p_value(2.0, 2), (-1.0f64).exp(), 1e-10));
        assert!(close(chi_square_p_value(10.0, 2), (-5.0f64).exp(), 1e-10));
        assert_eq!(chi_square_p_value(0.0, 3), 1.0);
        assert_eq!(chi_square_p_value(7.0, 0), 1.0);
    }

    #[test]
    fn test_homogeneity_identical_distributions() {
        let result = chi_square_homogeneity(&[100, 50], &[50, 25]);
        assert!(close(result.statistic, 0.0, 1e-12));
        assert_eq!(result.degrees_of_freedom, 1);
        assert!(close(result.p_value, 1.0, 1e-9));
    }

    #[test]
    fn test_homogeneity_differing_distributions() {
        let result = chi_square_homogeneity(&[100, 50], &[25, 25]);
        assert!(close(result.statistic, 4.444_444, 1e-5), "{}", result.statistic);
        assert!(result.p_value < 0.05, "{}", result.p_value);
        assert!(result.p_value > 0.03, "{}", result.p_value);
    }

    #[test]
    fn test_homogeneity_single_category() {
        let result = chi_square_homogeneity(&[150, 0], &[50, 0]);
        assert_eq!(result.degrees_of_freedom, 0);
        assert_eq!(result.p_value, 1.0);
    }

    #[test]
    fn test_psi() {
        assert!(close(population_stability_index(&[10, 10], &[5, 5]), 0.0, 1e-12));
        assert!(population_stability_index(&[90, 10], &[10, 90]) > 0.25);
        // A category missing on one side stays finite.
        assert!(population_stability_index(&[10, 0], &[5, 5]).is_finite());
    }
}
