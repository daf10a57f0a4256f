//! Threshold grid search
//!
//! Scores each candidate threshold by the t-statistic of the forward returns
//! it would have traded, sign-aligned with the side the signal would take.

use super::{CalibrationReason, CalibrationReport, LabeledObservation};

/// Runaway guard on grid construction
pub const MAX_GRID_STEPS: usize = 10_000;

/// Grid search parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSearch {
    /// First candidate threshold
    pub grid_min: f64,
    /// Last candidate threshold (inclusive)
    pub grid_max: f64,
    /// Increment between candidates
    pub grid_step: f64,
    /// Minimum selected observations for a candidate to count
    pub min_trades: usize,
    /// Weight of the trade-rate penalty
    pub turnover_penalty_alpha: f64,
}

fn round10(value: f64) -> f64 {
    (value * 1e10).round() / 1e10
}

/// Candidate thresholds from `grid_min` to `grid_max` in `grid_step` steps.
///
/// Non-positive values are skipped and values are rounded to 10 decimals.
pub fn threshold_grid(grid_min: f64, grid_max: f64, grid_step: f64) -> Vec<f64> {
    let mut grid = Vec::new();
    let mut theta = grid_min;
    let mut steps = 0;
    while theta <= grid_max + 1e-12 && steps < MAX_GRID_STEPS {
        if theta > 0.0 {
            grid.push(round10(theta));
        }
        theta += grid_step;
        steps += 1;
    }
    grid
}

/// Sample standard deviation (n - 1 denominator), 0 for n <= 1 or zero variance
pub fn sample_std(values: &[f64], mean: f64) -> f64 {
    let n = values.len();
    if n <= 1 {
        return 0.0;
    }
    let var = values.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / (n - 1) as f64;
    if var <= 0.0 {
        return 0.0;
    }
    var.sqrt()
}

/// t-statistic of the mean; infinite when the sample has no dispersion
pub fn t_stat(mean: f64, sd: f64, n: usize) -> f64 {
    if sd == 0.0 {
        return if mean > 0.0 {
            f64::INFINITY
        } else {
            f64::NEG_INFINITY
        };
    }
    mean / (sd / (n as f64).sqrt())
}

/// Returns the observations `theta` would have traded, signed by side
pub fn signed_returns(observations: &[LabeledObservation], theta: f64) -> Vec<f64> {
    observations
        .iter()
        .filter_map(|obs| {
            if obs.imbalance > theta {
                Some(obs.forward_return)
            } else if obs.imbalance < -theta {
                Some(-obs.forward_return)
            } else {
                None
            }
        })
        .collect()
}

impl GridSearch {
    /// Score one threshold, `None` when it trades too rarely
    pub fn score(
        &self,
        observations: &[LabeledObservation],
        theta: f64,
        window_size: usize,
    ) -> Option<CalibrationReport> {
        let returns = signed_returns(observations, theta);
        let n = returns.len();
        if n == 0 || n < self.min_trades {
            return None;
        }

        let mu = returns.iter().sum::<f64>() / n as f64;
        let sd = sample_std(&returns, mu);
        let score = t_stat(mu, sd, n);
        let trade_rate = n as f64 / window_size.max(1) as f64;
        let score_adj = score - self.turnover_penalty_alpha * trade_rate;

        Some(CalibrationReport {
            theta_hat: Some(theta),
            score,
            score_adj,
            n,
            trade_rate,
            window_obs: observations.len(),
            reason: CalibrationReason::Ok,
            theta_live: None,
        })
    }

    /// Pick the threshold with the highest adjusted score.
    ///
    /// Requires exactly a full window. Ties keep the earliest (lowest)
    /// threshold.
    pub fn run(&self, observations: &[LabeledObservation], window_size: usize) -> CalibrationReport {
        if observations.len() < window_size {
            return CalibrationReport::failure(
                CalibrationReason::InsufficientWindow,
                observations.len(),
            );
        }

        let grid = threshold_grid(self.grid_min, self.grid_max, self.grid_step);
        if grid.is_empty() {
            return CalibrationReport::failure(CalibrationReason::EmptyGrid, observations.len());
        }

        let mut best: Option<CalibrationReport> = None;
        for theta in grid {
            let Some(candidate) = self.score(observations, theta, window_size) else {
                continue;
            };
            let better = match &best {
                None => true,
                Some(current) => candidate.score_adj > current.score_adj,
            };
            if better {
                best = Some(candidate);
            }
        }

        best.unwrap_or_else(|| {
            CalibrationReport::failure(CalibrationReason::NoValidCandidate, observations.len())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(imbalance: f64, forward_return: f64) -> LabeledObservation {
        LabeledObservation {
            imbalance,
            forward_return,
        }
    }

    fn search(min_trades: usize, alpha: f64) -> GridSearch {
        GridSearch {
            grid_min: 0.1,
            grid_max: 0.5,
            grid_step: 0.1,
            min_trades,
            turnover_penalty_alpha: alpha,
        }
    }

    #[test]
    fn test_grid_inclusive_and_rounded() {
        let grid = threshold_grid(0.1, 0.5, 0.1);
        assert_eq!(grid, vec![0.1, 0.2, 0.3, 0.4, 0.5]);
    }

    #[test]
    fn test_grid_skips_zero_and_negative() {
        let grid = threshold_grid(-0.1, 0.2, 0.1);
        assert_eq!(grid, vec![0.1, 0.2]);
    }

    #[test]
    fn test_grid_empty_when_inverted() {
        assert!(threshold_grid(0.5, 0.1, 0.1).is_empty());
        assert!(threshold_grid(0.0, 0.0, 0.1).is_empty());
    }

    #[test]
    fn test_grid_step_cap() {
        let grid = threshold_grid(0.1, 0.2, 0.0);
        assert_eq!(grid.len(), MAX_GRID_STEPS);
    }

    #[test]
    fn test_sample_std() {
        assert_eq!(sample_std(&[1.0], 1.0), 0.0);
        assert_eq!(sample_std(&[2.0, 2.0, 2.0], 2.0), 0.0);
        let sd = sample_std(&[1.0, 2.0, 3.0], 2.0);
        assert!((sd - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_t_stat_zero_dispersion() {
        assert_eq!(t_stat(0.01, 0.0, 5), f64::INFINITY);
        assert_eq!(t_stat(-0.01, 0.0, 5), f64::NEG_INFINITY);
        assert_eq!(t_stat(0.0, 0.0, 5), f64::NEG_INFINITY);
        assert!((t_stat(1.0, 2.0, 4) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_signed_returns_align_with_side() {
        let window = vec![obs(0.3, 0.01), obs(-0.3, -0.02), obs(0.05, 0.5)];
        let returns = signed_returns(&window, 0.1);
        assert_eq!(returns, vec![0.01, 0.02]);
    }

    #[test]
    fn test_insufficient_window() {
        let window = vec![obs(0.3, 0.01)];
        let report = search(1, 0.0).run(&window, 5);
        assert_eq!(report.reason, CalibrationReason::InsufficientWindow);
        assert_eq!(report.window_obs, 1);
        assert!(report.theta_hat.is_none());
    }

    #[test]
    fn test_empty_grid() {
        let window = vec![obs(0.3, 0.01)];
        let mut gs = search(1, 0.0);
        gs.grid_min = 0.6;
        let report = gs.run(&window, 1);
        assert_eq!(report.reason, CalibrationReason::EmptyGrid);
    }

    #[test]
    fn test_no_valid_candidate() {
        let window = vec![obs(0.01, 0.01), obs(-0.02, 0.01)];
        let report = search(1, 0.0).run(&window, 2);
        assert_eq!(report.reason, CalibrationReason::NoValidCandidate);
    }

    #[test]
    fn test_selects_best_adjusted_score() {
        // Beyond 0.2 the signal is consistently right; below it is noise
        let window = vec![
            obs(0.15, -0.010),
            obs(-0.15, -0.008),
            obs(0.18, -0.004),
            obs(0.35, 0.010),
            obs(-0.35, -0.012),
            obs(0.45, 0.011),
            obs(-0.40, -0.009),
        ];
        let report = search(2, 0.0).run(&window, window.len());
        assert_eq!(report.reason, CalibrationReason::Ok);
        // 0.2 and 0.3 select the same observations; the lower one is kept
        assert_eq!(report.theta_hat, Some(0.2));
        assert_eq!(report.n, 4);
        assert!(report.score > 0.0);
    }

    #[test]
    fn test_infinite_score_wins_and_ties_keep_lowest() {
        // Every selected return is identical: zero dispersion at every theta
        let window = vec![obs(0.6, 0.125), obs(-0.6, -0.125), obs(0.7, 0.125)];
        let report = search(1, 0.0).run(&window, 3);
        assert_eq!(report.score, f64::INFINITY);
        assert_eq!(report.theta_hat, Some(0.1));
    }

    #[test]
    fn test_turnover_penalty_applied() {
        let window = vec![
            obs(0.2, 0.01),
            obs(0.25, 0.02),
            obs(0.45, 0.03),
            obs(-0.45, -0.01),
        ];
        let gs = search(1, 2.0);
        let report = gs.score(&window, 0.1, 4).unwrap();
        assert_eq!(report.n, 4);
        assert_eq!(report.trade_rate, 1.0);
        assert!((report.score_adj - (report.score - 2.0)).abs() < 1e-12);
    }

    #[test]
    fn test_grid_search_is_deterministic() {
        let window: Vec<LabeledObservation> = (0..50)
            .map(|i| {
                let x = (i as f64 * 0.37).sin();
                obs(x, x * 0.001 + ((i * 7) % 5) as f64 * 1e-4 - 2e-4)
            })
            .collect();
        let gs = search(3, 0.5);
        let first = gs.run(&window, 50);
        let second = gs.run(&window, 50);
        assert_eq!(first, second);
    }
}
