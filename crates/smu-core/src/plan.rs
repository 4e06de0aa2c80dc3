//! Sweep set-point generation.

use crate::error::{SmuError, SmuResult};

/// Largest point count [`SweepPlan::linear`] and [`SweepPlan::dual`] accept.
pub const MAX_POINTS: usize = 1_000_000;

/// Ordered list of source levels for one sweep.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SweepPlan {
    levels: Vec<f64>,
}

impl SweepPlan {
    /// Use `levels` exactly as given. Rejects non-finite values.
    pub fn new(levels: Vec<f64>) -> SmuResult<Self> {
        if let Some(bad) = levels.iter().find(|v| !v.is_finite()) {
            return Err(SmuError::Configuration(format!(
                "sweep level {} is not finite",
                bad
            )));
        }
        Ok(Self { levels })
    }

    /// `points` evenly spaced levels from `start` to `stop`, both inclusive.
    ///
    /// Zero points gives an empty plan and one point gives `[start]`. The
    /// last level is exactly `stop`. More than [`MAX_POINTS`] points is a
    /// [`SmuError::Configuration`] error.
    pub fn linear(start: f64, stop: f64, points: usize) -> SmuResult<Self> {
        if !start.is_finite() || !stop.is_finite() {
            return Err(SmuError::Configuration(format!(
                "sweep bounds must be finite, got {}..{}",
                start, stop
            )));
        }
        if points > MAX_POINTS {
            return Err(SmuError::Configuration(format!(
                "sweep of {} points exceeds the limit of {}",
                points, MAX_POINTS
            )));
        }

        let levels = match points {
            0 => Vec::new(),
            1 => vec![start],
            n => {
                let step = (stop - start) / (n - 1) as f64;
                let mut levels: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
                levels[n - 1] = stop;
                levels
            }
        };
        Ok(Self { levels })
    }

    /// Linear sweep out to `stop` and back to `start`.
    ///
    /// The turning point is measured once.
    pub fn dual(start: f64, stop: f64, points: usize) -> SmuResult<Self> {
        let mut plan = Self::linear(start, stop, points)?;
        if plan.levels.len() > 1 {
            let reverse: Vec<f64> = plan.levels.iter().rev().skip(1).copied().collect();
            plan.levels.extend(reverse);
        }
        Ok(plan)
    }

    /// Levels in sweep order.
    pub fn levels(&self) -> &[f64] {
        &self.levels
    }

    /// Number of levels.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// True when the plan has no levels.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_endpoints() {
        let plan = SweepPlan::linear(-1.0, 1.0, 5).unwrap();
        assert_eq!(plan.levels(), &[-1.0, -0.5, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_linear_last_level_is_exact() {
        let plan = SweepPlan::linear(0.0, 0.3, 4).unwrap();
        assert_eq!(plan.len(), 4);
        assert_eq!(plan.levels()[3], 0.3);
    }

    #[test]
    fn test_linear_degenerate_counts() {
        assert!(SweepPlan::linear(0.0, 1.0, 0).unwrap().is_empty());
        assert_eq!(SweepPlan::linear(0.25, 1.0, 1).unwrap().levels(), &[0.25]);
    }

    #[test]
    fn test_dual_does_not_repeat_turning_point() {
        let plan = SweepPlan::dual(0.0, 1.0, 3).unwrap();
        assert_eq!(plan.levels(), &[0.0, 0.5, 1.0, 0.5, 0.0]);

        let single = SweepPlan::dual(0.0, 1.0, 1).unwrap();
        assert_eq!(single.levels(), &[0.0]);
    }

    #[test]
    fn test_rejects_oversized_point_count() {
        for points in [MAX_POINTS + 1, usize::MAX / 4, usize::MAX] {
            let err = SweepPlan::linear(0.0, 1.0, points).unwrap_err();
            assert!(matches!(err, SmuError::Configuration(_)), "{points}");
            assert!(SweepPlan::dual(0.0, 1.0, points).is_err());
        }
        assert_eq!(SweepPlan::linear(0.0, 1.0, MAX_POINTS).unwrap().len(), MAX_POINTS);
    }

    #[test]
    fn test_rejects_non_finite() {
        assert!(SweepPlan::new(vec![0.0, f64::INFINITY]).is_err());
        assert!(SweepPlan::linear(f64::NAN, 1.0, 3).is_err());
    }
}
