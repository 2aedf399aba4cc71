// ============================================================
// Layer 5 — Learning Rate Schedule
// ============================================================
// Linear warmup from 0 to the base rate, then decay to 0 at the
// last training step. The schedule is stepped once per optimizer
// step, so the very first update uses lr(0), which is 0 when
// there is any warmup.
//
//   linear      λ(t) = (T - t) / (T - W)
//   polynomial  λ(t) = (1 - (t - W) / (T - W))^power, power 1,
//               end rate 0
//
// With power 1 and end rate 0 the two decays coincide inside
// [W, T]; past T the linear form clamps at 0 and the polynomial
// form returns the end rate.

use std::{fmt, str::FromStr};

use crate::domain::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerKind {
    Linear,
    Polynomial,
}

impl FromStr for SchedulerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "linear" => Ok(SchedulerKind::Linear),
            "polynomial" => Ok(SchedulerKind::Polynomial),
            other => Err(ConfigError::UnknownScheduler(other.to_string())),
        }
    }
}

impl fmt::Display for SchedulerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SchedulerKind::Linear => "linear",
            SchedulerKind::Polynomial => "polynomial",
        })
    }
}

/// Exactly one of the two must be set.
pub fn check_warmup(warmup_steps: Option<usize>, warmup_ratio: Option<f64>) -> Result<(), ConfigError> {
    match (warmup_steps, warmup_ratio) {
        (Some(_), Some(_)) => Err(ConfigError::ConflictingWarmup),
        (None, None) => Err(ConfigError::MissingWarmup),
        _ => Ok(()),
    }
}

/// Warmup length in (possibly fractional) steps.
pub fn resolve_warmup(
    warmup_steps: Option<usize>,
    warmup_ratio: Option<f64>,
    total_steps:  usize,
) -> Result<f64, ConfigError> {
    check_warmup(warmup_steps, warmup_ratio)?;
    match (warmup_steps, warmup_ratio) {
        (Some(steps), _) => Ok(steps as f64),
        (_, Some(ratio)) => Ok(total_steps as f64 * ratio),
        (None, None) => Err(ConfigError::MissingWarmup),
    }
}

/// epochs × ceil(examples / batch_size)
pub fn total_training_steps(epochs: usize, examples: usize, batch_size: usize) -> usize {
    epochs * examples.div_ceil(batch_size.max(1))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WarmupSchedule {
    pub kind:         SchedulerKind,
    pub base_lr:      f64,
    pub warmup_steps: f64,
    pub total_steps:  usize,
}

impl WarmupSchedule {
    pub fn new(kind: SchedulerKind, base_lr: f64, warmup_steps: f64, total_steps: usize) -> Self {
        Self { kind, base_lr, warmup_steps, total_steps }
    }

    /// Learning rate for the update at global step `step`.
    pub fn lr(&self, step: usize) -> f64 {
        self.base_lr * self.factor(step)
    }

    pub fn factor(&self, step: usize) -> f64 {
        let t = step as f64;
        let w = self.warmup_steps;
        let total = self.total_steps as f64;

        if t < w {
            return t / w.max(1.0);
        }
        match self.kind {
            SchedulerKind::Linear => ((total - t) / (total - w).max(1.0)).max(0.0),
            SchedulerKind::Polynomial => {
                if t > total {
                    return 0.0;
                }
                let decay_steps = (total - w).max(1.0);
                1.0 - (t - w) / decay_steps
            }
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_warmup_exclusivity() {
        assert_eq!(check_warmup(Some(10), Some(0.1)), Err(ConfigError::ConflictingWarmup));
        assert_eq!(check_warmup(None, None), Err(ConfigError::MissingWarmup));
        assert_eq!(check_warmup(Some(0), None), Ok(()));
        assert_eq!(check_warmup(None, Some(0.0)), Ok(()));
    }

    #[test]
    fn test_resolve_warmup_from_ratio() {
        let total = total_training_steps(3, 1001, 100);
        assert_eq!(total, 33);
        assert!(close(resolve_warmup(None, Some(0.1), total).unwrap(), 3.3));
        assert!(close(resolve_warmup(Some(5), None, total).unwrap(), 5.0));
    }

    #[test]
    fn test_linear_schedule() {
        let s = WarmupSchedule::new(SchedulerKind::Linear, 1.0, 10.0, 110);
        assert!(close(s.factor(0), 0.0));
        assert!(close(s.factor(5), 0.5));
        assert!(close(s.factor(10), 1.0));
        assert!(close(s.factor(60), 0.5));
        assert!(close(s.factor(110), 0.0));
        assert!(close(s.factor(200), 0.0));
    }

    #[test]
    fn test_polynomial_matches_linear_inside_range() {
        let lin  = WarmupSchedule::new(SchedulerKind::Linear, 2e-5, 4.0, 40);
        let poly = WarmupSchedule::new(SchedulerKind::Polynomial, 2e-5, 4.0, 40);
        for step in 0..=40 {
            assert!(close(lin.lr(step), poly.lr(step)), "step {step}");
        }
        assert!(close(poly.lr(41), 0.0));
    }

    #[test]
    fn test_zero_warmup_starts_at_base_rate() {
        let s = WarmupSchedule::new(SchedulerKind::Linear, 0.1, 0.0, 10);
        assert!(close(s.lr(0), 0.1));
    }

    #[test]
    fn test_unknown_scheduler() {
        assert_eq!("cosine".parse::<SchedulerKind>(), Err(ConfigError::UnknownScheduler("cosine".into())));
    }
}
