//! CPU usage estimation for tracked processes.
//!
//! Converts the cumulative CPU-time counter of a process (user + system
//! ticks) into a smoothed utilization figure. The estimate is a fraction of
//! one CPU, so a process busy on several cores can exceed 1.0.

use once_cell::sync::Lazy;
use std::time::Instant;

/// Get system clock ticks per second (usually 100, but can vary).
fn get_clk_tck() -> f64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_CLK_TCK
        // Returns -1 on error, 0 if undefined - both are handled by the > 0 check
        unsafe {
            let tck = libc::sysconf(libc::_SC_CLK_TCK);
            if tck > 0 {
                return tck as f64;
            }
        }
    }
    // Fallback to common default for error cases or non-Unix platforms
    100.0
}

/// Number of online CPUs (at least 1).
fn get_cpu_count() -> usize {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_NPROCESSORS_ONLN
        unsafe {
            let n = libc::sysconf(libc::_SC_NPROCESSORS_ONLN);
            if n > 0 {
                return n as usize;
            }
        }
    }
    1
}

/// System clock ticks per second (for CPU time calculation).
pub static CLK_TCK: Lazy<f64> = Lazy::new(get_clk_tck);

/// Online CPUs; upper bound of a single process's utilization.
pub static CPU_COUNT: Lazy<usize> = Lazy::new(get_cpu_count);

/// Smoothing factor of the moving average (~12 sample time constant).
pub const ALPHA: f64 = 0.08;

/// Per-process CPU usage estimator.
///
/// The first sample only records a baseline. The second sample seeds the
/// estimate with the raw rate; every later sample blends in with weight
/// [`ALPHA`].
#[derive(Debug, Clone, Default)]
pub struct CpuSampler {
    cpu_time_accum: Option<u64>,
    last_sample_time: Option<Instant>,
    cpu_usage_estimate: Option<f64>,
}

impl CpuSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last cumulative tick counter read, if any.
    pub fn cpu_time_accum(&self) -> Option<u64> {
        self.cpu_time_accum
    }

    pub fn last_sample_time(&self) -> Option<Instant> {
        self.last_sample_time
    }

    /// Smoothed utilization; `None` until two samples have been taken.
    pub fn usage(&self) -> Option<f64> {
        self.cpu_usage_estimate
    }

    /// Folds a counter reading taken at `now` into the estimate.
    ///
    /// `tick_rate` is the number of counter ticks one CPU accrues per second.
    /// Returns the current estimate.
    pub fn fold(&mut self, ticks: u64, now: Instant, tick_rate: f64) -> Option<f64> {
        let (last_ticks, last_time) = match (self.cpu_time_accum, self.last_sample_time) {
            (Some(t), Some(at)) => (t, at),
            _ => {
                self.rebase(ticks, now);
                return None;
            }
        };

        if ticks < last_ticks {
            // A counter never goes backwards for the same process.
            self.rebase(ticks, now);
            return None;
        }

        let dt = now.saturating_duration_since(last_time).as_secs_f64();
        if dt <= 0.0 {
            return self.cpu_usage_estimate;
        }

        let max_ticks = dt * tick_rate;
        let instant = (ticks - last_ticks) as f64 / max_ticks;

        let estimate = match self.cpu_usage_estimate {
            None => instant,
            Some(prev) => (1.0 - ALPHA) * prev + ALPHA * instant,
        };

        self.cpu_usage_estimate = Some(estimate);
        self.cpu_time_accum = Some(ticks);
        self.last_sample_time = Some(now);
        Some(estimate)
    }

    fn rebase(&mut self, ticks: u64, now: Instant) {
        self.cpu_time_accum = Some(ticks);
        self.last_sample_time = Some(now);
        self.cpu_usage_estimate = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // -------------------------------------------------------------------------
    // Tests for CpuSampler::fold
    // -------------------------------------------------------------------------

    #[test]
    fn test_first_sample_is_baseline_only() {
        let mut sampler = CpuSampler::new();
        let t0 = Instant::now();

        assert_eq!(sampler.fold(500, t0, 100.0), None);
        assert_eq!(sampler.usage(), None);
        assert_eq!(sampler.cpu_time_accum(), Some(500));
        assert_eq!(sampler.last_sample_time(), Some(t0));
    }

    #[test]
    fn test_second_sample_seeds_with_raw_rate() {
        let mut sampler = CpuSampler::new();
        let t0 = Instant::now();
        sampler.fold(1000, t0, 100.0);

        // 50 ticks over 1s at 100 ticks/s -> half a CPU
        let usage = sampler.fold(1050, t0 + Duration::from_secs(1), 100.0);
        assert!(approx(usage.unwrap(), 0.5));
    }

    #[test]
    fn test_instant_rate_is_ticks_over_interval_times_rate() {
        let mut sampler = CpuSampler::new();
        let t0 = Instant::now();
        sampler.fold(0, t0, 250.0);

        // C = 300 ticks, T = 2s, R = 250/s -> 300 / 500 = 0.6
        let usage = sampler.fold(300, t0 + Duration::from_secs(2), 250.0).unwrap();
        assert!(approx(usage, 0.6));
    }

    #[test]
    fn test_idle_samples_decay_by_alpha() {
        let mut sampler = CpuSampler::new();
        let t0 = Instant::now();
        sampler.fold(0, t0, 100.0);
        let seed = sampler.fold(100, t0 + Duration::from_secs(1), 100.0).unwrap();
        assert!(approx(seed, 1.0));

        let mut expected = seed;
        for i in 2..20u64 {
            expected *= 1.0 - ALPHA;
            let usage = sampler
                .fold(100, t0 + Duration::from_secs(i), 100.0)
                .unwrap();
            assert!(approx(usage, expected), "step {}: {} vs {}", i, usage, expected);
        }
        assert!(expected < seed * 0.25);
    }

    #[test]
    fn test_smoothing_blends_new_sample() {
        let mut sampler = CpuSampler::new();
        let t0 = Instant::now();
        sampler.fold(0, t0, 100.0);
        sampler.fold(50, t0 + Duration::from_secs(1), 100.0); // seed 0.5

        // Next interval at full speed: 0.92 * 0.5 + 0.08 * 1.0
        let usage = sampler.fold(150, t0 + Duration::from_secs(2), 100.0).unwrap();
        assert!(approx(usage, 0.54));
    }

    #[test]
    fn test_multi_core_usage_exceeds_one() {
        let mut sampler = CpuSampler::new();
        let t0 = Instant::now();
        sampler.fold(0, t0, 100.0);
        let usage = sampler.fold(400, t0 + Duration::from_secs(1), 100.0).unwrap();
        assert!(approx(usage, 4.0));
    }

    #[test]
    fn test_irregular_intervals() {
        let mut sampler = CpuSampler::new();
        let t0 = Instant::now();
        sampler.fold(0, t0, 100.0);
        sampler.fold(25, t0 + Duration::from_millis(250), 100.0); // seed 1.0

        // 10 ticks over 400ms -> 0.25
        let usage = sampler
            .fold(35, t0 + Duration::from_millis(650), 100.0)
            .unwrap();
        assert!(approx(usage, 0.92 + 0.08 * 0.25));
    }

    #[test]
    fn test_zero_interval_leaves_state_untouched() {
        let mut sampler = CpuSampler::new();
        let t0 = Instant::now();
        sampler.fold(0, t0, 100.0);
        let t1 = t0 + Duration::from_secs(1);
        sampler.fold(30, t1, 100.0);

        assert!(approx(sampler.fold(90, t1, 100.0).unwrap(), 0.3));
        assert_eq!(sampler.cpu_time_accum(), Some(30));
    }

    #[test]
    fn test_counter_going_backwards_rebases() {
        let mut sampler = CpuSampler::new();
        let t0 = Instant::now();
        sampler.fold(1000, t0, 100.0);
        sampler.fold(1100, t0 + Duration::from_secs(1), 100.0);

        assert_eq!(sampler.fold(10, t0 + Duration::from_secs(2), 100.0), None);
        assert_eq!(sampler.usage(), None);
        assert_eq!(sampler.cpu_time_accum(), Some(10));
    }

    #[test]
    fn test_clk_tck_and_cpu_count_are_positive() {
        assert!(*CLK_TCK > 0.0);
        assert!(*CPU_COUNT >= 1);
    }
}
