//! Climb rate from a window of timestamped altitudes
//!
//! Smooth noise-robust differentiator (Holoborodko) over an odd sized window,
//! with per-sample timestamps so irregular sample spacing is handled.

use heapless::HistoryBuffer;

/// Derivative filter over the last `N` samples. `N` must be 5, 7, 9 or 11.
#[derive(Debug, Clone)]
pub struct DerivativeFilter<const N: usize> {
    samples: HistoryBuffer<(u32, f32), N>,
    last_slope: f32,
    new_data: bool,
}

impl<const N: usize> Default for DerivativeFilter<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> DerivativeFilter<N> {
    pub fn new() -> Self {
        Self {
            samples: HistoryBuffer::new(),
            last_slope: 0.0,
            new_data: false,
        }
    }

    /// Add a sample taken at `timestamp_ms`. A repeated timestamp is ignored.
    pub fn update(&mut self, sample: f32, timestamp_ms: u32) {
        if let Some(&(last_ts, _)) = self.samples.recent() {
            if last_ts == timestamp_ms {
                return;
            }
        }
        self.samples.write((timestamp_ms, sample));
        self.new_data = true;
    }

    /// Whether the window holds `N` samples
    pub fn is_full(&self) -> bool {
        self.samples.len() == N
    }

    /// Forget all samples
    pub fn reset(&mut self) {
        self.samples.clear();
        self.last_slope = 0.0;
        self.new_data = false;
    }

    /// Slope in units per millisecond. Zero until the window is full; holds
    /// its last value while no new samples arrive.
    pub fn slope(&mut self) -> f32 {
        if !self.new_data {
            return self.last_slope;
        }
        if !self.is_full() {
            return 0.0;
        }

        let (weights, divisor): (&[f32], f32) = match N {
            5 => (&[4.0, 4.0], 8.0),
            7 => (&[10.0, 16.0, 6.0], 32.0),
            9 => (&[28.0, 56.0, 36.0, 8.0], 128.0),
            11 => (&[84.0, 192.0, 162.0, 64.0, 10.0], 512.0),
            _ => (&[], 1.0),
        };

        let mut window = [(0u32, 0.0f32); N];
        for (slot, sample) in window.iter_mut().zip(self.samples.oldest_ordered()) {
            *slot = *sample;
        }
        let center = N / 2;

        let mut result = 0.0;
        for (k, weight) in weights.iter().enumerate() {
            let (t_hi, f_hi) = window[center + k + 1];
            let (t_lo, f_lo) = window[center - k - 1];
            let dt = t_hi.wrapping_sub(t_lo) as f32;
            result += weight * (f_hi - f_lo) / dt;
        }
        result /= divisor;

        if result.is_nan() || result.is_infinite() {
            result = 0.0;
        }
        self.new_data = false;
        self.last_slope = result;
        result
    }
}

/// Climb rate filter used by the frontend
pub type ClimbRateFilter = DerivativeFilter<7>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_until_full() {
        let mut filter = ClimbRateFilter::new();
        for i in 0..6u32 {
            filter.update(i as f32, i * 100);
            assert_eq!(filter.slope(), 0.0, "window not full after {} samples", i + 1);
        }
    }

    #[test]
    fn test_linear_climb() {
        let mut filter = ClimbRateFilter::new();
        // 2 m/s sampled at 10Hz
        for i in 0..20u32 {
            let t = 1000 + i * 100;
            filter.update(0.2 * i as f32, t);
        }
        let rate = filter.slope() * 1.0e3;
        assert!((rate - 2.0).abs() < 1e-3, "Expected 2.0 m/s, got {}", rate);
    }

    #[test]
    fn test_irregular_spacing() {
        let mut filter = ClimbRateFilter::new();
        let times = [0u32, 80, 200, 290, 400, 520, 600, 710];
        for t in times {
            filter.update(-3.0 * t as f32 / 1000.0, t);
        }
        let rate = filter.slope() * 1.0e3;
        assert!((rate + 3.0).abs() < 1e-3, "Expected -3.0 m/s, got {}", rate);
    }

    #[test]
    fn test_repeated_timestamp_ignored() {
        let mut filter = ClimbRateFilter::new();
        for i in 0..7u32 {
            filter.update(i as f32, i * 100);
        }
        let before = filter.slope();
        filter.update(1000.0, 600);
        assert_eq!(filter.slope(), before, "duplicate timestamp must not enter the window");
    }

    #[test]
    fn test_holds_last_value() {
        let mut filter = ClimbRateFilter::new();
        for i in 0..7u32 {
            filter.update(i as f32, i * 100);
        }
        let rate = filter.slope();
        assert!(rate > 0.0);
        assert_eq!(filter.slope(), rate);
        filter.reset();
        assert_eq!(filter.slope(), 0.0);
    }

    #[test]
    fn test_other_window_sizes() {
        let mut five = DerivativeFilter::<5>::new();
        let mut eleven = DerivativeFilter::<11>::new();
        for i in 0..12u32 {
            five.update(0.5 * i as f32, i * 50);
            eleven.update(0.5 * i as f32, i * 50);
        }
        assert!((five.slope() - 0.01).abs() < 1e-6);
        assert!((eleven.slope() - 0.01).abs() < 1e-6);
    }
}
