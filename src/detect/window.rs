use std::collections::VecDeque;

/// Mean and population standard deviation of a [`StatWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WindowStats {
    pub mean: f64,
    pub std_dev: f64,
}

/// Bounded trailing buffer of raw values for one signal.
#[derive(Debug, Clone)]
pub struct StatWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl StatWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Append a value, evicting the oldest once the window is over capacity.
    pub fn observe(&mut self, value: f64) {
        self.values.push_back(value);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    /// Statistics over the current contents. An empty window yields zeros.
    pub fn stats(&self) -> WindowStats {
        if self.values.is_empty() {
            return WindowStats::default();
        }
        let n = self.values.len() as f64;
        let mean = self.values.iter().sum::<f64>() / n;
        let variance = self
            .values
            .iter()
            .map(|&x| (x - mean).powi(2))
            .sum::<f64>()
            / n;

        WindowStats {
            mean,
            std_dev: variance.sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_window() {
        let w = StatWindow::new(5);
        assert!(w.is_empty());
        assert_eq!(w.stats(), WindowStats { mean: 0.0, std_dev: 0.0 });
    }

    #[test]
    fn test_population_std_dev() {
        let mut w = StatWindow::new(10);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            w.observe(v);
        }
        let stats = w.stats();
        assert_eq!(stats.mean, 3.0);
        // Population variance of 1..5 is 2.0
        assert!((stats.std_dev - 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_fifo_eviction() {
        let mut w = StatWindow::new(3);
        for v in [100.0, 1.0, 2.0, 3.0] {
            w.observe(v);
        }
        assert_eq!(w.len(), 3);
        assert_eq!(w.stats().mean, 2.0);
    }

    #[test]
    fn test_constant_window_has_zero_std_dev() {
        let mut w = StatWindow::new(30);
        for _ in 0..30 {
            w.observe(80_000_000.0);
        }
        assert_eq!(w.stats().std_dev, 0.0);
    }
}
