use std::collections::VecDeque;

use super::HeartRateSample;

/// Amount of samples kept for the live chart (~1 minute at 1Hz)
pub const WINDOW_CAPACITY: usize = 60;

/// The most recent heart rate samples of a session, oldest first.
///
/// Appending past [`WINDOW_CAPACITY`] drops the oldest samples.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    samples: VecDeque<HeartRateSample>,
    capacity: usize,
}

impl Default for SampleWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl SampleWindow {
    pub fn new() -> Self {
        Self::with_capacity(WINDOW_CAPACITY)
    }
    pub fn with_capacity(capacity: usize) -> Self {
        // A window that can't hold its latest sample can't report `current()`
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }
    pub fn append(&mut self, sample: HeartRateSample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }
    /// Latest sample, if any have arrived.
    pub fn current(&self) -> Option<HeartRateSample> {
        self.samples.back().copied()
    }
    pub fn clear(&mut self) {
        self.samples.clear();
    }
    /// Point-in-time copy of the window, oldest first.
    pub fn snapshot(&self) -> Vec<HeartRateSample> {
        self.samples.iter().copied().collect()
    }
    pub fn len(&self) -> usize {
        self.samples.len()
    }
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    /// (index, bpm) pairs for charting.
    pub fn bpm_dataset(&self) -> Vec<(f64, f64)> {
        self.samples
            .iter()
            .enumerate()
            .map(|(i, sample)| (i as f64, sample.bpm() as f64))
            .collect()
    }
    /// Lowest and highest BPM currently in the window.
    pub fn bpm_bounds(&self) -> Option<(u16, u16)> {
        let low = self.samples.iter().map(HeartRateSample::bpm).min()?;
        let high = self.samples.iter().map(HeartRateSample::bpm).max()?;
        Some((low, high))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(i: u16) -> HeartRateSample {
        HeartRateSample::new(1_700_000_000_000 + i as i64, 60 + i)
    }

    #[test]
    fn keeps_last_sixty_in_order() {
        let mut window = SampleWindow::new();
        for i in 0..65 {
            window.append(sample(i));
        }
        assert_eq!(window.len(), WINDOW_CAPACITY);
        let snapshot = window.snapshot();
        let expected: Vec<HeartRateSample> = (5..65).map(sample).collect();
        assert_eq!(snapshot, expected);
        assert_eq!(window.current(), Some(sample(64)));
    }

    #[test]
    fn clear_empties() {
        let mut window = SampleWindow::new();
        assert_eq!(window.current(), None);
        for i in 0..10 {
            window.append(sample(i));
        }
        window.clear();
        assert!(window.snapshot().is_empty());
        assert!(window.is_empty());
        assert_eq!(window.current(), None);
    }

    #[test]
    fn colliding_timestamps_keep_arrival_order() {
        let mut window = SampleWindow::with_capacity(3);
        for bpm in [70, 71, 72, 73] {
            window.append(HeartRateSample::new(42, bpm));
        }
        let bpms: Vec<u16> = window.snapshot().iter().map(|s| s.bpm()).collect();
        assert_eq!(bpms, vec![71, 72, 73]);
    }

    #[test]
    fn snapshot_is_detached() {
        let mut window = SampleWindow::new();
        window.append(sample(0));
        let snapshot = window.snapshot();
        window.append(sample(1));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn dataset_and_bounds() {
        let mut window = SampleWindow::new();
        assert_eq!(window.bpm_bounds(), None);
        for bpm in [80, 65, 90] {
            window.append(HeartRateSample::new(0, bpm));
        }
        assert_eq!(
            window.bpm_dataset(),
            vec![(0.0, 80.0), (1.0, 65.0), (2.0, 90.0)]
        );
        assert_eq!(window.bpm_bounds(), Some((65, 90)));
    }
}
