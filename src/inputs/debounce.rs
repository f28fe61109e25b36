use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Logical transition of a filtered input
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Edge {
    Activated,
    Deactivated,
}

/// Debounce state tracker for a switch
///
/// A raw level only becomes the stable level after it has been observed
/// unchanged for the whole debounce window.
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    stable: bool,
    candidate: bool,
    candidate_since: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            stable: false,
            candidate: false,
            candidate_since: None,
        }
    }

    /// Feed a raw reading. Returns an edge once the new level has settled.
    pub fn update(&mut self, active: bool, now: Instant) -> Option<Edge> {
        if active != self.candidate || self.candidate_since.is_none() {
            self.candidate = active;
            self.candidate_since = Some(now);
        }

        if self.candidate == self.stable {
            return None;
        }

        let since = self.candidate_since?;
        if now.duration_since(since) >= self.window {
            self.stable = self.candidate;
            Some(if self.stable {
                Edge::Activated
            } else {
                Edge::Deactivated
            })
        } else {
            None
        }
    }
}

/// Fires once per continuous activation that lasts at least `threshold`
#[derive(Debug)]
pub struct HoldDetector {
    threshold: Duration,
    pressed_at: Option<Instant>,
    fired: bool,
}

impl HoldDetector {
    pub fn new(threshold: Duration) -> Self {
        Self {
            threshold,
            pressed_at: None,
            fired: false,
        }
    }

    pub fn press(&mut self, now: Instant) {
        self.pressed_at = Some(now);
        self.fired = false;
    }

    pub fn release(&mut self) {
        self.pressed_at = None;
        self.fired = false;
    }

    /// Returns true exactly once when the current press reaches the threshold
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.pressed_at {
            Some(at) if !self.fired && now.duration_since(at) >= self.threshold => {
                self.fired = true;
                true
            }
            _ => false,
        }
    }
}

/// Moving-average filter for a raw presence signal
///
/// Presence is reported while the mean of the last `queue_len` samples is
/// above `threshold`. Until the queue is full the signal reads as absent.
#[derive(Debug)]
pub struct PresenceFilter {
    samples: VecDeque<bool>,
    queue_len: usize,
    threshold: f32,
    present: bool,
}

impl PresenceFilter {
    pub fn new(queue_len: usize, threshold: f32) -> Self {
        let queue_len = queue_len.max(1);
        Self {
            samples: VecDeque::with_capacity(queue_len),
            queue_len,
            threshold,
            present: false,
        }
    }

    pub fn update(&mut self, active: bool) -> Option<Edge> {
        if self.samples.len() == self.queue_len {
            self.samples.pop_front();
        }
        self.samples.push_back(active);

        if self.samples.len() < self.queue_len {
            return None;
        }

        let hits = self.samples.iter().filter(|s| **s).count();
        let present = hits as f32 / self.queue_len as f32 > self.threshold;

        if present == self.present {
            return None;
        }

        self.present = present;
        Some(if present {
            Edge::Activated
        } else {
            Edge::Deactivated
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_debounce_ignores_bounce() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(ms(20));

        assert_eq!(d.update(true, t0), None);
        assert_eq!(d.update(false, t0 + ms(5)), None);
        assert_eq!(d.update(true, t0 + ms(10)), None);
        assert_eq!(d.update(true, t0 + ms(25)), None);
        assert_eq!(d.update(true, t0 + ms(30)), Some(Edge::Activated));
        assert_eq!(d.update(true, t0 + ms(40)), None);
    }

    #[test]
    fn test_debounce_release_edge() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(ms(20));

        d.update(true, t0);
        assert_eq!(d.update(true, t0 + ms(20)), Some(Edge::Activated));
        assert_eq!(d.update(false, t0 + ms(100)), None);
        assert_eq!(d.update(false, t0 + ms(120)), Some(Edge::Deactivated));
        assert_eq!(d.update(false, t0 + ms(200)), None);
    }

    #[test]
    fn test_zero_window_passes_through() {
        let t0 = Instant::now();
        let mut d = Debouncer::new(Duration::ZERO);

        assert_eq!(d.update(true, t0), Some(Edge::Activated));
        assert_eq!(d.update(false, t0), Some(Edge::Deactivated));
    }

    #[test]
    fn test_hold_fires_once_per_press() {
        let t0 = Instant::now();
        let mut h = HoldDetector::new(Duration::from_secs(3));

        assert!(!h.poll(t0));
        h.press(t0);
        assert!(!h.poll(t0 + ms(2999)));
        assert!(h.poll(t0 + ms(3000)));
        assert!(!h.poll(t0 + ms(5000)));

        h.release();
        h.press(t0 + ms(6000));
        assert!(h.poll(t0 + ms(9000)));
    }

    #[test]
    fn test_short_press_never_holds() {
        let t0 = Instant::now();
        let mut h = HoldDetector::new(Duration::from_secs(3));

        h.press(t0);
        h.release();
        assert!(!h.poll(t0 + ms(10_000)));
    }

    #[test]
    fn test_presence_single_sample() {
        let mut p = PresenceFilter::new(1, 0.5);

        assert_eq!(p.update(true), Some(Edge::Activated));
        assert_eq!(p.update(true), None);
        assert_eq!(p.update(false), Some(Edge::Deactivated));
    }

    #[test]
    fn test_presence_averages_dropouts() {
        let mut p = PresenceFilter::new(4, 0.5);

        assert_eq!(p.update(true), None);
        assert_eq!(p.update(true), None);
        assert_eq!(p.update(true), None);
        // one dropout in four still reads as presence
        assert_eq!(p.update(false), Some(Edge::Activated));
        assert_eq!(p.update(true), None);
        assert_eq!(p.update(true), None);
        assert_eq!(p.update(false), Some(Edge::Deactivated));
        assert_eq!(p.update(false), None);
    }
}
