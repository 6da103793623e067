/// Consecutive-hit debounce: a candidate only becomes an anomaly once
/// `min_consecutive` candidates have been seen in a row.
#[derive(Debug, Clone)]
pub struct HysteresisGate {
    min_consecutive: u32,
    consecutive_hits: u32,
}

impl HysteresisGate {
    /// `min_consecutive` must be at least 1; the detector config validates this.
    pub fn new(min_consecutive: u32) -> Self {
        Self {
            min_consecutive,
            consecutive_hits: 0,
        }
    }

    pub fn consecutive_hits(&self) -> u32 {
        self.consecutive_hits
    }

    /// Feed one candidate flag and return whether the point is a confirmed anomaly.
    pub fn update(&mut self, is_candidate: bool) -> bool {
        if is_candidate {
            self.consecutive_hits = self.consecutive_hits.saturating_add(1);
        } else {
            self.consecutive_hits = 0;
        }
        self.consecutive_hits >= self.min_consecutive
    }
}
