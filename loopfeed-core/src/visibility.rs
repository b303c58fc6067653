use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewabilityConfig {
    /// Share of an item's extent, in percent, that has to be inside the
    /// viewport for the item to count as visible.
    pub visible_percent_threshold: f64,
    /// How long an item has to stay visible before it is reported.
    pub minimum_view_time: Duration,
}

/// Turns raw scroll offsets into "visible index changed" observations.
pub struct ViewabilityTracker {
    config: ViewabilityConfig,
    item_extent: f64,
    viewport_extent: f64,
    candidate: Option<(usize, Instant)>,
    reported: Option<usize>,
}

impl ViewabilityTracker {
    pub fn new(config: ViewabilityConfig, item_extent: f64, viewport_extent: f64) -> Self {
        Self {
            config,
            item_extent,
            viewport_extent,
            candidate: None,
            reported: None,
        }
    }

    /// First item at `offset` covering at least the visibility threshold.
    pub fn most_visible(&self, offset: f64, len: usize) -> Option<usize> {
        if len == 0 || self.item_extent <= 0.0 {
            return None;
        }
        // Saturates for offsets far past the end.
        let first = (offset / self.item_extent).floor().max(0.0) as usize;
        if first >= len {
            return None;
        }
        let span = (self.viewport_extent / self.item_extent).ceil() as usize;
        (first..=first.saturating_add(span))
            .take_while(|&index| index < len)
            .find(|&index| self.visible_percent(index, offset) >= self.config.visible_percent_threshold)
    }

    /// The viewport moved to `offset`.  Returns an index to report if the
    /// minimum view time is zero.
    pub fn scrolled(&mut self, offset: f64, len: usize, now: Instant) -> Option<usize> {
        match self.most_visible(offset, len) {
            None => self.candidate = None,
            Some(index) if Some(index) == self.reported => self.candidate = None,
            Some(index) => {
                if self.candidate.map(|(candidate, _)| candidate) != Some(index) {
                    self.candidate = Some((index, now));
                }
            }
        }
        self.poll(now)
    }

    /// Report the candidate once it has been visible long enough.
    pub fn poll(&mut self, now: Instant) -> Option<usize> {
        let (index, since) = self.candidate?;
        if now.saturating_duration_since(since) < self.config.minimum_view_time {
            return None;
        }
        self.candidate = None;
        self.reported = Some(index);
        Some(index)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.candidate
            .map(|(_, since)| since + self.config.minimum_view_time)
    }

    /// Forget what was reported, the item sequence was replaced.
    pub fn reset(&mut self) {
        self.candidate = None;
        self.reported = None;
    }

    fn visible_percent(&self, index: usize, offset: f64) -> f64 {
        let start = index as f64 * self.item_extent;
        let end = start + self.item_extent;
        let overlap = end.min(offset + self.viewport_extent) - start.max(offset);
        overlap.max(0.0) / self.item_extent * 100.0
    }
}
