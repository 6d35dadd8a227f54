//! Scheduled gain automation
//!
//! A deck's gain is not written directly by the control side. Instead a
//! linear ramp is scheduled against the graph's frame clock and evaluated
//! per sample on the render thread, which makes crossfades sample accurate
//! regardless of block size.

/// A linear ramp between two frame positions
#[derive(Debug, Clone, Copy, PartialEq)]
struct LinearRamp {
    from: f32,
    to: f32,
    start: u64,
    end: u64,
}

/// Automated gain value of one deck
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainAutomation {
    /// Value outside of any ramp (also the value held after a ramp ends)
    value: f32,
    ramp: Option<LinearRamp>,
}

impl GainAutomation {
    pub fn new(value: f32) -> Self {
        Self { value, ramp: None }
    }

    /// Drop any scheduled ramp, holding the value reached at `now`
    pub fn cancel_scheduled(&mut self, now: u64) {
        self.value = self.value_at(now);
        self.ramp = None;
    }

    /// Set the value immediately, discarding any ramp
    pub fn set_value(&mut self, value: f32) {
        self.value = value;
        self.ramp = None;
    }

    /// Schedule a linear ramp `from -> to` over `[start, start + duration)`
    ///
    /// A zero duration is an immediate set.
    pub fn linear_ramp(&mut self, from: f32, to: f32, start: u64, duration: u64) {
        if duration == 0 {
            self.set_value(to);
            return;
        }
        self.value = to;
        self.ramp = Some(LinearRamp {
            from,
            to,
            start,
            end: start.saturating_add(duration),
        });
    }

    /// Gain at an absolute frame position
    #[inline]
    pub fn value_at(&self, frame: u64) -> f32 {
        match self.ramp {
            Some(r) if frame < r.start => r.from,
            Some(r) if frame < r.end => {
                let t = (frame - r.start) as f32 / (r.end - r.start) as f32;
                r.from + (r.to - r.from) * t
            }
            _ => self.value,
        }
    }
}

impl Default for GainAutomation {
    fn default() -> Self {
        Self::new(1.0)
    }
}
