use std::collections::VecDeque;

/// Monotonic fence bookkeeping.
///
/// Each signal pairs a new fence value with a backend token (a submission
/// index in practice). Values start at 1; value 0 is always complete.
#[derive(Debug)]
pub struct FenceTimeline<T> {
    last_signaled: u64,
    completed: u64,
    pending: VecDeque<(u64, T)>,
}

impl<T> FenceTimeline<T> {
    pub fn new() -> Self {
        Self {
            last_signaled: 0,
            completed: 0,
            pending: VecDeque::new(),
        }
    }

    /// Records `token` under the next fence value and returns that value.
    pub fn signal(&mut self, token: T) -> u64 {
        self.last_signaled += 1;
        self.pending.push_back((self.last_signaled, token));
        self.last_signaled
    }

    #[inline]
    pub fn last_signaled(&self) -> u64 {
        self.last_signaled
    }

    #[inline]
    pub fn completed(&self) -> u64 {
        self.completed
    }

    #[inline]
    pub fn is_complete(&self, value: u64) -> bool {
        value <= self.completed
    }

    /// The token that has to finish for `value` to be reached.
    ///
    /// Returns `None` when `value` is already complete. Pending entries stay
    /// queued until [`FenceTimeline::mark_completed`] covers them.
    pub fn token_through(&self, value: u64) -> Option<&T> {
        self.pending
            .iter()
            .take_while(|(v, _)| *v <= value)
            .last()
            .map(|(_, token)| token)
    }

    /// Marks everything up to `value` as complete and drops the pending
    /// entries it covers. Never moves backwards.
    pub fn mark_completed(&mut self, value: u64) {
        self.completed = self.completed.max(value.min(self.last_signaled));
        while self.pending.front().is_some_and(|(v, _)| *v <= self.completed) {
            self.pending.pop_front();
        }
    }
}

impl<T> Default for FenceTimeline<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Tracks which fence value guards each ring slot.
///
/// `begin` yields the slot to record into and the fence value that must be
/// reached before the slot's constant data may be overwritten; `end` stores
/// the fence of the frame just submitted.
#[derive(Debug, Clone)]
pub struct FramePacer {
    slot_fences: Vec<u64>,
    frame_number: u64,
}

impl FramePacer {
    /// `frame_count` is clamped to at least one slot.
    pub fn new(frame_count: u32) -> Self {
        Self {
            slot_fences: vec![0; frame_count.max(1) as usize],
            frame_number: 0,
        }
    }

    #[inline]
    pub fn frame_count(&self) -> u32 {
        self.slot_fences.len() as u32
    }

    /// Ring slot for the frame about to be recorded.
    #[inline]
    pub fn current_index(&self) -> u32 {
        (self.frame_number % self.slot_fences.len() as u64) as u32
    }

    /// Total frames ended so far.
    #[inline]
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Returns `(frame_index, fence_to_wait_for)` for the next frame.
    pub fn begin(&self) -> (u32, u64) {
        let index = self.current_index();
        (index, self.slot_fences[index as usize])
    }

    /// Records `fence` as guarding the current slot and advances.
    pub fn end(&mut self, fence: u64) {
        let index = self.current_index() as usize;
        self.slot_fences[index] = fence;
        self.frame_number += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── timeline ──────────────────────────────────────────────────────────

    #[test]
    fn values_increase_from_one() {
        let mut t = FenceTimeline::new();
        assert_eq!(t.signal('a'), 1);
        assert_eq!(t.signal('b'), 2);
        assert_eq!(t.last_signaled(), 2);
        assert!(t.is_complete(0));
        assert!(!t.is_complete(1));
    }

    #[test]
    fn token_through_returns_token_of_target() {
        let mut t = FenceTimeline::new();
        t.signal(10);
        t.signal(20);
        t.signal(30);
        assert_eq!(t.token_through(2), Some(&20));
        t.mark_completed(2);
        // already drained
        assert_eq!(t.token_through(2), None);
        assert_eq!(t.token_through(3), Some(&30));
    }

    #[test]
    fn token_stays_pending_until_completion_is_recorded() {
        let mut t = FenceTimeline::new();
        t.signal(10);
        t.signal(20);
        // a wait that fails never reaches mark_completed
        assert_eq!(t.token_through(2), Some(&20));
        assert_eq!(t.token_through(2), Some(&20));
        assert!(!t.is_complete(2));
        t.mark_completed(1);
        assert_eq!(t.token_through(2), Some(&20));
        t.mark_completed(2);
        assert_eq!(t.token_through(2), None);
    }

    #[test]
    fn completion_never_regresses_or_overshoots() {
        let mut t = FenceTimeline::new();
        t.signal(());
        t.signal(());
        t.mark_completed(2);
        t.mark_completed(1);
        assert_eq!(t.completed(), 2);
        t.mark_completed(99);
        assert_eq!(t.completed(), 2);
    }

    // ── pacer ─────────────────────────────────────────────────────────────

    #[test]
    fn pacer_cycles_slots() {
        let mut p = FramePacer::new(3);
        let mut seen = Vec::new();
        for fence in 1..=6 {
            let (idx, _) = p.begin();
            seen.push(idx);
            p.end(fence);
        }
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn pacer_waits_on_fence_from_previous_use_of_slot() {
        let mut p = FramePacer::new(2);
        assert_eq!(p.begin(), (0, 0));
        p.end(5);
        assert_eq!(p.begin(), (1, 0));
        p.end(6);
        // slot 0 again: must wait for the frame that last used it
        assert_eq!(p.begin(), (0, 5));
    }

    #[test]
    fn single_slot_pacer_waits_every_frame() {
        let mut p = FramePacer::new(0);
        assert_eq!(p.frame_count(), 1);
        p.end(7);
        assert_eq!(p.begin(), (0, 7));
    }
}
