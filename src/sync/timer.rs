use crate::time::Ticks;

/// Where the reaction window currently stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    NotStarted,
    /// Window open since `start`; exactly one reaction may be captured
    Armed { start: Ticks },
    Reacted { elapsed_ms: u32 },
}

/// Outcome of a user action against the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// Reaction captured while armed
    Captured(u32),
    /// Pressed before the window opened; the press is dropped
    TooSoon,
    /// Pressed after a reaction was already captured
    Restart,
}

/// Arm/react state of one round
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionTimer {
    state: TimerState,
}

impl Default for ReactionTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReactionTimer {
    pub fn new() -> Self {
        ReactionTimer {
            state: TimerState::NotStarted,
        }
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, TimerState::Armed { .. })
    }

    pub fn reacted_ms(&self) -> Option<u32> {
        match self.state {
            TimerState::Reacted { elapsed_ms } => Some(elapsed_ms),
            _ => None,
        }
    }

    /// Opens the window at `now`, discarding any previous reaction
    pub fn arm(&mut self, now: Ticks) {
        self.state = TimerState::Armed { start: now };
    }

    /// Applies a user action at `now`
    pub fn react(&mut self, now: Ticks) -> Reaction {
        match self.state {
            TimerState::Armed { start } => {
                let elapsed_ms = now.elapsed_since(start);
                self.state = TimerState::Reacted { elapsed_ms };
                Reaction::Captured(elapsed_ms)
            }
            TimerState::NotStarted => Reaction::TooSoon,
            TimerState::Reacted { .. } => Reaction::Restart,
        }
    }

    pub fn reset(&mut self) {
        self.state = TimerState::NotStarted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_too_soon_is_a_no_op() {
        let mut timer = ReactionTimer::new();
        assert_eq!(timer.react(Ticks::new(10)), Reaction::TooSoon);
        assert_eq!(timer.state(), TimerState::NotStarted);
        assert_eq!(timer.reacted_ms(), None);
    }

    #[test]
    fn test_capture_clears_armed() {
        let mut timer = ReactionTimer::new();
        timer.arm(Ticks::new(1_000));
        assert!(timer.is_armed());

        assert_eq!(timer.react(Ticks::new(1_280)), Reaction::Captured(280));
        assert!(!timer.is_armed());
        assert_eq!(timer.reacted_ms(), Some(280));

        // A second press asks for a new round
        assert_eq!(timer.react(Ticks::new(1_500)), Reaction::Restart);
        assert_eq!(timer.reacted_ms(), Some(280));
    }

    #[test]
    fn test_arming_clears_previous_reaction() {
        let mut timer = ReactionTimer::new();
        timer.arm(Ticks::new(0));
        timer.react(Ticks::new(100));
        timer.arm(Ticks::new(200));
        assert_eq!(timer.reacted_ms(), None);
        assert!(timer.is_armed());
    }

    #[test]
    fn test_capture_across_counter_wrap() {
        let mut timer = ReactionTimer::new();
        let start = Ticks::new(u32::MAX - 99);
        timer.arm(start);
        assert_eq!(timer.react(start.add_ms(312)), Reaction::Captured(312));
    }
}
