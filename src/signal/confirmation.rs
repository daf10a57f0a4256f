//! Signal confirmation (debounce) filter

use super::Signal;
use std::collections::VecDeque;

/// Debounces raw signals over a trailing window.
///
/// Keeps the `window` most recent raw signals (oldest evicted first). A
/// directional raw signal is confirmed once it appears at least `required`
/// times in the window; anything else comes out as HOLD. HOLD is still
/// pushed so stale confirmations decay.
#[derive(Debug, Clone)]
pub struct ConfirmationFilter {
    history: VecDeque<Signal>,
    window: usize,
    required: usize,
}

impl ConfirmationFilter {
    /// Create a filter with window size M and confirmation count K.
    ///
    /// Both are clamped to at least 1 and K to at most M.
    pub fn new(window: usize, required: usize) -> Self {
        let window = window.max(1);
        let required = required.clamp(1, window);
        Self {
            history: VecDeque::with_capacity(window),
            window,
            required,
        }
    }

    /// Push a raw signal and return the confirmed signal for this poll
    pub fn confirm(&mut self, raw: Signal) -> Signal {
        if self.history.len() == self.window {
            self.history.pop_front();
        }
        self.history.push_back(raw);

        if !raw.is_directional() {
            return Signal::Hold;
        }

        let hits = self.history.iter().filter(|s| **s == raw).count();
        if hits >= self.required {
            raw
        } else {
            Signal::Hold
        }
    }

    /// Window capacity (M)
    pub fn window(&self) -> usize {
        self.window
    }

    /// Required confirmations (K)
    pub fn required(&self) -> usize {
        self.required
    }

    /// Raw signals currently held, oldest first
    pub fn history(&self) -> impl Iterator<Item = &Signal> {
        self.history.iter()
    }
}
