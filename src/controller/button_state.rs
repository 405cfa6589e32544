use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

// Buttons wired to the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalButton {
    A,
    B,
    X,
    Y,
    // Soft buttons, decoded from analog inputs
    Up,
    Down,
}

impl LogicalButton {
    pub const ALL: [LogicalButton; 6] = [
        LogicalButton::A,
        LogicalButton::B,
        LogicalButton::X,
        LogicalButton::Y,
        LogicalButton::Up,
        LogicalButton::Down,
    ];
}

impl fmt::Display for LogicalButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogicalButton::A => "A",
            LogicalButton::B => "B",
            LogicalButton::X => "X",
            LogicalButton::Y => "Y",
            LogicalButton::Up => "Up",
            LogicalButton::Down => "Down",
        };
        f.write_str(name)
    }
}

/// Copy of all button states at one instant
///
/// Owned by the receiver; later updates to [`ButtonState`] never change it.
#[derive(Clone, Debug, PartialEq)]
pub struct ButtonSnapshot {
    states: HashMap<LogicalButton, bool>,
    pub timestamp: DateTime<Local>,
}

impl ButtonSnapshot {
    pub fn get(&self, button: LogicalButton) -> bool {
        self.states.get(&button).copied().unwrap_or(false)
    }

    /// Pressed buttons in [`LogicalButton::ALL`] order
    pub fn pressed(&self) -> impl Iterator<Item = LogicalButton> + '_ {
        LogicalButton::ALL
            .into_iter()
            .filter(move |button| self.get(*button))
    }

    pub fn is_idle(&self) -> bool {
        self.pressed().next().is_none()
    }

    pub fn states(&self) -> &HashMap<LogicalButton, bool> {
        &self.states
    }
}

/// Live button states shared between the sampler and readers
///
/// All six buttons are present from construction, released. Clones share the
/// same map.
#[derive(Clone, Debug)]
pub struct ButtonState {
    states: Arc<RwLock<HashMap<LogicalButton, bool>>>,
}

impl Default for ButtonState {
    fn default() -> Self {
        Self::new()
    }
}

impl ButtonState {
    pub fn new() -> Self {
        let states = LogicalButton::ALL
            .into_iter()
            .map(|button| (button, false))
            .collect();
        Self {
            states: Arc::new(RwLock::new(states)),
        }
    }

    pub fn get(&self, button: LogicalButton) -> bool {
        let states = self.states.read().unwrap_or_else(PoisonError::into_inner);
        states.get(&button).copied().unwrap_or(false)
    }

    pub fn set(&self, button: LogicalButton, pressed: bool) {
        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        states.insert(button, pressed);
    }

    /// Applies several updates under one write lock
    pub fn set_all(&self, updates: &[(LogicalButton, bool)]) {
        let mut states = self.states.write().unwrap_or_else(PoisonError::into_inner);
        for (button, pressed) in updates {
            states.insert(*button, *pressed);
        }
    }

    pub fn snapshot(&self) -> ButtonSnapshot {
        let states = self.states.read().unwrap_or_else(PoisonError::into_inner);
        ButtonSnapshot {
            states: states.clone(),
            timestamp: Local::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn all_buttons_start_released() {
        let state = ButtonState::new();
        let snapshot = state.snapshot();
        assert_eq!(snapshot.states().len(), 6);
        assert!(snapshot.is_idle());
        for button in LogicalButton::ALL {
            assert!(!state.get(button));
        }
    }

    #[test]
    fn set_then_get() {
        let state = ButtonState::new();
        state.set(LogicalButton::X, true);
        assert!(state.get(LogicalButton::X));
        assert!(!state.get(LogicalButton::Y));
        state.set(LogicalButton::X, false);
        assert!(!state.get(LogicalButton::X));
    }

    #[test]
    fn snapshot_is_independent_of_later_writes() {
        let state = ButtonState::new();
        state.set(LogicalButton::Up, true);
        let before = state.snapshot();

        state.set(LogicalButton::Up, false);
        state.set(LogicalButton::A, true);

        assert!(before.get(LogicalButton::Up));
        assert!(!before.get(LogicalButton::A));
        assert_eq!(before.pressed().collect::<Vec<_>>(), vec![LogicalButton::Up]);
    }

    #[test]
    fn concurrent_snapshots_never_see_half_an_update() {
        let state = ButtonState::new();
        let all_pressed: Vec<_> = LogicalButton::ALL.iter().map(|b| (*b, true)).collect();
        let all_released: Vec<_> = LogicalButton::ALL.iter().map(|b| (*b, false)).collect();

        let writer = {
            let state = state.clone();
            thread::spawn(move || {
                for i in 0..2_000 {
                    if i % 2 == 0 {
                        state.set_all(&all_pressed);
                    } else {
                        state.set_all(&all_released);
                    }
                }
            })
        };
        let single_writer = {
            let state = state.clone();
            thread::spawn(move || {
                for i in 0..2_000 {
                    state.set(LogicalButton::ALL[i % 6], i % 3 == 0);
                }
            })
        };

        for _ in 0..2_000 {
            let snapshot = state.snapshot();
            assert_eq!(snapshot.states().len(), 6);
        }
        writer.join().unwrap();
        single_writer.join().unwrap();

        state.set_all(&LogicalButton::ALL.map(|b| (b, true)));
        let snapshot = state.snapshot();
        assert!(LogicalButton::ALL.iter().all(|b| snapshot.get(*b)));
    }

    #[test]
    fn whole_tick_updates_are_atomic_for_readers() {
        let state = ButtonState::new();
        let writer = {
            let state = state.clone();
            thread::spawn(move || {
                for i in 0..5_000 {
                    let pressed = i % 2 == 0;
                    state.set_all(&LogicalButton::ALL.map(|b| (b, pressed)));
                }
            })
        };
        for _ in 0..5_000 {
            let snapshot = state.snapshot();
            let first = snapshot.get(LogicalButton::A);
            assert!(LogicalButton::ALL.iter().all(|b| snapshot.get(*b) == first));
        }
        writer.join().unwrap();
    }

    #[test]
    fn display_names() {
        let names: Vec<_> = LogicalButton::ALL.iter().map(|b| b.to_string()).collect();
        assert_eq!(names, ["A", "B", "X", "Y", "Up", "Down"]);
    }
}
