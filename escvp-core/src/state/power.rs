//! Power-state gate.
//!
//! While the projector warms up or cools down it ignores most commands,
//! so new requests are held back until the transition ends. The gate
//! tracks the last observed power state, the shared transition signal
//! and the latched alarm flag.
//!
//! ```text
//!  Off ──ack "PWR ON"──► WarmingUp ──PWR=on──► On
//!   ▲                                          │
//!   └──PWR=off── CoolingDown ◄──ack "PWR OFF"──┘
//! ```

use tracing::debug;

use crate::error::EscvpError;
use crate::property::{self, PowerState, PropertyValue};
use crate::state::completion::Completion;

/// Command text that starts a warm-up.
pub fn power_on_command() -> String {
    format!("{} {}", property::POWER, property::ON)
}

/// Command text that starts a cool-down.
pub fn power_off_command() -> String {
    format!("{} {}", property::POWER, property::OFF)
}

/// `true` for power writes, which get the longer timeout.
pub fn is_power_command(command: &str) -> bool {
    command
        .strip_prefix(property::POWER)
        .is_some_and(|rest| rest.starts_with(' '))
}

/// Result of feeding a power update through the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerUpdate {
    /// Stale update; nothing changes and nothing is published.
    Discarded,
    /// Applied. `cleared_error` is set when a latched alarm was released.
    Applied { cleared_error: bool },
}

#[derive(Debug, Default)]
pub struct PowerGate {
    state: Option<PowerState>,
    transition: Option<Completion>,
    error_latched: bool,
}

impl PowerGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Option<PowerState> {
        self.state
    }

    pub fn has_error(&self) -> bool {
        self.error_latched
    }

    pub fn latch_error(&mut self) {
        self.error_latched = true;
    }

    fn transition_pending(&self) -> bool {
        self.transition.as_ref().is_some_and(|signal| !signal.is_done())
    }

    /// An ack arrived for `command`. Returns the transition state to
    /// publish when the ack starts a warm-up or cool-down.
    pub fn on_ack(&mut self, command: &str) -> Option<PowerState> {
        let target = match self.state {
            Some(PowerState::Off) if command == power_on_command() => PowerState::WarmingUp,
            Some(PowerState::On) if command == power_off_command() => PowerState::CoolingDown,
            _ => return None,
        };
        if self.transition.is_none() {
            debug!(%target, "creating power transition signal");
            self.transition = Some(Completion::new());
        }
        Some(target)
    }

    fn is_stale(&self, reported: PowerState) -> bool {
        match (self.state, reported) {
            (Some(PowerState::Off), PowerState::CoolingDown)
            | (Some(PowerState::On), PowerState::WarmingUp) => true,
            (Some(PowerState::WarmingUp), PowerState::Off)
            | (Some(PowerState::CoolingDown), PowerState::On) => self.transition_pending(),
            _ => false,
        }
    }

    /// Apply a decoded `PWR` value.
    pub fn observe(&mut self, value: &PropertyValue) -> PowerUpdate {
        let reported = value.as_power().unwrap_or(PowerState::Error);
        if self.is_stale(reported) {
            debug!(current = ?self.state, %reported, "discarding stale power update");
            return PowerUpdate::Discarded;
        }

        self.state = Some(reported);
        let mut cleared_error = false;
        if reported.is_terminal() {
            if let Some(signal) = self.transition.take() {
                if signal.resolve(PropertyValue::Power(reported)) {
                    debug!(%reported, "power transition complete");
                }
            }
            if self.error_latched {
                self.error_latched = false;
                cleared_error = true;
            }
        }
        PowerUpdate::Applied { cleared_error }
    }

    /// The signal to wait on before writing, while a transition runs.
    pub fn pending_transition(&self) -> Option<Completion> {
        match self.state {
            Some(state) if state.is_transition() => self
                .transition
                .clone()
                .filter(|signal| !signal.is_done()),
            _ => None,
        }
    }

    /// Waiting on `signal` timed out: fail it for every waiter and stop
    /// treating late terminal updates as stale.
    pub fn expire(&mut self, signal: &Completion, error: EscvpError) {
        signal.reject(error);
        if self
            .transition
            .as_ref()
            .is_some_and(|current| current.same_as(signal))
        {
            self.transition = None;
        }
    }

    /// Forget everything; used when the session closes.
    pub fn reset(&mut self) {
        if let Some(signal) = self.transition.take() {
            signal.reject(EscvpError::ConnectionClosed);
        }
        *self = Self::default();
    }
}
