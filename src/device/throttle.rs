//! Paces the commands of each button, because the robot firmware drops commands that arrive too
//! close to each other.
//!
//! Every button has its own gate. A command for a free gate is sent right away and makes the gate
//! busy for the delay of its edge type (140ms after a press, 190ms after a release). A command for
//! a busy gate is deferred by that same delay and frees the gate. While a deferred command is
//! pending, newer commands for that button replace it instead of being sent out of order.

use std::time::Duration;
use log::debug;

use crate::device::command::{Button, CommandCode, Edge};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThrottleGate {
    busy: bool,
    pending: Option<CommandCode>,
    // incremented whenever the gate becomes busy, so that stale clear timers can be ignored
    epoch: u64,
}

impl ThrottleGate {
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn pending(&self) -> Option<CommandCode> {
        self.pending
    }
}

/// What the caller must do with a button edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThrottleDecision {
    /// Send `code` now, then call `clear(button, epoch)` after `clear_after`.
    Immediate { code: CommandCode, clear_after: Duration, epoch: u64 },
    /// Call `take_pending(button)` after `delay` and send the result.
    Deferred { delay: Duration },
    /// `code` replaced the command that was already pending; nothing to schedule.
    Coalesced { replaced: CommandCode },
}

#[derive(Debug, Default)]
pub struct CommandThrottler {
    gates: [ThrottleGate; Button::COUNT],
}

impl CommandThrottler {
    pub fn new() -> Self {
        CommandThrottler::default()
    }

    pub fn gate(&self, button: Button) -> &ThrottleGate {
        &self.gates[button.index()]
    }

    pub fn edge(&mut self, button: Button, edge: Edge) -> ThrottleDecision {
        let code = button.code(edge);
        let gate = &mut self.gates[button.index()];

        if let Some(replaced) = gate.pending.replace(code) {
            debug!("{} replaces pending command {}", code, replaced);
            return ThrottleDecision::Coalesced { replaced };
        }

        if gate.busy {
            gate.busy = false;
            return ThrottleDecision::Deferred { delay: edge.delay() };
        }

        gate.pending = None;
        gate.busy = true;
        gate.epoch += 1;

        ThrottleDecision::Immediate {
            code,
            clear_after: edge.delay(),
            epoch: gate.epoch,
        }
    }

    /// The clear timer armed by an immediate dispatch has elapsed.
    pub fn clear(&mut self, button: Button, epoch: u64) {
        let gate = &mut self.gates[button.index()];
        if gate.epoch == epoch {
            gate.busy = false;
        }
    }

    /// The delay of a deferred command has elapsed. This does not make the gate busy again.
    pub fn take_pending(&mut self, button: Button) -> Option<CommandCode> {
        self.gates[button.index()].pending.take()
    }

    pub fn reset(&mut self) {
        for gate in self.gates.iter_mut() {
            gate.busy = false;
            gate.pending = None;
        }
    }
}
