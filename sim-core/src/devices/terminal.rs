//! Console terminal: TTI keyboard input and TTO character output.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use log::debug;

use crate::config::TerminalConfig;
use crate::console::Console;
use crate::device::Device;
use crate::error::{SimError, SimResult};
use crate::scheduler::Scheduler;
use crate::unit::{Unit, UnitId};

/// Typing this key stops the simulation (Ctrl-E).
pub const INTERRUPT_CHAR: u8 = 0x05;

#[derive(Default)]
struct TerminalState {
    input: VecDeque<u8>,
    output: VecDeque<u8>,
}

/// Cloneable front end the instruction stream uses to talk to the terminal.
#[derive(Clone)]
pub struct TerminalHandle {
    state: Rc<RefCell<TerminalState>>,
    tto: UnitId,
    output_ticks: i32,
}

impl TerminalHandle {
    /// Next character received by TTI.
    pub fn read_char(&self) -> Option<u8> {
        self.state.borrow_mut().input.pop_front()
    }

    /// Queue a character for TTO. It reaches the console `output_ticks` later.
    pub fn put_char(&self, sched: &mut Scheduler, ch: u8) {
        self.state.borrow_mut().output.push_back(ch);
        sched.activate(self.tto, self.output_ticks);
    }

    /// True while output is still queued.
    pub fn output_busy(&self) -> bool {
        !self.state.borrow().output.is_empty()
    }
}

/// Both halves of the console terminal, registered as one device.
pub struct Terminal {
    units: [UnitId; 2],
    poll_ticks: i32,
    handle: TerminalHandle,
}

impl Terminal {
    pub fn new(
        sched: &mut Scheduler,
        config: &TerminalConfig,
        console: Rc<RefCell<dyn Console>>,
    ) -> Self {
        let state = Rc::new(RefCell::new(TerminalState::default()));
        let poll_ticks = config.poll_ticks;
        let output_ticks = config.output_ticks;

        let (keyboard, rx) = (Rc::clone(&console), Rc::clone(&state));
        let tti = sched.add_unit(Unit::new("TTI").with_action(move |sched, id| {
            sched.activate(id, poll_ticks);
            let mut keyboard = keyboard.borrow_mut();
            while let Some(key) = keyboard.get_key() {
                if key == INTERRUPT_CHAR {
                    debug!("TTI: interrupt character");
                    return Err(SimError::Stopped);
                }
                rx.borrow_mut().input.push_back(key);
            }
            Ok(())
        }));

        let (display, tx) = (console, Rc::clone(&state));
        let tto = sched.add_unit(Unit::new("TTO").with_action(move |sched, id| {
            let mut tx = tx.borrow_mut();
            if let Some(ch) = tx.output.pop_front() {
                display.borrow_mut().write(ch);
            }
            if !tx.output.is_empty() {
                sched.activate(id, output_ticks);
            }
            Ok(())
        }));

        Self {
            units: [tti, tto],
            poll_ticks,
            handle: TerminalHandle {
                state,
                tto,
                output_ticks,
            },
        }
    }

    pub fn handle(&self) -> TerminalHandle {
        self.handle.clone()
    }
}

impl Device for Terminal {
    fn name(&self) -> &str {
        "TT"
    }

    fn units(&self) -> &[UnitId] {
        &self.units
    }

    fn reset(&mut self, sched: &mut Scheduler) -> SimResult<()> {
        let [tti, tto] = self.units;
        sched.cancel(tti)?;
        sched.cancel(tto)?;
        {
            let mut state = self.handle.state.borrow_mut();
            state.input.clear();
            state.output.clear();
        }
        sched.activate(tti, self.poll_ticks);
        Ok(())
    }
}
