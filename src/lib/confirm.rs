// SPDX-License-Identifier: Apache-2.0

use std::io::Write;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::NetplanError;

const DEFAULT_TICK: Duration = Duration::from_secs(1);
const DEFAULT_POLL_SLICE: Duration = Duration::from_millis(100);

const NO_INTERRUPT: u8 = 0;
const INTERRUPT_ACCEPT: u8 = 1;
const INTERRUPT_REJECT: u8 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Accepted,
    Rejected,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    Accept,
    Reject,
}

/// Slot holding at most one pending interrupt. Posting only touches an
/// atomic, so it may happen from a signal handler.
#[derive(Debug, Clone, Default)]
pub struct InterruptToken {
    slot: Arc<AtomicU8>,
}

impl InterruptToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first interrupt posted wins until it is taken.
    pub fn post(&self, interrupt: Interrupt) {
        let value = match interrupt {
            Interrupt::Accept => INTERRUPT_ACCEPT,
            Interrupt::Reject => INTERRUPT_REJECT,
        };
        let _ = self.slot.compare_exchange(
            NO_INTERRUPT,
            value,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    pub fn take(&self) -> Option<Interrupt> {
        match self.slot.swap(NO_INTERRUPT, Ordering::SeqCst) {
            INTERRUPT_ACCEPT => Some(Interrupt::Accept),
            INTERRUPT_REJECT => Some(Interrupt::Reject),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.slot.load(Ordering::SeqCst) != NO_INTERRUPT
    }
}

/// Operator input watched while waiting for a confirmation.
pub trait ConfirmInput {
    fn prepare(&mut self) -> Result<(), NetplanError> {
        Ok(())
    }

    /// Wait up to `timeout` for input. Returns true when some input was
    /// consumed.
    fn wait_readable(
        &mut self,
        timeout: Duration,
    ) -> Result<bool, NetplanError>;

    fn restore(&mut self) {}
}

struct RestoreGuard<'a, I: ConfirmInput + ?Sized> {
    input: &'a mut I,
}

impl<I: ConfirmInput + ?Sized> Drop for RestoreGuard<'_, I> {
    fn drop(&mut self) {
        self.input.restore();
    }
}

/// Countdown waiting for the operator to accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmWait {
    timeout: Duration,
    tick: Duration,
    poll_slice: Duration,
}

impl ConfirmWait {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            tick: DEFAULT_TICK,
            poll_slice: DEFAULT_POLL_SLICE,
        }
    }

    /// Length of one countdown step, one second unless shortened for tests.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self.poll_slice = std::cmp::min(self.poll_slice, tick);
        self
    }

    /// Block until input arrives (`Accepted`), an interrupt is posted
    /// (`Accepted` or `Rejected`) or the timeout expires (`TimedOut`).
    /// Terminal settings are restored whatever the exit path.
    pub fn wait<I, W>(
        &self,
        input: &mut I,
        interrupts: &InterruptToken,
        out: &mut W,
    ) -> Result<Confirmation, NetplanError>
    where
        I: ConfirmInput + ?Sized,
        W: Write + ?Sized,
    {
        input.prepare()?;
        let mut guard = RestoreGuard { input };

        let ticks = count_ticks(self.timeout, self.tick);
        for remaining in (1..=ticks).rev() {
            let _ = write!(
                out,
                "\rChanges will revert in {remaining:>3} seconds"
            );
            let _ = out.flush();

            let tick_end = Instant::now() + self.tick;
            loop {
                if let Some(interrupt) = interrupts.take() {
                    let _ = writeln!(out);
                    log::debug!("Confirmation interrupted by {interrupt:?}");
                    return Ok(match interrupt {
                        Interrupt::Accept => Confirmation::Accepted,
                        Interrupt::Reject => Confirmation::Rejected,
                    });
                }
                let now = Instant::now();
                if now >= tick_end {
                    break;
                }
                let slice = std::cmp::min(self.poll_slice, tick_end - now);
                if guard.input.wait_readable(slice)? {
                    let _ = writeln!(out);
                    return Ok(Confirmation::Accepted);
                }
            }
        }
        let _ = writeln!(out);
        Ok(Confirmation::TimedOut)
    }
}

fn count_ticks(timeout: Duration, tick: Duration) -> u64 {
    if tick.is_zero() {
        return 0;
    }
    let tick = tick.as_nanos();
    let ticks = (timeout.as_nanos() + tick - 1) / tick;
    u64::try_from(ticks).unwrap_or(u64::MAX)
}
