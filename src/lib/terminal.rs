// SPDX-License-Identifier: Apache-2.0

use std::os::unix::io::{AsRawFd, RawFd};
use std::time::Duration;

use nix::poll::{poll, PollFd, PollFlags};
use nix::sys::termios::{tcgetattr, tcsetattr, LocalFlags, SetArg, Termios};

use crate::{ConfirmInput, NetplanError};

/// Standard input of a terminal, switched to non-canonical mode without
/// echo while waiting so a single key press is enough.
///
/// When stdin is not a terminal its settings are left alone and any data
/// read accepts. Once it reaches end of file only interrupts or the timeout
/// end the wait.
#[derive(Debug)]
pub struct TtyInput {
    fd: RawFd,
    is_tty: bool,
    eof: bool,
    saved: Option<Termios>,
}

impl Default for TtyInput {
    fn default() -> Self {
        Self::new()
    }
}

impl TtyInput {
    pub fn new() -> Self {
        Self::with_fd(std::io::stdin().as_raw_fd())
    }

    pub(crate) fn with_fd(fd: RawFd) -> Self {
        Self {
            fd,
            is_tty: nix::unistd::isatty(fd).unwrap_or_default(),
            eof: false,
            saved: None,
        }
    }

    // Closed or invalid input is only reported once.
    fn read_piped(&mut self) -> bool {
        let mut buf = [0u8; 64];
        match nix::unistd::read(self.fd, &mut buf) {
            Ok(n) if n > 0 => true,
            Err(nix::errno::Errno::EINTR) => false,
            Ok(_) => {
                log::debug!("Standard input closed");
                self.eof = true;
                false
            }
            Err(e) => {
                log::debug!("Stopped reading standard input: {e}");
                self.eof = true;
                false
            }
        }
    }

    fn drain(&self) {
        let mut buf = [0u8; 64];
        loop {
            let mut fds = [PollFd::new(self.fd, PollFlags::POLLIN)];
            match poll(&mut fds, 0) {
                Ok(n) if n > 0 => (),
                _ => return,
            }
            match nix::unistd::read(self.fd, &mut buf) {
                Ok(n) if n > 0 => (),
                _ => return,
            }
        }
    }
}

impl ConfirmInput for TtyInput {
    fn prepare(&mut self) -> Result<(), NetplanError> {
        if !self.is_tty || self.saved.is_some() {
            return Ok(());
        }
        let saved = tcgetattr(self.fd)?;
        let mut raw = saved.clone();
        raw.local_flags.remove(LocalFlags::ICANON | LocalFlags::ECHO);
        tcsetattr(self.fd, SetArg::TCSANOW, &raw)?;
        self.saved = Some(saved);
        Ok(())
    }

    fn wait_readable(
        &mut self,
        timeout: Duration,
    ) -> Result<bool, NetplanError> {
        if self.eof {
            std::thread::sleep(timeout);
            return Ok(false);
        }
        let timeout_ms =
            i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let mut fds = [PollFd::new(self.fd, PollFlags::POLLIN)];
        match poll(&mut fds, timeout_ms) {
            // A signal arrived, the caller checks its interrupts.
            Err(nix::errno::Errno::EINTR) => Ok(false),
            Err(e) => Err(e.into()),
            Ok(0) => Ok(false),
            Ok(_) => {
                let readable = fds[0]
                    .revents()
                    .map(|r| r.contains(PollFlags::POLLIN))
                    .unwrap_or_default();
                if !self.is_tty {
                    return Ok(self.read_piped());
                }
                if readable {
                    self.drain();
                } else {
                    // Hung up terminal.
                    self.eof = true;
                }
                Ok(readable)
            }
        }
    }

    fn restore(&mut self) {
        if let Some(saved) = self.saved.take() {
            if let Err(e) = tcsetattr(self.fd, SetArg::TCSANOW, &saved) {
                log::warn!("Failed to restore terminal settings: {e}");
            }
        }
    }
}

impl Drop for TtyInput {
    fn drop(&mut self) {
        self.restore();
    }
}
