// SPDX-License-Identifier: Apache-2.0

use std::sync::OnceLock;

use netplan::{Interrupt, InterruptToken};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet};

use crate::error::CliError;

static INTERRUPTS: OnceLock<InterruptToken> = OnceLock::new();

extern "C" fn accept_on_sigusr1(_: nix::libc::c_int) {
    if let Some(token) = INTERRUPTS.get() {
        token.post(Interrupt::Accept);
    }
}

/// SIGINT and SIGTERM reject the pending trial, SIGUSR1 accepts it.
pub(crate) fn install_trial_handlers(
) -> Result<&'static InterruptToken, CliError> {
    let token = INTERRUPTS.get_or_init(InterruptToken::new);
    ctrlc::set_handler(move || token.post(Interrupt::Reject)).map_err(
        |e| CliError::from(format!("Failed to set SIGINT handler: {e}")),
    )?;
    let action = SigAction::new(
        SigHandler::Handler(accept_on_sigusr1),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    // The handler only performs an atomic store.
    unsafe { sigaction(nix::sys::signal::Signal::SIGUSR1, &action) }
        .map_err(|e| {
            CliError::from(format!("Failed to set SIGUSR1 handler: {e}"))
        })?;
    Ok(token)
}
