// SPDX-License-Identifier: Apache-2.0

use std::process::{Command, Stdio};

use crate::{ErrorKind, NetplanError};

/// Run a command and capture its stdout.
pub(crate) fn run_command(
    program: &str,
    args: &[&str],
) -> Result<String, NetplanError> {
    log::debug!("Running {} {}", program, args.join(" "));
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| spawn_error(program, e))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let e = NetplanError::new(
            ErrorKind::EnvironmentError,
            format!(
                "Command '{} {}' failed with {}: {}",
                program,
                args.join(" "),
                output.status,
                stderr.trim()
            ),
        );
        log::debug!("{e}");
        Err(e)
    }
}

/// Run a command, only caring whether it succeeded.
pub(crate) fn run_command_status(
    program: &str,
    args: &[&str],
) -> Result<(), NetplanError> {
    run_command(program, args).map(|_| ())
}

fn spawn_error(program: &str, e: std::io::Error) -> NetplanError {
    match e.kind() {
        std::io::ErrorKind::NotFound => NetplanError::new(
            ErrorKind::EnvironmentError,
            format!("Command '{program}' not found"),
        ),
        std::io::ErrorKind::PermissionDenied => NetplanError::new(
            ErrorKind::PermissionError,
            format!("Permission denied executing '{program}'"),
        ),
        _ => NetplanError::new(
            ErrorKind::EnvironmentError,
            format!("Failed to execute '{program}': {e}"),
        ),
    }
}
