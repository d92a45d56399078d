// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};
use std::time::Duration;

use netplan::{
    ApplyEnv, ApplyOptions, CommandGenerator, ErrorKind, NetplanError,
    RevertReason, SysfsInventory, SystemBackend, TrialOptions, TrialOutcome,
    TrialSession, TtyInput, YamlConfigReader,
};

use crate::config::Config;
use crate::error::CliError;
use crate::signals::install_trial_handlers;

const DEFAULT_TRY_TIMEOUT: u64 = 120;

// Changing the running system needs root, a private root directory does
// not.
fn check_privileges(root_dir: &Path) -> Result<(), CliError> {
    if root_dir == Path::new("/") && !nix::unistd::geteuid().is_root() {
        return Err(NetplanError::new(
            ErrorKind::PermissionError,
            "This command needs root privileges".to_string(),
        )
        .into());
    }
    Ok(())
}

fn root_dir(matches: &clap::ArgMatches) -> PathBuf {
    PathBuf::from(matches.value_of("ROOT_DIR").unwrap_or("/"))
}

fn generator(config: &Config) -> CommandGenerator {
    match config.apply.generator.as_deref() {
        Some(path) => CommandGenerator::new(Path::new(path)),
        None => CommandGenerator::default(),
    }
}

fn try_timeout(
    matches: &clap::ArgMatches,
    config: &Config,
) -> Result<Duration, CliError> {
    let secs = match matches.value_of("TIMEOUT") {
        Some(t) => t.parse::<u64>().map_err(|e| CliError {
            code: crate::error::EX_USAGE,
            error_msg: format!("Invalid timeout {t}: {e}"),
        })?,
        None => config.trial.timeout.unwrap_or(DEFAULT_TRY_TIMEOUT),
    };
    Ok(Duration::from_secs(secs))
}

pub(crate) fn apply(matches: &clap::ArgMatches) -> Result<String, CliError> {
    let root_dir = root_dir(matches);
    check_privileges(&root_dir)?;
    let config = Config::load(matches.value_of("CONFIG").unwrap_or(
        Config::DEFAULT_CONFIG_PATH,
    ))?;

    let reader = YamlConfigReader::new();
    let generator = generator(&config);
    let backend = SystemBackend::new();
    let inventory = SysfsInventory::new(&root_dir);
    let env = ApplyEnv {
        config: &reader,
        generator: &generator,
        backend: &backend,
        inventory: &inventory,
    };

    let mut opts = ApplyOptions::new(&root_dir);
    opts.sriov_only = matches.is_present("SRIOV_ONLY");
    opts.only_ovs_cleanup = matches.is_present("ONLY_OVS_CLEANUP");
    opts.state_dir = matches.value_of("STATE").map(PathBuf::from);

    let plan = netplan::apply(&env, &opts, None)?;
    log::debug!("Applied with {plan:?}");
    Ok(String::new())
}

pub(crate) fn try_config(
    matches: &clap::ArgMatches,
) -> Result<String, CliError> {
    let root_dir = root_dir(matches);
    check_privileges(&root_dir)?;
    let config = Config::load(matches.value_of("CONFIG").unwrap_or(
        Config::DEFAULT_CONFIG_PATH,
    ))?;
    let timeout = try_timeout(matches, &config)?;
    let interrupts = install_trial_handlers()?;

    let reader = YamlConfigReader::new();
    let generator = generator(&config);
    let backend = SystemBackend::new();
    let inventory = SysfsInventory::new(&root_dir);
    let env = ApplyEnv {
        config: &reader,
        generator: &generator,
        backend: &backend,
        inventory: &inventory,
    };

    let mut opts = TrialOptions::new(&root_dir);
    opts.timeout = timeout;
    opts.config_file = matches.value_of("CONFIG_FILE").map(PathBuf::from);
    opts.state_dir = matches.value_of("STATE").map(PathBuf::from);

    let mut input = TtyInput::new();
    let mut out = std::io::stdout();
    let mut session = TrialSession::new(env, opts);
    match session.run(&mut input, interrupts, &mut out)? {
        TrialOutcome::Accepted => Ok(String::new()),
        TrialOutcome::Reverted(RevertReason::Rejected) => {
            log::info!("Configuration rejected, previous one restored");
            Ok(String::new())
        }
        TrialOutcome::Reverted(RevertReason::TimedOut) => {
            log::info!("Confirmation timed out, previous one restored");
            Ok(String::new())
        }
        TrialOutcome::Reverted(RevertReason::Errored(e)) => Err(format!(
            "Failed to apply the new configuration, previous one \
            restored: {e}"
        )
        .into()),
    }
}
