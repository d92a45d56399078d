// SPDX-License-Identifier: Apache-2.0

use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{
    apply, snapshot::is_same_file, ApplyEnv, ApplyOptions, ArtifactSet,
    ConfirmInput, ConfirmWait, Confirmation, DeviceType, ErrorKind,
    InterruptToken, NetplanError, NetplanState, Snapshot, SnapshotStore,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const DEFAULT_READY_MARKER: &str = "run/netplan/netplan-try.ready";
const DECLARED_CONFIG_DIR: &str = "etc/netplan";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrialState {
    Idle,
    BackedUp,
    Applied,
    AwaitingConfirmation,
    Accepted,
    Rejected,
    Errored,
    Reverting,
    Cleaned,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevertReason {
    Rejected,
    TimedOut,
    Errored(NetplanError),
}

impl std::fmt::Display for RevertReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected => write!(f, "rejected"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Errored(e) => write!(f, "error: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrialOutcome {
    Accepted,
    Reverted(RevertReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct TrialOptions {
    pub root_dir: PathBuf,
    /// Candidate file staged into the declared configuration.
    pub config_file: Option<PathBuf>,
    pub timeout: Duration,
    /// Countdown step, one second outside of tests.
    pub tick: Duration,
    /// File created while waiting for the confirmation, relative to
    /// `root_dir` unless absolute.
    pub ready_marker: PathBuf,
    /// Root of the previous configuration for stale link removal.
    pub state_dir: Option<PathBuf>,
}

impl Default for TrialOptions {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("/"),
            config_file: None,
            timeout: DEFAULT_TIMEOUT,
            tick: Duration::from_secs(1),
            ready_marker: PathBuf::from(DEFAULT_READY_MARKER),
            state_dir: None,
        }
    }
}

impl TrialOptions {
    pub fn new(root_dir: &Path) -> Self {
        Self {
            root_dir: root_dir.to_path_buf(),
            ..Default::default()
        }
    }
}

// Exists while the session waits for the operator.
struct ReadyMarker {
    path: PathBuf,
}

impl ReadyMarker {
    fn create(path: PathBuf) -> Result<Self, NetplanError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, b"")?;
        Ok(Self { path })
    }
}

impl Drop for ReadyMarker {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove {}: {e}", self.path.display());
            }
        }
    }
}

/// Bridges and bonds with custom parameters cannot be reverted reliably.
pub(crate) fn check_revertable(
    state: &NetplanState,
) -> Result<(), NetplanError> {
    let unsafe_ids: Vec<String> = state
        .of_type(DeviceType::Bridge)
        .chain(state.of_type(DeviceType::Bond))
        .filter_map(|d| {
            let keys: Vec<&str> = d
                .parameters
                .as_ref()?
                .keys()
                .map(|k| k.as_str())
                .collect();
            Some(if keys.is_empty() {
                d.id.clone()
            } else {
                format!("{} ({})", d.id, keys.join(", "))
            })
        })
        .collect();
    if unsafe_ids.is_empty() {
        Ok(())
    } else {
        let e = NetplanError::new(
            ErrorKind::NotSupportedError,
            format!(
                "reverting custom parameters for bridges and bonds is not \
                supported: {}",
                unsafe_ids.join(", ")
            ),
        );
        log::error!("{e}");
        Err(e)
    }
}

/// Apply a candidate configuration, roll it back unless the operator
/// accepts it in time.
pub struct TrialSession<'a> {
    env: ApplyEnv<'a>,
    opts: TrialOptions,
    state: TrialState,
    history: Vec<TrialState>,
}

impl<'a> TrialSession<'a> {
    pub fn new(env: ApplyEnv<'a>, opts: TrialOptions) -> Self {
        Self {
            env,
            opts,
            state: TrialState::Idle,
            history: vec![TrialState::Idle],
        }
    }

    pub fn state(&self) -> TrialState {
        self.state
    }

    /// Every state the session went through, in order.
    pub fn history(&self) -> &[TrialState] {
        self.history.as_slice()
    }

    fn transit(&mut self, state: TrialState) {
        log::debug!("Trial state {:?} -> {state:?}", self.state);
        self.state = state;
        self.history.push(state);
    }

    fn apply_options(&self) -> ApplyOptions {
        ApplyOptions {
            root_dir: self.opts.root_dir.clone(),
            state_dir: self.opts.state_dir.clone(),
            regenerate: true,
            ..Default::default()
        }
    }

    fn ready_marker_path(&self) -> PathBuf {
        if self.opts.ready_marker.is_absolute() {
            self.opts.ready_marker.clone()
        } else {
            self.opts.root_dir.join(&self.opts.ready_marker)
        }
    }

    /// Run the session to completion.
    ///
    /// Only errors raised before any change (validation, backup) and
    /// revert failures are returned as `Err`. Every other error reverts
    /// the candidate and is reported in the outcome.
    pub fn run<I, W>(
        &mut self,
        input: &mut I,
        interrupts: &InterruptToken,
        out: &mut W,
    ) -> Result<TrialOutcome, NetplanError>
    where
        I: ConfirmInput + ?Sized,
        W: Write + ?Sized,
    {
        let mut store = SnapshotStore::new(&self.opts.root_dir);
        let result = self.run_with_store(&mut store, input, interrupts, out);
        store.cleanup();
        self.transit(TrialState::Cleaned);
        result
    }

    fn run_with_store<I, W>(
        &mut self,
        store: &mut SnapshotStore,
        input: &mut I,
        interrupts: &InterruptToken,
        out: &mut W,
    ) -> Result<TrialOutcome, NetplanError>
    where
        I: ConfirmInput + ?Sized,
        W: Write + ?Sized,
    {
        let candidate = match self.opts.config_file.as_ref() {
            Some(file) => self.env.config.load_with_files(
                &self.opts.root_dir,
                std::slice::from_ref(file),
            )?,
            None => self.env.config.load_hierarchy(&self.opts.root_dir)?,
        };
        check_revertable(&candidate)?;

        let backup = store.backup(self.opts.config_file.is_some())?;
        self.transit(TrialState::BackedUp);

        let confirmation = self.apply_and_wait(store, input, interrupts, out);
        let reason = match confirmation {
            Ok(Confirmation::Accepted) => {
                self.transit(TrialState::Accepted);
                let _ = writeln!(out, "Configuration accepted.");
                log::info!("Configuration accepted");
                return Ok(TrialOutcome::Accepted);
            }
            Ok(Confirmation::Rejected) => {
                self.transit(TrialState::Rejected);
                RevertReason::Rejected
            }
            Ok(Confirmation::TimedOut) => {
                self.transit(TrialState::Rejected);
                RevertReason::TimedOut
            }
            Err(e) => {
                log::error!("Trial apply failed: {e}");
                self.transit(TrialState::Errored);
                RevertReason::Errored(e)
            }
        };

        self.transit(TrialState::Reverting);
        let _ = writeln!(out, "Reverting.");
        log::info!("Reverting configuration: {reason}");
        self.revert(store, backup)?;
        Ok(TrialOutcome::Reverted(reason))
    }

    fn apply_and_wait<I, W>(
        &mut self,
        store: &mut SnapshotStore,
        input: &mut I,
        interrupts: &InterruptToken,
        out: &mut W,
    ) -> Result<Confirmation, NetplanError>
    where
        I: ConfirmInput + ?Sized,
        W: Write + ?Sized,
    {
        if let Some(file) = self.opts.config_file.as_ref() {
            let name = file.file_name().ok_or_else(|| {
                NetplanError::new(
                    ErrorKind::InvalidConfig,
                    format!("Invalid config file path {}", file.display()),
                )
            })?;
            let dst = self
                .opts
                .root_dir
                .join(DECLARED_CONFIG_DIR)
                .join(name);
            if is_same_file(file, &dst) {
                log::info!(
                    "{} is already part of the declared configuration",
                    file.display()
                );
            } else {
                store.add(file, &dst)?;
            }
        }
        apply(&self.env, &self.apply_options(), None)?;
        self.transit(TrialState::Applied);

        let _marker = ReadyMarker::create(self.ready_marker_path())?;
        self.transit(TrialState::AwaitingConfirmation);
        let _ = writeln!(
            out,
            "Do you want to keep these settings?\n\n\nPress ENTER before \
            the timeout to accept the new configuration\n\n"
        );
        ConfirmWait::new(self.opts.timeout)
            .with_tick(self.opts.tick)
            .wait(input, interrupts, out)
    }

    fn revert(
        &mut self,
        store: &mut SnapshotStore,
        backup: Snapshot,
    ) -> Result<(), NetplanError> {
        let root_dir = self.opts.root_dir.clone();
        let candidate_artifacts = match ArtifactSet::scan(&root_dir) {
            Ok(a) => Some(a),
            Err(e) => {
                log::warn!("Failed to scan candidate artifacts: {e}");
                None
            }
        };
        // Kept only until cleanup, its declared config tells which links
        // the candidate introduced.
        let candidate = match store.backup(true) {
            Ok(s) => Some(s),
            Err(e) => {
                log::warn!("Failed to back up the candidate state: {e}");
                None
            }
        };

        store.revert(backup)?;

        let opts = ApplyOptions {
            root_dir,
            state_dir: candidate.as_ref().map(|c| c.root().to_path_buf()),
            regenerate: false,
            ..Default::default()
        };
        apply(&self.env, &opts, candidate_artifacts).map_err(|e| {
            log::error!("Failed to re-apply the previous configuration: {e}");
            NetplanError::new(
                ErrorKind::RevertError,
                format!(
                    "Failed to re-apply the previous configuration: {}",
                    e.msg()
                ),
            )
        })?;
        Ok(())
    }
}
