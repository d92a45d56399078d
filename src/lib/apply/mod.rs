// SPDX-License-Identifier: Apache-2.0

mod artifacts;
mod backend;
mod decision;
mod inventory;
mod pipeline;

pub use self::artifacts::{ArtifactSet, Backend};
pub use self::backend::{
    BackendControl, CommandGenerator, Generator, SystemBackend,
};
pub use self::decision::{MatchDiagnostic, MatchSkipReason, RestartPlan};
pub use self::inventory::{LinkInventory, SysfsInventory, SystemInterface};
pub use self::pipeline::{apply, ApplyEnv, ApplyOptions};

pub(crate) use self::inventory::{sysfs_driver, sysfs_is_wireless};
