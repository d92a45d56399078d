// SPDX-License-Identifier: Apache-2.0

mod apply;
mod command;
mod config;
mod confirm;
mod deserializer;
mod diff;
mod error;
mod ip;
mod observed;
mod route;
mod snapshot;
mod terminal;
mod trial;


pub use crate::apply::{
    apply, ApplyEnv, ApplyOptions, ArtifactSet, Backend, BackendControl,
    CommandGenerator, Generator, LinkInventory, MatchDiagnostic,
    MatchSkipReason, RestartPlan, SysfsInventory, SystemBackend,
    SystemInterface,
};
pub use crate::config::{
    ConfigReader, DeviceType, GlobPattern, LinkRelations, MatchCandidate,
    MatchRule, Nameservers, NetplanState, NetworkDefinition, Renderer,
    StaticConfigReader, YamlConfigReader,
};
pub use crate::confirm::{
    ConfirmInput, ConfirmWait, Confirmation, Interrupt, InterruptToken,
};
pub use crate::diff::{
    diff, DiffReport, FactDiff, InterfaceDiff, MissingInDeclared,
    MissingInSystem,
};
pub use crate::error::{ConfigLocation, ErrorKind, NetplanError};
pub use crate::ip::{normalize_address, AddressFamily, InterfaceIpAddr};
pub use crate::observed::{
    AddressFlag, ManagedBy, ObservedAddress, ObservedInterface,
    ObservedState, ObservedStateReader, SystemStateReader,
};
pub use crate::route::{
    DeclaredRoute, NetplanRoute, RouteTableRef, RouteTables,
};
pub use crate::snapshot::{Snapshot, SnapshotStore};
pub use crate::terminal::TtyInput;
pub use crate::trial::{
    RevertReason, TrialOptions, TrialOutcome, TrialSession, TrialState,
};
