// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{
    apply::inventory::composite_members, ArtifactSet, Backend, DeviceType,
    NetplanState, NetworkDefinition, SystemInterface,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
#[non_exhaustive]
pub enum MatchSkipReason {
    NoMatchRule,
    Critical,
    CompositeMember,
    NoMatch,
    MultipleMatches(Vec<String>),
}

impl std::fmt::Display for MatchSkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoMatchRule => write!(f, "no match rule"),
            Self::Critical => write!(f, "critical interface"),
            Self::CompositeMember => {
                write!(f, "member of a bridge or bond")
            }
            Self::NoMatch => write!(f, "no interface matches"),
            Self::MultipleMatches(names) => write!(
                f,
                "multiple interfaces match: {}",
                names.join(", ")
            ),
        }
    }
}

/// Definition skipped by the rename decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[non_exhaustive]
pub struct MatchDiagnostic {
    pub id: String,
    pub reason: MatchSkipReason,
}

/// What the apply pipeline has to do with the backends and links.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[non_exhaustive]
pub struct RestartPlan {
    pub restart_networkd: bool,
    pub restart_network_manager: bool,
    pub restart_ovs: bool,
    /// Current interface name to new name.
    pub renames: BTreeMap<String, String>,
    /// Virtual links dropped from the configuration.
    pub delete_links: BTreeSet<String>,
    pub diagnostics: Vec<MatchDiagnostic>,
}

/// A backend restarts when it has generated artifacts, or just lost all of
/// them and has to drop the old configuration.
pub(crate) fn restart_needed(before: bool, after: bool) -> bool {
    after || (before && !after)
}

impl RestartPlan {
    pub fn compute(
        before: &ArtifactSet,
        after: &ArtifactSet,
        ifaces: &[SystemInterface],
        declared: &NetplanState,
        previous: Option<&NetplanState>,
    ) -> Self {
        let mut ret = Self {
            restart_networkd: restart_needed(before.networkd, after.networkd),
            restart_network_manager: restart_needed(
                before.network_manager,
                after.network_manager,
            ),
            restart_ovs: restart_needed(before.ovs, after.ovs),
            ..Default::default()
        };
        ret.compute_renames(ifaces, declared);
        if let Some(previous) = previous {
            ret.compute_stale_links(ifaces, declared, previous);
        }
        ret
    }

    pub fn restart(&self, backend: Backend) -> bool {
        match backend {
            Backend::Networkd => self.restart_networkd,
            Backend::NetworkManager => self.restart_network_manager,
            Backend::Ovs => self.restart_ovs,
        }
    }

    fn skip(&mut self, id: &str, reason: MatchSkipReason) {
        log::warn!("Not renaming {id}: {reason}");
        self.diagnostics.push(MatchDiagnostic {
            id: id.to_string(),
            reason,
        });
    }

    fn compute_renames(
        &mut self,
        ifaces: &[SystemInterface],
        declared: &NetplanState,
    ) {
        let members = composite_members(ifaces);
        // Composite devices share their MAC with a member.
        let candidates: Vec<SystemInterface> = ifaces
            .iter()
            .filter(|i| {
                !matches!(i.kind, DeviceType::Bridge | DeviceType::Bond)
            })
            .cloned()
            .collect();

        for def in declared.physical() {
            let Some(target) = def.set_name.as_deref() else {
                continue;
            };
            if let Some(reason) = pre_match_skip(def) {
                self.skip(&def.id, reason);
                continue;
            }
            let Some(rule) = def.match_rule.as_ref() else {
                continue;
            };
            let matched = rule.narrow(&candidates);
            let iface = match matched.as_slice() {
                [] => {
                    self.skip(&def.id, MatchSkipReason::NoMatch);
                    continue;
                }
                [iface] => *iface,
                _ => {
                    self.skip(
                        &def.id,
                        MatchSkipReason::MultipleMatches(
                            matched.iter().map(|i| i.name.clone()).collect(),
                        ),
                    );
                    continue;
                }
            };
            if members.contains(&iface.name) {
                self.skip(&def.id, MatchSkipReason::CompositeMember);
                continue;
            }
            if iface.name != target {
                log::info!("{}: renaming {} to {target}", def.id, iface.name);
                self.renames.insert(iface.name.clone(), target.to_string());
            }
        }
    }

    fn compute_stale_links(
        &mut self,
        ifaces: &[SystemInterface],
        declared: &NetplanState,
        previous: &NetplanState,
    ) {
        let visible: BTreeSet<&str> =
            ifaces.iter().map(|i| i.name.as_str()).collect();
        for def in previous.iter().filter(|d| d.device_type.is_virtual()) {
            if declared.get(&def.id).is_none()
                && visible.contains(def.id.as_str())
            {
                log::info!("Deleting stale virtual link {}", def.id);
                self.delete_links.insert(def.id.clone());
            }
        }
    }
}

fn pre_match_skip(def: &NetworkDefinition) -> Option<MatchSkipReason> {
    if !def.has_match() {
        Some(MatchSkipReason::NoMatchRule)
    } else if def.critical {
        Some(MatchSkipReason::Critical)
    } else if def.is_composite_member() {
        Some(MatchSkipReason::CompositeMember)
    } else {
        None
    }
}
