// SPDX-License-Identifier: Apache-2.0

use std::collections::{BTreeMap, BTreeSet};

use crate::{NetplanState, ObservedState};

/// Observed interface name to declared id mapping, in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub(crate) struct Correlation {
    pub(crate) name_to_id: BTreeMap<String, String>,
    pub(crate) id_to_names: BTreeMap<String, BTreeSet<String>>,
}

impl Correlation {
    fn insert(&mut self, name: &str, id: &str) {
        self.name_to_id.insert(name.to_string(), id.to_string());
        self.id_to_names
            .entry(id.to_string())
            .or_default()
            .insert(name.to_string());
    }

    pub(crate) fn names_of(&self, id: &str) -> Option<&BTreeSet<String>> {
        self.id_to_names.get(id)
    }
}

// Backends may append a suffix to the id they report, NetworkManager uses
// `<id>-<ssid>` for wifi connections. Pick the longest declared id that is
// such a prefix.
fn resolve_backend_id<'a>(
    hint: &str,
    declared: &'a NetplanState,
) -> Option<&'a str> {
    if let Some(def) = declared.get(hint) {
        return Some(def.id.as_str());
    }
    declared
        .iter()
        .map(|d| d.id.as_str())
        .filter(|id| {
            hint.strip_prefix(id)
                .map(|rest| rest.starts_with('-'))
                .unwrap_or_default()
        })
        .max_by_key(|id| id.len())
}

pub(crate) fn correlate(
    observed: &ObservedState,
    declared: &NetplanState,
) -> Correlation {
    let mut ret = Correlation::default();

    for iface in observed.interfaces.values() {
        if let Some(id) = iface
            .declared_id
            .as_deref()
            .and_then(|hint| resolve_backend_id(hint, declared))
        {
            log::debug!(
                "Interface {} correlated to {id} by its backend",
                iface.name
            );
            ret.insert(&iface.name, id);
        }
    }

    for def in declared.iter() {
        let Some(rule) = def.match_rule.as_ref() else {
            continue;
        };
        for iface in observed.interfaces.values() {
            if ret.name_to_id.contains_key(&iface.name) {
                continue;
            }
            if rule.matches(iface)
                || def.set_name.as_deref() == Some(iface.name.as_str())
            {
                log::debug!(
                    "Interface {} correlated to {} by match rule",
                    iface.name,
                    def.id
                );
                ret.insert(&iface.name, &def.id);
            }
        }
    }

    for def in declared.iter().filter(|d| !d.has_match()) {
        if observed.interfaces.contains_key(&def.id)
            && !ret.name_to_id.contains_key(&def.id)
        {
            ret.insert(&def.id, &def.id);
        }
    }
    ret
}
