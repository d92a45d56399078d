// SPDX-License-Identifier: Apache-2.0

mod compare;
pub(crate) mod correlate;
mod report;

pub use self::report::{
    DiffReport, FactDiff, InterfaceDiff, MissingInDeclared, MissingInSystem,
};

use crate::{DeviceType, NetplanState, ObservedState};

use self::compare::compare_interface;
use self::correlate::correlate;

/// Compare the observed state against the declared configuration.
///
/// Only interfaces found on both sides are compared fact by fact, the rest
/// are listed as missing on one side. With `focus`, the report is limited
/// to the interface of that name or to the interfaces correlated to that
/// declared id.
pub fn diff(
    observed: &ObservedState,
    declared: &NetplanState,
    focus: Option<&str>,
) -> DiffReport {
    let correlation = correlate(observed, declared);
    let mut report = DiffReport::default();

    for (name, id) in correlation.name_to_id.iter() {
        let (Some(iface), Some(def)) = (observed.get(name), declared.get(id))
        else {
            continue;
        };
        report.interfaces.insert(
            name.clone(),
            compare_interface(
                def,
                iface,
                &observed.route_tables,
                &correlation,
            ),
        );
    }

    for def in declared.iter() {
        if correlation.id_to_names.contains_key(&def.id) {
            continue;
        }
        // Access points out of reach are not drift.
        if def.device_type == DeviceType::Wifi {
            continue;
        }
        report.missing_interfaces_system.insert(
            def.id.clone(),
            MissingInSystem {
                device_type: def.device_type,
                renderer: def.renderer,
            },
        );
    }

    for iface in observed.interfaces.values() {
        if correlation.name_to_id.contains_key(&iface.name)
            || iface.iface_type == DeviceType::Loopback
        {
            continue;
        }
        report.missing_interfaces_declared.insert(
            iface.name.clone(),
            MissingInDeclared {
                index: iface.index,
                device_type: iface.iface_type,
                managed_by: iface.managed_by,
            },
        );
    }

    if let Some(focus) = focus {
        report
            .interfaces
            .retain(|name, i| name == focus || i.id == focus);
        report.missing_interfaces_system.retain(|id, _| id == focus);
        report.missing_interfaces_declared.retain(|name, _| name == focus);
    }
    report
}
