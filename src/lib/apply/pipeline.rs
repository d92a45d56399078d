// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::{
    ArtifactSet, BackendControl, ConfigReader, Generator, LinkInventory,
    NetplanError, NetplanState, Renderer, RestartPlan, SystemInterface,
};

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct ApplyOptions {
    pub root_dir: PathBuf,
    /// Only run the SR-IOV collaborator.
    pub sriov_only: bool,
    /// Only clean up OpenVSwitch.
    pub only_ovs_cleanup: bool,
    /// Root of the previous configuration, used to find stale virtual
    /// links.
    pub state_dir: Option<PathBuf>,
    /// Run the generator before looking at the artifacts.
    pub regenerate: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("/"),
            sriov_only: false,
            only_ovs_cleanup: false,
            state_dir: None,
            regenerate: true,
        }
    }
}

impl ApplyOptions {
    pub fn new(root_dir: &Path) -> Self {
        Self {
            root_dir: root_dir.to_path_buf(),
            ..Default::default()
        }
    }
}

/// Collaborators of the apply pipeline.
pub struct ApplyEnv<'a> {
    pub config: &'a dyn ConfigReader,
    pub generator: &'a dyn Generator,
    pub backend: &'a dyn BackendControl,
    pub inventory: &'a dyn LinkInventory,
}

// Interface names configured through `renderer` once renames are done.
fn device_names(
    declared: &NetplanState,
    ifaces: &[SystemInterface],
    plan: &RestartPlan,
    renderer: Renderer,
) -> Vec<String> {
    let visible: BTreeSet<&str> = ifaces
        .iter()
        .map(|i| {
            plan.renames
                .get(&i.name)
                .map(|n| n.as_str())
                .unwrap_or(i.name.as_str())
        })
        .collect();
    let mut ret = BTreeSet::new();
    for def in declared.iter().filter(|d| d.renderer == renderer) {
        match def.match_rule.as_ref() {
            Some(rule) if def.set_name.is_none() => {
                for iface in rule.narrow(ifaces) {
                    ret.insert(iface.name.clone());
                }
            }
            _ => {
                if visible.contains(def.expected_name()) {
                    ret.insert(def.expected_name().to_string());
                }
            }
        }
    }
    ret.into_iter().collect()
}

/// Regenerate the backend configuration and bring the system onto it.
///
/// `prior` replaces the scan of the artifacts present before
/// regeneration, for callers that changed them on their own.
pub fn apply(
    env: &ApplyEnv,
    opts: &ApplyOptions,
    prior: Option<ArtifactSet>,
) -> Result<RestartPlan, NetplanError> {
    let root_dir = opts.root_dir.as_path();
    let before = match prior {
        Some(p) => p,
        None => ArtifactSet::scan(root_dir)?,
    };
    if opts.regenerate {
        log::info!("Generating backend configuration");
        env.generator.generate(root_dir)?;
    }
    let after = ArtifactSet::scan(root_dir)?;
    let declared = env.config.load_hierarchy(root_dir)?;

    if opts.only_ovs_cleanup {
        env.backend.cleanup_ovs()?;
        return Ok(RestartPlan::default());
    }

    env.backend.apply_sriov(&declared)?;
    if opts.sriov_only {
        return Ok(RestartPlan::default());
    }

    let previous = match opts.state_dir.as_deref() {
        Some(dir) => Some(env.config.load_hierarchy(dir)?),
        None => None,
    };
    let ifaces = env.inventory.interfaces()?;
    let plan = RestartPlan::compute(
        &before,
        &after,
        &ifaces,
        &declared,
        previous.as_ref(),
    );
    log::debug!("Restart plan: {plan:?}");

    for link in plan.delete_links.iter() {
        if let Err(e) = env.backend.delete_link(link) {
            log::warn!("Failed to delete stale link {link}: {e}");
        }
    }

    if plan.restart_network_manager {
        for dev in
            device_names(&declared, &ifaces, &plan, Renderer::NetworkManager)
        {
            if let Err(e) = env.backend.disconnect_device(&dev) {
                log::debug!("Ignoring disconnect failure of {dev}: {e}");
            }
        }
        log::info!("Stopping NetworkManager");
        env.backend.stop_network_manager()?;
        // Drop addresses NetworkManager left on links networkd takes over.
        if plan.restart_networkd {
            for dev in
                device_names(&declared, &ifaces, &plan, Renderer::Networkd)
            {
                if let Err(e) = env.backend.flush_addresses(&dev) {
                    log::warn!("Failed to flush addresses of {dev}: {e}");
                }
            }
        }
    }

    for (from, to) in plan.renames.iter() {
        env.backend.rename_link(from, to)?;
    }

    if plan.restart_networkd {
        log::info!("Reloading networkd");
        let devices =
            device_names(&declared, &ifaces, &plan, Renderer::Networkd);
        env.backend.reload_networkd(&devices)?;
    }
    if plan.restart_network_manager {
        log::info!("Starting NetworkManager");
        env.backend.start_network_manager()?;
    }
    if plan.restart_ovs {
        env.backend.cleanup_ovs()?;
    }
    Ok(plan)
}
