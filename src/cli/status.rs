// SPDX-License-Identifier: Apache-2.0

use std::path::Path;

use netplan::{
    diff, ConfigReader, ObservedStateReader, SystemStateReader,
    YamlConfigReader,
};
use serde::Serialize;

use crate::error::CliError;

fn to_output<T: Serialize>(value: &T, json: bool) -> Result<String, CliError> {
    Ok(if json {
        serde_json::to_string_pretty(value)?
    } else {
        serde_yaml::to_string(value)?
    })
}

pub(crate) fn status(matches: &clap::ArgMatches) -> Result<String, CliError> {
    let root_dir = Path::new(matches.value_of("ROOT_DIR").unwrap_or("/"));
    let json = matches.is_present("JSON");
    let ifname = matches.value_of("IFNAME");
    let mut observed = SystemStateReader::new(root_dir).read()?;

    if matches.is_present("DIFF") {
        let declared = YamlConfigReader::new().load_hierarchy(root_dir)?;
        let report = diff(&observed, &declared, ifname);
        return to_output(&report, json);
    }

    if let Some(ifname) = ifname {
        observed.interfaces.retain(|name, _| name == ifname);
        if observed.interfaces.is_empty() {
            return Err(format!("Interface {ifname} not found").into());
        }
    }
    to_output(&observed, json)
}
