// SPDX-License-Identifier: Apache-2.0

use std::io::Read;

use serde::Deserialize;

use crate::error::{CliError, EX_DATAERR};

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub(crate) struct Config {
    #[serde(default, rename = "try")]
    pub(crate) trial: TryConfig,
    #[serde(default)]
    pub(crate) apply: ApplyConfig,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub(crate) struct TryConfig {
    /// Seconds to wait for the confirmation.
    #[serde(default)]
    pub(crate) timeout: Option<u64>,
}

#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
pub(crate) struct ApplyConfig {
    /// Backend configuration generator binary.
    #[serde(default)]
    pub(crate) generator: Option<String>,
}

impl Config {
    pub(crate) const DEFAULT_CONFIG_PATH: &'static str = "/etc/netplanctl.conf";

    pub(crate) fn load(path: &str) -> Result<Self, CliError> {
        let path = std::path::Path::new(path);
        if !path.exists() {
            log::debug!("{} not found, using defaults", path.display());
            return Ok(Config::default());
        }
        let mut fd = std::fs::File::open(path)?;
        let mut content = String::new();
        fd.read_to_string(&mut content)?;
        match Self::parse(&content) {
            Ok(c) => {
                log::info!("Configuration loaded:\n{content}");
                Ok(c)
            }
            Err(e) => Err(CliError {
                code: EX_DATAERR,
                error_msg: format!(
                    "Failed to read configuration from {}: {e}",
                    path.display()
                ),
            }),
        }
    }

    fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str::<Config>(content)
    }
}
