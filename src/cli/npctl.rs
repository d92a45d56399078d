// SPDX-License-Identifier: Apache-2.0

mod apply;
mod config;
mod error;
mod result;
mod signals;
mod status;

use env_logger::Builder;
use log::LevelFilter;

use crate::apply::{apply, try_config};
use crate::config::Config;
use crate::result::print_result_and_exit;
use crate::status::status;

const APP_NAME: &str = "netplanctl";

const SUB_CMD_APPLY: &str = "apply";
const SUB_CMD_TRY: &str = "try";
const SUB_CMD_STATUS: &str = "status";
const SUB_CMD_VERSION: &str = "version";

fn cli() -> clap::Command<'static> {
    clap::Command::new(APP_NAME)
        .version(clap::crate_version!())
        .about("Apply and try declarative network configuration")
        .subcommand_required(true)
        .arg(
            clap::Arg::new("verbose")
                .short('v')
                .multiple_occurrences(true)
                .help("Set verbose level")
                .global(true),
        )
        .arg(
            clap::Arg::new("quiet")
                .short('q')
                .help("Disable logging")
                .global(true),
        )
        .arg(
            clap::Arg::new("ROOT_DIR")
                .long("root-dir")
                .takes_value(true)
                .default_value("/")
                .help("Search for configuration files in this root")
                .global(true),
        )
        .arg(
            clap::Arg::new("CONFIG")
                .long("config")
                .takes_value(true)
                .default_value(Config::DEFAULT_CONFIG_PATH)
                .help("Configuration file of this tool")
                .global(true),
        )
        .subcommand(
            clap::Command::new(SUB_CMD_APPLY)
                .about("Apply the current configuration to the system")
                .arg(
                    clap::Arg::new("SRIOV_ONLY")
                        .long("sriov-only")
                        .help("Only apply SR-IOV related configuration"),
                )
                .arg(
                    clap::Arg::new("ONLY_OVS_CLEANUP")
                        .long("only-ovs-cleanup")
                        .conflicts_with("SRIOV_ONLY")
                        .help("Only clean up OpenVSwitch interfaces"),
                )
                .arg(
                    clap::Arg::new("STATE")
                        .long("state")
                        .takes_value(true)
                        .help(
                            "Root directory of the previous configuration, \
                            used to remove stale virtual interfaces",
                        ),
                ),
        )
        .subcommand(
            clap::Command::new(SUB_CMD_TRY)
                .about(
                    "Try to apply a new configuration, with automatic \
                    rollback",
                )
                .arg(
                    clap::Arg::new("CONFIG_FILE")
                        .long("config-file")
                        .takes_value(true)
                        .help(
                            "Apply this file in addition to the current \
                            configuration",
                        ),
                )
                .arg(
                    clap::Arg::new("TIMEOUT")
                        .long("timeout")
                        .takes_value(true)
                        .help("Seconds to wait before reverting, default 120"),
                )
                .arg(
                    clap::Arg::new("STATE")
                        .long("state")
                        .takes_value(true)
                        .help(
                            "Root directory of the previous configuration, \
                            used to remove stale virtual interfaces",
                        ),
                ),
        )
        .subcommand(
            clap::Command::new(SUB_CMD_STATUS)
                .about("Show the current network state")
                .arg(
                    clap::Arg::new("IFNAME")
                        .index(1)
                        .help("Show specific interface only"),
                )
                .arg(
                    clap::Arg::new("DIFF")
                        .long("diff")
                        .help(
                            "Show the difference between the declared \
                            configuration and the system",
                        ),
                )
                .arg(
                    clap::Arg::new("JSON")
                        .long("json")
                        .help("Show state in json format"),
                ),
        )
        .subcommand(
            clap::Command::new(SUB_CMD_VERSION).about("Show version"),
        )
}

fn main() {
    let matches = cli().get_matches();
    let (log_module_filters, log_level) =
        match matches.occurrences_of("verbose") {
            0 => (vec!["netplan", "netplanctl"], LevelFilter::Info),
            1 => (vec!["netplan", "netplanctl"], LevelFilter::Debug),
            _ => (vec![""], LevelFilter::Debug),
        };

    if !matches.is_present("quiet") {
        let mut log_builder = Builder::new();
        for log_module_filter in log_module_filters {
            if !log_module_filter.is_empty() {
                log_builder.filter(Some(log_module_filter), log_level);
            } else {
                log_builder.filter(None, log_level);
            }
        }
        log_builder.init();
    }

    if let Some(matches) = matches.subcommand_matches(SUB_CMD_APPLY) {
        print_result_and_exit(apply(matches));
    } else if let Some(matches) = matches.subcommand_matches(SUB_CMD_TRY) {
        print_result_and_exit(try_config(matches));
    } else if let Some(matches) = matches.subcommand_matches(SUB_CMD_STATUS)
    {
        print_result_and_exit(status(matches));
    } else if matches.subcommand_matches(SUB_CMD_VERSION).is_some() {
        print_result_and_exit(Ok(format!(
            "{APP_NAME} {}",
            clap::crate_version!()
        )));
    }
}
