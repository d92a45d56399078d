// SPDX-License-Identifier: Apache-2.0

mod definition;
mod glob;
mod reader;
mod yaml;

pub use self::definition::{
    DeviceType, LinkRelations, MatchCandidate, MatchRule, Nameservers,
    NetworkDefinition, Renderer,
};
pub use self::glob::GlobPattern;
pub use self::reader::{ConfigReader, NetplanState, StaticConfigReader};
pub use self::yaml::YamlConfigReader;
