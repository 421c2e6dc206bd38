pub mod macros;
pub mod parsable;

pub mod casfetch_config;
pub mod groups;

pub use casfetch_config::{CasfetchConfig, config};
pub use parsable::ParsableConfigValue;

pub type ClientConfig = groups::client::ConfigValues;
pub type DownloadConfig = groups::download::ConfigValues;
pub type TokenConfig = groups::token::ConfigValues;
