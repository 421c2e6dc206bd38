use lazy_static::lazy_static;

use crate::groups;

/// Primary configuration struct containing all config sections.
#[derive(Debug, Clone, Default)]
pub struct CasfetchConfig {
    pub client: groups::client::ConfigValues,
    pub download: groups::download::ConfigValues,
    pub token: groups::token::ConfigValues,
}

impl CasfetchConfig {
    /// Create a new instance with default values and environment variable overrides
    /// applied. Equivalent to `CasfetchConfig::default().with_env_overrides()`.
    pub fn new() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply environment variable overrides to all configuration sections.
    /// The group name for each section is derived from its module name;
    /// environment variables follow the pattern `CASFETCH_{GROUP}_{FIELD}`.
    pub fn with_env_overrides(mut self) -> Self {
        self.client.apply_env_overrides();
        self.download.apply_env_overrides();
        self.token.apply_env_overrides();
        self
    }
}

lazy_static! {
    static ref GLOBAL_CONFIG: CasfetchConfig = CasfetchConfig::new();
}

/// The process-wide configuration, resolved once on first use.
pub fn config() -> &'static CasfetchConfig {
    &GLOBAL_CONFIG
}
