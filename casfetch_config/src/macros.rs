/// Macro to create a configuration value group struct.
///
/// Usage:
/// ```rust
/// use casfetch_config::config_group;
///
/// config_group!({
///     ref test_int: usize = 42;
///     ref test_string: String = "default".to_string();
/// });
/// ```
///
/// This creates a `ConfigValueGroup` struct with the specified fields and an
/// `apply_env_overrides` method that loads values from environment variables
/// named after the enclosing module.
#[macro_export]
macro_rules! config_group {
    ({
        $(
            $(#[$meta:meta])*
            ref $name:ident : $type:ty = $value:expr;
        )+
    }) => {
        #[allow(unused_imports)]
        use $crate::ParsableConfigValue;

        /// ConfigValueGroup struct containing all configurable values
        #[derive(Debug, Clone)]
        pub struct ConfigValueGroup {
            $(
                $(#[$meta])*
                pub $name: $type,
            )+
        }

        impl Default for ConfigValueGroup {
            /// Create a new instance with default values only (no environment variable overrides).
            fn default() -> Self {
                Self {
                    $(
                        $name: {
                            let v: $type = $value;
                            v
                        },
                    )+
                }
            }
        }

        impl AsRef<ConfigValueGroup> for ConfigValueGroup {
            fn as_ref(&self) -> &ConfigValueGroup {
                self
            }
        }

        impl ConfigValueGroup {
            /// Create a new instance with default values only (no environment variable overrides).
            /// This is an alias for `Default::default()`.
            pub fn new() -> Self {
                Self::default()
            }

            /// Apply environment variable overrides to this configuration group.
            ///
            /// The group name is derived from the module path. For example, in module
            /// `casfetch_config::groups::client`, the env var for `pool_size` would be
            /// `CASFETCH_CLIENT_POOL_SIZE`.
            pub fn apply_env_overrides(&mut self) {
                $(
                    {
                        // Get the module name at compile time and build the env var name in one line.
                        const ENV_VAR_NAME: &str = const_str::concat!(
                            "CASFETCH_",
                            const_str::convert_ascii_case!(upper, konst::string::rsplit_once(module_path!(), "::").unwrap().1),
                            "_",
                            const_str::convert_ascii_case!(upper, stringify!($name)));

                        let maybe_env_value = std::env::var(ENV_VAR_NAME).ok();

                        let default_value: $type = $value;
                        self.$name = <$type>::parse(stringify!($name), maybe_env_value, default_value);
                    }
                )+
            }
        }

        /// Type alias for easier reference in config aggregation
        pub type ConfigValues = ConfigValueGroup;
    };
}
