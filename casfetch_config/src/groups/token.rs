use std::time::Duration;

crate::config_group!({

    /// The margin before a token's expiration during which it is treated as
    /// stale and refreshed ahead of use.
    ///
    /// The default value is 60 seconds.
    ///
    /// Use the environment variable `CASFETCH_TOKEN_SAFETY_WINDOW` to set this value.
    ref safety_window: Duration = Duration::from_secs(60);
});
