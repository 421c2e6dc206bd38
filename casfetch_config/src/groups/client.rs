use std::time::Duration;

crate::config_group!({

    /// The maximum number of concurrent xorb range fetches per download.
    /// The effective fetch concurrency is the larger of this value and
    /// `pool_size * connections_per_host`.
    ///
    /// The default value is 128.
    ///
    /// Use the environment variable `CASFETCH_CLIENT_MAX_CONCURRENT_FETCHES` to set this value.
    ref max_concurrent_fetches: usize = 128;

    /// The number of HTTP clients in the round-robin client pool.
    ///
    /// The default value is 1; a single well-pooled client is usually sufficient.
    ///
    /// Use the environment variable `CASFETCH_CLIENT_POOL_SIZE` to set this value.
    ref pool_size: usize = 1;

    /// The maximum number of connections each pooled client keeps to a single host.
    ///
    /// The default value is 16.
    ///
    /// Use the environment variable `CASFETCH_CLIENT_CONNECTIONS_PER_HOST` to set this value.
    ref connections_per_host: usize = 16;

    /// The connection establishment timeout applied to every HTTP request.
    ///
    /// The default value is 60 seconds.
    ///
    /// Use the environment variable `CASFETCH_CLIENT_CONNECT_TIMEOUT` to set this value.
    ref connect_timeout: Duration = Duration::from_secs(60);

    /// The read timeout applied to every HTTP request; exceeding it fails the
    /// request with a transport error carrying the URL.
    ///
    /// The default value is 120 seconds.
    ///
    /// Use the environment variable `CASFETCH_CLIENT_READ_TIMEOUT` to set this value.
    ref read_timeout: Duration = Duration::from_secs(120);

    /// Whether to accept plan and fetch URLs whose scheme is not HTTPS.
    /// Downloads fail on non-HTTPS URLs unless this is enabled.
    ///
    /// The default value is false.
    ///
    /// Use the environment variable `CASFETCH_CLIENT_ALLOW_INSECURE_URLS` to set this value.
    ref allow_insecure_urls: bool = false;
});
