crate::config_group!({

    /// The number of in-memory response buffers each xorb fetch may hold while
    /// the decoder catches up. Bounds memory when decode is slower than the
    /// network. Values below 2 are clamped to 2.
    ///
    /// The default value is 16.
    ///
    /// Use the environment variable `CASFETCH_DOWNLOAD_DECODED_BUFFER_SLOTS` to set this value.
    ref decoded_buffer_slots: usize = 16;
});
