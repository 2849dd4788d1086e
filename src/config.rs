/// Session configuration.
#[derive(Clone)]
pub struct Config {
    max_retries: usize,
    min_buffer_size: usize,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            max_retries: 8,
            min_buffer_size: 0,
        }
    }

    /// Max regrow-and-retry iterations per wrap/unwrap before giving up.
    ///
    /// Overflow recovery grows the destination to the engine's recommended
    /// size and retries. Capacity growth is monotonic, so a well-behaved
    /// engine converges in one or two iterations; the bound exists to turn a
    /// misbehaving engine into an error instead of a spin.
    #[inline(always)]
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Floor for the initial buffer capacities.
    ///
    /// Regions start at the larger of this and the engine's recommended
    /// sizes. Zero means the recommendations are used as-is.
    #[inline(always)]
    pub fn min_buffer_size(&self) -> usize {
        self.min_buffer_size
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::builder().build()
    }
}

/// Builder for session configuration.
pub struct ConfigBuilder {
    max_retries: usize,
    min_buffer_size: usize,
}

impl ConfigBuilder {
    /// Set the max regrow-and-retry iterations per operation.
    pub fn max_retries(mut self, v: usize) -> Self {
        self.max_retries = v;
        self
    }

    /// Set the floor for initial buffer capacities.
    pub fn min_buffer_size(mut self, v: usize) -> Self {
        self.min_buffer_size = v;
        self
    }

    pub fn build(self) -> Config {
        Config {
            max_retries: self.max_retries,
            min_buffer_size: self.min_buffer_size,
        }
    }
}
