//! Reduction launch configuration

/// Caller-side limits applied when planning a reduction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReduceConfig {
    /// Launch-bounds cap on the block width (`None`: device limit only)
    pub max_block_width: Option<u32>,
}

impl ReduceConfig {
    /// Configuration with no caller limits
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_block_width: None,
        }
    }

    /// Cap the deduced block width at `width` lanes
    #[must_use]
    pub const fn with_max_block_width(mut self, width: u32) -> Self {
        self.max_block_width = Some(width);
        self
    }
}
