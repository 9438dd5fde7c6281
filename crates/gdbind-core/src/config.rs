//! Runtime configuration for the binding layer.

use rustc_hash::FxHashMap;

/// Tunable properties, each with an engine-independent default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingProperty {
    /// Verify handle liveness on every read (non-zero enables).
    CheckOwnership,
    /// Route `error`/`warn` log records to the engine's own printer.
    ForwardLogsToEngine,
    /// Highest `log::LevelFilter` discriminant that gets emitted.
    MaxLogLevel,
    /// Pending task limit of the render-thread queue. Zero means unbounded.
    RenderQueueCapacity,
    /// Release the static lifetime when the library is deinitialized.
    ReleaseStaticOnDeinit,
}

impl BindingProperty {
    pub fn default_value(&self) -> usize {
        match self {
            BindingProperty::CheckOwnership => cfg!(debug_assertions) as usize,
            BindingProperty::ForwardLogsToEngine => 1,
            BindingProperty::MaxLogLevel => log::LevelFilter::Warn as usize,
            BindingProperty::RenderQueueCapacity => 256,
            BindingProperty::ReleaseStaticOnDeinit => 1,
        }
    }
}

/// Property overrides layered over [`BindingProperty::default_value`].
#[derive(Debug, Clone, Default)]
pub struct BindingConfig {
    overrides: FxHashMap<BindingProperty, usize>,
}

impl BindingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style override.
    pub fn with(mut self, property: BindingProperty, value: usize) -> Self {
        self.set(property, value);
        self
    }

    pub fn set(&mut self, property: BindingProperty, value: usize) {
        self.overrides.insert(property, value);
    }

    pub fn get(&self, property: BindingProperty) -> usize {
        self.overrides
            .get(&property)
            .copied()
            .unwrap_or_else(|| property.default_value())
    }

    pub fn check_ownership(&self) -> bool {
        self.get(BindingProperty::CheckOwnership) != 0
    }

    pub fn forward_logs_to_engine(&self) -> bool {
        self.get(BindingProperty::ForwardLogsToEngine) != 0
    }

    pub fn max_log_level(&self) -> log::LevelFilter {
        match self.get(BindingProperty::MaxLogLevel) {
            0 => log::LevelFilter::Off,
            1 => log::LevelFilter::Error,
            2 => log::LevelFilter::Warn,
            3 => log::LevelFilter::Info,
            4 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }

    /// `None` when the queue should be unbounded.
    pub fn render_queue_capacity(&self) -> Option<usize> {
        match self.get(BindingProperty::RenderQueueCapacity) {
            0 => None,
            n => Some(n),
        }
    }

    pub fn release_static_on_deinit(&self) -> bool {
        self.get(BindingProperty::ReleaseStaticOnDeinit) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_overrides() {
        let config = BindingConfig::new();
        assert_eq!(config.check_ownership(), cfg!(debug_assertions));
        assert_eq!(config.render_queue_capacity(), Some(256));
        assert_eq!(config.max_log_level(), log::LevelFilter::Warn);
        assert!(config.release_static_on_deinit());
    }

    #[test]
    fn overrides_win() {
        let config = BindingConfig::new()
            .with(BindingProperty::CheckOwnership, 1)
            .with(BindingProperty::RenderQueueCapacity, 0)
            .with(BindingProperty::MaxLogLevel, log::LevelFilter::Debug as usize);
        assert!(config.check_ownership());
        assert_eq!(config.render_queue_capacity(), None);
        assert_eq!(config.max_log_level(), log::LevelFilter::Debug);
    }
}
