use log::LevelFilter;

/// Settings used to initialize the global logger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    max_level: LevelFilter,
    enable_metrics: bool,
}

impl Settings {
    /// Constructs new `Settings`; metrics are disabled by default.
    pub fn new(max_level: LevelFilter) -> Self {
        Settings {
            max_level,
            enable_metrics: false,
        }
    }

    /// If `true`, log lines created via `log_metric` and `log_duration` are output.
    pub fn with_metrics_enabled(mut self, enable_metrics: bool) -> Self {
        self.enable_metrics = enable_metrics;
        self
    }

    pub fn max_level(&self) -> LevelFilter {
        self.max_level
    }

    pub fn metrics_enabled(&self) -> bool {
        self.enable_metrics
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings::new(LevelFilter::Info)
    }
}
