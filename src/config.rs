use crate::error::{Error, Result};

/// Adds to the running task's accumulated execution time at a fixed tick,
/// simulating a task that overruns its estimated duration mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaultInjection {
    pub tick: u32,
    pub added_ticks: u32,
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Override the test case's tick count. `None` runs the full length.
    pub tick_limit: Option<u32>,

    /// Optional mid-run execution-time fault.
    pub fault: Option<FaultInjection>,

    /// Emit a per-tick snapshot event. Long soak runs with a memory sink
    /// may want this off.
    pub emit_snapshots: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            tick_limit: None,
            fault: None,
            emit_snapshots: true,
        }
    }
}

impl SimConfig {
    pub fn builder() -> SimConfigBuilder {
        SimConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(limit) = self.tick_limit {
            if limit == 0 {
                return Err(Error::config("tick_limit must be > 0"));
            }
        }

        if let Some(fault) = self.fault {
            if fault.tick == 0 {
                return Err(Error::config("fault tick must be > 0"));
            }
            if fault.added_ticks == 0 {
                return Err(Error::config("fault added_ticks must be > 0"));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SimConfigBuilder {
    config: SimConfig,
}

impl SimConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SimConfig::default(),
        }
    }

    pub fn tick_limit(mut self, ticks: u32) -> Self {
        self.config.tick_limit = Some(ticks);
        self
    }

    pub fn fault(mut self, tick: u32, added_ticks: u32) -> Self {
        self.config.fault = Some(FaultInjection { tick, added_ticks });
        self
    }

    pub fn emit_snapshots(mut self, emit: bool) -> Self {
        self.config.emit_snapshots = emit;
        self
    }

    pub fn build(self) -> Result<SimConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
