//! Metrics export.

use super::metrics::MetricsSnapshot;
use crate::error::{Error, Result};
use std::io::Write;
use std::path::PathBuf;

pub trait MetricsExporter: Send + Sync {
    fn export(&self, snapshot: &MetricsSnapshot) -> Result<()>;
}

/// Writes one JSON document per export, either to a file or stdout.
#[derive(Debug, Default)]
pub struct JsonExporter {
    path: Option<PathBuf>,
}

impl JsonExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }
}

impl MetricsExporter for JsonExporter {
    fn export(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        let json = serde_json::to_string_pretty(snapshot)
            .map_err(|e| Error::telemetry(format!("serialize snapshot: {}", e)))?;
        match &self.path {
            Some(path) => {
                let mut file = std::fs::File::create(path)?;
                file.write_all(json.as_bytes())?;
                file.write_all(b"\n")?;
            }
            None => println!("{}", json),
        }
        Ok(())
    }
}

/// Human-readable summary on stdout.
#[derive(Debug, Default)]
pub struct ConsoleExporter;

impl ConsoleExporter {
    pub fn new() -> Self {
        Self
    }
}

impl MetricsExporter for ConsoleExporter {
    fn export(&self, snapshot: &MetricsSnapshot) -> Result<()> {
        println!("=== Engine Metrics ===");
        println!("ticks:         {}", snapshot.ticks);
        println!("events:        {}", snapshot.events);
        println!("overrun ticks: {}", snapshot.overruns);
        println!(
            "tick latency:  avg {}ns / p50 {}ns / p99 {}ns / max {}ns",
            snapshot.avg_tick_ns, snapshot.p50_tick_ns, snapshot.p99_tick_ns, snapshot.max_tick_ns
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_ns: 1_000_000,
            ticks: 400,
            events: 1200,
            overruns: 0,
            avg_tick_ns: 350,
            p50_tick_ns: 300,
            p99_tick_ns: 900,
            max_tick_ns: 1500,
        }
    }

    #[test]
    fn test_json_export_to_file() {
        let dir = std::env::temp_dir().join("ticksched_export_test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("metrics.json");

        let exporter = JsonExporter::with_path(&path);
        exporter.export(&sample()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"ticks\": 400"));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_console_export_succeeds() {
        assert!(ConsoleExporter::new().export(&sample()).is_ok());
    }
}
