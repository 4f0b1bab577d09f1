//! The router under test, seen from the fuzzer.
//!
//! The field tree never talks to a router itself. [`RouterControl`] is the
//! seam a backend implements for its routing daemon, and [`Campaign`] strings
//! the pieces together: mutate, deliver, wait for the log to settle, check
//! for a crash, report, recover.

use crate::mutator::Mutator;
use log::{info, warn};
use rand::RngCore;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("router log i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("router is not running")]
    NotRunning,
    /// Anything the backend reports about its own process or control plane.
    #[error("router backend: {0}")]
    Backend(String),
}

/// Where the router keeps its files and how long to wait for it.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
#[serde(deny_unknown_fields)]
pub struct RouterSettings {
    /// Free-form name of the routing software, for reports.
    #[serde(default = "default_software")]
    pub software: String,
    pub config_path: PathBuf,
    pub log_path: PathBuf,
    #[serde(default = "default_quiescence_timeout_ms")]
    pub quiescence_timeout_ms: u64,
}

fn default_software() -> String {
    "unknown".to_string()
}

fn default_quiescence_timeout_ms() -> u64 {
    2000
}

impl RouterSettings {
    pub fn quiescence_timeout(&self) -> Duration {
        Duration::from_millis(self.quiescence_timeout_ms)
    }
}

/// Lifecycle control over one routing daemon.
pub trait RouterControl {
    fn start(&mut self, settings: &RouterSettings) -> Result<(), RouterError>;

    fn stop(&mut self) -> Result<(), RouterError>;

    fn restart(&mut self) -> Result<(), RouterError>;

    fn has_crashed(&mut self) -> Result<bool, RouterError>;

    /// Brings a crashed router back to a state where it accepts input.
    fn recover(&mut self) -> Result<(), RouterError>;

    /// Hands one serialized payload to the router, over whatever transport the
    /// backend uses.
    fn deliver(&mut self, payload: &[u8]) -> Result<(), RouterError>;

    /// Blocks until the log stops growing or `timeout` elapses. Returns
    /// whether the log settled in time.
    fn wait_until_quiescent(&mut self, timeout: Duration) -> Result<bool, RouterError>;

    fn read_log(&self, path: &Path) -> Result<String, RouterError> {
        Ok(fs::read_to_string(path)?)
    }

    fn clear_log(&self, path: &Path) -> Result<(), RouterError> {
        fs::write(path, "")?;
        Ok(())
    }
}

/// A payload that took the router down.
#[derive(Debug, Clone)]
pub struct CrashReport {
    pub iteration: u64,
    pub payload: Vec<u8>,
    /// MD5 of the payload, for deduplication and file names.
    pub payload_hash: String,
    /// Router log captured right after the crash.
    pub log: String,
}

impl CrashReport {
    pub fn new(iteration: u64, payload: Vec<u8>, log: String) -> Self {
        let payload_hash = format!("{:x}", md5::compute(&payload));
        Self {
            iteration,
            payload,
            payload_hash,
            log,
        }
    }

    pub fn payload_hex(&self) -> String {
        hex::encode(&self.payload)
    }

    /// Writes `<hash>.bin` and `<hash>.log` into `dir`, returning the payload
    /// file's path.
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf, std::io::Error> {
        fs::create_dir_all(dir)?;
        let payload_path = dir.join(format!("{}.bin", self.payload_hash));
        fs::write(&payload_path, &self.payload)?;
        fs::write(dir.join(format!("{}.log", self.payload_hash)), &self.log)?;
        Ok(payload_path)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CampaignStats {
    pub iterations: u64,
    pub crashes: u64,
    /// Deliveries after which the log did not settle in time.
    pub unsettled: u64,
}

/// Drives a mutator against a router.
pub struct Campaign<M, C> {
    mutator: M,
    router: C,
    settings: RouterSettings,
    crash_directory: Option<PathBuf>,
    reports: Vec<CrashReport>,
    stats: CampaignStats,
}

impl<M, C: RouterControl> Campaign<M, C> {
    pub fn new(mutator: M, router: C, settings: RouterSettings) -> Self {
        Self {
            mutator,
            router,
            settings,
            crash_directory: None,
            reports: Vec::new(),
            stats: CampaignStats::default(),
        }
    }

    /// Also persist every crash report under `dir`.
    pub fn with_crash_directory(mut self, dir: PathBuf) -> Self {
        self.crash_directory = Some(dir);
        self
    }

    pub fn reports(&self) -> &[CrashReport] {
        &self.reports
    }

    pub fn stats(&self) -> CampaignStats {
        self.stats
    }

    pub fn router(&self) -> &C {
        &self.router
    }

    /// Starts the router, runs `iterations` steps, and stops it again. The
    /// router is stopped even when a step fails; the step's error wins over
    /// a failing stop.
    pub fn run<R: RngCore>(&mut self, iterations: u64, rng: &mut R) -> Result<CampaignStats, anyhow::Error>
    where
        M: Mutator<R>,
    {
        info!(
            "starting {} with {:?}",
            self.settings.software, self.settings.config_path
        );
        self.router.start(&self.settings)?;
        let outcome = self.run_steps(iterations, rng);
        let stopped = self.router.stop();
        match (outcome, stopped) {
            (Err(e), Err(stop_err)) => {
                warn!("failed to stop router after an aborted campaign: {stop_err}");
                return Err(e);
            }
            (Err(e), Ok(())) => return Err(e),
            (Ok(()), stopped) => stopped?,
        }
        info!(
            "campaign finished: {} iterations, {} crashes",
            self.stats.iterations, self.stats.crashes
        );
        Ok(self.stats)
    }

    fn run_steps<R: RngCore>(&mut self, iterations: u64, rng: &mut R) -> Result<(), anyhow::Error>
    where
        M: Mutator<R>,
    {
        self.router.clear_log(&self.settings.log_path)?;
        for _ in 0..iterations {
            self.step(rng)?;
        }
        Ok(())
    }

    /// One mutate, deliver, observe round. Returns the crash report if the
    /// router went down.
    pub fn step<R: RngCore>(&mut self, rng: &mut R) -> Result<Option<CrashReport>, anyhow::Error>
    where
        M: Mutator<R>,
    {
        let payload = self.mutator.mutate(rng)?;
        let iteration = self.stats.iterations;
        self.stats.iterations += 1;

        self.router.deliver(&payload)?;
        if !self
            .router
            .wait_until_quiescent(self.settings.quiescence_timeout())?
        {
            self.stats.unsettled += 1;
        }
        if !self.router.has_crashed()? {
            return Ok(None);
        }

        let log = self.router.read_log(&self.settings.log_path)?;
        let report = CrashReport::new(iteration, payload, log);
        warn!(
            "router crashed at iteration {iteration}, payload {} ({})",
            report.payload_hash,
            report.payload_hex()
        );
        if let Some(dir) = &self.crash_directory {
            report.write_to(dir)?;
        }
        self.router.recover()?;
        self.router.clear_log(&self.settings.log_path)?;
        self.stats.crashes += 1;
        self.reports.push(report.clone());
        Ok(Some(report))
    }
}
