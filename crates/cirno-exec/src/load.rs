use std::{fmt, io, num::NonZeroUsize, str::FromStr, thread};

use cirno_core::{CoreError, LoadSource};

use crate::{ExecConfig, ExecError};

/// Which load average to read.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LoadWindow {
    One,
    #[default]
    Five,
    Fifteen,
}

impl LoadWindow {
    fn index(&self) -> usize {
        match self {
            LoadWindow::One => 0,
            LoadWindow::Five => 1,
            LoadWindow::Fifteen => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoadWindow::One => "1m",
            LoadWindow::Five => "5m",
            LoadWindow::Fifteen => "15m",
        }
    }
}

impl fmt::Display for LoadWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoadWindow {
    type Err = ExecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "1m" => Ok(LoadWindow::One),
            "5" | "5m" => Ok(LoadWindow::Five),
            "15" | "15m" => Ok(LoadWindow::Fifteen),
            other => Err(ExecError::InvalidConfig(format!(
                "unknown load window '{other}', expected 1m, 5m or 15m"
            ))),
        }
    }
}

/// System load average as reported by `getloadavg(3)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoadAvgSource {
    window: LoadWindow,
    per_cpu: bool,
}

impl LoadAvgSource {
    pub fn new(window: LoadWindow) -> Self {
        Self {
            window,
            per_cpu: false,
        }
    }

    pub fn from_config(config: &ExecConfig) -> Self {
        Self::new(config.load_window).per_cpu(config.per_cpu_load)
    }

    /// Divide every sample by the number of CPUs available to this process.
    pub fn per_cpu(mut self, per_cpu: bool) -> Self {
        self.per_cpu = per_cpu;
        self
    }

    pub fn window(&self) -> LoadWindow {
        self.window
    }

    fn scale(&self, load: f64) -> f64 {
        if self.per_cpu {
            load / cpu_count() as f64
        } else {
            load
        }
    }
}

impl LoadSource for LoadAvgSource {
    fn sample(&mut self) -> Result<f64, CoreError> {
        read_loadavg()
            .map(|samples| self.scale(samples[self.window.index()]))
            .map_err(|e| CoreError::Load(e.to_string()))
    }
}

fn cpu_count() -> usize {
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

#[cfg(unix)]
fn read_loadavg() -> io::Result<[f64; 3]> {
    let mut samples = [0f64; 3];
    let n = unsafe { libc::getloadavg(samples.as_mut_ptr(), 3) };
    if n < 3 {
        return Err(io::Error::other(format!(
            "getloadavg returned {n} samples"
        )));
    }
    Ok(samples)
}

#[cfg(not(unix))]
fn read_loadavg() -> io::Result<[f64; 3]> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "load average is only available on unix",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_parses_short_and_long_forms() {
        assert_eq!("1".parse::<LoadWindow>().unwrap(), LoadWindow::One);
        assert_eq!(" 5M ".parse::<LoadWindow>().unwrap(), LoadWindow::Five);
        assert_eq!("15m".parse::<LoadWindow>().unwrap(), LoadWindow::Fifteen);
        assert!("10m".parse::<LoadWindow>().is_err());
        assert_eq!(LoadWindow::default(), LoadWindow::Five);
    }

    #[cfg(unix)]
    #[test]
    fn samples_a_finite_non_negative_load() {
        let mut source = LoadAvgSource::new(LoadWindow::One);
        let load = source.sample().unwrap();
        assert!(load.is_finite());
        assert!(load >= 0.0);
    }

    #[test]
    fn per_cpu_load_is_divided_by_cpu_count() {
        let source = LoadAvgSource::new(LoadWindow::Five).per_cpu(true);
        let cpus = cpu_count() as f64;
        assert_eq!(source.scale(2.0 * cpus), 2.0);
        assert_eq!(LoadAvgSource::default().scale(3.0), 3.0);
    }

    #[test]
    fn config_selects_window_and_scaling() {
        let config = ExecConfig {
            load_window: LoadWindow::One,
            per_cpu_load: true,
            ..ExecConfig::default()
        };
        let source = LoadAvgSource::from_config(&config);
        assert_eq!(source.window(), LoadWindow::One);
        assert!(source.per_cpu);
    }
}
