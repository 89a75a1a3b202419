use std::fmt;

use serde::Serialize;

use crate::error::CoreError;

/// Resource band reported next to the load sample.
///
/// `Hold` keeps the running set as it is: nothing is admitted above the floor and nothing
/// is evicted. `Shed` counts as overload even when the load sample is under the threshold.
/// Variants are ordered by severity, so several gates combine with `max`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Pressure {
    #[default]
    Clear,
    Hold,
    Shed,
}

impl Pressure {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pressure::Clear => "clear",
            Pressure::Hold => "hold",
            Pressure::Shed => "shed",
        }
    }
}

impl fmt::Display for Pressure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Source of the system load measurement.
///
/// Sampled at most once per tick, only when there is something to admit or evict.
pub trait LoadSource {
    fn sample(&mut self) -> Result<f64, CoreError>;

    /// Resource band for the next admission, given how many tasks hold a process.
    ///
    /// Asked right after a successful [`LoadSource::sample`]. Sources that only measure
    /// load never gate admission on anything else.
    fn pressure(&mut self, _live: usize) -> Pressure {
        Pressure::Clear
    }
}

impl<F> LoadSource for F
where
    F: FnMut() -> Result<f64, CoreError>,
{
    fn sample(&mut self) -> Result<f64, CoreError> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_never_gate_on_pressure() {
        let mut source = || Ok::<_, CoreError>(0.5);
        assert_eq!(source.sample().unwrap(), 0.5);
        assert_eq!(source.pressure(10), Pressure::Clear);
    }

    #[test]
    fn pressure_displays_as_label() {
        assert_eq!(Pressure::Shed.to_string(), "shed");
        assert_eq!(Pressure::default(), Pressure::Clear);
        assert_eq!(Pressure::Hold.max(Pressure::Shed), Pressure::Shed);
        assert_eq!(Pressure::Clear.max(Pressure::Hold), Pressure::Hold);
    }
}
