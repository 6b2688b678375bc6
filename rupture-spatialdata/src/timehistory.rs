//! Piecewise-linear amplitude tables.
use crate::ascii::AsciiDocument;
use crate::error::{ParseError, QueryError};
use crate::units::parse_scale;
use eyre::WrapErr;
use std::path::Path;

/// An amplitude as a piecewise linear function of time.
///
/// Times are in seconds and strictly increasing. Outside the table the amplitude is held
/// constant at the first or last value.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeHistory {
    label: String,
    times: Vec<f64>,
    amplitudes: Vec<f64>,
}

impl TimeHistory {
    pub fn new(label: impl Into<String>, times: Vec<f64>, amplitudes: Vec<f64>) -> Result<Self, QueryError> {
        let label = label.into();
        let invalid = |message: String| QueryError::InvalidData {
            db: label.clone(),
            message,
        };

        if times.is_empty() {
            return Err(invalid("time history has no points".to_string()));
        }
        if times.len() != amplitudes.len() {
            return Err(invalid(format!(
                "{} times but {} amplitudes",
                times.len(),
                amplitudes.len()
            )));
        }
        if times.iter().chain(&amplitudes).any(|v| !v.is_finite()) {
            return Err(invalid("non-finite entry".to_string()));
        }
        if let Some(idx) = times.windows(2).position(|w| w[0] >= w[1]) {
            return Err(invalid(format!("times are not strictly increasing at point {}", idx + 1)));
        }

        Ok(Self {
            label,
            times,
            amplitudes,
        })
    }

    /// Parses the time history ASCII format.
    ///
    /// ```text
    /// #TIME HISTORY ascii
    /// TimeHistory {
    ///   num-points = 3
    ///   time-units = year
    /// }
    ///  0.0  0.0
    ///  1.0  0.5
    ///  2.0  1.0
    /// ```
    pub fn from_ascii(label: impl Into<String>, text: &str) -> Result<Self, ParseError> {
        let document = AsciiDocument::parse(text, "#TIME HISTORY", "TimeHistory")?;
        let num_points: usize = document.get_parsed("num-points")?;
        let (units_line, units) = document.get("time-units").unwrap_or((0, "s"));
        let time_scale =
            parse_scale(units).ok_or_else(|| ParseError::new(units_line, format!("unknown time unit '{}'", units)))?;

        let rows = document.data_rows(2, num_points)?;
        let times = rows.iter().map(|row| row[0] * time_scale).collect();
        let amplitudes = rows.iter().map(|row| row[1]).collect();
        Self::new(label, times, amplitudes).map_err(|err| ParseError::new(0, err.to_string()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> eyre::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read time history file {}", path.display()))?;
        let label = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().to_string())
            .unwrap_or_else(|| "time history".to_string());
        Self::from_ascii(label, &text).wrap_err_with(|| format!("in file {}", path.display()))
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn amplitudes(&self) -> &[f64] {
        &self.amplitudes
    }

    /// Index of the segment `[times[i], times[i + 1])` containing `t`, if any.
    fn segment(&self, t: f64) -> Option<usize> {
        let n = self.times.len();
        if n < 2 || t < self.times[0] || t >= self.times[n - 1] {
            return None;
        }
        // partition_point returns the first index with times[i] > t, which is at least 1 here
        Some(self.times.partition_point(|&ti| ti <= t) - 1)
    }

    /// Amplitude at time `t`.
    pub fn value(&self, t: f64) -> f64 {
        let n = self.times.len();
        match self.segment(t) {
            Some(i) => {
                let (t0, t1) = (self.times[i], self.times[i + 1]);
                let (a0, a1) = (self.amplitudes[i], self.amplitudes[i + 1]);
                a0 + (a1 - a0) * (t - t0) / (t1 - t0)
            }
            None if t < self.times[0] => self.amplitudes[0],
            None => self.amplitudes[n - 1],
        }
    }

    /// Time derivative of the amplitude at `t` (right derivative at table points).
    pub fn rate(&self, t: f64) -> f64 {
        match self.segment(t) {
            Some(i) => {
                (self.amplitudes[i + 1] - self.amplitudes[i]) / (self.times[i + 1] - self.times[i])
            }
            None => 0.0,
        }
    }

    /// Returns a copy with every time divided by `time_scale`.
    pub fn nondimensionalized(&self, time_scale: f64) -> Self {
        Self {
            label: self.label.clone(),
            times: self.times.iter().map(|t| t / time_scale).collect(),
            amplitudes: self.amplitudes.clone(),
        }
    }
}
