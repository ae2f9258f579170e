//! Time strings and window-width conversion.
//!
//! Processing parameters that describe a span of retention time are accepted
//! either as a number of scan points or as a time string of the form
//! `"<number>s"` (seconds) or `"<number>m"` (minutes), case-insensitive.
//! Time strings are resolved against the chromatogram's time step.

use std::fmt;

/// Errors arising from window and time-string resolution.
#[derive(Debug, thiserror::Error)]
pub enum WindowError {
    /// The string is not `<number>s` or `<number>m`.
    #[error("improper time string: '{0}'")]
    BadTimeString(String),

    /// A half-window was requested from an even number of points.
    #[error("window must be an odd number of points, got {0}")]
    EvenWindow(usize),

    /// The resolved window covers too few points to be usable.
    #[error("window too small ({kind} = {points})")]
    WindowTooSmall {
        /// `"window"` or `"half window"`.
        kind: &'static str,
        /// Number of points the window resolved to.
        points: usize,
    },
}

/// A window width, either in scan points or as a time string.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowSize {
    /// Width in scan points.
    Points(usize),
    /// Width as a time string (`"1.5m"`, `"10s"`).
    Time(String),
}

impl From<usize> for WindowSize {
    fn from(points: usize) -> Self {
        WindowSize::Points(points)
    }
}

impl From<&str> for WindowSize {
    fn from(time: &str) -> Self {
        WindowSize::Time(time.to_string())
    }
}

impl fmt::Display for WindowSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowSize::Points(p) => write!(f, "{p} point(s)"),
            WindowSize::Time(t) => write!(f, "'{t}'"),
        }
    }
}

/// Resolves a time string of the form `"<number>s"` or `"<number>m"` into
/// seconds.
///
/// ```
/// use elution::units::time_str_secs;
///
/// assert_eq!(time_str_secs("90s").unwrap(), 90.0);
/// assert_eq!(time_str_secs("1.5m").unwrap(), 90.0);
/// ```
pub fn time_str_secs(time_str: &str) -> Result<f64, WindowError> {
    let trimmed = time_str.trim();
    let spec = match trimmed.chars().last() {
        Some(spec) if trimmed.len() >= 2 => spec,
        _ => return Err(WindowError::BadTimeString(time_str.to_string())),
    };

    let number = &trimmed[..trimmed.len() - spec.len_utf8()];
    let value: f64 = number
        .parse()
        .map_err(|_| WindowError::BadTimeString(time_str.to_string()))?;
    if !value.is_finite() {
        return Err(WindowError::BadTimeString(time_str.to_string()));
    }

    match spec {
        's' | 'S' => Ok(value),
        'm' | 'M' => Ok(value * 60.0),
        _ => Err(WindowError::BadTimeString(time_str.to_string())),
    }
}

/// Converts a window selection into a number of points based on the time
/// step of the data it will be applied to.
///
/// Integer windows are taken verbatim; time strings resolve to
/// `floor(time / time_step)` points. With `half_window` the window must be
/// odd and the returned value is the wing length `(points - 1) / 2`.
pub fn window_points(
    window: &WindowSize,
    time_step: f64,
    half_window: bool,
) -> Result<usize, WindowError> {
    let points = match window {
        WindowSize::Points(p) => {
            if half_window {
                if p % 2 == 0 {
                    return Err(WindowError::EvenWindow(*p));
                }
                p / 2
            } else {
                *p
            }
        }
        WindowSize::Time(t) => {
            let mut time = time_str_secs(t)?;
            if half_window {
                time *= 0.5;
            }
            (time / time_step).floor() as usize
        }
    };

    if half_window {
        if points < 1 {
            return Err(WindowError::WindowTooSmall {
                kind: "half window",
                points,
            });
        }
    } else if points < 2 {
        return Err(WindowError::WindowTooSmall {
            kind: "window",
            points,
        });
    }

    Ok(points)
}
