//! Noise filters for ion chromatograms.
//!
//! Two smoothers are provided: a Savitzky-Golay polynomial filter and a
//! plain moving-window mean/median filter. Both take their window either
//! in scan points or as a time string, and both have matrix-wide variants
//! that run per mass channel.

mod savgol;
mod window;

pub use savgol::{savitzky_golay, savitzky_golay_im};
pub use window::{window_smooth, window_smooth_im, WindowMode};

use crate::units::WindowError;

/// Errors raised by the smoothing filters.
#[derive(Debug, thiserror::Error)]
pub enum SmoothError {
    /// Window resolution failed (too small, even, bad time string).
    #[error(transparent)]
    Window(#[from] WindowError),

    /// The window holds fewer points than the polynomial needs.
    #[error("window of {points} points cannot fit a degree {degree} polynomial")]
    DegreeTooLarge { points: usize, degree: usize },

    /// The normal equations were not solvable.
    #[error("normal equations are not positive definite (degree {degree})")]
    IllConditioned { degree: usize },
}
