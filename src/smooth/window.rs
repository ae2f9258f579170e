//! Moving-window mean and median smoothing.

use ordered_float::OrderedFloat;

use crate::chromatogram::IonChromatogram;
use crate::matrix::IntensityMatrix;
use crate::units::{window_points, WindowSize};

use super::SmoothError;

/// Statistic applied inside the moving window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    /// Arithmetic mean of the window.
    Mean,
    /// Median of the window.
    Median,
}

/// Applies moving-window smoothing to an ion chromatogram.
///
/// Each point becomes the mean or median of the window
/// `[i - h, i + h]` clipped to the trace; the output length equals the
/// input length.
pub fn window_smooth(
    ic: &IonChromatogram,
    window: &WindowSize,
    mode: WindowMode,
) -> Result<IonChromatogram, SmoothError> {
    let wing = window_points(window, ic.time_step(), true)?;
    let values = ic.intensities();
    let len = values.len();

    let mut smoothed_values = Vec::with_capacity(len);
    for index in 0..len {
        let left = index.saturating_sub(wing);
        let right = (index + wing + 1).min(len);
        let slice = &values[left..right];
        let value = match mode {
            WindowMode::Mean => slice.iter().sum::<f64>() / slice.len() as f64,
            WindowMode::Median => median_of(slice),
        };
        smoothed_values.push(value);
    }

    let mut smoothed = ic.clone();
    smoothed
        .set_intensities(smoothed_values)
        .unwrap_or_else(|_| unreachable!("window smoothing preserves length"));
    Ok(smoothed)
}

/// Applies moving-window smoothing to every mass channel of a matrix.
pub fn window_smooth_im(
    im: &IntensityMatrix,
    window: &WindowSize,
    mode: WindowMode,
) -> Result<IntensityMatrix, SmoothError> {
    im.map_columns(|ic| window_smooth(ic, window, mode))
}

fn median_of(slice: &[f64]) -> f64 {
    let mut sorted: Vec<f64> = slice.to_vec();
    sorted.sort_by_key(|v| OrderedFloat(*v));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chromatogram::ChromatogramKind;

    fn ic_from(values: Vec<f64>) -> IonChromatogram {
        let times: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
        IonChromatogram::new(values, times, ChromatogramKind::Tic).unwrap()
    }

    #[test]
    fn mean_window_averages_neighbours() {
        let ic = ic_from(vec![0.0, 3.0, 6.0, 3.0, 0.0]);
        let smoothed = window_smooth(&ic, &WindowSize::Points(3), WindowMode::Mean).unwrap();
        // interior point: (3 + 6 + 3) / 3
        assert!((smoothed.intensities()[2] - 4.0).abs() < 1e-12);
        // edge point: window clipped to two values
        assert!((smoothed.intensities()[0] - 1.5).abs() < 1e-12);
        assert_eq!(smoothed.len(), 5);
    }

    #[test]
    fn median_window_suppresses_spikes() {
        let ic = ic_from(vec![1.0, 1.0, 50.0, 1.0, 1.0]);
        let smoothed = window_smooth(&ic, &WindowSize::Points(3), WindowMode::Median).unwrap();
        assert_eq!(smoothed.intensities()[2], 1.0);
    }

    #[test]
    fn constant_signal_is_unchanged() {
        let ic = ic_from(vec![2.5; 10]);
        for mode in [WindowMode::Mean, WindowMode::Median] {
            let smoothed = window_smooth(&ic, &WindowSize::Points(5), mode).unwrap();
            assert_eq!(smoothed.intensities(), ic.intensities());
        }
    }

    #[test]
    fn even_windows_are_rejected() {
        let ic = ic_from(vec![0.0; 8]);
        assert!(window_smooth(&ic, &WindowSize::Points(4), WindowMode::Mean).is_err());
    }
}
