//! Property tests for the numerical kernels.

use proptest::prelude::*;

use elution::align::score::position_similarity;
use elution::detect::maxima_indices;
use elution::matrix::build_intensity_matrix;
use elution::peak::area::half_area;
use elution::peak::Peak;
use elution::raw::{RawData, Scan};
use elution::spectrum::MassSpectrum;

fn scan_strategy() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((50.0_f64..100.0, 0.0_f64..1000.0), 1..12)
}

proptest! {
    #[test]
    fn binning_conserves_total_intensity(raw_scans in prop::collection::vec(scan_strategy(), 1..8)) {
        let times: Vec<f64> = (0..raw_scans.len()).map(|i| i as f64).collect();
        let scans: Vec<Scan> = raw_scans
            .iter()
            .map(|pairs| {
                let mut sorted = pairs.clone();
                sorted.sort_by(|a, b| a.0.total_cmp(&b.0));
                Scan::new(
                    sorted.iter().map(|p| p.0).collect(),
                    sorted.iter().map(|p| p.1).collect(),
                )
                .unwrap()
            })
            .collect();
        let total: f64 = scans.iter().map(Scan::total_intensity).sum();
        let data = RawData::new(times, scans).unwrap();

        let im = build_intensity_matrix(&data, 1.0, 0.5, 0.5, None).unwrap();
        prop_assert!((im.intensity_array().sum() - total).abs() < 1e-6 * total.max(1.0));
    }

    #[test]
    fn position_similarity_stays_in_unit_interval(
        spec1 in prop::collection::vec(0.0_f64..100.0, 4),
        spec2 in prop::collection::vec(0.0_f64..100.0, 4),
        rt1 in 0.0_f64..300.0,
        rt2 in 0.0_f64..300.0,
        d in 0.5_f64..10.0,
    ) {
        let masses = vec![50.0, 51.0, 52.0, 53.0];
        let pos1 = vec![Some(Peak::with_spectrum(
            rt1,
            MassSpectrum::new(masses.clone(), spec1).unwrap(),
        ))];
        let pos2 = vec![Some(Peak::with_spectrum(
            rt2,
            MassSpectrum::new(masses, spec2).unwrap(),
        ))];

        let score = position_similarity(&pos1, &pos2, d).unwrap();
        prop_assert!((0.0..=1.0 + 1e-12).contains(&score), "score {score}");
    }

    #[test]
    fn maxima_are_sorted_and_in_bounds(
        values in prop::collection::vec(0.0_f64..100.0, 3..64),
        points in 3_usize..9,
    ) {
        let maxima = maxima_indices(&values, points);
        prop_assert!(maxima.windows(2).all(|w| w[0] < w[1]));
        prop_assert!(maxima.iter().all(|&i| i < values.len()));
    }

    #[test]
    fn half_area_never_exceeds_the_total(
        values in prop::collection::vec(0.0_f64..1000.0, 1..64),
    ) {
        let (area, bound, _) = half_area(&values, 0, 0.5);
        let total: f64 = values.iter().sum();
        prop_assert!(area <= total + 1e-9);
        prop_assert!(bound < values.len());
    }
}
