//! End-to-end pipeline tests: JCAMP ingestion through peak integration.

use std::fmt::Write as _;
use std::fs;

use elution::baseline::tophat_im;
use elution::detect::biller_biemann;
use elution::experiment::Experiment;
use elution::matrix::build_intensity_matrix_i;
use elution::noise::window_analyzer;
use elution::peak::area::integrate_peak;
use elution::peak::filter::{num_ions_threshold, rel_threshold};
use elution::smooth::savitzky_golay_im;
use elution::units::WindowSize;

/// Intensity of ion `mass` at time `t` for a run holding two compounds.
fn intensity(mass: f64, t: f64) -> f64 {
    let gauss = |apex: f64, sigma: f64| (-((t - apex) / sigma).powi(2) / 2.0).exp();
    // compound A elutes at 30 s, compound B at 80 s
    let a = 1000.0 * gauss(30.0, 3.0);
    let b = 800.0 * gauss(80.0, 3.0);
    match mass as i64 {
        50 => a + 0.3 * b,
        51 => 0.6 * a,
        52 => 0.2 * a,
        53 => b,
        54 => 0.5 * b,
        _ => 0.0,
    }
}

fn synthetic_jcamp() -> String {
    let mut text = String::from("##TITLE=synthetic two-compound run\n##JCAMP-DX=4.24\n");
    for i in 0..120 {
        let t = i as f64;
        writeln!(text, "##PAGE= T={t:.1}").unwrap();
        writeln!(text, "##XYDATA= (XY..XY)").unwrap();
        let mut pairs = Vec::new();
        for mass in [50.0, 51.0, 52.0, 53.0, 54.0] {
            let v = intensity(mass, t);
            if v > 0.01 {
                pairs.push(format!("{mass:.1},{v:.4}"));
            }
        }
        if pairs.is_empty() {
            pairs.push("50.0,0.0".to_string());
        }
        writeln!(text, "{}", pairs.join(" ")).unwrap();
    }
    text.push_str("##END=\n");
    text
}

#[test]
fn jcamp_to_integrated_experiment() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let jdx = dir.path().join("run.jdx");
    fs::write(&jdx, synthetic_jcamp()).unwrap();

    // ingest
    let data = elution::formats::jcamp::read_jcamp(&jdx).unwrap();
    assert_eq!(data.len(), 120);
    assert!((data.time_step() - 1.0).abs() < 1e-9);
    assert_eq!(data.min_mass(), 50.0);
    assert_eq!(data.max_mass(), 54.0);

    // the TIC apexes at the stronger compound
    let tic = data.tic();
    let apex = tic
        .intensities()
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, _)| i)
        .unwrap();
    assert_eq!(apex, 30);

    // bin, smooth, baseline-correct
    let im = build_intensity_matrix_i(&data).unwrap();
    assert_eq!(im.size(), (120, 5));
    let im = savitzky_golay_im(&im, &WindowSize::Points(7), 2).unwrap();
    let im = tophat_im(&im, Some(&WindowSize::from("20s"))).unwrap();

    // detect and filter
    let peaks = biller_biemann(&im, 9, 3);
    let peaks = rel_threshold(&peaks, 2.0).unwrap();
    let mut peaks = num_ions_threshold(&peaks, 2, 10.0);
    assert_eq!(peaks.len(), 2, "expected the two compounds");

    // integrate
    for peak in &mut peaks {
        integrate_peak(&im, peak, 0).unwrap();
    }

    let first = &peaks[0];
    let second = &peaks[1];
    assert!((first.rt() - 30.0).abs() <= 1.0, "rt was {}", first.rt());
    assert!((second.rt() - 80.0).abs() <= 1.0, "rt was {}", second.rt());
    assert!(first.area().unwrap() > second.area().unwrap());
    assert_eq!(first.top_ions(1), vec![50.0]);
    assert_eq!(second.top_ions(1), vec![53.0]);
    assert!(first.uid().starts_with("50-51-"));

    // per-ion areas cover every apexing channel
    assert!(first.ion_area(51.0).unwrap() > 0.0);
    assert!(second.ion_area(54.0).unwrap() > 0.0);

    // experiment scoping and persistence
    let mut expr = Experiment::new("wt-01", peaks);
    expr.sele_rt_range("1m", "2m").unwrap();
    assert_eq!(expr.len(), 1);
    assert!((expr.peaks()[0].rt() - 80.0).abs() <= 1.0);

    let stored = dir.path().join("wt-01.json");
    expr.store(&stored).unwrap();
    let loaded = Experiment::load(&stored).unwrap();
    assert_eq!(loaded, expr);
}

#[test]
fn noise_estimate_sits_below_the_signal() {
    let dir = tempfile::tempdir().unwrap();
    let jdx = dir.path().join("run.jdx");
    fs::write(&jdx, synthetic_jcamp()).unwrap();
    let data = elution::formats::jcamp::read_jcamp(&jdx).unwrap();

    let tic = data.tic();
    let noise = window_analyzer(&tic, &WindowSize::Points(20), 256, Some(17)).unwrap();
    let max = tic.intensities().iter().copied().fold(0.0_f64, f64::max);
    assert!(noise < max / 100.0, "noise {noise} vs max {max}");
}

#[test]
fn smoothing_preserves_a_gaussian_apex() {
    // spec scenario: 101-point Gaussian, window 7, degree 2
    let times: Vec<f64> = (0..101).map(|i| i as f64).collect();
    let values: Vec<f64> = times
        .iter()
        .map(|&t| 100.0 * (-((t - 50.0) / 5.0).powi(2) / 2.0).exp())
        .collect();
    let ic = elution::IonChromatogram::new(values, times, elution::ChromatogramKind::Tic).unwrap();

    let smoothed = elution::smooth::savitzky_golay(&ic, &WindowSize::Points(7), 2).unwrap();
    let (apex, max) = smoothed
        .intensities()
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(i, &v)| (i, v))
        .unwrap();
    assert_eq!(apex, 50);
    assert!((max - 100.0).abs() / 100.0 < 1e-3);
}
