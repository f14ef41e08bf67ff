//! End-to-end reads of synthetic plate directories

use std::io::Write;
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;
use tempfile::tempdir;

use platespec::exposure::{Camera, ExposureSelector, SelectionMode};
use platespec::identity::encode_target_id;
use platespec::ingest::{read_spectra, read_spectra_with_observer, IngestObserver, ReadOptions};
use platespec::prelude::*;
use platespec::synthetic::{flux_model, SyntheticPlate};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn options(mode: SelectionMode) -> ReadOptions {
    ReadOptions {
        mode,
        ..Default::default()
    }
}

fn closest_index(wave: &[f64], target: f64) -> usize {
    wave.iter()
        .enumerate()
        .min_by(|a, b| (a.1 - target).abs().total_cmp(&(b.1 - target).abs()))
        .map(|(i, _)| i)
        .unwrap()
}

#[test]
fn test_coadded_single_plate() -> TestResult {
    let dir = tempdir()?;
    let synthetic = SyntheticPlate::new(7027, 56448);
    let files = synthetic.write(dir.path())?;

    let output = read_spectra(&[&files.plate], &options(SelectionMode::Coadded))?;

    let expected: Vec<i64> = synthetic
        .fiber_ids()
        .into_iter()
        .map(|fiber| encode_target_id(7027, 56448, fiber).unwrap())
        .collect();
    assert_eq!(output.metadata.target_ids(), expected);
    assert_eq!(output.targets.len(), 6);
    assert_eq!(output.report.exposures_read, 1);
    assert_eq!(output.report.spectra, 6);
    assert!(!output.report.has_omissions());

    for target in &output.targets {
        assert_eq!(target.spectra.len(), 1);
        assert_eq!(target.brickname(), Some("7027-56448"));
        assert!(target.coadd);
        assert_eq!(
            output.metadata.get(target.id).map(|row| row.brickname.as_str()),
            Some("7027-56448")
        );

        let spectrum = &target.spectra[0];
        assert!((spectrum.wave[0] - 3600.0).abs() < 1e-3);
        assert!((spectrum.wave[spectrum.npix() - 1] - 10000.0).abs() < 30.0);
        assert_eq!(spectrum.resolution.n(), spectrum.npix());
    }

    let first = &output.targets[0].spectra[0];
    assert!((first.flux[10] - flux_model(1, first.wave[10])).abs() < 1e-5);
    Ok(())
}

#[test]
fn test_all_frames_cropped_per_camera() -> TestResult {
    let dir = tempdir()?;
    let files = SyntheticPlate::new(7027, 56448).write(dir.path())?;

    let output = read_spectra(&[&files.plate], &options(SelectionMode::AllFrames))?;
    assert_eq!(output.report.exposures_read, 8);
    assert_eq!(output.targets.len(), 6);
    assert_eq!(output.report.spectra, 24);

    for target in &output.targets {
        // b exp1, b exp2, r exp1, r exp2
        assert_eq!(target.spectra.len(), 4);
        for blue in &target.spectra[..2] {
            assert!(*blue.wave.last().unwrap() < 6000.0 + 10.0);
            assert!(blue.wave[0] < 3600.0);
        }
        for red in &target.spectra[2..] {
            assert!(red.wave[0] >= 5550.0);
            assert!((*red.wave.last().unwrap() - 10000.0).abs() < 20.0);
        }
    }
    Ok(())
}

#[test]
fn test_best_exposure_reads_four_frames() -> TestResult {
    let dir = tempdir()?;
    let files = SyntheticPlate::new(10, 20)
        .exposures(vec![100_001, 100_002, 100_003])
        .best_exposure(100_003)
        .write(dir.path())?;

    let selection = ExposureSelector::new(SelectionMode::BestExposure, 0).select(&[&files.plate])?;
    assert_eq!(selection.exposures.len(), 4);
    for exposure in &selection.exposures {
        assert_eq!(exposure.expid.as_deref(), Some("00100003"));
    }

    let output = read_spectra(&[&files.plate], &options(SelectionMode::BestExposure))?;
    assert!(output.targets.iter().all(|t| t.spectra.len() == 2));
    Ok(())
}

#[test]
fn test_random_exposure_picks_only_complete_one() -> TestResult {
    let dir = tempdir()?;
    let files = SyntheticPlate::new(3, 4)
        .npix(100)
        .without_frame(Camera::R2, 100_001)
        .write(dir.path())?;

    for seed in 0..8 {
        let selection =
            ExposureSelector::new(SelectionMode::RandomExposure, seed).select(&[&files.plate])?;
        assert_eq!(selection.exposures.len(), 4);
        assert!(selection
            .exposures
            .iter()
            .all(|e| e.expid.as_deref() == Some("00100002")));
    }

    let output = read_spectra(&[&files.plate], &options(SelectionMode::RandomExposure))?;
    assert_eq!(output.report.exposures_read, 4);
    assert!(output.targets.iter().all(|t| t.spectra.len() == 2));
    Ok(())
}

#[test]
fn test_random_exposure_without_complete_candidate() -> TestResult {
    let dir = tempdir()?;
    let files = SyntheticPlate::new(3, 4)
        .npix(50)
        .without_camera(Camera::R2)
        .write(dir.path())?;

    let output = read_spectra(&[&files.plate], &options(SelectionMode::RandomExposure))?;
    assert!(output.targets.is_empty());
    assert_eq!(output.report.exposures_read, 0);
    assert_eq!(
        output.report.omissions,
        vec![Omission::NoCompleteExposure {
            plate_path: files.plate.clone()
        }]
    );
    Ok(())
}

#[test]
fn test_missing_camera_skipped_in_all_frames() -> TestResult {
    let dir = tempdir()?;
    let files = SyntheticPlate::new(3, 4)
        .npix(50)
        .without_camera(Camera::B2)
        .write(dir.path())?;

    let output = read_spectra(&[&files.plate], &options(SelectionMode::AllFrames))?;
    assert_eq!(output.report.exposures_read, 6);
    assert!(output.report.omissions.contains(&Omission::CameraWithoutExposures {
        plate_path: files.plate.clone(),
        camera: Camera::B2,
    }));
    Ok(())
}

#[test]
fn test_allow_list_excluding_everything() -> TestResult {
    let dir = tempdir()?;
    let files = SyntheticPlate::new(7027, 56448).npix(50).write(dir.path())?;

    let options = ReadOptions {
        target_ids: Some(vec![42]),
        ..Default::default()
    };
    let output = read_spectra(&[&files.plate], &options)?;

    assert!(output.targets.is_empty());
    assert!(output.metadata.is_empty());
    assert!(output.report.omissions.contains(&Omission::PlateWithoutTargets {
        plate_path: files.plate.clone()
    }));
    assert!(output
        .report
        .omissions
        .contains(&Omission::TargetWithoutSpectra { target_id: 42 }));
    Ok(())
}

#[test]
fn test_allow_list_keeps_requested_target() -> TestResult {
    let dir = tempdir()?;
    let files = SyntheticPlate::new(7027, 56448).npix(50).write(dir.path())?;
    let wanted = encode_target_id(7027, 56448, 502)?;

    let options = ReadOptions {
        target_ids: Some(vec![wanted]),
        mode: SelectionMode::AllFrames,
        ..Default::default()
    };
    let output = read_spectra(&[&files.plate], &options)?;

    assert_eq!(output.metadata.target_ids(), vec![wanted]);
    assert_eq!(output.targets[0].spectra.len(), 4);
    assert!(!output.report.has_omissions());
    Ok(())
}

#[test]
fn test_coadd_frames_every_method() -> TestResult {
    let dir = tempdir()?;
    let files = SyntheticPlate::new(7027, 56448).write(dir.path())?;

    let plate_output = read_spectra(&[&files.plate], &options(SelectionMode::Coadded))?;
    let plate_wave = &plate_output.targets[0].spectra[0].wave;

    for method in [
        ResampleMethod::Integration,
        ResampleMethod::NearestNeighbor,
        ResampleMethod::MaskedSpline,
        ResampleMethod::SimpleSpline,
    ] {
        let options = ReadOptions {
            mode: SelectionMode::AllFrames,
            coadd_frames: true,
            resample_method: method,
            ..Default::default()
        };
        let output = read_spectra(&[&files.plate], &options)?;
        let target = &output.targets[0];
        assert_eq!(target.spectra.len(), 4, "{}", method);

        for spectrum in &target.spectra {
            assert_eq!(&spectrum.wave, plate_wave, "{}", method);
        }

        let blue = &target.spectra[0];
        let i = closest_index(&blue.wave, 4500.0);
        assert!(
            (blue.flux[i] - flux_model(1, blue.wave[i])).abs() < 0.02,
            "{}: {} vs {}",
            method,
            blue.flux[i],
            flux_model(1, blue.wave[i])
        );
        assert!(blue.ivar[i] > 0.0);

        // the red camera does not reach 4500 A
        let red = &target.spectra[2];
        assert_eq!(red.flux[i], 0.0, "{}", method);
        assert_eq!(red.ivar[i], 0.0, "{}", method);
    }
    Ok(())
}

#[test]
fn test_masked_spline_propagates_andmask() -> TestResult {
    let dir = tempdir()?;
    let files = SyntheticPlate::new(5, 6)
        .npix(200)
        .masked_every(7)
        .write(dir.path())?;

    let read = |method| -> Result<Vec<f64>, IngestError> {
        let options = ReadOptions {
            mode: SelectionMode::AllFrames,
            coadd_frames: true,
            use_andmask: true,
            resample_method: method,
            ..Default::default()
        };
        let output = read_spectra(&[&files.plate], &options)?;
        Ok(output.targets[0].spectra[0].ivar.clone())
    };

    let masked = read(ResampleMethod::MaskedSpline)?;
    let simple = read(ResampleMethod::SimpleSpline)?;
    let masked_zeros = masked.iter().filter(|&&v| v == 0.0).count();
    let simple_zeros = simple.iter().filter(|&&v| v == 0.0).count();
    assert!(masked_zeros > simple_zeros);
    Ok(())
}

#[test]
fn test_multi_plate_uses_thing_ids() -> TestResult {
    let dir = tempdir()?;
    let first = SyntheticPlate::new(100, 55000).npix(60);
    let second = SyntheticPlate::new(200, 55001).npix(60);
    let first_files = first.write(&dir.path().join("100"))?;
    let second_files = second.write(&dir.path().join("200"))?;

    let output = read_spectra(
        &[&first_files.plate, &second_files.plate],
        &options(SelectionMode::Coadded),
    )?;

    let mut expected: Vec<i64> = first
        .fiber_ids()
        .into_iter()
        .map(|f| first.thing_id(f))
        .chain(second.fiber_ids().into_iter().map(|f| second.thing_id(f)))
        .collect();
    expected.sort_unstable();
    assert_eq!(output.metadata.target_ids(), expected);
    assert_eq!(output.report.plates, 2);

    let row = output.metadata.get(second.thing_id(501)).unwrap();
    assert_eq!(row.brickname, "200-55001");
    Ok(())
}

#[test]
fn test_multi_plate_without_identity_file() -> TestResult {
    let dir = tempdir()?;
    let first_files = SyntheticPlate::new(100, 55000).npix(20).write(&dir.path().join("a"))?;
    let second_files = SyntheticPlate::new(200, 55001).npix(20).write(&dir.path().join("b"))?;
    std::fs::remove_file(&second_files.identity)?;

    let result = read_spectra(
        &[&first_files.plate, &second_files.plate],
        &ReadOptions::default(),
    );
    assert!(matches!(result, Err(IngestError::MissingIdentityFile(path)) if path == second_files.identity));
    Ok(())
}

#[test]
fn test_frame_from_another_plate_is_rejected() -> TestResult {
    let dir = tempdir()?;
    let files = SyntheticPlate::new(100, 55000).npix(20).write(dir.path())?;
    // same exposure ids, so these frames overwrite the first plate's
    SyntheticPlate::new(200, 55000).npix(20).write(dir.path())?;

    let result = read_spectra(&[&files.plate], &options(SelectionMode::AllFrames));
    assert!(matches!(
        result,
        Err(IngestError::PlateMismatch {
            expected: 100,
            found: 200,
            ..
        })
    ));
    Ok(())
}

fn gzip_in_place(path: &Path) -> std::io::Result<()> {
    let raw = std::fs::read(path)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw)?;
    std::fs::write(path, encoder.finish()?)
}

#[test]
fn test_gzip_compressed_inputs() -> TestResult {
    let dir = tempdir()?;
    let files = SyntheticPlate::new(7, 8).npix(80).write(dir.path())?;
    let plain = read_spectra(&[&files.plate], &options(SelectionMode::AllFrames))?;

    gzip_in_place(&files.plate)?;
    for frame in &files.frames {
        gzip_in_place(frame)?;
    }
    let compressed = read_spectra(&[&files.plate], &options(SelectionMode::AllFrames))?;

    assert_eq!(plain.metadata, compressed.metadata);
    for (a, b) in plain.targets.iter().zip(&compressed.targets) {
        for (sa, sb) in a.spectra.iter().zip(&b.spectra) {
            assert_eq!(sa.wave, sb.wave);
            assert_eq!(sa.flux, sb.flux);
        }
    }
    Ok(())
}

#[test]
fn test_coadd_frames_with_gzip_named_plate() -> TestResult {
    let dir = tempdir()?;
    let files = SyntheticPlate::new(7, 8).npix(80).write(dir.path())?;
    let plain_options = ReadOptions {
        mode: SelectionMode::AllFrames,
        coadd_frames: true,
        ..Default::default()
    };
    let plain = read_spectra(&[&files.plate], &plain_options)?;

    let gz_plate = dir.path().join("spPlate-7-8.fits.gz");
    gzip_in_place(&files.plate)?;
    std::fs::rename(&files.plate, &gz_plate)?;

    let all_frames = read_spectra(&[&gz_plate], &options(SelectionMode::AllFrames))?;
    assert_eq!(all_frames.targets.len(), 6);

    let coadded = read_spectra(&[&gz_plate], &plain_options)?;
    assert_eq!(coadded.metadata, plain.metadata);
    for (a, b) in plain.targets.iter().zip(&coadded.targets) {
        assert_eq!(a.spectra.len(), b.spectra.len());
        for (sa, sb) in a.spectra.iter().zip(&b.spectra) {
            assert_eq!(sa.wave, sb.wave);
        }
    }
    Ok(())
}

#[test]
fn test_fiber_filter() -> TestResult {
    let dir = tempdir()?;
    let files = SyntheticPlate::new(7027, 56448).npix(50).write(dir.path())?;

    let options = ReadOptions {
        fiber_ids: Some(vec![2, 502]),
        mode: SelectionMode::AllFrames,
        ..Default::default()
    };
    let output = read_spectra(&[&files.plate], &options)?;
    assert_eq!(
        output.metadata.target_ids(),
        vec![
            encode_target_id(7027, 56448, 2)?,
            encode_target_id(7027, 56448, 502)?
        ]
    );

    let spectrum = &output.targets[0].spectra[0];
    assert!((spectrum.flux[5] - flux_model(2, spectrum.wave[5])).abs() < 1e-4);
    Ok(())
}

#[test]
fn test_resolution_matrices() -> TestResult {
    let dir = tempdir()?;
    let files = SyntheticPlate::new(7027, 56448)
        .npix(80)
        .wdisp(1.6)
        .write(dir.path())?;

    let lazy = read_spectra(&[&files.plate], &ReadOptions::default())?;
    let eager = read_spectra(
        &[&files.plate],
        &ReadOptions {
            cache_csr: true,
            ..Default::default()
        },
    )?;

    let resolution = &lazy.targets[0].spectra[0].resolution;
    // 4 * ceil(1.6) + 1
    assert_eq!(resolution.ndiag(), 9);
    assert!(!resolution.is_csr_cached());
    for sum in resolution.column_sums() {
        assert!((sum - 1.0).abs() < 1e-12);
    }

    let cached = &eager.targets[0].spectra[0].resolution;
    assert!(cached.is_csr_cached());
    let x: Vec<f64> = (0..cached.n()).map(|i| (i as f64).sqrt()).collect();
    let banded = cached.dot(&x).ok_or("banded dot rejected x")?;
    let sparse = cached.csr().dot(&x).ok_or("csr dot rejected x")?;
    assert_eq!(banded.len(), cached.n());
    for (a, b) in banded.iter().zip(&sparse) {
        assert!((a - b).abs() < 1e-12);
    }
    assert_eq!(cached.dot(&x[1..]), None);
    assert_eq!(cached.csr().dot(&x[1..]), None);
    Ok(())
}

#[test]
fn test_degenerate_dispersion_substituted() -> TestResult {
    let dir = tempdir()?;
    let files = SyntheticPlate::new(1, 2).npix(40).wdisp(0.0).write(dir.path())?;

    let output = read_spectra(&[&files.plate], &ReadOptions::default())?;
    // fallback width 2.0 gives 4 * 2 + 1 bands
    assert_eq!(output.targets[0].spectra[0].resolution.ndiag(), 9);
    Ok(())
}

#[derive(Default)]
struct CountingObserver {
    selected: usize,
    started: usize,
    read: usize,
    spectra: usize,
    finished: bool,
}

impl IngestObserver for CountingObserver {
    fn exposures_selected(&mut self, count: usize) {
        self.selected = count;
    }

    fn exposure_started(&mut self, _index: usize, _exposure: &ExposureRef) {
        self.started += 1;
    }

    fn exposure_read(&mut self, _exposure: &ExposureData, spectra: usize) {
        self.read += 1;
        self.spectra += spectra;
    }

    fn finished(&mut self, _report: &IngestReport) {
        self.finished = true;
    }
}

#[test]
fn test_observer_sees_every_exposure() -> TestResult {
    let dir = tempdir()?;
    let files = SyntheticPlate::new(7027, 56448).npix(40).write(dir.path())?;

    let mut observer = CountingObserver::default();
    let output = read_spectra_with_observer(
        &[&files.plate],
        &options(SelectionMode::AllFrames),
        &mut observer,
    )?;

    assert_eq!(observer.selected, 8);
    assert_eq!(observer.started, 8);
    assert_eq!(observer.read, 8);
    assert_eq!(observer.spectra, output.report.spectra);
    assert!(observer.finished);
    Ok(())
}

#[test]
fn test_all_spectra_clears_coadd_hint() -> TestResult {
    let dir = tempdir()?;
    let files = SyntheticPlate::new(7027, 56448).npix(40).write(dir.path())?;

    let options = ReadOptions {
        all_spectra: true,
        mode: SelectionMode::AllFrames,
        ..Default::default()
    };
    let output = read_spectra(&[&files.plate], &options)?;
    assert!(output.targets.iter().all(|t| !t.coadd));
    Ok(())
}
