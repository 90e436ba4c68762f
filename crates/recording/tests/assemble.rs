mod common;

use common::{RecordingEncoders, solid_frame, staged_files};
use lapse_frame_store::{DiskFrameStore, FrameStore, MemoryFrameStore, StagingFormat};
use lapse_media_info::Dimensions;
use lapse_recording::{RecordingError, assemble};

const VGA: Dimensions = Dimensions::new(640, 480);
const QVGA: Dimensions = Dimensions::new(320, 240);

#[test]
fn empty_store_is_rejected_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("timelapse.mp4");
    let encoders = RecordingEncoders::default();

    let mut store = MemoryFrameStore::new();
    let err = assemble(&mut store, 30.0, &output, &encoders).unwrap_err();

    assert!(matches!(err, RecordingError::EmptyCapture));
    assert!(!output.exists());
    assert!(encoders.videos().is_empty());
}

#[test]
fn frames_are_written_in_order_at_rate() {
    common::init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("timelapse.mp4");
    let encoders = RecordingEncoders::default();

    let mut store = MemoryFrameStore::new();
    for value in 0..3 {
        store.append(&solid_frame(VGA, value)).unwrap();
    }

    let path = assemble(&mut store, 10.0, &output, &encoders).unwrap();

    assert_eq!(path, output);
    assert!(store.is_empty());

    let videos = encoders.videos();
    assert_eq!(videos.len(), 1);

    let video = &videos[0];
    assert_eq!(video.path, output);
    assert_eq!(video.info.unwrap().frame_rate, 10.0);
    assert_eq!(video.info.unwrap().dimensions, VGA);
    assert_eq!(video.frames, vec![VGA; 3]);
    assert!(video.finished);
    assert!((video.duration_secs() - 0.3).abs() < 1e-9);
}

#[test]
fn dimension_mismatch_aborts_before_output_exists() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("timelapse.mp4");
    let encoders = RecordingEncoders::default();

    let mut store = MemoryFrameStore::new();
    store.append(&solid_frame(VGA, 0)).unwrap();
    store.append(&solid_frame(QVGA, 0)).unwrap();

    let err = assemble(&mut store, 30.0, &output, &encoders).unwrap_err();

    assert!(matches!(
        err,
        RecordingError::DimensionMismatch {
            index: 1,
            expected: VGA,
            found: QVGA,
        }
    ));
    assert!(!output.exists());
    assert!(encoders.videos().is_empty());
    assert_eq!(store.len(), 2);
}

#[test]
fn encoder_failure_removes_output_and_keeps_frames() {
    let dir = tempfile::tempdir().unwrap();
    let staging = dir.path().join("staging");
    let output = dir.path().join("timelapse.mp4");
    let encoders = RecordingEncoders::failing_at(1);

    let mut store = DiskFrameStore::open(&staging, StagingFormat::Png).unwrap();
    for value in 0..3 {
        store.append(&solid_frame(QVGA, value)).unwrap();
    }

    let err = assemble(&mut store, 30.0, &output, &encoders).unwrap_err();

    assert!(matches!(err, RecordingError::EncodeFailure(_)));
    assert!(!output.exists());
    assert_eq!(store.len(), 3);
    assert_eq!(staged_files(&staging).len(), 3);

    // the same frames can be assembled again once the encoder works
    let retry = RecordingEncoders::default();
    assemble(&mut store, 30.0, &output, &retry).unwrap();

    assert_eq!(retry.videos()[0].frames.len(), 3);
    assert!(staged_files(&staging).is_empty());
}

#[test]
fn failed_encoder_creation_keeps_existing_output() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("timelapse.mp4");
    std::fs::write(&output, b"earlier video").unwrap();

    let mut store = MemoryFrameStore::new();
    store.append(&solid_frame(QVGA, 0)).unwrap();

    let encoders = RecordingEncoders::failing_to_create();
    let err = assemble(&mut store, 30.0, &output, &encoders).unwrap_err();

    assert!(matches!(err, RecordingError::EncodeFailure(_)));
    assert_eq!(std::fs::read(&output).unwrap(), b"earlier video");
    assert_eq!(store.len(), 1);
}

#[test]
fn invalid_rate_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("timelapse.mp4");

    let mut store = MemoryFrameStore::new();
    store.append(&solid_frame(QVGA, 0)).unwrap();

    for rate in [0.0, -1.0, f64::NAN] {
        let err = assemble(&mut store, rate, &output, &RecordingEncoders::default()).unwrap_err();
        assert!(matches!(err, RecordingError::InvalidConfig(_)));
    }

    assert_eq!(store.len(), 1);
}
