use lapse_frame_store::{DiskFrameStore, FrameStore, FrameStoreError, StagingFormat};
use lapse_media_info::{Dimensions, RawFrame};

fn gradient(width: u32, height: u32, seed: u8) -> RawFrame {
    let data = (0..width * height * 3)
        .map(|i| (i as u8).wrapping_add(seed))
        .collect();
    RawFrame::from_rgb24(width, height, data).unwrap()
}

#[test]
fn png_frames_read_back_exactly() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = DiskFrameStore::open(dir.path(), StagingFormat::Png).unwrap();

    let frame = gradient(16, 8, 7);
    let index = store.append(&frame).unwrap();

    assert_eq!(index, 0);
    assert!(dir.path().join("frame_00000.png").exists());

    let read = store.read(0).unwrap();
    assert_eq!(read.dimensions(), Dimensions::new(16, 8));
    assert_eq!(read.data(), frame.data());
}

#[test]
fn jpeg_frames_keep_dimensions() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = DiskFrameStore::open(dir.path(), StagingFormat::Jpeg).unwrap();

    store.append(&gradient(64, 48, 0)).unwrap();
    store.append(&gradient(32, 24, 0)).unwrap();

    assert_eq!(store.dimensions(0).unwrap(), Dimensions::new(64, 48));
    assert_eq!(store.dimensions(1).unwrap(), Dimensions::new(32, 24));
    assert_eq!(store.read(1).unwrap().data().len(), 32 * 24 * 3);
    assert!(dir.path().join("frame_00001.jpg").exists());
}

#[test]
fn reopening_recovers_staged_frames() {
    let dir = tempfile::tempdir().unwrap();

    {
        let mut store = DiskFrameStore::open(dir.path(), StagingFormat::Png).unwrap();
        for seed in 0..3 {
            store.append(&gradient(8, 8, seed)).unwrap();
        }
    }

    let mut store = DiskFrameStore::open(dir.path(), StagingFormat::Png).unwrap();
    assert_eq!(store.len(), 3);
    assert_eq!(store.append(&gradient(8, 8, 9)).unwrap(), 3);
    assert!(dir.path().join("frame_00003.png").exists());
}

#[test]
fn reopening_rejects_gaps() {
    let dir = tempfile::tempdir().unwrap();

    {
        let mut store = DiskFrameStore::open(dir.path(), StagingFormat::Png).unwrap();
        for seed in 0..3 {
            store.append(&gradient(8, 8, seed)).unwrap();
        }
    }
    std::fs::remove_file(dir.path().join("frame_00001.png")).unwrap();

    let err = DiskFrameStore::open(dir.path(), StagingFormat::Png).unwrap_err();
    assert!(matches!(err, FrameStoreError::Gap(1)));
}

#[test]
fn clear_removes_only_frame_files() {
    let dir = tempfile::tempdir().unwrap();
    let notes = dir.path().join("notes.txt");
    std::fs::write(&notes, "keep me").unwrap();

    let mut store = DiskFrameStore::open(dir.path(), StagingFormat::Jpeg).unwrap();
    store.append(&gradient(8, 8, 0)).unwrap();
    store.append(&gradient(8, 8, 1)).unwrap();

    store.clear().unwrap();

    assert!(store.is_empty());
    assert!(!dir.path().join("frame_00000.jpg").exists());
    assert!(!dir.path().join("frame_00001.jpg").exists());
    assert!(notes.exists());

    assert_eq!(store.append(&gradient(8, 8, 2)).unwrap(), 0);
}

#[test]
fn open_creates_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let staging = dir.path().join("nested").join("staging");

    let store = DiskFrameStore::open(&staging, StagingFormat::Jpeg).unwrap();

    assert!(staging.is_dir());
    assert!(store.is_empty());
}
