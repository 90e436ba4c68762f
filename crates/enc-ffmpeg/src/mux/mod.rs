pub mod mp4;
