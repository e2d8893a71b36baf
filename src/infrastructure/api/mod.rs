pub mod petbuddy;
