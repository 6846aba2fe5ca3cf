#[cfg(any(test, feature = "mock-commands"))]
pub mod mock;
pub mod process_control;
pub mod startup_self_check;
pub mod video;
pub mod yt_dlp;
