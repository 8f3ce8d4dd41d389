pub mod audio;
pub mod ffmpeg;
pub mod frames;
pub mod text;
pub mod video;

pub use audio::{AudioSource, FfmpegAudioSource};
pub use video::{FfmpegFrameSource, FrameSource, FrameStream, VideoFrame};
