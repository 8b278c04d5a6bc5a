//! Media collaborators: audio extraction, video frame sampling, pixel buffers

pub mod audio_extractor;
pub mod frame;
pub mod video;
pub mod wav;

pub use audio_extractor::{
    AudioExtractor, AudioTrack, FfmpegAudioExtractor, SymphoniaAudioExtractor,
    TwoStageAudioExtractor,
};
pub use frame::{GrayFrame, RgbFrame};
pub use video::{FfmpegVideoDecoder, FrameStream, VideoDecoder};
