// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// Video input
///
/// - FrameSource:   sequential frame reader the stream runner pulls from
/// - FfmpegSource:  video file decoded by FFmpeg on its own threads
/// - RgbFrameFilter: FFmpeg frame → packed RGB `Frame`
pub mod decode_filter;
pub mod decoder;

pub use decode_filter::RgbFrameFilter;
pub use decoder::FfmpegSource;

use crate::detection::Frame;
use crate::Result;

pub trait FrameSource {
    /// Next frame; `Ok(None)` once the stream has ended.
    fn read(&mut self) -> Result<Option<Frame>>;

    /// Stop decoding and release the underlying resources.
    fn release(&mut self);
}
