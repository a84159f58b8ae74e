// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// FFmpeg frame filter: RGB24 `AVFrame` → `Frame` on a bounded channel
use std::time::Instant;

use crossbeam_channel::Sender;
use ez_ffmpeg::filter::frame_filter::FrameFilter;
use ez_ffmpeg::filter::frame_filter_context::FrameFilterContext;
use ez_ffmpeg::{AVMediaType, Frame as AVFrame};

use super::decoder::Decoded;
use crate::detection::Frame;

const MAX_DIM: u32 = 8192;

/// Expects `format=rgb24` upstream, so plane 0 holds packed RGB rows.
pub struct RgbFrameFilter {
    tx: Option<Sender<Decoded>>,
    count: usize,
    dropped: usize,
    last: Instant,
}

impl RgbFrameFilter {
    pub fn new(tx: Sender<Decoded>) -> Self {
        Self {
            tx: Some(tx),
            count: 0,
            dropped: 0,
            last: Instant::now(),
        }
    }
}

impl FrameFilter for RgbFrameFilter {
    fn media_type(&self) -> AVMediaType {
        AVMediaType::AVMEDIA_TYPE_VIDEO
    }

    fn init(&mut self, _ctx: &FrameFilterContext) -> Result<(), String> {
        log::debug!("decode filter started");
        Ok(())
    }

    fn filter_frame(
        &mut self,
        frame: AVFrame,
        _ctx: &FrameFilterContext,
    ) -> Result<Option<AVFrame>, String> {
        let Some(tx) = &self.tx else {
            return Err("frame receiver closed".to_string());
        };

        let image = unsafe {
            if frame.as_ptr().is_null() || frame.is_empty() || frame.is_corrupt() {
                self.dropped += 1;
                log::warn!("dropping empty or corrupt frame #{}", self.count + self.dropped);
                return Ok(None);
            }

            let av = &*frame.as_ptr();
            let (w, h) = (av.width as u32, av.height as u32);
            let stride = av.linesize[0];
            if w == 0 || h == 0 || w > MAX_DIM || h > MAX_DIM || av.data[0].is_null() {
                self.dropped += 1;
                log::warn!("dropping frame with invalid geometry {}x{}", w, h);
                return Ok(None);
            }
            if stride < 0 || (stride as usize) < w as usize * 3 {
                return Err(format!("unexpected stride {} for {}px wide rgb24 frame", stride, w));
            }

            let plane = std::slice::from_raw_parts(av.data[0], stride as usize * h as usize);
            pack_rgb_rows(plane, stride as usize, w, h)
        };
        let Some(image) = image else {
            return Err("rgb24 plane shorter than frame".to_string());
        };

        // blocks while the reader is two frames behind
        if tx.send(Decoded::Frame(image)).is_err() {
            self.tx = None;
            return Err("frame receiver closed".to_string());
        }

        self.count += 1;
        if self.last.elapsed().as_secs_f64() >= 5.0 {
            log::debug!("decoded {} frames, dropped {}", self.count, self.dropped);
            self.last = Instant::now();
        }
        Ok(Some(frame))
    }

    fn uninit(&mut self, _ctx: &FrameFilterContext) {
        log::debug!("decode filter stopped after {} frames", self.count);
        self.tx = None;
    }
}

/// Copy `height` rows of `width * 3` bytes out of a strided RGB24 plane.
pub fn pack_rgb_rows(plane: &[u8], stride: usize, width: u32, height: u32) -> Option<Frame> {
    let row = width as usize * 3;
    if stride < row || plane.len() < stride * (height as usize).saturating_sub(1) + row {
        return None;
    }
    let mut buf = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        let start = y * stride;
        buf.extend_from_slice(&plane[start..start + row]);
    }
    Frame::from_raw(width, height, buf)
}
