// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// Video file decoder
use std::path::Path;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver, Sender};
use ez_ffmpeg::core::context::null_output::create_null_output;
use ez_ffmpeg::filter::frame_pipeline_builder::FramePipelineBuilder;
use ez_ffmpeg::{AVMediaType, FfmpegContext, Input};

use super::decode_filter::RgbFrameFilter;
use super::FrameSource;
use crate::detection::Frame;
use crate::{Error, Result};

/// Decoder runs at most this many frames ahead of the reader.
pub const FRAME_QUEUE: usize = 2;

/// Messages from the decode threads, in stream order.
#[derive(Debug)]
pub enum Decoded {
    Frame(Frame),
    Finished,
    Failed(String),
}

/// Sequential reader over a video file.
///
/// FFmpeg decodes on its own scheduler threads; frames come through a
/// bounded channel of `FRAME_QUEUE`.
pub struct FfmpegSource {
    path: String,
    rx: Option<Receiver<Decoded>>,
    worker: Option<JoinHandle<()>>,
    frames: u64,
    ended: bool,
}

impl FfmpegSource {
    pub fn open(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if !Path::new(&path).is_file() {
            return Err(Error::source_unavailable(path, "no such file"));
        }

        let (tx, rx) = bounded::<Decoded>(FRAME_QUEUE);
        let (started_tx, started_rx) = bounded::<std::result::Result<(), String>>(1);
        let input = path.clone();
        let worker = std::thread::Builder::new()
            .name("ffmpeg-decode".into())
            .spawn(move || decode(&input, tx, started_tx))
            .map_err(|e| Error::source_unavailable(path.as_str(), e))?;

        match started_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => {
                let _ = worker.join();
                return Err(Error::source_unavailable(path, reason));
            }
            Err(_) => {
                let _ = worker.join();
                return Err(Error::source_unavailable(path, "decoder thread exited"));
            }
        }
        log::info!("📹 decoding {}", path);

        Ok(Self {
            path,
            rx: Some(rx),
            worker: Some(worker),
            frames: 0,
            ended: false,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Frames handed out so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// Decode thread body: build → start → wait, then report how decoding ended.
fn decode(path: &str, tx: Sender<Decoded>, started: Sender<std::result::Result<(), String>>) {
    let pipe: FramePipelineBuilder = AVMediaType::AVMEDIA_TYPE_VIDEO.into();
    let pipe = pipe.filter("rgb24", Box::new(RgbFrameFilter::new(tx.clone())));
    let out = create_null_output().add_frame_pipeline(pipe);

    let ctx = match FfmpegContext::builder()
        .input(Input::new(path))
        .filter_descs(["format=rgb24"].into())
        .output(out)
        .build()
    {
        Ok(ctx) => ctx,
        Err(e) => {
            let _ = started.send(Err(format!("build failed: {}", e)));
            return;
        }
    };
    let sch = match ctx.start() {
        Ok(sch) => sch,
        Err(e) => {
            let _ = started.send(Err(format!("start failed: {}", e)));
            return;
        }
    };
    let _ = started.send(Ok(()));

    let outcome = match sch.wait() {
        Ok(_) => Decoded::Finished,
        Err(e) => Decoded::Failed(e.to_string()),
    };
    // receiver gone means the source was released
    let _ = tx.send(outcome);
}

impl FrameSource for FfmpegSource {
    fn read(&mut self) -> Result<Option<Frame>> {
        if self.ended {
            return Ok(None);
        }
        let Some(rx) = &self.rx else {
            return Ok(None);
        };
        match rx.recv() {
            Ok(Decoded::Frame(frame)) => {
                self.frames += 1;
                Ok(Some(frame))
            }
            Ok(Decoded::Finished) => {
                self.ended = true;
                log::debug!("{}: end of stream after {} frames", self.path, self.frames);
                Ok(None)
            }
            Ok(Decoded::Failed(reason)) => {
                self.ended = true;
                Err(Error::FrameRead(reason))
            }
            Err(_) => {
                self.ended = true;
                Err(Error::FrameRead("decoder thread exited unexpectedly".to_string()))
            }
        }
    }

    fn release(&mut self) {
        // dropping the receiver fails the filter's next send, which aborts decoding
        if self.rx.take().is_none() {
            return;
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("decoder thread for {} panicked", self.path);
            }
        }
        log::debug!("released {}", self.path);
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.release();
    }
}
