// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// Video processing pipeline
///
/// Single-threaded per frame, driven by `StreamRunner`:
/// - FrameSource: read (FFmpeg decodes ahead on its own threads)
/// - Detector:    detect + draw
/// - FrameSink:   display, and the quit check
pub mod runner;

pub use runner::{RunState, RunSummary, Step, StopReason, StreamRunner};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::detection::Frame;
use crate::Result;

/// Where annotated frames go.
pub trait FrameSink {
    fn show(&mut self, frame: &Frame) -> Result<()>;

    /// Polled once after every shown frame.
    fn quit_requested(&mut self) -> bool;

    /// Tear down the display. Called exactly once, when the run stops.
    fn close(&mut self) {}
}

/// Sink without a display; quits when the shared flag is raised (Ctrl-C).
#[derive(Debug, Clone, Default)]
pub struct HeadlessSink {
    quit: Arc<AtomicBool>,
    shown: u64,
}

impl HeadlessSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flag(quit: Arc<AtomicBool>) -> Self {
        Self { quit, shown: 0 }
    }

    /// Flag to raise from a signal handler.
    pub fn quit_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.quit)
    }

    pub fn shown(&self) -> u64 {
        self.shown
    }
}

impl FrameSink for HeadlessSink {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        self.shown += 1;
        if self.shown % 100 == 0 {
            log::debug!("{} frames processed ({}x{})", self.shown, frame.width(), frame.height());
        }
        Ok(())
    }

    fn quit_requested(&mut self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }
}
