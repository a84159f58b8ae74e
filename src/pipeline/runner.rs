// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
//
// Stream runner: Read → Detect → Draw → Display, one frame at a time

use std::time::{Duration, Instant};

use super::FrameSink;
use crate::detection::Detector;
use crate::input::FrameSource;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    UserQuit,
}

/// `Opened → Running → Stopped | Failed`; the last two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Opened,
    Running,
    Stopped(StopReason),
    Failed,
}

/// Outcome of one `StreamRunner::step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A frame went through; `detections` survived suppression.
    Frame { detections: usize },
    Stopped(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub frames: u64,
    pub reason: StopReason,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

pub struct StreamRunner<S, K> {
    source: S,
    detector: Detector,
    sink: K,
    state: RunState,
    failure: Option<Error>,
    frames: u64,
    started: Option<Instant>,
    elapsed: Duration,
    closed: bool,
}

impl<S: FrameSource, K: FrameSink> StreamRunner<S, K> {
    pub fn new(source: S, detector: Detector, sink: K) -> Self {
        Self {
            source,
            detector,
            sink,
            state: RunState::Opened,
            failure: None,
            frames: 0,
            started: None,
            elapsed: Duration::ZERO,
            closed: false,
        }
    }

    /// Run until end of stream, user quit, or the first error.
    pub fn process(&mut self) -> Result<RunSummary> {
        loop {
            if let Step::Stopped(reason) = self.step()? {
                return Ok(self.summary(reason));
            }
        }
    }

    /// One Read → Detect → Draw → Display iteration.
    ///
    /// Once stopped, returns the same stop reason, or the same error, without
    /// touching the source.
    pub fn step(&mut self) -> Result<Step> {
        match self.state {
            RunState::Stopped(reason) => return Ok(Step::Stopped(reason)),
            RunState::Failed => {
                return Err(self
                    .failure
                    .clone()
                    .unwrap_or_else(|| Error::FrameRead("stream failed".to_string())))
            }
            RunState::Opened => {
                self.started = Some(Instant::now());
                self.state = RunState::Running;
            }
            RunState::Running => {}
        }

        let result = self.advance();
        match &result {
            Ok(Step::Stopped(reason)) => {
                self.state = RunState::Stopped(*reason);
                self.finish();
            }
            Err(e) => {
                log::error!("stream stopped after {} frames: {}", self.frames, e);
                self.state = RunState::Failed;
                self.failure = Some(e.clone());
                self.finish();
            }
            Ok(Step::Frame { .. }) => {}
        }
        result
    }

    fn advance(&mut self) -> Result<Step> {
        let Some(mut frame) = self.source.read()? else {
            return Ok(Step::Stopped(StopReason::EndOfStream));
        };
        log::debug!("frame {}: {}x{}", self.frames + 1, frame.width(), frame.height());

        let detections = self.detector.detect_objects(&frame)?;
        self.detector.draw_labels(&mut frame, &detections);
        self.sink.show(&frame)?;
        self.frames += 1;

        if self.sink.quit_requested() {
            return Ok(Step::Stopped(StopReason::UserQuit));
        }
        Ok(Step::Frame {
            detections: detections.len(),
        })
    }

    // release the source and close the sink, once
    fn finish(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.elapsed = self.started.map(|t| t.elapsed()).unwrap_or_default();
        self.source.release();
        self.sink.close();
    }

    pub fn summary(&self, reason: StopReason) -> RunSummary {
        RunSummary {
            frames: self.frames,
            reason,
            elapsed: self.elapsed,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    pub fn detector_mut(&mut self) -> &mut Detector {
        &mut self.detector
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use ndarray::{Array4, ArrayD, IxDyn};

    use super::*;
    use crate::config::{NetworkConfig, Thresholds};
    use crate::detection::{ClassCatalog, Frame};
    use crate::models::Network;

    struct NoDetections;

    impl Network for NoDetections {
        fn output_names(&self) -> &[String] {
            &[]
        }

        fn forward(&mut self, _blob: &Array4<f32>) -> Result<Vec<ArrayD<f32>>> {
            Ok(vec![ArrayD::zeros(IxDyn(&[0, 85]))])
        }
    }

    fn detector() -> Detector {
        let net = NetworkConfig {
            input_width: 16,
            input_height: 16,
            ..Default::default()
        };
        Detector::with_network(
            Box::new(NoDetections),
            net,
            ClassCatalog::new(vec!["person".into()]),
            Thresholds::default(),
            42,
        )
    }

    #[derive(Default)]
    struct VecSource {
        frames: VecDeque<Result<Frame>>,
        reads: usize,
        released: usize,
    }

    impl VecSource {
        fn frames(n: usize) -> Self {
            Self {
                frames: (0..n).map(|_| Ok(Frame::new(8, 6))).collect(),
                ..Default::default()
            }
        }
    }

    impl FrameSource for VecSource {
        fn read(&mut self) -> Result<Option<Frame>> {
            self.reads += 1;
            self.frames.pop_front().transpose()
        }

        fn release(&mut self) {
            self.released += 1;
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        shown: usize,
        quit_after: Option<usize>,
        closed: usize,
    }

    impl FrameSink for RecordingSink {
        fn show(&mut self, _frame: &Frame) -> Result<()> {
            self.shown += 1;
            Ok(())
        }

        fn quit_requested(&mut self) -> bool {
            self.quit_after.is_some_and(|n| self.shown >= n)
        }

        fn close(&mut self) {
            self.closed += 1;
        }
    }

    #[test]
    fn every_frame_is_processed_until_end_of_stream() {
        let mut runner = StreamRunner::new(VecSource::frames(10), detector(), RecordingSink::default());
        let summary = runner.process().unwrap();
        assert_eq!(summary.frames, 10);
        assert_eq!(summary.reason, StopReason::EndOfStream);
        assert_eq!(runner.sink().shown, 10);
        assert_eq!(runner.source().released, 1);
        assert_eq!(runner.sink().closed, 1);
    }

    #[test]
    fn empty_stream_ends_immediately() {
        let mut runner = StreamRunner::new(VecSource::frames(0), detector(), RecordingSink::default());
        let summary = runner.process().unwrap();
        assert_eq!(summary.frames, 0);
        assert_eq!(summary.reason, StopReason::EndOfStream);
        assert_eq!(runner.sink().shown, 0);
        assert_eq!(runner.source().released, 1);
    }

    #[test]
    fn quit_key_stops_after_current_frame() {
        let sink = RecordingSink {
            quit_after: Some(3),
            ..Default::default()
        };
        let mut runner = StreamRunner::new(VecSource::frames(10), detector(), sink);
        let summary = runner.process().unwrap();
        assert_eq!(summary.reason, StopReason::UserQuit);
        assert_eq!(summary.frames, 3);
        assert_eq!(runner.source().reads, 3);
        assert_eq!(runner.source().released, 1);
        assert_eq!(runner.sink().closed, 1);
    }

    #[test]
    fn read_error_stops_with_frame_read_and_releases_once() {
        let mut source = VecSource::frames(2);
        source.frames.push_back(Err(Error::FrameRead("corrupt packet".into())));
        source.frames.push_back(Ok(Frame::new(8, 6)));
        let mut runner = StreamRunner::new(source, detector(), RecordingSink::default());

        let err = runner.process().unwrap_err();
        assert!(matches!(err, Error::FrameRead(_)));
        assert_eq!(err.exit_code(), 4);
        assert_eq!(runner.frames(), 2);
        assert_eq!(runner.state(), RunState::Failed);

        // no retry: the remaining frame is never read
        assert!(matches!(runner.step(), Err(Error::FrameRead(ref m)) if m == "corrupt packet"));
        assert_eq!(runner.source().reads, 3);
        assert_eq!(runner.source().released, 1);
        assert_eq!(runner.sink().closed, 1);
    }

    struct BrokenNetwork;

    impl Network for BrokenNetwork {
        fn output_names(&self) -> &[String] {
            &[]
        }

        fn forward(&mut self, _blob: &Array4<f32>) -> Result<Vec<ArrayD<f32>>> {
            Err(Error::inference("output yolo_82 missing"))
        }
    }

    #[test]
    fn failure_kind_is_kept_after_stopping() {
        let detector = Detector::with_network(
            Box::new(BrokenNetwork),
            NetworkConfig {
                input_width: 16,
                input_height: 16,
                ..Default::default()
            },
            ClassCatalog::new(vec!["person".into()]),
            Thresholds::default(),
            42,
        );
        let mut runner = StreamRunner::new(VecSource::frames(3), detector, RecordingSink::default());

        let err = runner.process().unwrap_err();
        assert_eq!(err.exit_code(), 5);
        assert_eq!(runner.state(), RunState::Failed);
        for _ in 0..2 {
            let again = runner.step().unwrap_err();
            assert!(matches!(again, Error::Inference(_)));
            assert_eq!(again.to_string(), err.to_string());
        }
        assert_eq!(runner.source().reads, 1);
        assert_eq!(runner.source().released, 1);
        assert_eq!(runner.sink().shown, 0);
    }

    #[test]
    fn stopped_is_terminal() {
        let mut runner = StreamRunner::new(VecSource::frames(1), detector(), RecordingSink::default());
        assert_eq!(runner.step().unwrap(), Step::Frame { detections: 0 });
        assert_eq!(runner.state(), RunState::Running);
        assert_eq!(runner.step().unwrap(), Step::Stopped(StopReason::EndOfStream));
        for _ in 0..3 {
            assert_eq!(runner.step().unwrap(), Step::Stopped(StopReason::EndOfStream));
        }
        assert_eq!(runner.source().reads, 2);
        assert_eq!(runner.source().released, 1);
        assert_eq!(runner.sink().closed, 1);
    }

    #[test]
    fn fps_is_frames_over_elapsed() {
        let summary = RunSummary {
            frames: 50,
            reason: StopReason::EndOfStream,
            elapsed: Duration::from_secs(2),
        };
        assert!((summary.fps() - 25.0).abs() < 1e-9);
        let instant = RunSummary {
            elapsed: Duration::ZERO,
            ..summary
        };
        assert_eq!(instant.fps(), 0.0);
    }
}
