// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::Ordering;

use ndarray::{Array4, ArrayD, IxDyn};
use yolo_video::detection::format_detection;
use yolo_video::{
    ClassCatalog, Detection, Detector, Frame, FrameSink, FrameSource, HeadlessSink, Network,
    NetworkConfig, Result, StopReason, StreamRunner, Thresholds,
};

/// Two overlapping people and a car, every frame.
struct StaticScene;

impl Network for StaticScene {
    fn output_names(&self) -> &[String] {
        &[]
    }

    fn forward(&mut self, _blob: &Array4<f32>) -> Result<Vec<ArrayD<f32>>> {
        #[rustfmt::skip]
        let rows = vec![
            0.25, 0.5, 0.25, 0.5, 1.0, 0.6, 0.0,
            0.26, 0.5, 0.25, 0.5, 1.0, 0.9, 0.0,
            0.75, 0.5, 0.25, 0.25, 1.0, 0.0, 0.7,
            0.5, 0.5, 0.1, 0.1, 1.0, 0.3, 0.2,
        ];
        Ok(vec![ArrayD::from_shape_vec(IxDyn(&[1, 4, 7]), rows).unwrap()])
    }
}

struct Frames(Vec<Frame>, usize);

impl FrameSource for Frames {
    fn read(&mut self) -> Result<Option<Frame>> {
        Ok(self.0.pop())
    }

    fn release(&mut self) {
        self.1 += 1;
    }
}

fn detector(lines: Rc<RefCell<Vec<String>>>) -> Detector {
    let net = NetworkConfig {
        input_width: 32,
        input_height: 32,
        ..Default::default()
    };
    let catalog = ClassCatalog::parse("person\ncar\n").unwrap();
    let mut detector =
        Detector::with_network(Box::new(StaticScene), net, catalog, Thresholds::default(), 42);
    detector.set_observer(move |label: &str, det: &Detection| {
        lines.borrow_mut().push(format_detection(label, det))
    });
    detector
}

#[test]
fn video_runs_to_end_of_stream_and_logs_each_detection() {
    let lines = Rc::new(RefCell::new(Vec::new()));
    let frames = Frames((0..3).map(|_| Frame::new(256, 128)).collect(), 0);
    let mut runner = StreamRunner::new(frames, detector(Rc::clone(&lines)), HeadlessSink::new());

    let summary = runner.process().unwrap();
    assert_eq!(summary.reason, StopReason::EndOfStream);
    assert_eq!(summary.frames, 3);
    assert_eq!(runner.source().1, 1);
    assert_eq!(runner.sink().shown(), 3);

    let lines = lines.borrow();
    assert_eq!(lines.len(), 6);
    assert_eq!(
        &lines[..2],
        &[
            "Detected person with confidence 0.90 at [34, 32, 64, 64]".to_string(),
            "Detected car with confidence 0.70 at [160, 48, 64, 32]".to_string(),
        ]
    );
}

#[test]
fn ctrl_c_flag_quits_headless_run() {
    let lines = Rc::new(RefCell::new(Vec::new()));
    let frames = Frames((0..5).map(|_| Frame::new(64, 64)).collect(), 0);
    let mut sink = HeadlessSink::new();
    sink.quit_flag().store(true, Ordering::SeqCst);
    assert!(sink.quit_requested());

    let mut runner = StreamRunner::new(frames, detector(lines), sink);
    let summary = runner.process().unwrap();
    assert_eq!(summary.reason, StopReason::UserQuit);
    assert_eq!(summary.frames, 1);
    assert_eq!(runner.source().1, 1);
}
