// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// YOLO object detection over a video file
///
/// cargo run --release -- --config yolov3.cfg --weights yolov3.onnx \
///     --classes coco.names --video test_video.mp4
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use anyhow::Context;
use clap::Parser;
use macroquad::window::Conf;
use yolo_video::pipeline::Step;
use yolo_video::renderer::{WindowSink, WINDOW_TITLE};
use yolo_video::{Args, Detector, Error, FfmpegSource, HeadlessSink, RunSummary, StreamRunner};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let (detector, source) = match setup(&args) {
        Ok(parts) => parts,
        Err(e) => return ExitCode::from(report(Err(e))),
    };

    if args.headless {
        return ExitCode::from(report(run_headless(detector, source)));
    }

    let conf = Conf {
        window_title: WINDOW_TITLE.to_string(),
        window_width: args.window_width,
        window_height: args.window_height,
        window_resizable: true,
        ..Default::default()
    };
    macroquad::Window::from_config(conf, async move {
        let code = report(run_windowed(detector, source).await);
        std::process::exit(code as i32);
    });
    ExitCode::SUCCESS
}

fn setup(args: &Args) -> anyhow::Result<(Detector, FfmpegSource)> {
    let detector = Detector::new(&args.detector_config())?;
    let source = FfmpegSource::open(args.video.as_str())?;
    Ok((detector, source))
}

fn run_headless(detector: Detector, source: FfmpegSource) -> anyhow::Result<RunSummary> {
    let sink = HeadlessSink::new();
    let quit = sink.quit_flag();
    ctrlc::set_handler(move || quit.store(true, Ordering::SeqCst))
        .context("installing Ctrl-C handler")?;
    log::info!("🚀 running headless, Ctrl-C to stop");

    let mut runner = StreamRunner::new(source, detector, sink);
    Ok(runner.process()?)
}

async fn run_windowed(detector: Detector, source: FfmpegSource) -> anyhow::Result<RunSummary> {
    let mut runner = StreamRunner::new(source, detector, WindowSink::new());
    log::info!("🚀 press Q or Esc to quit");
    loop {
        if let Step::Stopped(reason) = runner.step()? {
            return Ok(runner.summary(reason));
        }
        macroquad::window::next_frame().await;
    }
}

/// Log the outcome and map it to an exit status.
fn report(result: anyhow::Result<RunSummary>) -> u8 {
    match result {
        Ok(summary) => {
            log::info!(
                "✅ {:?}: {} frames in {:.2?} ({:.1} fps)",
                summary.reason,
                summary.frames,
                summary.elapsed,
                summary.fps()
            );
            0
        }
        Err(e) => {
            log::error!("❌ {:#}", e);
            e.downcast_ref::<Error>().map(Error::exit_code).unwrap_or(1)
        }
    }
}
