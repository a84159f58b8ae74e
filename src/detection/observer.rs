// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use super::types::Detection;

/// Hook called once per drawn detection.
pub trait DetectionObserver {
    fn on_detection(&mut self, label: &str, detection: &Detection);
}

/// `Detected person with confidence 0.80 at [x, y, w, h]`
pub fn format_detection(label: &str, detection: &Detection) -> String {
    let b = &detection.bbox;
    format!(
        "Detected {} with confidence {:.2} at [{}, {}, {}, {}]",
        label,
        detection.confidence,
        b.x(),
        b.y(),
        b.width(),
        b.height()
    )
}

/// Sends the diagnostic line to the `log` facade at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl DetectionObserver for LogObserver {
    fn on_detection(&mut self, label: &str, detection: &Detection) {
        log::info!("{}", format_detection(label, detection));
    }
}

impl<F> DetectionObserver for F
where
    F: FnMut(&str, &Detection),
{
    fn on_detection(&mut self, label: &str, detection: &Detection) {
        self(label, detection)
    }
}
