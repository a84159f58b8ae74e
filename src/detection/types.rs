// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// Video frame (RGB, row-major)
pub type Frame = image::RgbImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bbox {
    // top-left origin, pixels of the original frame
    x: i32,
    y: i32,
    width: i32,
    height: i32,
}

impl Bbox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Convert a normalized `(cx, cy, w, h)` candidate to frame pixels.
    ///
    /// Each step truncates toward zero, so `x = ⌊⌊cx·W⌋ − ⌊w·W⌋ / 2⌋`.
    pub fn from_normalized_center(
        cx: f32,
        cy: f32,
        w: f32,
        h: f32,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        let fw = frame_width as f32;
        let fh = frame_height as f32;
        let center_x = (cx * fw) as i32;
        let center_y = (cy * fh) as i32;
        let width = (w * fw) as i32;
        let height = (h * fh) as i32;
        let x = (center_x as f32 - width as f32 / 2.) as i32;
        let y = (center_y as f32 - height as f32 / 2.) as i32;
        Self::new(x, y, width, height)
    }

    pub fn x(&self) -> i32 {
        self.x
    }

    pub fn y(&self) -> i32 {
        self.y
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn xmax(&self) -> i32 {
        self.x + self.width
    }

    pub fn ymax(&self) -> i32 {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn area(&self) -> f32 {
        if self.is_empty() {
            0.
        } else {
            self.width as f32 * self.height as f32
        }
    }

    pub fn intersection_area(&self, another: &Bbox) -> f32 {
        let l = self.x.max(another.x);
        let r = self.xmax().min(another.xmax());
        let t = self.y.max(another.y);
        let b = self.ymax().min(another.ymax());
        ((r - l).max(0) as f32) * ((b - t).max(0) as f32)
    }

    pub fn union(&self, another: &Bbox) -> f32 {
        self.area() + another.area() - self.intersection_area(another)
    }

    pub fn iou(&self, another: &Bbox) -> f32 {
        let union = self.union(another);
        if union <= 0. {
            return 0.;
        }
        self.intersection_area(another) / union
    }
}

/// One surviving detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: Bbox,
}

/// Per-frame detector output: the candidates that passed the confidence
/// filter, and the indices of those that survived suppression.
///
/// `indices` is ordered by descending confidence.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionSet {
    pub indices: Vec<usize>,
    pub boxes: Vec<Bbox>,
    pub confidences: Vec<f32>,
    pub class_ids: Vec<usize>,
}

impl DetectionSet {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Number of candidates before suppression.
    pub fn candidates(&self) -> usize {
        self.boxes.len()
    }

    pub fn get(&self, i: usize) -> Option<Detection> {
        self.indices.get(i).and_then(|&idx| self.at(idx))
    }

    /// Surviving detections, in suppression order.
    ///
    /// Indices past the end of the parallel vectors are skipped.
    pub fn iter(&self) -> impl Iterator<Item = Detection> + '_ {
        self.indices.iter().filter_map(move |&idx| self.at(idx))
    }

    fn at(&self, idx: usize) -> Option<Detection> {
        Some(Detection {
            class_id: *self.class_ids.get(idx)?,
            confidence: *self.confidences.get(idx)?,
            bbox: *self.boxes.get(idx)?,
        })
    }
}
