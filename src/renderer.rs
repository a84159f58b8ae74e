// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

/// Window sink
///
/// Shows annotated frames in a macroquad window. The caller owns the
/// frame loop and awaits `next_frame()` after each `StreamRunner::step`.
use macroquad::prelude::*;

use crate::detection::Frame;
use crate::pipeline::FrameSink;
use crate::{Error, Result};

pub const WINDOW_TITLE: &str = "Object Detection";

pub struct WindowSink {
    texture: Option<Texture2D>,
    rgba: Vec<u8>,
}

impl WindowSink {
    /// Must be created inside the macroquad main future.
    pub fn new() -> Self {
        // window close button goes through quit_requested like the Q key
        prevent_quit();
        Self {
            texture: None,
            rgba: Vec::new(),
        }
    }
}

impl Default for WindowSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for WindowSink {
    fn show(&mut self, frame: &Frame) -> Result<()> {
        let (w, h) = frame.dimensions();
        if w > u16::MAX as u32 || h > u16::MAX as u32 {
            return Err(Error::Display(format!("frame {}x{} exceeds texture limits", w, h)));
        }
        rgb_to_rgba(frame, &mut self.rgba);

        // rebuild the texture only when the resolution changes
        let needs_rebuild = match &self.texture {
            Some(tex) => tex.width() != w as f32 || tex.height() != h as f32,
            None => true,
        };
        if needs_rebuild {
            let texture = Texture2D::from_rgba8(w as u16, h as u16, &self.rgba);
            texture.set_filter(FilterMode::Linear);
            self.texture = Some(texture);
        } else if let Some(tex) = &self.texture {
            let img = Image {
                bytes: self.rgba.clone(),
                width: w as u16,
                height: h as u16,
            };
            tex.update(&img);
        }

        clear_background(BLACK);
        if let Some(texture) = &self.texture {
            let (x, y, dw, dh) = fit(texture.width(), texture.height(), screen_width(), screen_height());
            draw_texture_ex(
                texture,
                x,
                y,
                WHITE,
                DrawTextureParams {
                    dest_size: Some(vec2(dw, dh)),
                    ..Default::default()
                },
            );
        }
        Ok(())
    }

    fn quit_requested(&mut self) -> bool {
        is_key_pressed(KeyCode::Q) || is_key_pressed(KeyCode::Escape) || is_quit_requested()
    }

    fn close(&mut self) {
        self.texture = None;
        log::debug!("window sink closed");
    }
}

/// RGB → RGBA, reusing `out`.
pub fn rgb_to_rgba(frame: &Frame, out: &mut Vec<u8>) {
    out.clear();
    out.reserve(frame.width() as usize * frame.height() as usize * 4);
    for p in frame.pixels() {
        let [r, g, b] = p.0;
        out.extend_from_slice(&[r, g, b, 255]);
    }
}

/// Largest aspect-preserving rect for a `tw x th` texture, centered on screen.
pub fn fit(tw: f32, th: f32, sw: f32, sh: f32) -> (f32, f32, f32, f32) {
    if tw <= 0.0 || th <= 0.0 {
        return (0.0, 0.0, 0.0, 0.0);
    }
    let scale = (sw / tw).min(sh / th);
    let (w, h) = (tw * scale, th * scale);
    ((sw - w) / 2.0, (sh - h) / 2.0, w, h)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgba_has_opaque_alpha() {
        let frame = Frame::from_pixel(2, 1, ::image::Rgb([10, 20, 30]));
        let mut out = vec![9; 3];
        rgb_to_rgba(&frame, &mut out);
        assert_eq!(out, vec![10, 20, 30, 255, 10, 20, 30, 255]);
    }

    #[test]
    fn wide_frame_is_letterboxed() {
        let (x, y, w, h) = fit(2560.0, 1440.0, 1280.0, 1280.0);
        assert_eq!((x, w), (0.0, 1280.0));
        assert_eq!(h, 720.0);
        assert_eq!(y, 280.0);
    }

    #[test]
    fn tall_frame_is_pillarboxed() {
        let (x, y, w, h) = fit(480.0, 640.0, 1280.0, 720.0);
        assert_eq!((y, h), (0.0, 720.0));
        assert_eq!(w, 540.0);
        assert_eq!(x, 370.0);
    }
}
