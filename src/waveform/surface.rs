// src/waveform/surface.rs

use anyhow::{anyhow, Result};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: f32,
}

impl Color {
    pub const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Accepts `#rgb` and `#rrggbb`.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let h = hex.trim().trim_start_matches('#');
        if !h.is_ascii() {
            return Err(anyhow!("bad color {hex}"));
        }
        let parse = |s: &str| u8::from_str_radix(s, 16).map_err(|e| anyhow!("bad color {hex}: {e}"));
        match h.len() {
            6 => Ok(Self::rgb(parse(&h[0..2])?, parse(&h[2..4])?, parse(&h[4..6])?)),
            3 => {
                let r = parse(&h[0..1])?;
                let g = parse(&h[1..2])?;
                let b = parse(&h[2..3])?;
                Ok(Self::rgb(r * 17, g * 17, b * 17))
            }
            _ => Err(anyhow!("bad color {hex}")),
        }
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }
}

/// CSS-pixel size of a drawing target plus its device pixel ratio.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceSize {
    pub width: f64,
    pub height: f64,
    pub device_pixel_ratio: f64,
}

impl SurfaceSize {
    pub fn new(width: f64, height: f64, device_pixel_ratio: f64) -> Self {
        let dpr = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
            device_pixel_ratio
        } else {
            1.0
        };
        Self { width, height, device_pixel_ratio: dpr }
    }

    /// Backing store dimensions in device pixels.
    pub fn backing(&self) -> (u32, u32) {
        (
            (self.width * self.device_pixel_ratio).max(0.0) as u32,
            (self.height * self.device_pixel_ratio).max(0.0) as u32,
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PathCmd {
    MoveTo(f64, f64),
    LineTo(f64, f64),
    Close,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path {
    pub cmds: Vec<PathCmd>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&mut self, x: f64, y: f64) {
        self.cmds.push(PathCmd::MoveTo(x, y));
    }

    pub fn line_to(&mut self, x: f64, y: f64) {
        self.cmds.push(PathCmd::LineTo(x, y));
    }

    pub fn close(&mut self) {
        self.cmds.push(PathCmd::Close);
    }

    pub fn segment(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        let mut p = Self::new();
        p.move_to(x0, y0);
        p.line_to(x1, y1);
        p
    }

    /// Number of `MoveTo` commands, i.e. separate subpaths.
    pub fn subpaths(&self) -> usize {
        self.cmds.iter().filter(|c| matches!(c, PathCmd::MoveTo(..))).count()
    }
}

/// Vector drawing target. Coordinates are CSS pixels once `configure` has run.
pub trait Surface {
    /// Resizes the backing store and sets the CSS → device scale.
    fn configure(&mut self, backing_width: u32, backing_height: u32, scale: f64);
    fn clear(&mut self);
    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Color);
    fn stroke_path(&mut self, path: &Path, color: Color, line_width: f64);
    fn fill_path(&mut self, path: &Path, color: Color);
    fn fill_text(&mut self, text: &str, x: f64, y: f64, color: Color);
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    Configure { backing_width: u32, backing_height: u32, scale: f64 },
    Clear,
    FillRect { x: f64, y: f64, w: f64, h: f64, color: Color },
    Stroke { path: Path, color: Color, line_width: f64 },
    Fill { path: Path, color: Color },
    Text { text: String, x: f64, y: f64, color: Color },
}

/// A `Surface` that records every call. Hosts replay it onto their own canvas.
#[derive(Clone, Debug, Default)]
pub struct DisplayList {
    pub ops: Vec<DrawOp>,
}

impl DisplayList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn strokes(&self) -> impl Iterator<Item = (&Path, Color)> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Stroke { path, color, .. } => Some((path, *color)),
            _ => None,
        })
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

impl Surface for DisplayList {
    fn configure(&mut self, backing_width: u32, backing_height: u32, scale: f64) {
        // a resize wipes the bitmap, so earlier ops are moot
        self.ops.clear();
        self.ops.push(DrawOp::Configure { backing_width, backing_height, scale });
    }

    fn clear(&mut self) {
        self.ops.push(DrawOp::Clear);
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64, color: Color) {
        self.ops.push(DrawOp::FillRect { x, y, w, h, color });
    }

    fn stroke_path(&mut self, path: &Path, color: Color, line_width: f64) {
        self.ops.push(DrawOp::Stroke { path: path.clone(), color, line_width });
    }

    fn fill_path(&mut self, path: &Path, color: Color) {
        self.ops.push(DrawOp::Fill { path: path.clone(), color });
    }

    fn fill_text(&mut self, text: &str, x: f64, y: f64, color: Color) {
        self.ops.push(DrawOp::Text { text: text.to_string(), x, y, color });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_colors() {
        assert_eq!(Color::from_hex("#f87171").unwrap(), Color::rgb(0xf8, 0x71, 0x71));
        assert_eq!(Color::from_hex("#888").unwrap(), Color::rgb(0x88, 0x88, 0x88));
        assert!(Color::from_hex("#12345").is_err());
        assert!(Color::from_hex("zzzzzz").is_err());
    }

    #[test]
    fn test_non_ascii_hex_is_rejected() {
        assert!(Color::from_hex("aééx").is_err());
        assert!(Color::from_hex("#ééé").is_err());
        assert!(Color::from_hex("#ab€").is_err());
        assert!(Color::from_hex("").is_err());
    }

    #[test]
    fn test_backing_scales_with_dpr() {
        let size = SurfaceSize::new(300.0, 72.0, 2.0);
        assert_eq!(size.backing(), (600, 144));
        let fallback = SurfaceSize::new(300.0, 72.0, 0.0);
        assert_eq!(fallback.device_pixel_ratio, 1.0);
    }
}
