//! Render surface: DisplayState snapshot in, fixed-size RGBA frame out.
//!
//! The pipeline treats rendering as a collaborator behind [`RenderSurface`].
//! [`PanelSurface`] is the built-in one, painting the kitchen layout with the
//! embedded-graphics mono fonts straight into an RGBA buffer.

use crate::models::DisplayState;
use embedded_graphics::{
    mono_font::{
        iso_8859_1::{FONT_10X20, FONT_6X10},
        MonoFont, MonoTextStyle,
    },
    pixelcolor::Rgb888,
    prelude::*,
    primitives::{PrimitiveStyle, Rectangle},
    text::{Baseline, Text},
};
use serde::Serialize;
use std::borrow::Cow;
use std::convert::Infallible;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn rgba_len(self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Uncompressed capture, 4 bytes per pixel, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl RawFrame {
    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }
}

/// What one capture draws.
#[derive(Debug, Clone, Copy)]
pub struct Scene<'a> {
    pub state: &'a DisplayState,
    pub status: &'a str,
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("capture failed: {0}")]
    Capture(String),
    #[error("surface returned {got:?}, expected {expected:?}")]
    SizeMismatch { expected: FrameSize, got: FrameSize },
}

pub trait RenderSurface: Send + Sync {
    /// Synchronous capture at exactly `size`, whatever the physical display scale.
    fn capture(&self, scene: &Scene<'_>, size: FrameSize) -> Result<RawFrame, RenderError>;
}

struct Canvas {
    size: FrameSize,
    rgba: Vec<u8>,
}

impl Canvas {
    fn new(size: FrameSize, background: Rgb888) -> Self {
        let mut rgba = Vec::with_capacity(size.rgba_len());
        for _ in 0..(size.width as usize * size.height as usize) {
            rgba.extend_from_slice(&[background.r(), background.g(), background.b(), 0xff]);
        }
        Self { size, rgba }
    }

    fn put(&mut self, x: i32, y: i32, color: Rgb888) {
        if x < 0 || y < 0 || x as u32 >= self.size.width || y as u32 >= self.size.height {
            return;
        }
        let idx = (y as usize * self.size.width as usize + x as usize) * 4;
        self.rgba[idx..idx + 3].copy_from_slice(&[color.r(), color.g(), color.b()]);
    }

    fn into_frame(self) -> RawFrame {
        RawFrame { width: self.size.width, height: self.size.height, rgba: self.rgba }
    }
}

impl OriginDimensions for Canvas {
    fn size(&self) -> Size {
        Size::new(self.size.width, self.size.height)
    }
}

impl DrawTarget for Canvas {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            self.put(point.x, point.y, color);
        }
        Ok(())
    }
}

/// Draws onto a canvas with every logical pixel blown up to `factor`².
struct Scaled<'a> {
    canvas: &'a mut Canvas,
    factor: u32,
}

impl OriginDimensions for Scaled<'_> {
    fn size(&self) -> Size {
        Size::new(self.canvas.size.width / self.factor, self.canvas.size.height / self.factor)
    }
}

impl DrawTarget for Scaled<'_> {
    type Color = Rgb888;
    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let f = self.factor as i32;
        for Pixel(point, color) in pixels {
            for dy in 0..f {
                for dx in 0..f {
                    self.canvas.put(point.x * f + dx, point.y * f + dy, color);
                }
            }
        }
        Ok(())
    }
}

const INK: Rgb888 = Rgb888::BLACK;
const PAPER: Rgb888 = Rgb888::WHITE;
const MARGIN: i32 = 24;

/// Built-in kitchen layout: weekday and date on top, morning/afternoon
/// columns below, weather badges and a status footer at the bottom.
#[derive(Debug, Default, Clone, Copy)]
pub struct PanelSurface;

impl PanelSurface {
    fn paint(&self, canvas: &mut Canvas, scene: &Scene<'_>) -> Result<(), Infallible> {
        let width = canvas.size.width as i32;
        let height = canvas.size.height as i32;
        let state = scene.state;

        // header, 4x scaled 10x20 font
        {
            let scale = 4;
            let mut big = Scaled { canvas: &mut *canvas, factor: scale as u32 };
            let style = MonoTextStyle::new(&FONT_10X20, INK);
            Text::with_baseline(&state.weekday_label, Point::new(MARGIN / scale, MARGIN / scale), style, Baseline::Top)
                .draw(&mut big)?;
            let date_w = text_width(&state.date_label, &FONT_10X20) as i32;
            let x = (width - MARGIN) / scale - date_w;
            Text::with_baseline(&state.date_label, Point::new(x, MARGIN / scale), style, Baseline::Top)
                .draw(&mut big)?;
        }

        let columns_top = MARGIN + 80 + 24;
        let footer_top = height - MARGIN - 10;
        let badges_top = footer_top - 40;
        let column_w = (width - 3 * MARGIN) / 2;

        Rectangle::new(Point::new(MARGIN, columns_top - 8), Size::new((width - 2 * MARGIN).max(0) as u32, 2))
            .into_styled(PrimitiveStyle::with_fill(INK))
            .draw(canvas)?;

        let column_w = column_w.max(0) as u32;
        self.column(canvas, "FM", &state.morning_events, Point::new(MARGIN, columns_top), column_w, badges_top)?;
        self.column(
            canvas,
            "EM",
            &state.afternoon_events,
            Point::new(2 * MARGIN + column_w as i32, columns_top),
            column_w,
            badges_top,
        )?;

        let mut x = MARGIN;
        for (on, label) in [(state.needs_sunscreen, "SOLKRÄM"), (state.needs_raingear, "REGNKLÄDER")] {
            if on {
                x = self.badge(canvas, label, Point::new(x, badges_top))? + 16;
            }
        }

        let small = MonoTextStyle::new(&FONT_6X10, INK);
        Text::with_baseline(scene.status, Point::new(MARGIN, footer_top), small, Baseline::Top)
            .draw(canvas)?;
        Ok(())
    }

    fn column(
        &self,
        canvas: &mut Canvas,
        heading: &str,
        lines: &[String],
        origin: Point,
        width: u32,
        bottom: i32,
    ) -> Result<(), Infallible> {
        let style = MonoTextStyle::new(&FONT_10X20, INK);
        let line_h = FONT_10X20.character_size.height as i32 + 6;
        Text::with_baseline(heading, origin, style, Baseline::Top).draw(canvas)?;
        let mut y = origin.y + line_h + 4;
        for line in lines {
            if y + line_h > bottom {
                break;
            }
            let line = fit_width(line, &FONT_10X20, width);
            Text::with_baseline(&line, Point::new(origin.x, y), style, Baseline::Top).draw(canvas)?;
            y += line_h;
        }
        Ok(())
    }

    /// Inverted label box; returns its right edge.
    fn badge(&self, canvas: &mut Canvas, label: &str, origin: Point) -> Result<i32, Infallible> {
        let w = text_width(label, &FONT_10X20) + 16;
        let h = FONT_10X20.character_size.height + 8;
        Rectangle::new(origin, Size::new(w, h))
            .into_styled(PrimitiveStyle::with_fill(INK))
            .draw(canvas)?;
        Text::with_baseline(label, origin + Point::new(8, 4), MonoTextStyle::new(&FONT_10X20, PAPER), Baseline::Top)
            .draw(canvas)?;
        Ok(origin.x + w as i32)
    }
}

fn text_width(text: &str, font: &MonoFont<'_>) -> u32 {
    let advance = font.character_size.width + font.character_spacing;
    text.chars().count() as u32 * advance
}

/// Cuts `text` to at most `max_width` pixels, marking the cut with "..".
fn fit_width<'t>(text: &'t str, font: &MonoFont<'_>, max_width: u32) -> Cow<'t, str> {
    if text_width(text, font) <= max_width {
        return Cow::Borrowed(text);
    }
    let advance = font.character_size.width + font.character_spacing;
    let keep = (max_width / advance).saturating_sub(2) as usize;
    let mut cut: String = text.chars().take(keep).collect();
    cut.push_str("..");
    Cow::Owned(cut)
}

impl RenderSurface for PanelSurface {
    fn capture(&self, scene: &Scene<'_>, size: FrameSize) -> Result<RawFrame, RenderError> {
        if size.width == 0 || size.height == 0 {
            return Err(RenderError::Capture(format!("empty frame {size:?}")));
        }
        let mut canvas = Canvas::new(size, PAPER);
        self.paint(&mut canvas, scene).map_err(|never| match never {})?;
        Ok(canvas.into_frame())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> DisplayState {
        DisplayState {
            weekday_label: "Lördag".into(),
            date_label: "20".into(),
            morning_events: vec!["Holiday".into(), "09:30  Standup".into()],
            afternoon_events: vec!["14:00  Fika".into()],
            needs_sunscreen: true,
            needs_raingear: false,
            ..DisplayState::default()
        }
    }

    fn ink_pixels(frame: &RawFrame) -> usize {
        frame.rgba.chunks(4).filter(|px| px[0] == 0).count()
    }

    #[test]
    fn test_capture_has_requested_size() {
        let size = FrameSize::new(960, 540);
        let st = state();
        let frame = PanelSurface.capture(&Scene { state: &st, status: "ok" }, size).unwrap();
        assert_eq!(frame.size(), size);
        assert_eq!(frame.rgba.len(), size.rgba_len());
        assert!(ink_pixels(&frame) > 0);
    }

    #[test]
    fn test_different_state_different_pixels() {
        let size = FrameSize::new(480, 270);
        let a = state();
        let mut b = state();
        b.needs_raingear = true;
        let fa = PanelSurface.capture(&Scene { state: &a, status: "" }, size).unwrap();
        let fb = PanelSurface.capture(&Scene { state: &b, status: "" }, size).unwrap();
        assert_ne!(fa, fb);
    }

    #[test]
    fn test_blank_state_still_renders() {
        let size = FrameSize::new(64, 48);
        let st = DisplayState::default();
        let frame = PanelSurface.capture(&Scene { state: &st, status: "" }, size).unwrap();
        assert_eq!(frame.size(), size);
    }

    #[test]
    fn test_fit_width_cuts_long_lines() {
        // 10x20 advances 10px per char
        assert_eq!(fit_width("09:30  Standup", &FONT_10X20, 200), "09:30  Standup");
        let cut = fit_width("09:30  Föräldramöte med hela klassen och rektorn", &FONT_10X20, 200);
        assert_eq!(cut, "09:30  Föräldramöt..");
        assert!(text_width(&cut, &FONT_10X20) <= 200);
        assert_eq!(fit_width("abc", &FONT_10X20, 0), "..");
    }

    #[test]
    fn test_long_morning_event_stays_in_its_column() {
        let size = FrameSize::new(960, 540);
        let st = DisplayState {
            morning_events: vec!["08:00  ".to_string() + &"Lång rubrik ".repeat(10)],
            ..DisplayState::default()
        };
        let frame = PanelSurface.capture(&Scene { state: &st, status: "" }, size).unwrap();

        // afternoon column, below its heading and above the badges
        let column_w = (960 - 3 * MARGIN) / 2;
        let em_x = (2 * MARGIN + column_w) as usize;
        let rows = (MARGIN + 80 + 24 + 26)..(540 - MARGIN - 10 - 40);
        for y in rows {
            for x in (MARGIN as usize + column_w as usize)..960 {
                let idx = (y as usize * 960 + x) * 4;
                assert_eq!(frame.rgba[idx], 0xff, "ink at ({x}, {y}), EM column starts at {em_x}");
            }
        }
    }

    #[test]
    fn test_zero_size_rejected() {
        let st = DisplayState::default();
        let res = PanelSurface.capture(&Scene { state: &st, status: "" }, FrameSize::new(0, 540));
        assert!(matches!(res, Err(RenderError::Capture(_))));
    }
}
