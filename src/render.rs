//! Draws a [`DashboardView`] onto any Rgb565 `DrawTarget`
//!
//! Shared by the LCD on the device and the SDL window of the simulator.

use embedded_graphics::mono_font::ascii::{FONT_6X10, FONT_10X20};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle, PrimitiveStyleBuilder, Rectangle};
use embedded_graphics::text::{Alignment, Text};

use crate::app_state::FORECAST_WINDOW;
use crate::view::{DashboardView, OverlayView, UvCategory};

pub const DISPLAY_WIDTH: u32 = 320;
pub const DISPLAY_HEIGHT: u32 = 240;

pub const COLOR_BACKGROUND: Rgb565 = Rgb565::new(18 >> 3, 23 >> 2, 24 >> 3);
pub const COLOR_PANEL: Rgb565 = Rgb565::new(26 >> 3, 32 >> 2, 33 >> 3);
pub const COLOR_STROKE: Rgb565 = Rgb565::new(43 >> 3, 55 >> 2, 57 >> 3);
pub const COLOR_TEXT: Rgb565 = Rgb565::new(230 >> 3, 232 >> 2, 230 >> 3);
pub const COLOR_MUTED: Rgb565 = Rgb565::new(140 >> 3, 150 >> 2, 150 >> 3);
pub const COLOR_ERROR: Rgb565 = Rgb565::new(190 >> 3, 95 >> 2, 95 >> 3);

const MARGIN: i32 = 12;
const BAR_BASELINE: i32 = 200;
const BAR_MAX_PX: u32 = 110;
const BAR_WIDTH: u32 = 28;

pub fn category_color(category: UvCategory) -> Rgb565 {
    let (r, g, b) = category.rgb();
    Rgb565::new(r >> 3, g >> 2, b >> 3)
}

fn text<D>(
    target: &mut D,
    content: &str,
    at: Point,
    font: &'static MonoFont<'static>,
    color: Rgb565,
    alignment: Alignment,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    Text::with_alignment(content, at, MonoTextStyle::new(font, color), alignment).draw(target)?;
    Ok(())
}

/// Full redraw of the dashboard, overlay included when present
pub fn draw_dashboard<D>(target: &mut D, view: &DashboardView<'_>) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    target.clear(COLOR_BACKGROUND)?;

    // Header: current index on the left, freshness on the right
    text(target, "UV INDEX", Point::new(MARGIN, 20), &FONT_6X10, COLOR_MUTED, Alignment::Left)?;
    let current_color = view.current_category.map_or(COLOR_TEXT, category_color);
    text(target, &view.current, Point::new(MARGIN, 50), &FONT_10X20, current_color, Alignment::Left)?;
    if let Some(category) = view.current_category {
        text(
            target,
            category.label(),
            Point::new(MARGIN + 70, 48),
            &FONT_6X10,
            current_color,
            Alignment::Left,
        )?;
    }

    let right = DISPLAY_WIDTH as i32 - MARGIN;
    text(target, view.last_update, Point::new(right, 20), &FONT_6X10, COLOR_TEXT, Alignment::Right)?;
    let status_color = if view.status_is_error { COLOR_ERROR } else { COLOR_MUTED };
    text(target, view.status, Point::new(right, 36), &FONT_6X10, status_color, Alignment::Right)?;

    Line::new(Point::new(MARGIN, 64), Point::new(right, 64))
        .into_styled(PrimitiveStyle::with_stroke(COLOR_STROKE, 1))
        .draw(target)?;

    draw_bars(target, view)?;

    if let Some(overlay) = &view.overlay {
        draw_overlay(target, overlay)?;
    }
    Ok(())
}

fn draw_bars<D>(target: &mut D, view: &DashboardView<'_>) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    let column = (DISPLAY_WIDTH as i32 - 2 * MARGIN) / FORECAST_WINDOW as i32;

    for (i, slot) in view.slots.iter().enumerate() {
        let center = MARGIN + column * i as i32 + column / 2;
        let height = slot.bar_height(BAR_MAX_PX);
        let color = slot.category.map_or(COLOR_STROKE, category_color);

        if height > 0 {
            Rectangle::new(
                Point::new(center - BAR_WIDTH as i32 / 2, BAR_BASELINE - height as i32),
                Size::new(BAR_WIDTH, height),
            )
            .into_styled(PrimitiveStyle::with_fill(color))
            .draw(target)?;
        }

        let value_y = BAR_BASELINE - height as i32 - 6;
        text(target, &slot.value, Point::new(center, value_y), &FONT_6X10, COLOR_TEXT, Alignment::Center)?;
        text(
            target,
            &slot.hour,
            Point::new(center, BAR_BASELINE + 16),
            &FONT_6X10,
            COLOR_MUTED,
            Alignment::Center,
        )?;
    }

    Line::new(
        Point::new(MARGIN, BAR_BASELINE),
        Point::new(DISPLAY_WIDTH as i32 - MARGIN, BAR_BASELINE),
    )
    .into_styled(PrimitiveStyle::with_stroke(COLOR_STROKE, 1))
    .draw(target)?;
    Ok(())
}

fn draw_overlay<D>(target: &mut D, overlay: &OverlayView<'_>) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    let panel = PrimitiveStyleBuilder::new()
        .fill_color(COLOR_PANEL)
        .stroke_color(COLOR_STROKE)
        .stroke_width(1)
        .build();
    Rectangle::new(Point::new(40, 72), Size::new(240, 112))
        .into_styled(panel)
        .draw(target)?;

    let lines = [
        ("Mode", overlay.mode),
        ("Source", overlay.source),
        ("Place", overlay.location),
        ("Coords", overlay.coordinates.as_str()),
    ];
    for (row, (label, value)) in lines.iter().enumerate() {
        let y = 94 + row as i32 * 18;
        text(target, label, Point::new(52, y), &FONT_6X10, COLOR_MUTED, Alignment::Left)?;
        text(target, value, Point::new(120, y), &FONT_6X10, COLOR_TEXT, Alignment::Left)?;
    }
    text(
        target,
        "Hold right: switch source",
        Point::new(160, 174),
        &FONT_6X10,
        COLOR_MUTED,
        Alignment::Center,
    )?;
    Ok(())
}

/// Centred two-line status screen used for mode changes
pub fn draw_message<D>(target: &mut D, title: &str, detail: &str) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    target.clear(COLOR_BACKGROUND)?;
    let center = DISPLAY_WIDTH as i32 / 2;
    text(target, title, Point::new(center, 110), &FONT_10X20, COLOR_TEXT, Alignment::Center)?;
    text(target, detail, Point::new(center, 140), &FONT_6X10, COLOR_MUTED, Alignment::Center)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_state::{ForecastSlot, PersistentState};
    use crate::config::Config;

    /// Full-screen framebuffer that can count pixels by colour
    struct Canvas {
        pixels: alloc::vec::Vec<Rgb565>,
    }

    impl Canvas {
        fn new() -> Self {
            Self {
                pixels: alloc::vec![Rgb565::BLACK; (DISPLAY_WIDTH * DISPLAY_HEIGHT) as usize],
            }
        }

        fn count(&self, color: Rgb565) -> usize {
            self.pixels.iter().filter(|p| **p == color).count()
        }
    }

    impl OriginDimensions for Canvas {
        fn size(&self) -> Size {
            Size::new(DISPLAY_WIDTH, DISPLAY_HEIGHT)
        }
    }

    impl DrawTarget for Canvas {
        type Color = Rgb565;
        type Error = core::convert::Infallible;

        fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
        where
            I: IntoIterator<Item = Pixel<Self::Color>>,
        {
            for Pixel(point, color) in pixels {
                if point.x >= 0 && point.y >= 0 && (point.x as u32) < DISPLAY_WIDTH && (point.y as u32) < DISPLAY_HEIGHT
                {
                    self.pixels[(point.y as u32 * DISPLAY_WIDTH + point.x as u32) as usize] = color;
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_empty_dashboard_draws_no_bars() {
        let state = PersistentState::with_defaults(&Config::DEFAULT);
        let mut canvas = Canvas::new();
        draw_dashboard(&mut canvas, &DashboardView::new(&state, false)).unwrap();

        assert_eq!(canvas.count(Rgb565::BLACK), 0, "Background fills the screen");
        assert_eq!(canvas.count(category_color(UvCategory::High)), 0);
    }

    #[test]
    fn test_bar_colour_follows_category() {
        let mut state = PersistentState::with_defaults(&Config::DEFAULT);
        state.forecast_slots[2] = ForecastSlot::new(12, 7.5);
        let mut canvas = Canvas::new();
        draw_dashboard(&mut canvas, &DashboardView::new(&state, false)).unwrap();

        let high = canvas.count(category_color(UvCategory::High));
        assert!(
            high >= (BAR_WIDTH * BAR_MAX_PX / 2) as usize,
            "7.5 of 15 fills half the bar area, got {} px",
            high
        );
    }

    #[test]
    fn test_overlay_panel_drawn() {
        let state = PersistentState::with_defaults(&Config::DEFAULT);
        let mut without = Canvas::new();
        let mut with = Canvas::new();
        draw_dashboard(&mut without, &DashboardView::new(&state, false)).unwrap();
        draw_dashboard(&mut with, &DashboardView::new(&state, true)).unwrap();

        assert_eq!(without.count(COLOR_PANEL), 0);
        assert!(with.count(COLOR_PANEL) > 0);
    }
}
