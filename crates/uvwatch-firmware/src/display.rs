//! The LCD as a [`Screen`]

use core::fmt::Debug;

use embedded_graphics::pixelcolor::Rgb565;
use embedded_graphics::prelude::*;
use esp_hal::gpio::Output;
use uvwatch::app_state::PersistentState;
use uvwatch::platform::Screen;
use uvwatch::render::{draw_dashboard, draw_message};
use uvwatch::view::DashboardView;

pub struct LcdScreen<D> {
    display: D,
    backlight: Output<'static>,
}

impl<D> LcdScreen<D>
where
    D: DrawTarget<Color = Rgb565>,
{
    pub fn new(display: D, backlight: Output<'static>) -> Self {
        Self { display, backlight }
    }
}

impl<D> Screen for LcdScreen<D>
where
    D: DrawTarget<Color = Rgb565>,
    D::Error: Debug,
{
    type Error = D::Error;

    fn render(&mut self, state: &PersistentState, overlay: bool) -> Result<(), Self::Error> {
        draw_dashboard(&mut self.display, &DashboardView::new(state, overlay))
    }

    fn show_message(&mut self, title: &str, detail: &str) -> Result<(), Self::Error> {
        draw_message(&mut self.display, title, detail)
    }

    fn set_power(&mut self, on: bool) -> Result<(), Self::Error> {
        if on {
            self.backlight.set_high();
        } else {
            self.display.clear(Rgb565::BLACK)?;
            self.backlight.set_low();
        }
        Ok(())
    }
}
