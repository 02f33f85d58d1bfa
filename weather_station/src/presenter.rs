use std::io::Write;

use embedded_graphics::{
    mono_font::{iso_8859_1::FONT_10X20, MonoTextStyle, MonoTextStyleBuilder},
    pixelcolor::Rgb565,
    prelude::*,
    text::{Alignment, Text},
};
use profont::PROFONT_14_POINT;

use crate::reading::Reading;

/// ST7789 panel in portrait orientation.
pub const DISPLAY_WIDTH: u32 = 240;
pub const DISPLAY_HEIGHT: u32 = 320;

const TITLE_POSITION: Point = Point::new(10, 28);
const FIRST_ROW_Y: i32 = 80;
const ROW_SPACING: i32 = 36;
const LABEL_X: i32 = 10;
/// Values are right-aligned against this column.
const VALUE_RIGHT_X: i32 = 190;
const UNIT_X: i32 = 196;

/// Draws a [`Reading`] as five labeled rows and echoes it to a text sink.
pub struct Presenter {
    title: String,
    title_style: MonoTextStyle<'static, Rgb565>,
    text_style: MonoTextStyle<'static, Rgb565>,
}

impl Presenter {
    pub fn new(city: &str) -> Self {
        Self {
            title: format!("Weather in {}", city),
            title_style: MonoTextStyle::new(&PROFONT_14_POINT, Rgb565::YELLOW),
            text_style: MonoTextStyleBuilder::new()
                .font(&FONT_10X20)
                .text_color(Rgb565::GREEN)
                .background_color(Rgb565::BLACK)
                .build(),
        }
    }

    pub fn present<D, W>(&self, display: &mut D, diagnostics: &mut W, reading: &Reading)
    where
        D: DrawTarget<Color = Rgb565>,
        W: Write,
    {
        self.render(display, reading);
        write_diagnostics(diagnostics, reading);
    }

    /// Clears the screen and draws the title plus one row per field.
    pub fn render<D: DrawTarget<Color = Rgb565>>(&self, display: &mut D, reading: &Reading) {
        display.clear(Rgb565::BLACK).ok();

        Text::new(&self.title, TITLE_POSITION, self.title_style)
            .draw(display)
            .ok();

        for (i, (label, value, unit)) in rows(reading).iter().enumerate() {
            let y = FIRST_ROW_Y + i as i32 * ROW_SPACING;

            Text::new(label, Point::new(LABEL_X, y), self.text_style)
                .draw(display)
                .ok();
            Text::with_alignment(
                value,
                Point::new(VALUE_RIGHT_X, y),
                self.text_style,
                Alignment::Right,
            )
            .draw(display)
            .ok();
            Text::new(unit, Point::new(UNIT_X, y), self.text_style)
                .draw(display)
                .ok();
        }
    }
}

/// Display rows in fixed order: label, formatted value, unit.
fn rows(reading: &Reading) -> [(&'static str, String, &'static str); 5] {
    [
        ("Temp", format!("{:.1}", reading.temperature), "°C"),
        ("Humidity", reading.humidity.to_string(), "%"),
        ("Pressure", reading.pressure.to_string(), "hPa"),
        ("Wind", format!("{:.1}", reading.wind_speed), "m/s"),
        ("Direction", reading.wind_direction.to_string(), "°"),
    ]
}

/// One line per field on the diagnostic stream. Write errors are ignored.
pub fn write_diagnostics<W: Write>(out: &mut W, reading: &Reading) {
    writeln!(out, "Temperature = {:.2}", reading.temperature).ok();
    writeln!(out, "Humidity = {}", reading.humidity).ok();
    writeln!(out, "Pressure = {}", reading.pressure).ok();
    writeln!(out, "Wind speed = {:.2}", reading.wind_speed).ok();
    writeln!(out, "Wind direction = {}", reading.wind_direction).ok();
    out.flush().ok();
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use embedded_graphics_framebuf::FrameBuf;

    pub(crate) const PIXELS: usize = (DISPLAY_WIDTH * DISPLAY_HEIGHT) as usize;

    pub(crate) type Pixels = Box<[Rgb565; PIXELS]>;

    pub(crate) fn blank_pixels() -> Pixels {
        vec![Rgb565::BLACK; PIXELS]
            .into_boxed_slice()
            .try_into()
            .unwrap()
    }

    pub(crate) fn lit(pixels: &Pixels, xs: core::ops::Range<i32>, ys: core::ops::Range<i32>) -> bool {
        ys.into_iter().any(|y| {
            xs.clone().any(|x| {
                pixels[y as usize * DISPLAY_WIDTH as usize + x as usize] != Rgb565::BLACK
            })
        })
    }

    fn render(reading: &Reading) -> Pixels {
        let mut pixels = blank_pixels();
        {
            let mut fbuf = FrameBuf::new(
                &mut *pixels,
                DISPLAY_WIDTH as usize,
                DISPLAY_HEIGHT as usize,
            );
            Presenter::new("Paderborn").render(&mut fbuf, reading);
        }
        pixels
    }

    fn sample() -> Reading {
        Reading {
            temperature: 21.5,
            humidity: 60,
            pressure: 1013,
            wind_speed: 3.2,
            wind_direction: 180,
        }
    }

    #[test]
    fn test_rows_in_fixed_order() {
        let rows = rows(&sample());
        let labels: Vec<_> = rows.iter().map(|(label, _, _)| *label).collect();
        let values: Vec<_> = rows.iter().map(|(_, value, _)| value.as_str()).collect();
        let units: Vec<_> = rows.iter().map(|(_, _, unit)| *unit).collect();

        assert_eq!(labels, ["Temp", "Humidity", "Pressure", "Wind", "Direction"]);
        assert_eq!(values, ["21.5", "60", "1013", "3.2", "180"]);
        assert_eq!(units, ["°C", "%", "hPa", "m/s", "°"]);
    }

    #[test]
    fn test_negative_values_format() {
        let reading = Reading {
            temperature: -4.26,
            humidity: -56,
            pressure: -25_536,
            wind_speed: 0.0,
            wind_direction: -12,
        };
        let values: Vec<_> = rows(&reading).into_iter().map(|(_, v, _)| v).collect();
        assert_eq!(values, ["-4.3", "-56", "-25536", "0.0", "-12"]);
    }

    #[test]
    fn test_every_row_has_label_and_value() {
        let pixels = render(&sample());

        assert!(lit(&pixels, 0..DISPLAY_WIDTH as i32, 0..40), "title missing");
        for i in 0..5 {
            let baseline = FIRST_ROW_Y + i * ROW_SPACING;
            let band = baseline - 18..baseline + 4;
            assert!(lit(&pixels, LABEL_X..LABEL_X + 40, band.clone()), "row {} label", i);
            assert!(lit(&pixels, VALUE_RIGHT_X - 30..VALUE_RIGHT_X, band.clone()), "row {} value", i);
            assert!(lit(&pixels, UNIT_X..DISPLAY_WIDTH as i32, band), "row {} unit", i);
        }
        assert!(!lit(&pixels, 0..DISPLAY_WIDTH as i32, 280..DISPLAY_HEIGHT as i32));
    }

    #[test]
    fn test_render_is_deterministic_and_value_dependent() {
        let first = render(&sample());
        let second = render(&sample());
        assert!(first[..] == second[..]);

        let other = render(&Reading {
            temperature: 9.0,
            ..sample()
        });
        assert!(first[..] != other[..]);
    }

    #[test]
    fn test_diagnostic_lines() {
        let mut out = Vec::new();
        write_diagnostics(&mut out, &sample());

        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Temperature = 21.50\n\
             Humidity = 60\n\
             Pressure = 1013\n\
             Wind speed = 3.20\n\
             Wind direction = 180\n"
        );
    }
}
