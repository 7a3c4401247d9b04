//! Status icon rendering
//!
//! Icons are drawn into a plain RGBA buffer so rendering stays testable
//! without a display:
//! - Idle: dark grey with a light square outline
//! - Processing: blue with three dots, one highlighted (changes every 0.5s)
//! - Error: red with a white X

use crate::error::TrayError;
use crate::state::AppStatus;

/// Edge length of the tray icon in pixels
pub const ICON_SIZE: u32 = 32;

type Rgb = (u8, u8, u8);

const IDLE_BG: Rgb = (50, 50, 50);
const IDLE_FG: Rgb = (200, 200, 200);
const PROCESSING_BG: Rgb = (0, 100, 200);
const ERROR_BG: Rgb = (200, 50, 50);
const WHITE: Rgb = (255, 255, 255);

/// A square RGBA image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IconImage {
    pub size: u32,
    pub rgba: Vec<u8>,
}

impl IconImage {
    fn filled(size: u32, color: Rgb) -> Self {
        let mut rgba = Vec::with_capacity((size * size * 4) as usize);
        for _ in 0..size * size {
            rgba.extend_from_slice(&[color.0, color.1, color.2, 255]);
        }
        Self { size, rgba }
    }

    fn put(&mut self, x: i32, y: i32, color: Rgb) {
        if x < 0 || y < 0 || x >= self.size as i32 || y >= self.size as i32 {
            return;
        }
        let i = ((y as u32 * self.size + x as u32) * 4) as usize;
        self.rgba[i..i + 4].copy_from_slice(&[color.0, color.1, color.2, 255]);
    }

    /// Color at (x, y), alpha dropped
    pub fn pixel(&self, x: u32, y: u32) -> (u8, u8, u8) {
        let i = ((y * self.size + x) * 4) as usize;
        (self.rgba[i], self.rgba[i + 1], self.rgba[i + 2])
    }

    fn disc(&mut self, cx: f32, cy: f32, radius: f32, color: Rgb) {
        let r2 = radius * radius;
        for y in 0..self.size as i32 {
            for x in 0..self.size as i32 {
                let dx = x as f32 + 0.5 - cx;
                let dy = y as f32 + 0.5 - cy;
                if dx * dx + dy * dy <= r2 {
                    self.put(x, y, color);
                }
            }
        }
    }

    /// Convert into a tray icon
    pub fn to_icon(&self) -> Result<tray_icon::Icon, TrayError> {
        Ok(tray_icon::Icon::from_rgba(
            self.rgba.clone(),
            self.size,
            self.size,
        )?)
    }
}

/// Index of the highlighted processing dot at `clock_secs`
pub fn highlighted_dot(clock_secs: f64) -> usize {
    ((clock_secs * 2.0).floor() as i64).rem_euclid(3) as usize
}

/// Draw the icon for `status`; `clock_secs` only affects Processing
pub fn render(status: AppStatus, clock_secs: f64) -> IconImage {
    let size = ICON_SIZE;
    match status {
        AppStatus::Idle => {
            let mut image = IconImage::filled(size, IDLE_BG);
            let (lo, hi) = (size as i32 / 4, size as i32 * 3 / 4 - 1);
            for i in lo..=hi {
                for t in 0..2 {
                    image.put(i, lo + t, IDLE_FG);
                    image.put(i, hi - t, IDLE_FG);
                    image.put(lo + t, i, IDLE_FG);
                    image.put(hi - t, i, IDLE_FG);
                }
            }
            image
        }
        AppStatus::Processing => {
            let mut image = IconImage::filled(size, PROCESSING_BG);
            let center = size as f32 / 2.0;
            let radius = size as f32 / 4.0;
            let dot_radius = radius / 3.0 + 0.5;
            let active = highlighted_dot(clock_secs);
            for i in 0..3 {
                let angle = ((i as f32) * 120.0 + 90.0).to_radians();
                let x = center + radius * 0.7 * angle.cos();
                let y = center + radius * 0.7 * angle.sin();
                let color = if i == active {
                    WHITE
                } else {
                    (WHITE.0 / 2, WHITE.1 / 2, WHITE.2 / 2)
                };
                image.disc(x, y, dot_radius, color);
            }
            image
        }
        AppStatus::Error => {
            let mut image = IconImage::filled(size, ERROR_BG);
            let (lo, hi) = (size as i32 / 4, size as i32 * 3 / 4 - 1);
            for i in lo..=hi {
                for t in 0..2 {
                    image.put(i + t, i, WHITE);
                    image.put(hi - (i - lo) + t, i, WHITE);
                }
            }
            image
        }
    }
}
