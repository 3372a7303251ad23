//! Maturity colors and labels for display layers.
//!
//! Colors run red (0) → yellow (5) → green (10).

use crate::song::MATURITY_MAX;
use std::fmt;

const RED: (f64, f64, f64) = (252.0, 80.0, 80.0);
const YELLOW: (f64, f64, f64) = (252.0, 223.0, 31.0);
const GREEN: (f64, f64, f64) = (60.0, 179.0, 113.0);

/// An sRGB color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    /// Wraps `text` in a 24-bit ANSI foreground color.
    #[must_use]
    pub fn paint(self, text: &str) -> String {
        format!("\x1b[38;2;{};{};{}m{text}\x1b[0m", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({},{},{})", self.r, self.g, self.b)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn blend(from: (f64, f64, f64), to: (f64, f64, f64), t: f64) -> Rgb {
    // Truncates toward zero; every channel stays within 0..=255.
    let channel = |a: f64, b: f64| (a + (b - a) * t) as u8;
    Rgb {
        r: channel(from.0, to.0),
        g: channel(from.1, to.1),
        b: channel(from.2, to.2),
    }
}

/// Gradient color for a maturity value. Out of range values are clamped.
#[must_use]
pub fn maturity_color(maturity: i64) -> Rgb {
    let grade = maturity.clamp(0, i64::from(MATURITY_MAX));
    #[allow(clippy::cast_precision_loss)]
    let grade = grade as f64;
    if grade <= 5.0 {
        blend(RED, YELLOW, grade / 5.0)
    } else {
        blend(YELLOW, GREEN, (grade - 5.0) / 5.0)
    }
}

/// Short status note shown next to a song.
#[must_use]
pub fn maturity_label(maturity: i64) -> &'static str {
    match maturity {
        m if m < 4 => "Übungsbedarf!",
        m if m >= 9 => "Top fit!",
        _ => "",
    }
}

/// Coarse readiness bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaturityBand {
    Low,
    Medium,
    High,
}

impl MaturityBand {
    #[must_use]
    pub fn of(maturity: i64) -> Self {
        match maturity {
            m if m < 4 => Self::Low,
            m if m >= 9 => Self::High,
            _ => Self::Medium,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Low => "needs practice (0-3)",
            Self::Medium => "getting there (4-8)",
            Self::High => "stage ready (9-10)",
        }
    }
}
