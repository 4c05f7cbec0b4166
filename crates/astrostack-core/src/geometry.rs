use serde::{Deserialize, Serialize};

use crate::error::{Result, StackError};

/// A rectangle in image coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rect {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering a whole `width` x `height` image.
    pub fn full(width: usize, height: usize) -> Self {
        Self::new(0, 0, width, height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Check the rectangle is non-empty and lies inside a `src_w` x `src_h` image.
    pub fn validated(&self, src_w: usize, src_h: usize) -> Result<Rect> {
        if self.is_empty() {
            return Err(StackError::InvalidRect(
                "width and height must be > 0".into(),
            ));
        }
        if self.x + self.width > src_w || self.y + self.height > src_h {
            return Err(StackError::InvalidRect(format!(
                "region ({},{} {}x{}) exceeds source dimensions ({src_w}x{src_h})",
                self.x, self.y, self.width, self.height
            )));
        }
        Ok(*self)
    }

    /// Same size, moved by a signed integer displacement. `None` when the
    /// result would start left of or above the origin.
    pub fn translated(&self, dx: i64, dy: i64) -> Option<Rect> {
        let x = self.x as i64 + dx;
        let y = self.y as i64 + dy;
        if x < 0 || y < 0 {
            return None;
        }
        Some(Rect::new(x as usize, y as usize, self.width, self.height))
    }
}

/// Translation of an image relative to the reference, in source-image pixels.
///
/// A feature at `(x, y)` in the reference appears at `(x + dx, y + dy)` in
/// the image the offset describes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Offset {
    pub dx: f64,
    pub dy: f64,
}

impl Offset {
    pub fn new(dx: f64, dy: f64) -> Self {
        Self { dx, dy }
    }

    pub fn norm(&self) -> f64 {
        self.dx.hypot(self.dy)
    }
}

impl std::ops::Add for Offset {
    type Output = Offset;

    fn add(self, rhs: Offset) -> Offset {
        Offset::new(self.dx + rhs.dx, self.dy + rhs.dy)
    }
}
