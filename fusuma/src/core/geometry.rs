#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn center(&self) -> (i32, i32) {
        (
            self.x + self.width as i32 / 2,
            self.y + self.height as i32 / 2,
        )
    }

    pub fn contains(&self, px: i32, py: i32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// Area shared with `other`, zero when disjoint.
    pub fn overlap_area(&self, other: &Rect) -> u64 {
        let w = self.right().min(other.right()) - self.x.max(other.x);
        let h = self.bottom().min(other.bottom()) - self.y.max(other.y);
        if w <= 0 || h <= 0 {
            return 0;
        }
        w as u64 * h as u64
    }

    /// Shift (and if necessary shrink) this rect so it lies inside `bounds`.
    pub fn clamp_into(&self, bounds: &Rect) -> Rect {
        let width = self.width.min(bounds.width);
        let height = self.height.min(bounds.height);
        let max_x = bounds.right() - width as i32;
        let max_y = bounds.bottom() - height as i32;
        Rect {
            x: self.x.clamp(bounds.x, max_x),
            y: self.y.clamp(bounds.y, max_y),
            width,
            height,
        }
    }

    /// Same size, centered on `bounds`.
    pub fn centered_in(&self, bounds: &Rect) -> Rect {
        Rect {
            x: bounds.x + (bounds.width as i32 - self.width as i32) / 2,
            y: bounds.y + (bounds.height as i32 - self.height as i32) / 2,
            width: self.width,
            height: self.height,
        }
    }

    /// Shrink by `amount` on every side.
    pub fn inset(&self, amount: u32) -> Rect {
        Rect {
            x: self.x + amount as i32,
            y: self.y + amount as i32,
            width: self.width.saturating_sub(2 * amount).max(1),
            height: self.height.saturating_sub(2 * amount).max(1),
        }
    }
}

/// Protocol-advertised size constraints (WM_NORMAL_HINTS).
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SizeHints {
    pub base_width: u32,
    pub base_height: u32,
    pub min_width: u32,
    pub min_height: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub inc_width: u32,
    pub inc_height: u32,
    /// min_aspect.y / min_aspect.x, 0 when unset
    pub min_aspect: f32,
    /// max_aspect.x / max_aspect.y, 0 when unset
    pub max_aspect: f32,
}

impl SizeHints {
    /// A client whose min and max size agree cannot be tiled meaningfully.
    pub fn is_fixed(&self) -> bool {
        self.max_width > 0
            && self.max_height > 0
            && self.max_width == self.min_width
            && self.max_height == self.min_height
    }

    /// Constrain an inner size to these hints. The result may be smaller
    /// than requested.
    pub fn constrain(&self, width: u32, height: u32) -> (u32, u32) {
        let mut w = width as i64;
        let mut h = height as i64;
        let base_w = self.base_width as i64;
        let base_h = self.base_height as i64;
        let base_is_min = self.base_width == self.min_width && self.base_height == self.min_height;

        if !base_is_min {
            w -= base_w;
            h -= base_h;
        }
        if self.min_aspect > 0.0 && self.max_aspect > 0.0 && w > 0 && h > 0 {
            if self.max_aspect < w as f32 / h as f32 {
                w = (h as f32 * self.max_aspect + 0.5) as i64;
            } else if self.min_aspect < h as f32 / w as f32 {
                h = (w as f32 * self.min_aspect + 0.5) as i64;
            }
        }
        if base_is_min {
            w -= base_w;
            h -= base_h;
        }
        if self.inc_width > 0 && w > 0 {
            w -= w % self.inc_width as i64;
        }
        if self.inc_height > 0 && h > 0 {
            h -= h % self.inc_height as i64;
        }
        w = (w + base_w).max(self.min_width as i64);
        h = (h + base_h).max(self.min_height as i64);
        if self.max_width > 0 {
            w = w.min(self.max_width as i64);
        }
        if self.max_height > 0 {
            h = h.min(self.max_height as i64);
        }
        (w.max(1) as u32, h.max(1) as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contains_is_half_open() {
        let r = Rect::new(10, 10, 100, 50);
        assert!(r.contains(10, 10));
        assert!(r.contains(109, 59));
        assert!(!r.contains(110, 30));
        assert!(!r.contains(50, 60));
    }

    #[test]
    fn test_overlap_area() {
        let a = Rect::new(0, 0, 100, 100);
        assert_eq!(a.overlap_area(&Rect::new(50, 50, 100, 100)), 2500);
        assert_eq!(a.overlap_area(&Rect::new(100, 0, 10, 10)), 0);
    }

    #[test]
    fn test_clamp_into_moves_then_shrinks() {
        let bounds = Rect::new(0, 0, 800, 600);
        let moved = Rect::new(700, 550, 200, 100).clamp_into(&bounds);
        assert_eq!(moved, Rect::new(600, 500, 200, 100));

        let shrunk = Rect::new(-50, 0, 1000, 100).clamp_into(&bounds);
        assert_eq!(shrunk, Rect::new(0, 0, 800, 100));
    }

    #[test]
    fn test_clamp_into_other_monitor() {
        let bounds = Rect::new(1920, 0, 1280, 1024);
        let r = Rect::new(10, 10, 200, 150).clamp_into(&bounds);
        assert_eq!(r, Rect::new(1920, 10, 200, 150));
    }

    #[test]
    fn test_centered_in() {
        let r = Rect::new(0, 0, 200, 100).centered_in(&Rect::new(0, 0, 800, 600));
        assert_eq!(r, Rect::new(300, 250, 200, 100));
    }

    #[test]
    fn test_constrain_increments() {
        let hints = SizeHints {
            base_width: 4,
            base_height: 4,
            inc_width: 10,
            inc_height: 20,
            ..Default::default()
        };
        assert_eq!(hints.constrain(407, 305), (404, 304));
    }

    #[test]
    fn test_constrain_min_max() {
        let hints = SizeHints {
            min_width: 300,
            min_height: 200,
            max_width: 500,
            max_height: 400,
            ..Default::default()
        };
        assert_eq!(hints.constrain(100, 100), (300, 200));
        assert_eq!(hints.constrain(900, 900), (500, 400));
    }

    #[test]
    fn test_constrain_aspect() {
        let hints = SizeHints {
            min_aspect: 1.0,
            max_aspect: 1.0,
            ..Default::default()
        };
        assert_eq!(hints.constrain(400, 200), (200, 200));
    }

    #[test]
    fn test_fixed() {
        let hints = SizeHints {
            min_width: 300,
            min_height: 200,
            max_width: 300,
            max_height: 200,
            ..Default::default()
        };
        assert!(hints.is_fixed());
        assert!(!SizeHints::default().is_fixed());
    }
}
