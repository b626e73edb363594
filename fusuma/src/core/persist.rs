//! Per-window placement record, stored on the window so placement survives
//! a restart of the window manager.

use super::{Client, FullscreenState, Rect, Tag};

pub const RECORD_LEN: usize = 15;

const ABSENT: i32 = i32::MIN;

#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub save_index: u32,
    pub tags: Tag,
    pub monitor: usize,
    pub floating: bool,
    /// Floating geometry relative to the monitor origin.
    pub float_frame: Rect,
    pub relative_offset: Option<(f64, f64)>,
    /// `None` means the configured default.
    pub border: Option<u32>,
    pub size_factor: f32,
    pub pretend_fullscreen: bool,
    pub hidden: bool,
    pub desktop: bool,
    pub on_desktop: bool,
}

impl Placement {
    pub fn capture(client: &Client, origin: (i32, i32), default_border: u32) -> Self {
        let (floating, border) = match client.fullscreen_capture {
            Some(cap) if client.is_fullscreen() => (cap.floating, cap.border),
            _ => (client.attrs.floating, client.attrs.border),
        };
        let ff = client.float_frame;
        Self {
            save_index: client.save_index,
            tags: client.attrs.tags,
            monitor: client.attrs.monitor,
            floating,
            float_frame: Rect::new(ff.x - origin.0, ff.y - origin.1, ff.width, ff.height),
            relative_offset: client.relative_offset,
            border: (border != default_border).then_some(border),
            size_factor: client.attrs.size_factor,
            pretend_fullscreen: client.attrs.fullscreen == FullscreenState::Pretend,
            hidden: client.attrs.hidden,
            desktop: client.attrs.desktop,
            on_desktop: client.attrs.on_desktop,
        }
    }

    pub fn encode(&self) -> Vec<i32> {
        let (ox, oy) = match self.relative_offset {
            Some((x, y)) => ((x * 1000.0).round() as i32, (y * 1000.0).round() as i32),
            None => (ABSENT, ABSENT),
        };
        vec![
            self.save_index as i32,
            self.tags.mask() as i32,
            self.monitor as i32,
            self.floating as i32,
            self.float_frame.x,
            self.float_frame.y,
            self.float_frame.width as i32,
            self.float_frame.height as i32,
            ox,
            oy,
            self.border.map(|b| b as i32 + 1).unwrap_or(0),
            (self.size_factor * 100.0).round() as i32,
            self.pretend_fullscreen as i32,
            self.hidden as i32,
            self.desktop as i32 | (self.on_desktop as i32) << 1,
        ]
    }

    pub fn decode(record: &[i32]) -> Option<Self> {
        if record.len() != RECORD_LEN {
            return None;
        }
        let r = record;
        if r[0] < 0 || r[2] < 0 || r[6] <= 0 || r[7] <= 0 {
            return None;
        }
        let relative_offset = if r[8] == ABSENT || r[9] == ABSENT {
            None
        } else {
            Some((r[8] as f64 / 1000.0, r[9] as f64 / 1000.0))
        };
        let size_factor = if r[11] > 0 { r[11] as f32 / 100.0 } else { 1.0 };
        Some(Self {
            save_index: r[0] as u32,
            tags: Tag::from_mask(r[1] as u32),
            monitor: r[2] as usize,
            floating: r[3] != 0,
            float_frame: Rect::new(r[4], r[5], r[6] as u32, r[7] as u32),
            relative_offset,
            border: (r[10] > 0).then(|| (r[10] - 1) as u32),
            size_factor,
            pretend_fullscreen: r[12] != 0,
            hidden: r[13] != 0,
            desktop: r[14] & 1 != 0,
            on_desktop: r[14] & 2 != 0,
        })
    }

    /// Floating geometry placed on a monitor at `origin`.
    pub fn float_frame_at(&self, origin: (i32, i32)) -> Rect {
        Rect::new(
            self.float_frame.x + origin.0,
            self.float_frame.y + origin.1,
            self.float_frame.width,
            self.float_frame.height,
        )
    }
}
