//! X11 protocol backend: the display side of `WindowSystem` and
//! `WindowManipulator`.

mod atoms;
mod backend;
mod events;
mod props;
mod warp;

pub use backend::{BackendError, X11Backend};

/// Protocol coordinates are 16 bits wide.
fn to_i16(v: i32) -> i16 {
    v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn to_u16(v: u32) -> u16 {
    v.min(u16::MAX as u32) as u16
}
