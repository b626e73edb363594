//! Animated pointer relocation.
//!
//! The animation runs on a helper thread that only issues pointer warps.
//! A new animation, an explicit cancel or shutdown flips the running
//! animation's cancellation flag; the thread checks it before every step.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ConnectionExt as _, Window};
use x11rb::rust_connection::RustConnection;
use x11rb::NONE;

use super::to_i16;

const STEPS: u32 = 12;
const STEP_INTERVAL: Duration = Duration::from_millis(8);

pub struct PointerWarp {
    conn: Arc<RustConnection>,
    root: Window,
    running: RefCell<Option<Arc<AtomicBool>>>,
}

impl PointerWarp {
    pub fn new(conn: Arc<RustConnection>, root: Window) -> Self {
        Self {
            conn,
            root,
            running: RefCell::new(None),
        }
    }

    pub fn start(&self, from: (i32, i32), to: (i32, i32)) {
        self.cancel();
        if from == to {
            return;
        }

        let cancelled = Arc::new(AtomicBool::new(false));
        *self.running.borrow_mut() = Some(Arc::clone(&cancelled));

        let conn = Arc::clone(&self.conn);
        let root = self.root;
        let points = path(from, to, STEPS);
        let spawned = thread::Builder::new()
            .name("fusuma-warp".to_string())
            .spawn(move || {
                for (x, y) in points {
                    if cancelled.load(Ordering::Relaxed) {
                        return;
                    }
                    let sent = conn
                        .warp_pointer(NONE, root, 0, 0, 0, 0, to_i16(x), to_i16(y))
                        .and_then(|_| conn.flush());
                    if let Err(e) = sent {
                        tracing::debug!("Pointer warp aborted: {}", e);
                        return;
                    }
                    thread::sleep(STEP_INTERVAL);
                }
            });

        if let Err(e) = spawned {
            tracing::warn!("Failed to start pointer warp: {}", e);
        }
    }

    pub fn cancel(&self) {
        if let Some(flag) = self.running.borrow_mut().take() {
            flag.store(true, Ordering::Relaxed);
        }
    }
}

impl Drop for PointerWarp {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Intermediate positions with an ease-out curve; the last one is `to`.
fn path(from: (i32, i32), to: (i32, i32), steps: u32) -> Vec<(i32, i32)> {
    let steps = steps.max(1);
    (1..=steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            let eased = 1.0 - (1.0 - t).powi(3);
            let lerp = |a: i32, b: i32| a + ((b - a) as f64 * eased).round() as i32;
            (lerp(from.0, to.0), lerp(from.1, to.1))
        })
        .collect()
}
