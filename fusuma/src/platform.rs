use crate::core::{NetState, Rect, SizeHints, WindowId};

/// Snapshot of a window's protocol properties, taken when it is managed
/// and refreshed on property changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowInfo {
    pub window: WindowId,
    pub class: String,
    pub instance: String,
    pub role: String,
    pub title: String,
    pub pid: Option<u32>,
    pub geometry: Rect,
    pub border: u32,
    pub transient_for: Option<WindowId>,
    pub size_hints: SizeHints,
    pub urgent: bool,
    pub accepts_input: bool,
    pub take_focus: bool,
    /// Window asked for fullscreen before it was mapped.
    pub fullscreen: bool,
    pub dialog: bool,
    /// Placement record left by a previous instance.
    pub persisted: Vec<i32>,
}

/// Trait for querying window and process information from the system.
/// This abstraction allows mocking in tests.
pub trait WindowSystem {
    fn window_info(&self, window: WindowId) -> Option<WindowInfo>;
    /// Physical output geometries, in monitor order.
    fn screens(&self) -> Vec<Rect>;
    /// Top-level windows that should be managed at startup.
    fn existing_windows(&self) -> Vec<WindowId>;
    fn parent_pid(&self, pid: u32) -> Option<u32>;
    fn process_alive(&self, pid: u32) -> bool;
    fn pointer_position(&self) -> Option<(i32, i32)>;
}

/// Trait for manipulating windows (side effects).
/// This abstraction allows mocking in tests.
pub trait WindowManipulator {
    fn configure(&self, window: WindowId, rect: &Rect, border: u32);
    fn set_border_color(&self, window: WindowId, color: u32);
    fn map(&self, window: WindowId);
    fn unmap(&self, window: WindowId);
    /// Stack `windows` so that the first is topmost.
    fn restack(&self, windows: &[WindowId]);
    fn focus_input(&self, window: WindowId);
    fn send_take_focus(&self, window: WindowId);
    fn focus_root(&self);
    fn set_net_state(&self, window: WindowId, state: NetState);
    fn set_active_window(&self, window: Option<WindowId>);
    fn set_client_list(&self, windows: &[WindowId]);
    fn write_persisted(&self, window: WindowId, record: &[i32]);
    fn close(&self, window: WindowId);
    fn kill(&self, window: WindowId);
    fn minimize(&self, window: WindowId);
    fn warp_pointer(&self, x: i32, y: i32);
    fn cancel_warp(&self);
    fn spawn(&self, command: &[String], env: &[(String, String)]) -> Result<(), String>;
    fn flush(&self);
}
