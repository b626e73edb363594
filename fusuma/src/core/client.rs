use bitflags::bitflags;

use super::{Rect, SizeHints, Tag};

/// Protocol window id.
pub type WindowId = u32;

/// Stable handle into the client arena. The generation guards against a
/// recycled slot being mistaken for the client that used to live there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId {
    pub(crate) index: u32,
    pub(crate) generation: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FullscreenState {
    #[default]
    Normal,
    /// Geometry covers the whole monitor, border cleared.
    Real,
    /// Reported as fullscreen to the protocol, geometry untouched.
    Pretend,
}

impl FullscreenState {
    pub fn name(self) -> &'static str {
        match self {
            FullscreenState::Normal => "normal",
            FullscreenState::Real => "real",
            FullscreenState::Pretend => "pretend",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DeferredState {
    #[default]
    None,
    Pending,
    Satisfied,
}

/// Requested floating geometry from rules; unset fields keep the
/// window's own request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FloatGeometry {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl FloatGeometry {
    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.width.is_none() && self.height.is_none()
    }
}

/// The attribute set rules mutate. Everything the rule engine can assign
/// lives here so that "reset to defaults" is a single assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Attributes {
    pub tags: Tag,
    pub monitor: usize,
    pub floating: bool,
    pub float_geometry: FloatGeometry,
    pub center: bool,
    pub fullscreen: FullscreenState,
    pub sticky: bool,
    pub urgent: bool,
    pub hidden: bool,
    pub ignored: bool,
    pub always_on_top: bool,
    pub modal: bool,
    pub autofocus: bool,
    pub never_focus: bool,
    pub border: u32,
    pub size_factor: f32,
    pub terminal: bool,
    pub no_swallow: bool,
    pub game: bool,
    pub desktop: bool,
    pub on_desktop: bool,
    pub deferred: DeferredState,
}

impl Attributes {
    pub fn new(tags: Tag, monitor: usize, border: u32) -> Self {
        Self {
            tags,
            monitor,
            floating: false,
            float_geometry: FloatGeometry::default(),
            center: false,
            fullscreen: FullscreenState::Normal,
            sticky: false,
            urgent: false,
            hidden: false,
            ignored: false,
            always_on_top: false,
            modal: false,
            autofocus: true,
            never_focus: false,
            border,
            size_factor: 1.0,
            terminal: false,
            no_swallow: false,
            game: false,
            desktop: false,
            on_desktop: false,
            deferred: DeferredState::None,
        }
    }
}

/// State captured on entering real fullscreen, restored on leaving it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FullscreenCapture {
    pub floating: bool,
    pub border: u32,
    pub frame: Rect,
}

/// Identity strings the rule engine matches against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    pub class: String,
    pub instance: String,
    pub role: String,
    pub title: String,
}

impl Identity {
    pub fn is_unclassifiable(&self) -> bool {
        self.class.is_empty() && self.instance.is_empty() && self.title.is_empty()
    }
}

bitflags! {
    /// Protocol-level state vocabulary advertised for external panels.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NetState: u16 {
        const URGENT = 1 << 0;
        const FULLSCREEN = 1 << 1;
        const STICKY = 1 << 2;
        const HIDDEN = 1 << 3;
        const MODAL = 1 << 4;
        const ABOVE = 1 << 5;
        const MAXIMIZED_HORZ = 1 << 6;
        const MAXIMIZED_VERT = 1 << 7;
        const SKIP_PAGER = 1 << 8;
        const SKIP_TASKBAR = 1 << 9;
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    pub id: ClientId,
    pub window: WindowId,
    pub pid: Option<u32>,
    pub identity: Identity,
    /// Current geometry (inner size, border excluded).
    pub frame: Rect,
    /// Geometry used whenever the client is floating.
    pub float_frame: Rect,
    /// Floating position relative to the parent, as fractions of its size.
    pub relative_offset: Option<(f64, f64)>,
    pub size_hints: SizeHints,
    pub attrs: Attributes,
    /// Attribute values before any rule ran; exclusive rules reset to these.
    pub defaults: Attributes,
    pub fullscreen_capture: Option<FullscreenCapture>,
    /// Set when the client was pushed out of fullscreen by another client
    /// taking focus.
    pub lose_fullscreen: bool,
    pub save_index: u32,
    pub parent: Option<ClientId>,
    pub ancestor: ClientId,
    /// Set on protocol errors; excised on the next arrangement pass.
    pub dormant: bool,
    /// The terminal this client swallowed.
    pub swallowing: Option<ClientId>,
    /// Set on a terminal while it is swallowed.
    pub swallowed_by: Option<ClientId>,
    pub transient_for: Option<WindowId>,
    /// Input hint; clients that refuse input only get WM_TAKE_FOCUS.
    pub accepts_input: bool,
    pub take_focus: bool,
    /// Last persisted record written for this client.
    pub persisted: Vec<i32>,
    pub(crate) attach_next: Option<ClientId>,
    pub(crate) stack_next: Option<ClientId>,
}

impl Client {
    pub fn new(id: ClientId, window: WindowId, attrs: Attributes) -> Self {
        Self {
            id,
            window,
            pid: None,
            identity: Identity::default(),
            frame: Rect::default(),
            float_frame: Rect::default(),
            relative_offset: None,
            size_hints: SizeHints::default(),
            defaults: attrs.clone(),
            attrs,
            fullscreen_capture: None,
            lose_fullscreen: false,
            save_index: 0,
            parent: None,
            ancestor: id,
            dormant: false,
            swallowing: None,
            swallowed_by: None,
            transient_for: None,
            accepts_input: true,
            take_focus: false,
            persisted: Vec::new(),
            attach_next: None,
            stack_next: None,
        }
    }

    pub fn monitor(&self) -> usize {
        self.attrs.monitor
    }

    pub fn tags(&self) -> Tag {
        self.attrs.tags
    }

    pub fn is_floating(&self) -> bool {
        self.attrs.floating
    }

    pub fn is_fullscreen(&self) -> bool {
        self.attrs.fullscreen == FullscreenState::Real
    }

    /// Tiled clients are the ones layouts arrange.
    pub fn is_tiled(&self) -> bool {
        !self.attrs.floating && !self.is_fullscreen() && !self.attrs.hidden && !self.attrs.desktop
    }

    /// Outer rectangle including the border.
    pub fn outer(&self) -> Rect {
        let bw = self.attrs.border;
        Rect {
            x: self.frame.x,
            y: self.frame.y,
            width: self.frame.width + 2 * bw,
            height: self.frame.height + 2 * bw,
        }
    }

    pub fn center(&self) -> (i32, i32) {
        self.outer().center()
    }

    /// Whether the client sits in its monitor's orderings. Swallowed
    /// terminals are the only clients that do not.
    pub fn is_linked(&self) -> bool {
        self.swallowed_by.is_none()
    }

    pub fn net_state(&self, work_area: &Rect) -> NetState {
        let mut state = NetState::empty();
        state.set(NetState::URGENT, self.attrs.urgent);
        state.set(
            NetState::FULLSCREEN,
            self.attrs.fullscreen != FullscreenState::Normal,
        );
        state.set(NetState::STICKY, self.attrs.sticky);
        state.set(NetState::HIDDEN, self.attrs.hidden);
        state.set(NetState::MODAL, self.attrs.modal);
        state.set(NetState::ABOVE, self.attrs.always_on_top);
        let outer = self.outer();
        state.set(
            NetState::MAXIMIZED_HORZ,
            !self.is_fullscreen() && outer.width >= work_area.width,
        );
        state.set(
            NetState::MAXIMIZED_VERT,
            !self.is_fullscreen() && outer.height >= work_area.height,
        );
        state.set(NetState::SKIP_PAGER, self.attrs.desktop);
        state.set(NetState::SKIP_TASKBAR, self.attrs.desktop);
        state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> Client {
        let id = ClientId {
            index: 0,
            generation: 0,
        };
        let mut c = Client::new(id, 0x200001, Attributes::new(Tag::new(1), 0, 2));
        c.frame = Rect::new(10, 20, 300, 200);
        c
    }

    #[test]
    fn test_new_client_is_its_own_ancestor() {
        let c = client();
        assert_eq!(c.ancestor, c.id);
        assert!(c.parent.is_none());
        assert_eq!(c.defaults, c.attrs);
    }

    #[test]
    fn test_outer_includes_border() {
        let c = client();
        assert_eq!(c.outer(), Rect::new(10, 20, 304, 204));
    }

    #[test]
    fn test_tiled_excludes_floating_and_fullscreen() {
        let mut c = client();
        assert!(c.is_tiled());
        c.attrs.floating = true;
        assert!(!c.is_tiled());
        c.attrs.floating = false;
        c.attrs.fullscreen = FullscreenState::Real;
        assert!(!c.is_tiled());
        c.attrs.fullscreen = FullscreenState::Pretend;
        assert!(c.is_tiled());
    }

    #[test]
    fn test_net_state_reports_pretend_fullscreen() {
        let mut c = client();
        c.attrs.fullscreen = FullscreenState::Pretend;
        c.attrs.sticky = true;
        let state = c.net_state(&Rect::new(0, 0, 1920, 1080));
        assert!(state.contains(NetState::FULLSCREEN | NetState::STICKY));
        assert!(!state.contains(NetState::MAXIMIZED_HORZ));
    }

    #[test]
    fn test_net_state_maximized_when_covering_work_area() {
        let mut c = client();
        c.attrs.border = 0;
        c.frame = Rect::new(0, 20, 1920, 1060);
        let state = c.net_state(&Rect::new(0, 20, 1920, 1060));
        assert!(state.contains(NetState::MAXIMIZED_HORZ | NetState::MAXIMIZED_VERT));
    }

    #[test]
    fn test_unclassifiable_identity() {
        assert!(Identity::default().is_unclassifiable());
        let id = Identity {
            role: "pop-up".to_string(),
            ..Default::default()
        };
        assert!(id.is_unclassifiable());
        let id = Identity {
            title: "x".to_string(),
            ..Default::default()
        };
        assert!(!id.is_unclassifiable());
    }
}
