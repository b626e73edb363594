use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::process::CommandExt;
use std::process::{Command as Process, Stdio};
use std::sync::Arc;

use thiserror::Error;
use x11rb::connection::Connection;
use x11rb::errors::{ConnectError, ConnectionError, ReplyError, ReplyOrIdError};
use x11rb::protocol::xinerama::ConnectionExt as _;
use x11rb::protocol::xproto::{
    Allow, Atom, AtomEnum, ButtonIndex, ChangeWindowAttributesAux, ClientMessageData,
    ClientMessageEvent, ConfigureNotifyEvent, ConfigureWindowAux, ConnectionExt as _,
    CreateWindowAux, EventMask, GetPropertyReply, GrabMode, InputFocus, MapState, ModMask,
    PropMode, StackMode, Window, WindowClass, CLIENT_MESSAGE_EVENT, CONFIGURE_NOTIFY_EVENT,
};
use x11rb::protocol::Event as XEvent;
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;
use x11rb::{COPY_DEPTH_FROM_PARENT, COPY_FROM_PARENT, CURRENT_TIME, NONE};

use crate::core::{NetState, Rect, WindowId};
use crate::event::Event;
use crate::platform::{WindowInfo, WindowManipulator, WindowSystem};
use crate::proc;

use super::atoms::{Atoms, WM_STATE_ICONIC, WM_STATE_NORMAL};
use super::events::Translator;
use super::props;
use super::warp::PointerWarp;
use super::{to_i16, to_u16};

const WM_NAME: &[u8] = b"fusuma";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("cannot open display: {0}")]
    Connect(#[from] ConnectError),
    #[error("display connection failed: {0}")]
    Connection(#[from] ConnectionError),
    #[error("display request failed: {0}")]
    Reply(#[from] ReplyError),
    #[error("cannot allocate a resource id: {0}")]
    Id(#[from] ReplyOrIdError),
    #[error("another window manager is already running")]
    AnotherWm,
}

/// Connection to the X server acting as the window manager of its default
/// screen.
pub struct X11Backend {
    conn: Arc<RustConnection>,
    root: Window,
    check_window: Window,
    translator: Translator,
    warp: PointerWarp,
}

impl X11Backend {
    pub fn connect() -> Result<Self, BackendError> {
        let (conn, screen_num) = RustConnection::connect(None)?;
        let conn = Arc::new(conn);
        let root = conn.setup().roots[screen_num].root;
        let atoms = Atoms::new(conn.as_ref())?.reply()?;
        let check_window = conn.generate_id()?;

        let backend = Self {
            conn: Arc::clone(&conn),
            root,
            check_window,
            translator: Translator::new(root, atoms),
            warp: PointerWarp::new(conn, root),
        };
        backend.become_wm()?;
        backend.setup_ewmh()?;
        backend.conn.flush()?;
        tracing::info!("Managing screen {} (root {:#x})", screen_num, root);
        Ok(backend)
    }

    fn atoms(&self) -> &Atoms {
        self.translator.atoms()
    }

    /// Selecting substructure redirection on the root window fails when
    /// another client already holds it.
    fn become_wm(&self) -> Result<(), BackendError> {
        let mask = EventMask::SUBSTRUCTURE_REDIRECT
            | EventMask::SUBSTRUCTURE_NOTIFY
            | EventMask::STRUCTURE_NOTIFY
            | EventMask::ENTER_WINDOW
            | EventMask::POINTER_MOTION
            | EventMask::PROPERTY_CHANGE;
        let cookie = self.conn.change_window_attributes(
            self.root,
            &ChangeWindowAttributesAux::new().event_mask(mask),
        )?;
        match cookie.check() {
            Ok(()) => Ok(()),
            Err(ReplyError::X11Error(_)) => Err(BackendError::AnotherWm),
            Err(e) => Err(e.into()),
        }
    }

    fn setup_ewmh(&self) -> Result<(), BackendError> {
        let atoms = *self.atoms();
        self.conn.create_window(
            COPY_DEPTH_FROM_PARENT,
            self.check_window,
            self.root,
            -1,
            -1,
            1,
            1,
            0,
            WindowClass::INPUT_ONLY,
            COPY_FROM_PARENT,
            &CreateWindowAux::new(),
        )?;
        for window in [self.root, self.check_window] {
            self.conn.change_property32(
                PropMode::REPLACE,
                window,
                atoms._NET_SUPPORTING_WM_CHECK,
                AtomEnum::WINDOW,
                &[self.check_window],
            )?;
        }
        self.conn.change_property8(
            PropMode::REPLACE,
            self.check_window,
            atoms._NET_WM_NAME,
            atoms.UTF8_STRING,
            WM_NAME,
        )?;
        self.conn.change_property32(
            PropMode::REPLACE,
            self.root,
            atoms._NET_SUPPORTED,
            AtomEnum::ATOM,
            &atoms.supported(),
        )?;
        self.conn
            .delete_property(self.root, atoms._NET_CLIENT_LIST)?;
        Ok(())
    }

    /// Drain every event already received, translated in arrival order.
    pub fn poll_events(&self) -> Result<Vec<Event>, BackendError> {
        let mut events = Vec::new();
        while let Some(event) = self.conn.poll_for_event()? {
            if let XEvent::ButtonPress(_) = event {
                // Clicks that focus a client still reach it
                self.conn.allow_events(Allow::REPLAY_POINTER, CURRENT_TIME)?;
            }
            events.extend(self.translator.translate(&event));
        }
        Ok(events)
    }

    /// Hand input focus back to the root and drop the advertised state.
    pub fn shutdown(&self) {
        self.warp.cancel();
        let atoms = *self.atoms();
        request(
            "reset focus",
            self.conn
                .set_input_focus(InputFocus::POINTER_ROOT, self.root, CURRENT_TIME),
        );
        request(
            "clear active window",
            self.conn.delete_property(self.root, atoms._NET_ACTIVE_WINDOW),
        );
        request(
            "clear client list",
            self.conn.delete_property(self.root, atoms._NET_CLIENT_LIST),
        );
        request(
            "destroy check window",
            self.conn.destroy_window(self.check_window),
        );
        request("flush", self.conn.flush());
    }

    fn property(
        &self,
        window: Window,
        property: impl Into<Atom>,
        type_: impl Into<Atom>,
        length: u32,
    ) -> Result<GetPropertyReply, BackendError> {
        Ok(self
            .conn
            .get_property(false, window, property, type_, 0, length)?
            .reply()?)
    }

    fn property32(
        &self,
        window: Window,
        property: impl Into<Atom>,
        type_: impl Into<Atom>,
    ) -> Result<Vec<u32>, BackendError> {
        let reply = self.property(window, property, type_, 64)?;
        Ok(reply.value32().map(|v| v.collect()).unwrap_or_default())
    }

    fn text_property(
        &self,
        window: Window,
        property: impl Into<Atom>,
        type_: impl Into<Atom>,
    ) -> Result<String, BackendError> {
        Ok(props::text(&self.property(window, property, type_, 256)?.value))
    }

    fn title(&self, window: Window) -> Result<String, BackendError> {
        let atoms = self.atoms();
        let title = self.text_property(window, atoms._NET_WM_NAME, atoms.UTF8_STRING)?;
        if !title.is_empty() {
            return Ok(title);
        }
        self.text_property(window, AtomEnum::WM_NAME, AtomEnum::ANY)
    }

    fn query_window(&self, window: Window) -> Result<Option<WindowInfo>, BackendError> {
        let attrs = self.conn.get_window_attributes(window)?.reply()?;
        if attrs.override_redirect {
            return Ok(None);
        }
        let atoms = *self.atoms();
        let geometry = self.conn.get_geometry(window)?.reply()?;
        let (instance, class) = props::wm_class(
            &self
                .property(window, AtomEnum::WM_CLASS, AtomEnum::STRING, 256)?
                .value,
        );
        let hints = props::wm_hints(&self.property32(
            window,
            AtomEnum::WM_HINTS,
            AtomEnum::WM_HINTS,
        )?);
        let transient_for = self
            .property32(window, AtomEnum::WM_TRANSIENT_FOR, AtomEnum::WINDOW)?
            .first()
            .copied()
            .filter(|w| *w != NONE && *w != window);
        let protocols = self.property32(window, atoms.WM_PROTOCOLS, AtomEnum::ATOM)?;
        let net_state = self.property32(window, atoms._NET_WM_STATE, AtomEnum::ATOM)?;
        let window_type = self.property32(window, atoms._NET_WM_WINDOW_TYPE, AtomEnum::ATOM)?;

        Ok(Some(WindowInfo {
            window,
            class,
            instance,
            role: self.text_property(window, atoms.WM_WINDOW_ROLE, AtomEnum::ANY)?,
            title: self.title(window)?,
            pid: self
                .property32(window, atoms._NET_WM_PID, AtomEnum::CARDINAL)?
                .first()
                .copied()
                .filter(|pid| *pid > 0),
            geometry: Rect::new(
                geometry.x as i32,
                geometry.y as i32,
                geometry.width as u32,
                geometry.height as u32,
            ),
            border: geometry.border_width as u32,
            transient_for,
            size_hints: props::size_hints(&self.property32(
                window,
                AtomEnum::WM_NORMAL_HINTS,
                AtomEnum::WM_SIZE_HINTS,
            )?),
            urgent: hints.urgent,
            accepts_input: hints.accepts_input,
            take_focus: protocols.contains(&atoms.WM_TAKE_FOCUS),
            fullscreen: net_state.contains(&atoms._NET_WM_STATE_FULLSCREEN),
            dialog: window_type.contains(&atoms._NET_WM_WINDOW_TYPE_DIALOG),
            persisted: props::persisted(&self.property32(
                window,
                atoms._FUSUMA_PLACEMENT,
                AtomEnum::CARDINAL,
            )?),
        }))
    }

    fn query_screens(&self) -> Result<Vec<Rect>, BackendError> {
        if self.conn.xinerama_is_active()?.reply()?.state != 0 {
            let reply = self.conn.xinerama_query_screens()?.reply()?;
            let screens = unique_screens(reply.screen_info.iter().map(|s| {
                Rect::new(
                    s.x_org as i32,
                    s.y_org as i32,
                    s.width as u32,
                    s.height as u32,
                )
            }));
            if !screens.is_empty() {
                return Ok(screens);
            }
        }
        self.root_screen()
    }

    fn root_screen(&self) -> Result<Vec<Rect>, BackendError> {
        let geometry = self.conn.get_geometry(self.root)?.reply()?;
        Ok(vec![Rect::new(
            0,
            0,
            geometry.width as u32,
            geometry.height as u32,
        )])
    }

    fn wm_state(&self, window: Window) -> Option<u32> {
        let atoms = self.atoms();
        self.property32(window, atoms.WM_STATE, atoms.WM_STATE)
            .ok()?
            .first()
            .copied()
    }

    fn set_wm_state(&self, window: Window, state: u32) {
        let atoms = self.atoms();
        request(
            "set WM_STATE",
            self.conn.change_property32(
                PropMode::REPLACE,
                window,
                atoms.WM_STATE,
                atoms.WM_STATE,
                &[state, NONE],
            ),
        );
    }

    /// Viewable or iconic top-level windows, transients last so their
    /// parents are registered first.
    fn scan(&self) -> Result<Vec<Window>, BackendError> {
        let tree = self.conn.query_tree(self.root)?.reply()?;
        let mut normal = Vec::new();
        let mut transient = Vec::new();
        for window in tree.children {
            let Ok(attrs) = self.conn.get_window_attributes(window)?.reply() else {
                continue;
            };
            if attrs.override_redirect {
                continue;
            }
            let iconic = self.wm_state(window) == Some(WM_STATE_ICONIC);
            if attrs.map_state != MapState::VIEWABLE && !iconic {
                continue;
            }
            let is_transient = self
                .property32(window, AtomEnum::WM_TRANSIENT_FOR, AtomEnum::WINDOW)
                .map(|v| v.first().is_some_and(|w| *w != NONE))
                .unwrap_or(false);
            if is_transient {
                transient.push(window);
            } else {
                normal.push(window);
            }
        }
        normal.extend(transient);
        Ok(normal)
    }

    fn supports_protocol(&self, window: Window, protocol: Atom) -> bool {
        self.property32(window, self.atoms().WM_PROTOCOLS, AtomEnum::ATOM)
            .map(|protocols| protocols.contains(&protocol))
            .unwrap_or(false)
    }

    fn send_protocol(&self, window: Window, protocol: Atom) {
        let event = ClientMessageEvent {
            response_type: CLIENT_MESSAGE_EVENT,
            format: 32,
            sequence: 0,
            window,
            type_: self.atoms().WM_PROTOCOLS,
            data: ClientMessageData::from([protocol, CURRENT_TIME, 0, 0, 0]),
        };
        request(
            "send client message",
            self.conn
                .send_event(false, window, EventMask::NO_EVENT, event),
        );
    }

    /// Focused clients are no longer urgent; keep their hints in step.
    fn clear_urgency(&self, window: Window) {
        let Ok(hints) = self.property32(window, AtomEnum::WM_HINTS, AtomEnum::WM_HINTS) else {
            return;
        };
        if let Some(cleared) = props::clear_urgency(&hints) {
            request(
                "clear urgency hint",
                self.conn.change_property32(
                    PropMode::REPLACE,
                    window,
                    AtomEnum::WM_HINTS,
                    AtomEnum::WM_HINTS,
                    &cleared,
                ),
            );
        }
    }
}

impl AsFd for X11Backend {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.conn.stream().as_fd()
    }
}

/// Requests without replies report failures as error events; only local
/// connection failures surface here.
fn request<T>(what: &str, result: Result<T, ConnectionError>) {
    if let Err(e) = result {
        tracing::warn!("Failed to {}: {}", what, e);
    }
}

/// Cloned outputs report the same geometry more than once.
fn unique_screens(screens: impl IntoIterator<Item = Rect>) -> Vec<Rect> {
    let mut unique: Vec<Rect> = Vec::new();
    for screen in screens {
        if !unique.contains(&screen) {
            unique.push(screen);
        }
    }
    unique
}

impl WindowSystem for X11Backend {
    fn window_info(&self, window: WindowId) -> Option<WindowInfo> {
        match self.query_window(window) {
            Ok(info) => info,
            Err(e) => {
                tracing::debug!("Cannot query window {:#x}: {}", window, e);
                None
            }
        }
    }

    fn screens(&self) -> Vec<Rect> {
        match self.query_screens() {
            Ok(screens) => screens,
            Err(e) => {
                tracing::debug!("Xinerama unavailable: {}", e);
                self.root_screen().unwrap_or_else(|e| {
                    tracing::warn!("Cannot query root geometry: {}", e);
                    vec![]
                })
            }
        }
    }

    fn existing_windows(&self) -> Vec<WindowId> {
        self.scan().unwrap_or_else(|e| {
            tracing::warn!("Cannot scan existing windows: {}", e);
            vec![]
        })
    }

    fn parent_pid(&self, pid: u32) -> Option<u32> {
        proc::parent_pid(pid)
    }

    fn process_alive(&self, pid: u32) -> bool {
        proc::is_alive(pid)
    }

    fn pointer_position(&self) -> Option<(i32, i32)> {
        let reply = self.conn.query_pointer(self.root).ok()?.reply().ok()?;
        Some((reply.root_x as i32, reply.root_y as i32))
    }
}

impl WindowManipulator for X11Backend {
    fn configure(&self, window: WindowId, rect: &Rect, border: u32) {
        let aux = ConfigureWindowAux::new()
            .x(rect.x)
            .y(rect.y)
            .width(rect.width)
            .height(rect.height)
            .border_width(border);
        request("configure window", self.conn.configure_window(window, &aux));

        let notify = ConfigureNotifyEvent {
            response_type: CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
            above_sibling: NONE,
            x: to_i16(rect.x),
            y: to_i16(rect.y),
            width: to_u16(rect.width),
            height: to_u16(rect.height),
            border_width: to_u16(border),
            override_redirect: false,
        };
        request(
            "send configure notify",
            self.conn
                .send_event(false, window, EventMask::STRUCTURE_NOTIFY, notify),
        );
    }

    fn set_border_color(&self, window: WindowId, color: u32) {
        request(
            "set border color",
            self.conn.change_window_attributes(
                window,
                &ChangeWindowAttributesAux::new().border_pixel(color),
            ),
        );
    }

    fn map(&self, window: WindowId) {
        request(
            "select client events",
            self.conn.change_window_attributes(
                window,
                &ChangeWindowAttributesAux::new()
                    .event_mask(EventMask::ENTER_WINDOW | EventMask::PROPERTY_CHANGE),
            ),
        );
        request(
            "grab buttons",
            self.conn.grab_button(
                false,
                window,
                EventMask::BUTTON_PRESS,
                GrabMode::SYNC,
                GrabMode::ASYNC,
                NONE,
                NONE,
                ButtonIndex::ANY,
                ModMask::ANY,
            ),
        );
        request("map window", self.conn.map_window(window));
        self.set_wm_state(window, WM_STATE_NORMAL);
    }

    fn unmap(&self, window: WindowId) {
        request("unmap window", self.conn.unmap_window(window));
        self.set_wm_state(window, WM_STATE_ICONIC);
    }

    fn restack(&self, windows: &[WindowId]) {
        let mut above: Option<Window> = None;
        for &window in windows {
            let aux = match above {
                None => ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
                Some(sibling) => ConfigureWindowAux::new()
                    .sibling(sibling)
                    .stack_mode(StackMode::BELOW),
            };
            request("restack window", self.conn.configure_window(window, &aux));
            above = Some(window);
        }
    }

    fn focus_input(&self, window: WindowId) {
        request(
            "set input focus",
            self.conn
                .set_input_focus(InputFocus::POINTER_ROOT, window, CURRENT_TIME),
        );
        self.clear_urgency(window);
    }

    fn send_take_focus(&self, window: WindowId) {
        let take_focus = self.atoms().WM_TAKE_FOCUS;
        self.send_protocol(window, take_focus);
    }

    fn focus_root(&self) {
        request(
            "focus root",
            self.conn
                .set_input_focus(InputFocus::POINTER_ROOT, self.root, CURRENT_TIME),
        );
    }

    fn set_net_state(&self, window: WindowId, state: NetState) {
        request(
            "set _NET_WM_STATE",
            self.conn.change_property32(
                PropMode::REPLACE,
                window,
                self.atoms()._NET_WM_STATE,
                AtomEnum::ATOM,
                &self.translator.states().encode(state),
            ),
        );
    }

    fn set_active_window(&self, window: Option<WindowId>) {
        let atom = self.atoms()._NET_ACTIVE_WINDOW;
        match window {
            Some(window) => request(
                "set _NET_ACTIVE_WINDOW",
                self.conn.change_property32(
                    PropMode::REPLACE,
                    self.root,
                    atom,
                    AtomEnum::WINDOW,
                    &[window],
                ),
            ),
            None => request(
                "clear _NET_ACTIVE_WINDOW",
                self.conn.delete_property(self.root, atom),
            ),
        }
    }

    fn set_client_list(&self, windows: &[WindowId]) {
        request(
            "set _NET_CLIENT_LIST",
            self.conn.change_property32(
                PropMode::REPLACE,
                self.root,
                self.atoms()._NET_CLIENT_LIST,
                AtomEnum::WINDOW,
                windows,
            ),
        );
    }

    fn write_persisted(&self, window: WindowId, record: &[i32]) {
        let data: Vec<u32> = record.iter().map(|v| *v as u32).collect();
        request(
            "write placement record",
            self.conn.change_property32(
                PropMode::REPLACE,
                window,
                self.atoms()._FUSUMA_PLACEMENT,
                AtomEnum::CARDINAL,
                &data,
            ),
        );
    }

    fn close(&self, window: WindowId) {
        let delete = self.atoms().WM_DELETE_WINDOW;
        if self.supports_protocol(window, delete) {
            self.send_protocol(window, delete);
        } else {
            self.kill(window);
        }
    }

    fn kill(&self, window: WindowId) {
        tracing::info!("Killing client of window {:#x}", window);
        request("kill client", self.conn.kill_client(window));
    }

    fn minimize(&self, window: WindowId) {
        self.unmap(window);
    }

    fn warp_pointer(&self, x: i32, y: i32) {
        let from = self.pointer_position().unwrap_or((x, y));
        self.warp.start(from, (x, y));
    }

    fn cancel_warp(&self) {
        self.warp.cancel();
    }

    fn spawn(&self, command: &[String], env: &[(String, String)]) -> Result<(), String> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| "empty command".to_string())?;
        Process::new(program)
            .args(args)
            .envs(env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .process_group(0)
            .spawn()
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    fn flush(&self) {
        request("flush", self.conn.flush());
    }
}
