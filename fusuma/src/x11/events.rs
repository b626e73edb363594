//! Translation of raw protocol events into core events.

use x11rb::protocol::xproto::{
    AtomEnum, ConfigWindow, NotifyDetail, NotifyMode, Property, Window,
};
use x11rb::protocol::{ErrorKind, Event as XEvent};

use crate::core::NetState;
use crate::event::{ConfigureRequest, Event, StateAction};

use super::atoms::{Atoms, StateTable};

pub struct Translator {
    root: Window,
    atoms: Atoms,
    states: StateTable,
}

impl Translator {
    pub fn new(root: Window, atoms: Atoms) -> Self {
        Self {
            root,
            states: atoms.state_table(),
            atoms,
        }
    }

    pub fn atoms(&self) -> &Atoms {
        &self.atoms
    }

    pub fn states(&self) -> &StateTable {
        &self.states
    }

    pub fn translate(&self, event: &XEvent) -> Vec<Event> {
        match event {
            XEvent::MapRequest(e) => vec![Event::MapRequest { window: e.window }],
            XEvent::DestroyNotify(e) => vec![Event::Destroyed { window: e.window }],
            XEvent::UnmapNotify(e) => vec![Event::Unmapped {
                window: e.window,
                synthetic: e.response_type & 0x80 != 0,
            }],
            XEvent::ConfigureRequest(e) => vec![Event::ConfigureRequest {
                window: e.window,
                request: configure_request(
                    u16::from(e.value_mask),
                    (e.x, e.y),
                    (e.width, e.height),
                    e.border_width,
                ),
            }],
            XEvent::ConfigureNotify(e) if e.window == self.root => vec![Event::ScreensChanged],
            XEvent::PropertyNotify(e) => {
                if e.state == Property::DELETE {
                    return vec![];
                }
                self.property_changed(e.window, e.atom)
                    .into_iter()
                    .collect()
            }
            XEvent::ClientMessage(e) => {
                let data = e.data.as_data32();
                if e.type_ == self.atoms._NET_WM_STATE {
                    state_requests(&self.states, &data)
                        .into_iter()
                        .map(|(action, state)| Event::StateRequest {
                            window: e.window,
                            action,
                            state,
                        })
                        .collect()
                } else if e.type_ == self.atoms._NET_ACTIVE_WINDOW {
                    vec![Event::ActivateRequest { window: e.window }]
                } else if e.type_ == self.atoms._NET_CLOSE_WINDOW {
                    vec![Event::CloseRequest { window: e.window }]
                } else {
                    vec![]
                }
            }
            XEvent::EnterNotify(e) => {
                if e.event == self.root {
                    return vec![Event::PointerMoved {
                        x: e.root_x as i32,
                        y: e.root_y as i32,
                    }];
                }
                if e.mode != NotifyMode::NORMAL || e.detail == NotifyDetail::INFERIOR {
                    return vec![];
                }
                vec![Event::PointerEntered { window: e.event }]
            }
            XEvent::MotionNotify(e) if e.event == self.root => vec![Event::PointerMoved {
                x: e.root_x as i32,
                y: e.root_y as i32,
            }],
            XEvent::ButtonPress(e) => vec![Event::ButtonPressed { window: e.event }],
            XEvent::Error(e) => match e.error_kind {
                ErrorKind::Window | ErrorKind::Drawable => {
                    tracing::debug!(
                        "Request {:?} failed for window {:#x}",
                        e.request_name,
                        e.bad_value
                    );
                    vec![Event::InvalidWindow {
                        window: e.bad_value,
                    }]
                }
                // Races against clients that are going away
                ErrorKind::Match | ErrorKind::Access => vec![],
                _ => {
                    tracing::warn!("X11 error: {:?}", e);
                    vec![]
                }
            },
            _ => vec![],
        }
    }

    fn property_changed(&self, window: Window, atom: u32) -> Option<Event> {
        if atom == u32::from(AtomEnum::WM_NAME) || atom == self.atoms._NET_WM_NAME {
            Some(Event::TitleChanged { window })
        } else if atom == u32::from(AtomEnum::WM_HINTS) {
            Some(Event::HintsChanged { window })
        } else if atom == u32::from(AtomEnum::WM_NORMAL_HINTS) {
            Some(Event::SizeHintsChanged { window })
        } else if atom == u32::from(AtomEnum::WM_TRANSIENT_FOR) {
            Some(Event::TransientForChanged { window })
        } else {
            None
        }
    }
}

/// Keep only the fields the request's value mask names.
pub fn configure_request(
    mask: u16,
    (x, y): (i16, i16),
    (width, height): (u16, u16),
    border: u16,
) -> ConfigureRequest {
    let has = |flag: ConfigWindow| mask & u16::from(flag) != 0;
    ConfigureRequest {
        x: has(ConfigWindow::X).then_some(x as i32),
        y: has(ConfigWindow::Y).then_some(y as i32),
        width: has(ConfigWindow::WIDTH).then_some(width as u32),
        height: has(ConfigWindow::HEIGHT).then_some(height as u32),
        border: has(ConfigWindow::BORDER_WIDTH).then_some(border as u32),
    }
}

fn state_action(value: u32) -> Option<StateAction> {
    match value {
        0 => Some(StateAction::Remove),
        1 => Some(StateAction::Add),
        2 => Some(StateAction::Toggle),
        _ => None,
    }
}

/// A `_NET_WM_STATE` message carries an action and up to two properties.
pub fn state_requests(states: &StateTable, data: &[u32; 5]) -> Vec<(StateAction, NetState)> {
    let Some(action) = state_action(data[0]) else {
        return vec![];
    };
    data[1..3]
        .iter()
        .filter(|atom| **atom != 0)
        .filter_map(|atom| states.flag(*atom))
        .map(|state| (action, state))
        .collect()
}
