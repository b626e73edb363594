use crate::core::{NetState, Rect, WindowId};

use fusuma_ipc::Response;

/// Protocol commands computed by the core and executed in order by the
/// app layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Configure {
        window: WindowId,
        rect: Rect,
        border: u32,
    },
    SetBorderColor {
        window: WindowId,
        color: u32,
    },
    Map {
        window: WindowId,
    },
    Unmap {
        window: WindowId,
    },
    /// Visible windows of one monitor, topmost first.
    Restack {
        windows: Vec<WindowId>,
    },
    FocusInput {
        window: WindowId,
    },
    SendTakeFocus {
        window: WindowId,
    },
    FocusRoot,
    SetNetState {
        window: WindowId,
        state: NetState,
    },
    SetActiveWindow(Option<WindowId>),
    SetClientList(Vec<WindowId>),
    WritePersisted {
        window: WindowId,
        record: Vec<i32>,
    },
    /// Polite close; the backend falls back to killing the client when it
    /// does not speak WM_DELETE_WINDOW.
    Close {
        window: WindowId,
    },
    Kill {
        window: WindowId,
    },
    Minimize {
        window: WindowId,
    },
    WarpPointer {
        x: i32,
        y: i32,
    },
    /// Stop a pointer animation that is still in flight.
    CancelWarp,
    Spawn {
        command: Vec<String>,
        monitor: usize,
    },
    Quit,
}

pub struct CommandResult {
    pub response: Response,
    pub effects: Vec<Effect>,
}

impl CommandResult {
    pub fn ok() -> Self {
        Self {
            response: Response::Ok,
            effects: vec![],
        }
    }

    pub fn ok_with_effects(effects: Vec<Effect>) -> Self {
        Self {
            response: Response::Ok,
            effects,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            response: Response::Error {
                message: message.into(),
            },
            effects: vec![],
        }
    }

    pub fn with_response(response: Response) -> Self {
        Self {
            response,
            effects: vec![],
        }
    }
}
