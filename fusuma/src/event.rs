use crate::core::{NetState, WindowId};

/// Requested change to a client's protocol state flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateAction {
    Remove,
    Add,
    Toggle,
}

impl StateAction {
    pub fn resolve(self, current: bool) -> bool {
        match self {
            StateAction::Remove => false,
            StateAction::Add => true,
            StateAction::Toggle => !current,
        }
    }
}

/// Fields present in a configure request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfigureRequest {
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub border: Option<u32>,
}

/// Window lifecycle notifications translated from the display server.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    MapRequest {
        window: WindowId,
    },
    Destroyed {
        window: WindowId,
    },
    Unmapped {
        window: WindowId,
        synthetic: bool,
    },
    ConfigureRequest {
        window: WindowId,
        request: ConfigureRequest,
    },
    TitleChanged {
        window: WindowId,
    },
    HintsChanged {
        window: WindowId,
    },
    SizeHintsChanged {
        window: WindowId,
    },
    TransientForChanged {
        window: WindowId,
    },
    StateRequest {
        window: WindowId,
        action: StateAction,
        state: NetState,
    },
    ActivateRequest {
        window: WindowId,
    },
    CloseRequest {
        window: WindowId,
    },
    PointerEntered {
        window: WindowId,
    },
    /// Pointer moved over the root window.
    PointerMoved {
        x: i32,
        y: i32,
    },
    ButtonPressed {
        window: WindowId,
    },
    ScreensChanged,
    /// A request against this window failed because it no longer exists.
    InvalidWindow {
        window: WindowId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_action_resolve() {
        assert!(!StateAction::Remove.resolve(true));
        assert!(StateAction::Add.resolve(false));
        assert!(StateAction::Toggle.resolve(false));
        assert!(!StateAction::Toggle.resolve(true));
    }
}
