use x11rb::protocol::xproto::Atom;

use crate::core::NetState;

/// ICCCM WM_STATE values.
pub const WM_STATE_NORMAL: u32 = 1;
pub const WM_STATE_ICONIC: u32 = 3;

x11rb::atom_manager! {
    pub Atoms: AtomsCookie {
        WM_PROTOCOLS,
        WM_DELETE_WINDOW,
        WM_TAKE_FOCUS,
        WM_STATE,
        WM_WINDOW_ROLE,
        UTF8_STRING,
        _NET_SUPPORTED,
        _NET_SUPPORTING_WM_CHECK,
        _NET_WM_NAME,
        _NET_WM_PID,
        _NET_ACTIVE_WINDOW,
        _NET_CLIENT_LIST,
        _NET_CLOSE_WINDOW,
        _NET_WM_STATE,
        _NET_WM_STATE_DEMANDS_ATTENTION,
        _NET_WM_STATE_FULLSCREEN,
        _NET_WM_STATE_STICKY,
        _NET_WM_STATE_HIDDEN,
        _NET_WM_STATE_MODAL,
        _NET_WM_STATE_ABOVE,
        _NET_WM_STATE_MAXIMIZED_HORZ,
        _NET_WM_STATE_MAXIMIZED_VERT,
        _NET_WM_STATE_SKIP_PAGER,
        _NET_WM_STATE_SKIP_TASKBAR,
        _NET_WM_WINDOW_TYPE,
        _NET_WM_WINDOW_TYPE_DIALOG,
        _FUSUMA_PLACEMENT,
    }
}

impl Atoms {
    pub fn state_table(&self) -> StateTable {
        StateTable::new(vec![
            (NetState::URGENT, self._NET_WM_STATE_DEMANDS_ATTENTION),
            (NetState::FULLSCREEN, self._NET_WM_STATE_FULLSCREEN),
            (NetState::STICKY, self._NET_WM_STATE_STICKY),
            (NetState::HIDDEN, self._NET_WM_STATE_HIDDEN),
            (NetState::MODAL, self._NET_WM_STATE_MODAL),
            (NetState::ABOVE, self._NET_WM_STATE_ABOVE),
            (NetState::MAXIMIZED_HORZ, self._NET_WM_STATE_MAXIMIZED_HORZ),
            (NetState::MAXIMIZED_VERT, self._NET_WM_STATE_MAXIMIZED_VERT),
            (NetState::SKIP_PAGER, self._NET_WM_STATE_SKIP_PAGER),
            (NetState::SKIP_TASKBAR, self._NET_WM_STATE_SKIP_TASKBAR),
        ])
    }

    /// Everything advertised in `_NET_SUPPORTED`.
    pub fn supported(&self) -> Vec<Atom> {
        let mut atoms = vec![
            self._NET_SUPPORTED,
            self._NET_SUPPORTING_WM_CHECK,
            self._NET_WM_NAME,
            self._NET_WM_PID,
            self._NET_ACTIVE_WINDOW,
            self._NET_CLIENT_LIST,
            self._NET_CLOSE_WINDOW,
            self._NET_WM_STATE,
            self._NET_WM_WINDOW_TYPE,
            self._NET_WM_WINDOW_TYPE_DIALOG,
        ];
        atoms.extend(self.state_table().atoms());
        atoms
    }
}

/// Mapping between state flags and their `_NET_WM_STATE_*` atoms.
#[derive(Debug, Clone)]
pub struct StateTable {
    entries: Vec<(NetState, Atom)>,
}

impl StateTable {
    pub fn new(entries: Vec<(NetState, Atom)>) -> Self {
        Self { entries }
    }

    pub fn encode(&self, state: NetState) -> Vec<Atom> {
        self.entries
            .iter()
            .filter(|(flag, _)| state.contains(*flag))
            .map(|(_, atom)| *atom)
            .collect()
    }

    pub fn flag(&self, atom: Atom) -> Option<NetState> {
        self.entries
            .iter()
            .find(|(_, a)| *a == atom)
            .map(|(flag, _)| *flag)
    }

    fn atoms(&self) -> impl Iterator<Item = Atom> + '_ {
        self.entries.iter().map(|(_, atom)| *atom)
    }
}
