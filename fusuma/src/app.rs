mod command;
mod dispatch;
mod effects;

pub use command::ACTIONS;

use std::io::{ErrorKind, Read};
use std::os::fd::{AsFd, AsRawFd};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::mpsc as std_mpsc;

use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

use crate::core::{Config, RuleSet, State};
use crate::ipc::{self, IpcRequest, IpcServer};
use crate::platform::WindowManipulator;
use crate::x11::X11Backend;
use fusuma_ipc::{Command, Response};

use dispatch::{dispatch_command, dispatch_event, Paths};
use effects::execute_effects;

static RELOAD_REQUESTED: AtomicBool = AtomicBool::new(false);
static TERMINATE_REQUESTED: AtomicBool = AtomicBool::new(false);
/// Write end of the signal wakeup socket, or -1.
static SIGNAL_WAKE_FD: AtomicI32 = AtomicI32::new(-1);

extern "C" fn on_signal(signal: nix::libc::c_int) {
    if signal == Signal::SIGHUP as nix::libc::c_int {
        RELOAD_REQUESTED.store(true, Ordering::Relaxed);
    } else {
        TERMINATE_REQUESTED.store(true, Ordering::Relaxed);
    }
    let fd = SIGNAL_WAKE_FD.load(Ordering::Relaxed);
    if fd >= 0 {
        let saved = Errno::last_raw();
        // SAFETY: write(2) is async-signal-safe and the descriptor outlives
        // the installed handlers. A full socket already holds a wakeup.
        unsafe {
            nix::libc::write(fd, [1u8].as_ptr().cast(), 1);
        }
        Errno::set_raw(saved);
    }
}

fn install_signal_handlers(wake: &UnixStream) -> Result<()> {
    SIGNAL_WAKE_FD.store(wake.as_raw_fd(), Ordering::Relaxed);

    let handler = SigAction::new(
        SigHandler::Handler(on_signal),
        SaFlags::empty(),
        SigSet::empty(),
    );
    // Spawned helpers are never waited for
    let reap = SigAction::new(SigHandler::SigIgn, SaFlags::SA_NOCLDWAIT, SigSet::empty());

    // SAFETY: the handler only stores to atomics.
    unsafe {
        for signal in [Signal::SIGHUP, Signal::SIGTERM, Signal::SIGINT] {
            sigaction(signal, &handler)
                .with_context(|| format!("Failed to install {} handler", signal))?;
        }
        sigaction(Signal::SIGCHLD, &reap).context("Failed to ignore SIGCHLD")?;
    }
    Ok(())
}

/// Startup options resolved from the command line.
pub struct Options {
    pub rules: PathBuf,
    pub layout: PathBuf,
    pub urgency_hints: bool,
}

pub struct App {
    state: State,
    backend: X11Backend,
    paths: Paths,
    requests: std_mpsc::Receiver<IpcRequest>,
    /// Read end of the wakeup socket; `None` once the IPC thread is gone.
    waker: Option<UnixStream>,
    /// Read end of the socket the signal handler writes to.
    signals: UnixStream,
}

impl App {
    pub fn run(options: Options) -> Result<()> {
        let config = load_config(&options.layout);
        let rules = load_rules(&options.rules);

        let backend = X11Backend::connect().context("Failed to start window manager")?;

        let mut state = State::new(config, rules);
        state.urgency_hints = options.urgency_hints;

        let paths = Paths {
            rules: options.rules,
            socket: ipc::socket_path(),
        };

        // Channel: IPC commands (tokio -> main thread)
        let (cmd_tx, cmd_rx) = std_mpsc::channel::<IpcRequest>();
        let (waker, wake_tx) = UnixStream::pair().context("Failed to create wakeup socket")?;
        waker.set_nonblocking(true)?;
        wake_tx.set_nonblocking(true)?;
        spawn_ipc_server(paths.socket.clone(), cmd_tx, wake_tx)?;

        let (signals, signal_tx) =
            UnixStream::pair().context("Failed to create signal wakeup socket")?;
        signals.set_nonblocking(true)?;
        signal_tx.set_nonblocking(true)?;
        install_signal_handlers(&signal_tx)?;

        let mut app = App {
            state,
            backend,
            paths,
            requests: cmd_rx,
            waker: Some(waker),
            signals,
        };
        let result = app.run_main_loop();
        SIGNAL_WAKE_FD.store(-1, Ordering::Relaxed);
        drop(signal_tx);

        app.backend.shutdown();
        let _ = std::fs::remove_file(&app.paths.socket);
        tracing::info!("fusuma exiting");
        result
    }

    fn run_main_loop(&mut self) -> Result<()> {
        tracing::info!("Starting main loop");
        let effects = self.state.start(&self.backend);
        match execute_effects(effects, &self.backend, &self.paths.socket) {
            Ok(true) => return Ok(()),
            Ok(false) => {}
            Err(message) => tracing::warn!("{}", message),
        }

        loop {
            if TERMINATE_REQUESTED.swap(false, Ordering::Relaxed) {
                tracing::info!("Termination signal received");
                return Ok(());
            }
            if RELOAD_REQUESTED.swap(false, Ordering::Relaxed) {
                self.reload_rules();
            }
            if self.handle_requests() {
                return Ok(());
            }
            if self.handle_events()? {
                return Ok(());
            }
            self.wait()?;
        }
    }

    /// Dispatch display events until the connection has nothing buffered.
    /// Handlers make round trips that can queue further events, so a single
    /// pass is not enough before blocking again.
    fn handle_events(&mut self) -> Result<bool> {
        loop {
            let events = self
                .backend
                .poll_events()
                .context("Lost the display connection")?;
            if events.is_empty() {
                return Ok(false);
            }
            for event in &events {
                tracing::trace!("Event: {:?}", event);
                if dispatch_event(
                    event,
                    &mut self.state,
                    &self.backend,
                    &self.backend,
                    &self.paths,
                ) {
                    tracing::info!("Quit requested");
                    return Ok(true);
                }
            }
        }
    }

    fn handle_requests(&mut self) -> bool {
        while let Ok((cmd, resp_tx)) = self.requests.try_recv() {
            tracing::debug!("Received IPC command: {:?}", cmd);
            let (response, quit) = dispatch_command(
                &cmd,
                &mut self.state,
                &self.backend,
                &self.backend,
                &self.paths,
            );
            if resp_tx.send(response).is_err() {
                tracing::debug!("IPC client left before the response was sent");
            }
            if quit {
                tracing::info!("Quit command received");
                return true;
            }
        }
        false
    }

    fn reload_rules(&mut self) {
        tracing::info!("Reloading rules from {:?}", self.paths.rules);
        let cmd = Command::Run {
            action: "reload-rules".to_string(),
            args: vec![],
        };
        let (response, _) = dispatch_command(
            &cmd,
            &mut self.state,
            &self.backend,
            &self.backend,
            &self.paths,
        );
        if let Response::Error { message } = response {
            tracing::warn!("Rule reload failed: {}", message);
        }
    }

    /// Block until the display, a signal or the IPC thread has something
    /// for us. Signals arriving before the poll still wake it through the
    /// signal socket.
    fn wait(&mut self) -> Result<()> {
        self.backend.flush();

        let (signalled, woken) = {
            let mut fds = vec![
                PollFd::new(self.backend.as_fd(), PollFlags::POLLIN),
                PollFd::new(self.signals.as_fd(), PollFlags::POLLIN),
            ];
            if let Some(waker) = &self.waker {
                fds.push(PollFd::new(waker.as_fd(), PollFlags::POLLIN));
            }
            match poll(&mut fds, PollTimeout::NONE) {
                Ok(_) | Err(Errno::EINTR) => {}
                Err(e) => return Err(e).context("Failed to poll"),
            }
            let ready = |i: usize| {
                fds.get(i)
                    .and_then(|fd| fd.revents())
                    .is_some_and(|r| r.intersects(PollFlags::POLLIN | PollFlags::POLLHUP))
            };
            (ready(1), ready(2))
        };

        if signalled {
            drain(&self.signals, "signal");
        }
        if woken {
            let closed = self.waker.as_ref().is_some_and(|w| drain(w, "wakeup"));
            if closed {
                tracing::warn!("IPC thread exited, control socket unavailable");
                self.waker = None;
            }
        }
        Ok(())
    }
}

/// Read everything pending on a wakeup socket. Returns whether the writer
/// side has closed.
fn drain(mut stream: &UnixStream, name: &str) -> bool {
    let mut buf = [0u8; 64];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => return true,
            Ok(_) => continue,
            Err(e) if e.kind() == ErrorKind::WouldBlock => return false,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!("Failed to drain {} socket: {}", name, e);
                return false;
            }
        }
    }
}

/// Unreadable or malformed documents fall back to the defaults.
fn load_config(path: &std::path::Path) -> Config {
    match Config::load(path) {
        Ok((config, warnings)) => {
            for warning in warnings {
                tracing::warn!("{:?}: {}", path, warning);
            }
            config
        }
        Err(e) => {
            tracing::warn!("{:#}; using default layout settings", e);
            Config::new()
        }
    }
}

fn load_rules(path: &std::path::Path) -> RuleSet {
    match RuleSet::load(path) {
        Ok((rules, warnings)) => {
            for warning in warnings {
                tracing::warn!("{:?}: {}", path, warning);
            }
            tracing::info!("Loaded {} rules", rules.len());
            rules
        }
        Err(e) => {
            tracing::warn!("{:#}; starting without rules", e);
            RuleSet::default()
        }
    }
}

fn spawn_ipc_server(
    socket: PathBuf,
    cmd_tx: std_mpsc::Sender<IpcRequest>,
    waker: UnixStream,
) -> Result<()> {
    std::thread::Builder::new()
        .name("fusuma-ipc".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(e) => {
                    tracing::error!("Failed to start tokio runtime: {}", e);
                    return;
                }
            };
            runtime.block_on(async move {
                let server = IpcServer::new(socket, cmd_tx, waker);
                if let Err(e) = server.run().await {
                    tracing::error!("IPC server error: {:#}", e);
                }
            });
        })
        .context("Failed to spawn IPC thread")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_signal_handler_wakes_poll() {
        let (rx, tx) = UnixStream::pair().unwrap();
        rx.set_nonblocking(true).unwrap();
        SIGNAL_WAKE_FD.store(tx.as_raw_fd(), Ordering::Relaxed);
        on_signal(Signal::SIGHUP as nix::libc::c_int);
        SIGNAL_WAKE_FD.store(-1, Ordering::Relaxed);
        assert!(RELOAD_REQUESTED.swap(false, Ordering::Relaxed));

        // A signal that lands before the poll leaves the socket readable.
        let mut fds = [PollFd::new(rx.as_fd(), PollFlags::POLLIN)];
        assert_eq!(poll(&mut fds, PollTimeout::ZERO).unwrap(), 1);
        assert!(!drain(&rx, "signal"));
        let mut fds = [PollFd::new(rx.as_fd(), PollFlags::POLLIN)];
        assert_eq!(poll(&mut fds, PollTimeout::ZERO).unwrap(), 0);
    }

    #[test]
    fn test_drain_reports_closed_writer() {
        let (rx, tx) = UnixStream::pair().unwrap();
        rx.set_nonblocking(true).unwrap();
        (&tx).write_all(b"xyz").unwrap();
        assert!(!drain(&rx, "wakeup"));
        drop(tx);
        assert!(drain(&rx, "wakeup"));
    }
}
