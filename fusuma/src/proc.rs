//! Process table lookups used for parent resolution and liveness checks.

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;

/// Extract the parent pid from the contents of `/proc/<pid>/stat`. The
/// command name may itself contain spaces and parentheses, so fields are
/// counted from the last `)`.
fn parse_ppid(stat: &str) -> Option<u32> {
    let rest = &stat[stat.rfind(')')? + 1..];
    let mut fields = rest.split_whitespace();
    fields.next()?;
    fields.next()?.parse().ok()
}

pub fn parent_pid(pid: u32) -> Option<u32> {
    let stat = std::fs::read_to_string(format!("/proc/{}/stat", pid)).ok()?;
    parse_ppid(&stat)
}

/// Whether a process with this pid exists. A process owned by another
/// user still counts as alive.
pub fn is_alive(pid: u32) -> bool {
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}
