use std::path::Path;

use crate::effect::Effect;
use crate::platform::WindowManipulator;

/// Environment handed to spawned helpers.
fn spawn_env(monitor: usize, socket_path: &Path) -> Vec<(String, String)> {
    vec![
        ("FUSUMA_MONITOR".to_string(), monitor.to_string()),
        (
            "FUSUMA_SOCKET".to_string(),
            socket_path.to_string_lossy().into_owned(),
        ),
    ]
}

/// Execute side effects in order. Returns whether a quit was requested.
pub fn execute_effects<M: WindowManipulator>(
    effects: Vec<Effect>,
    manipulator: &M,
    socket_path: &Path,
) -> Result<bool, String> {
    let mut quit = false;
    for effect in effects {
        match effect {
            Effect::Configure {
                window,
                rect,
                border,
            } => manipulator.configure(window, &rect, border),
            Effect::SetBorderColor { window, color } => {
                manipulator.set_border_color(window, color)
            }
            Effect::Map { window } => manipulator.map(window),
            Effect::Unmap { window } => manipulator.unmap(window),
            Effect::Restack { windows } => {
                if !windows.is_empty() {
                    manipulator.restack(&windows);
                }
            }
            Effect::FocusInput { window } => manipulator.focus_input(window),
            Effect::SendTakeFocus { window } => manipulator.send_take_focus(window),
            Effect::FocusRoot => manipulator.focus_root(),
            Effect::SetNetState { window, state } => manipulator.set_net_state(window, state),
            Effect::SetActiveWindow(window) => manipulator.set_active_window(window),
            Effect::SetClientList(windows) => manipulator.set_client_list(&windows),
            Effect::WritePersisted { window, record } => {
                manipulator.write_persisted(window, &record)
            }
            Effect::Close { window } => manipulator.close(window),
            Effect::Kill { window } => manipulator.kill(window),
            Effect::Minimize { window } => manipulator.minimize(window),
            Effect::WarpPointer { x, y } => manipulator.warp_pointer(x, y),
            Effect::CancelWarp => manipulator.cancel_warp(),
            Effect::Spawn { command, monitor } => {
                tracing::info!("Spawning {:?} on monitor {}", command, monitor);
                let env = spawn_env(monitor, socket_path);
                if let Err(e) = manipulator.spawn(&command, &env) {
                    manipulator.flush();
                    return Err(format!("Failed to spawn {:?}: {}", command, e));
                }
            }
            Effect::Quit => quit = true,
        }
    }
    manipulator.flush();
    Ok(quit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Rect;
    use crate::platform::mock::MockWindowManipulator;

    #[test]
    fn test_effects_run_in_order() {
        let m = MockWindowManipulator::new();
        let effects = vec![
            Effect::Configure {
                window: 1,
                rect: Rect::new(0, 0, 10, 10),
                border: 1,
            },
            Effect::Map { window: 1 },
            Effect::Restack { windows: vec![] },
            Effect::FocusInput { window: 1 },
        ];
        let quit = execute_effects(effects, &m, Path::new("/run/fusuma.sock")).unwrap();
        assert!(!quit);
        assert_eq!(
            m.calls(),
            vec![
                Effect::Configure {
                    window: 1,
                    rect: Rect::new(0, 0, 10, 10),
                    border: 1,
                },
                Effect::Map { window: 1 },
                Effect::FocusInput { window: 1 },
            ]
        );
    }

    #[test]
    fn test_spawn_injects_environment() {
        let m = MockWindowManipulator::new();
        let effects = vec![Effect::Spawn {
            command: vec!["dmenu_run".to_string()],
            monitor: 1,
        }];
        execute_effects(effects, &m, Path::new("/run/fusuma.sock")).unwrap();
        let spawned = m.spawned.borrow();
        assert_eq!(spawned.len(), 1);
        assert!(spawned[0]
            .1
            .contains(&("FUSUMA_MONITOR".to_string(), "1".to_string())));
        assert!(spawned[0]
            .1
            .contains(&("FUSUMA_SOCKET".to_string(), "/run/fusuma.sock".to_string())));
    }

    #[test]
    fn test_spawn_failure_is_reported() {
        let m = MockWindowManipulator::new();
        let effects = vec![Effect::Spawn {
            command: vec![],
            monitor: 0,
        }];
        assert!(execute_effects(effects, &m, Path::new("")).is_err());
    }

    #[test]
    fn test_quit_is_reported_after_other_effects() {
        let m = MockWindowManipulator::new();
        let effects = vec![Effect::Quit, Effect::FocusRoot];
        assert!(execute_effects(effects, &m, Path::new("")).unwrap());
        assert_eq!(m.calls(), vec![Effect::FocusRoot]);
    }
}
