use std::path::Path;

use crate::core::{
    Client, ClientId, FullscreenState, LayoutKind, RuleSet, State, Tag, MAX_TAGS,
};
use crate::effect::{CommandResult, Effect};
use crate::platform::WindowSystem;
use fusuma_ipc::{Arg, ClientInfo, Command, LayoutInfo, MonitorInfo, Response, TagInfo};

/// Every action name accepted by `Command::Run`.
pub const ACTIONS: &[&str] = &[
    "view",
    "toggle-view",
    "view-last",
    "tag",
    "toggle-tag",
    "focus-stack",
    "move-stack",
    "focus-monitor",
    "send-monitor",
    "zoom",
    "close",
    "kill",
    "toggle-floating",
    "toggle-fullscreen",
    "toggle-pretend-fullscreen",
    "toggle-sticky",
    "toggle-always-on-top",
    "minimize",
    "restore",
    "set-layout",
    "cycle-layout",
    "set-master-fraction",
    "inc-master-count",
    "set-size-factor",
    "toggle-gaps",
    "toggle-bar",
    "toggle-desktop",
    "focus-urgent",
    "spawn",
    "reload-rules",
    "quit",
];

fn int_arg(args: &[Arg], default: Option<i64>) -> Result<i64, String> {
    match args.first() {
        Some(arg) => arg
            .as_int()
            .ok_or_else(|| format!("expected an integer, got {}", arg)),
        None => default.ok_or_else(|| "missing integer argument".to_string()),
    }
}

/// Direction and distance for stack and monitor movement, 1 by default.
fn step_arg(args: &[Arg]) -> Result<i32, String> {
    let n = int_arg(args, Some(1))?;
    i32::try_from(n).map_err(|_| format!("step {} out of range", n))
}

/// Tag number argument; 0 selects every tag of the monitor.
fn tag_arg(state: &State, args: &[Arg]) -> Result<Tag, String> {
    let n = int_arg(args, None)?;
    let count = state
        .registry
        .monitor(state.selected)
        .map(|m| m.tag_count)
        .unwrap_or(MAX_TAGS);
    match n {
        0 => Ok(Tag::all(count)),
        n if n > 0 && n <= count as i64 => Ok(Tag::new(n as u32)),
        n => Err(format!("tag {} out of range 0..={}", n, count)),
    }
}

/// Fraction argument. A signed string or a negative number is relative.
fn fraction_arg(args: &[Arg]) -> Result<(f32, bool), String> {
    match args.first() {
        Some(Arg::Str(s)) if s.starts_with('+') || s.starts_with('-') => s
            .parse::<f32>()
            .map(|v| (v, true))
            .map_err(|_| format!("expected a number, got {}", s)),
        Some(arg) => {
            let v = arg
                .as_float()
                .ok_or_else(|| format!("expected a number, got {}", arg))?;
            Ok((v as f32, v < 0.0))
        }
        None => Err("missing fraction argument".to_string()),
    }
}

/// Optional window argument, decimal or `0x` hex.
fn window_arg(state: &State, args: &[Arg]) -> Result<Option<ClientId>, String> {
    let Some(arg) = args.first() else {
        return Ok(None);
    };
    let window = match arg {
        Arg::Str(s) if s.starts_with("0x") => u32::from_str_radix(&s[2..], 16).ok(),
        _ => arg.as_int().and_then(|i| u32::try_from(i).ok()),
    }
    .ok_or_else(|| format!("expected a window id, got {}", arg))?;
    state
        .client_by_window(window)
        .map(Some)
        .ok_or_else(|| format!("no client for window {:#x}", window))
}

fn run_action<W: WindowSystem>(
    state: &mut State,
    ws: &W,
    action: &str,
    args: &[Arg],
    rules_path: &Path,
) -> Result<Vec<Effect>, String> {
    let effects = match action {
        "view" => {
            let tags = tag_arg(state, args)?;
            state.view(ws, tags)
        }
        "toggle-view" => {
            let tags = tag_arg(state, args)?;
            state.toggle_view(ws, tags)
        }
        "view-last" => state.view_last(ws),
        "tag" => {
            let tags = tag_arg(state, args)?;
            state.tag_selected(ws, tags)
        }
        "toggle-tag" => {
            let tags = tag_arg(state, args)?;
            state.toggle_tag_selected(ws, tags)
        }
        "focus-stack" => state.focus_stack(ws, step_arg(args)?),
        "move-stack" => state.move_stack(step_arg(args)?),
        "focus-monitor" => state.focus_monitor(ws, step_arg(args)?),
        "send-monitor" => state.send_monitor(ws, step_arg(args)?),
        "zoom" => state.zoom(ws),
        "close" => {
            let id = window_arg(state, args)?;
            state.close(id)
        }
        "kill" => {
            let id = window_arg(state, args)?;
            state.kill(id)
        }
        "toggle-floating" => state.toggle_floating(),
        "toggle-fullscreen" => state.toggle_fullscreen(FullscreenState::Real),
        "toggle-pretend-fullscreen" => state.toggle_fullscreen(FullscreenState::Pretend),
        "toggle-sticky" => state.toggle_sticky(),
        "toggle-always-on-top" => state.toggle_always_on_top(),
        "minimize" => {
            let id = window_arg(state, args)?;
            state.minimize(ws, id)
        }
        "restore" => {
            let id = window_arg(state, args)?;
            state.restore(ws, id)
        }
        "set-layout" => {
            let name = args
                .first()
                .and_then(|a| a.as_str())
                .ok_or("missing layout name")?;
            let layout =
                LayoutKind::from_name(name).ok_or_else(|| format!("unknown layout: {}", name))?;
            state.set_layout(layout)
        }
        "cycle-layout" => state.cycle_layout(),
        "set-master-fraction" => {
            let (value, relative) = fraction_arg(args)?;
            state.set_master_fraction(value, relative)
        }
        "inc-master-count" => state.inc_master_count(int_arg(args, Some(1))?),
        "set-size-factor" => {
            let factor = args
                .first()
                .and_then(|a| a.as_float())
                .ok_or("missing size factor")?;
            if factor <= 0.0 {
                return Err("size factor must be positive".to_string());
            }
            state.set_size_factor(factor as f32)
        }
        "toggle-gaps" => state.toggle_gaps(),
        "toggle-bar" => state.toggle_bar(),
        "toggle-desktop" => state.toggle_desktop(ws),
        "focus-urgent" => state.focus_urgent(ws),
        "spawn" => {
            if args.is_empty() {
                return Err("missing command".to_string());
            }
            state.spawn(args.iter().map(|a| a.to_string()).collect())
        }
        "reload-rules" => {
            let (rules, warnings) = RuleSet::load(rules_path).map_err(|e| format!("{:#}", e))?;
            for warning in &warnings {
                tracing::warn!("Rules: {}", warning);
            }
            state.reload_rules(ws, rules)
        }
        "quit" => {
            tracing::info!("Quit requested");
            vec![Effect::Quit]
        }
        _ => return Err(format!("unknown action: {}", action)),
    };
    Ok(effects)
}

fn client_info(state: &State, c: &Client) -> ClientInfo {
    let window_of = |id: ClientId| state.registry.get(id).map(|p| p.window);
    ClientInfo {
        window: c.window,
        title: c.identity.title.clone(),
        class: c.identity.class.clone(),
        instance: c.identity.instance.clone(),
        role: c.identity.role.clone(),
        tags: c.tags().mask(),
        monitor: c.monitor(),
        x: c.frame.x,
        y: c.frame.y,
        width: c.frame.width,
        height: c.frame.height,
        border: c.attrs.border,
        is_focused: state.focused == Some(c.id),
        is_floating: c.attrs.floating,
        fullscreen: c.attrs.fullscreen.name().to_string(),
        is_sticky: c.attrs.sticky,
        is_urgent: c.attrs.urgent,
        is_hidden: c.attrs.hidden,
        parent: c.parent.and_then(window_of),
        ancestor: window_of(c.ancestor).unwrap_or(c.window),
    }
}

fn list_monitors(state: &State) -> Response {
    let monitors = state
        .registry
        .monitors
        .iter()
        .enumerate()
        .map(|(i, m)| MonitorInfo {
            index: i,
            x: m.screen.x,
            y: m.screen.y,
            width: m.screen.width,
            height: m.screen.height,
            work_x: m.work_area.x,
            work_y: m.work_area.y,
            work_width: m.work_area.width,
            work_height: m.work_area.height,
            tags: m.view().mask(),
            previous_tags: m.previous_view().mask(),
            layout: m.layout().name().to_string(),
            layout_symbol: m.symbol.clone(),
            master_count: m.master_count(),
            master_fraction: m.master_fraction(),
            client_count: state.registry.attach_iter(i).count(),
            is_selected: i == state.selected,
        })
        .collect();
    Response::Monitors { monitors }
}

fn list_tags(state: &State) -> Response {
    let mut tags = Vec::new();
    for (i, m) in state.registry.monitors.iter().enumerate() {
        let clients: Vec<&Client> = state
            .registry
            .attach_iter(i)
            .filter_map(|id| state.registry.get(id))
            .collect();
        for n in 1..=m.tag_count {
            let tag = Tag::new(n);
            tags.push(TagInfo {
                monitor: i,
                tag: n,
                occupied: clients.iter().any(|c| c.tags().intersects(tag)),
                selected: m.view().intersects(tag),
                urgent: clients
                    .iter()
                    .any(|c| c.attrs.urgent && c.tags().intersects(tag)),
            });
        }
    }
    Response::Tags { tags }
}

/// Pure function: processes a command and returns a response with effects.
/// Only state is mutated; effects are executed by the caller.
pub fn process_command<W: WindowSystem>(
    state: &mut State,
    ws: &W,
    cmd: &Command,
    rules_path: &Path,
) -> CommandResult {
    match cmd {
        Command::Run { action, args } => {
            tracing::debug!("Run action {} {:?}", action, args);
            match run_action(state, ws, action, args, rules_path) {
                Ok(effects) => CommandResult::ok_with_effects(effects),
                Err(message) => CommandResult::error(message),
            }
        }
        Command::ListMonitors => CommandResult::with_response(list_monitors(state)),
        Command::ListTags => CommandResult::with_response(list_tags(state)),
        Command::ListLayouts => CommandResult::with_response(Response::Layouts {
            layouts: LayoutKind::ALL
                .iter()
                .map(|k| LayoutInfo {
                    name: k.name().to_string(),
                    symbol: k.symbol().to_string(),
                })
                .collect(),
        }),
        Command::ListClients => CommandResult::with_response(Response::Clients {
            clients: state.registry.iter().map(|c| client_info(state, c)).collect(),
        }),
        Command::DescribeClient { window } => {
            match state
                .client_by_window(*window)
                .and_then(|id| state.registry.get(id))
            {
                Some(c) => CommandResult::with_response(Response::Client {
                    client: client_info(state, c),
                }),
                None => CommandResult::error(format!("no client for window {:#x}", window)),
            }
        }
    }
}
