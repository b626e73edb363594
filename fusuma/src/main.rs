mod app;
mod core;
mod effect;
mod event;
mod ipc;
mod platform;
mod proc;
mod x11;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use argh::FromArgs;
use ipc::IpcClient;
use tracing_subscriber::EnvFilter;
use fusuma_ipc::{Arg, Command, Response};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Fusuma - tag-based X11 tiling window manager
#[derive(FromArgs)]
struct Cli {
    /// rules document (default: $XDG_CONFIG_HOME/fusuma/rules.json)
    #[argh(option, short = 'r')]
    rules: Option<PathBuf>,
    /// layout document (default: $XDG_CONFIG_HOME/fusuma/layout.json)
    #[argh(option, short = 'l')]
    layout: Option<PathBuf>,
    /// ignore urgency hints set by clients
    #[argh(switch)]
    no_urgent: bool,
    /// do not start a system tray
    #[argh(switch)]
    no_tray: bool,
    /// print every recognised configuration key and action, then exit
    #[argh(switch)]
    print_keys: bool,
    /// show version information
    #[argh(switch)]
    version: bool,
    #[argh(subcommand)]
    command: Option<SubCommand>,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum SubCommand {
    Run(RunCmd),
    Query(QueryCmd),
}

/// Run a named action in the running instance
#[derive(FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCmd {
    /// action name (see --print-keys)
    #[argh(positional)]
    action: String,
    /// action arguments
    #[argh(positional, greedy)]
    args: Vec<String>,
}

/// Query the running instance
#[derive(FromArgs)]
#[argh(subcommand, name = "query")]
struct QueryCmd {
    /// one of monitors, tags, layouts, clients, client
    #[argh(positional)]
    what: String,
    /// window id for `client` (decimal or 0x hex)
    #[argh(positional)]
    window: Option<String>,
}

fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    if cli.version {
        println!("fusuma {}", VERSION);
        return Ok(());
    }
    if cli.print_keys {
        print_keys();
        return Ok(());
    }

    match cli.command {
        Some(subcmd) => run_cli(subcmd),
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::from_default_env())
                .init();

            tracing::info!("fusuma {} starting", VERSION);
            if cli.no_tray {
                tracing::debug!("Tray disabled");
            }
            app::App::run(app::Options {
                rules: cli.rules.unwrap_or_else(core::default_rules_path),
                layout: cli.layout.unwrap_or_else(core::default_layout_path),
                urgency_hints: !cli.no_urgent,
            })
        }
    }
}

fn print_keys() {
    println!("# layout document");
    for key in core::LAYOUT_KEYS {
        println!("{}", key);
    }
    for key in core::TAG_KEYS {
        println!("tags.<n>.{}", key);
    }
    println!("# rules document");
    for key in core::rule_keys() {
        println!("{}", key);
    }
    println!("# actions");
    for action in app::ACTIONS {
        println!("{}", action);
    }
}

fn run_cli(subcmd: SubCommand) -> Result<()> {
    let cmd = to_command(subcmd)?;
    let mut client = IpcClient::connect()?;
    let response = client.send(&cmd)?;

    match response {
        Response::Ok => {}
        Response::Error { message } => {
            eprintln!("Error: {}", message);
            std::process::exit(1);
        }
        Response::Monitors { monitors } => {
            for m in monitors {
                println!(
                    "{}: {}x{} @ ({},{}) tags={:#x} {} {} [{}]{}",
                    m.index,
                    m.width,
                    m.height,
                    m.x,
                    m.y,
                    m.tags,
                    m.layout,
                    m.layout_symbol,
                    m.client_count,
                    if m.is_selected { " *" } else { "" }
                );
            }
        }
        Response::Tags { tags } => {
            for t in tags {
                let mut flags = Vec::new();
                if t.selected {
                    flags.push("selected");
                }
                if t.occupied {
                    flags.push("occupied");
                }
                if t.urgent {
                    flags.push("urgent");
                }
                println!("{}:{} {}", t.monitor, t.tag, flags.join(","));
            }
        }
        Response::Layouts { layouts } => {
            for l in layouts {
                println!("{} {}", l.symbol, l.name);
            }
        }
        Response::Clients { clients } => {
            for c in clients {
                println!(
                    "{:#x}: {} - {} [tags={:#x}, mon={}, {}x{} @ ({},{})]{}",
                    c.window,
                    c.class,
                    c.title,
                    c.tags,
                    c.monitor,
                    c.width,
                    c.height,
                    c.x,
                    c.y,
                    if c.is_focused { " *" } else { "" }
                );
            }
        }
        Response::Client { client } => {
            println!("{}", serde_json::to_string_pretty(&client)?);
        }
    }

    Ok(())
}

fn to_command(subcmd: SubCommand) -> Result<Command> {
    match subcmd {
        SubCommand::Run(cmd) => Ok(Command::Run {
            action: cmd.action,
            args: cmd.args.iter().map(|word| parse_arg(word)).collect(),
        }),
        SubCommand::Query(cmd) => match cmd.what.as_str() {
            "monitors" => Ok(Command::ListMonitors),
            "tags" => Ok(Command::ListTags),
            "layouts" => Ok(Command::ListLayouts),
            "clients" => Ok(Command::ListClients),
            "client" => {
                let Some(window) = cmd.window else {
                    bail!("Usage: query client <window>");
                };
                Ok(Command::DescribeClient {
                    window: parse_window(&window)?,
                })
            }
            other => bail!(
                "Unknown query: {} (use monitors, tags, layouts, clients or client)",
                other
            ),
        },
    }
}

/// Words with a leading `+` stay strings so relative adjustments keep
/// their sign.
fn parse_arg(word: &str) -> Arg {
    if word.starts_with('+') {
        Arg::Str(word.to_string())
    } else {
        Arg::parse(word)
    }
}

fn parse_window(s: &str) -> Result<u32> {
    let parsed = match s.strip_prefix("0x") {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    };
    parsed.with_context(|| format!("Invalid window id: {}", s))
}
