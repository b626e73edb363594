use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Invoke a named action with typed arguments
    Run {
        action: String,
        #[serde(default)]
        args: Vec<Arg>,
    },

    // Queries
    ListMonitors,
    ListTags,
    ListLayouts,
    ListClients,
    DescribeClient { window: u32 },
}

/// A typed action argument.
/// Variant order matters for untagged decoding: `1` must decode as Int, not Float.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Arg {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl Arg {
    /// Parse a command-line word into the narrowest matching argument type.
    pub fn parse(s: &str) -> Self {
        if let Ok(b) = s.parse::<bool>() {
            return Arg::Bool(b);
        }
        if let Ok(i) = s.parse::<i64>() {
            return Arg::Int(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return Arg::Float(f);
        }
        Arg::Str(s.to_string())
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Arg::Int(i) => Some(*i),
            Arg::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Arg::Str(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Arg::Int(i) => Some(*i as f64),
            Arg::Float(f) => Some(*f),
            Arg::Str(s) => s.parse().ok(),
            Arg::Bool(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl std::fmt::Display for Arg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arg::Bool(b) => write!(f, "{}", b),
            Arg::Int(i) => write!(f, "{}", i),
            Arg::Float(x) => write!(f, "{}", x),
            Arg::Str(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Ok,
    Error { message: String },
    Monitors { monitors: Vec<MonitorInfo> },
    Tags { tags: Vec<TagInfo> },
    Layouts { layouts: Vec<LayoutInfo> },
    Clients { clients: Vec<ClientInfo> },
    Client { client: ClientInfo },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorInfo {
    pub index: usize,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub work_x: i32,
    pub work_y: i32,
    pub work_width: u32,
    pub work_height: u32,
    pub tags: u32,
    pub previous_tags: u32,
    pub layout: String,
    pub layout_symbol: String,
    pub master_count: u32,
    pub master_fraction: f32,
    pub client_count: usize,
    pub is_selected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagInfo {
    pub monitor: usize,
    /// 1-based tag number
    pub tag: u32,
    pub occupied: bool,
    pub selected: bool,
    pub urgent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutInfo {
    pub name: String,
    pub symbol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub window: u32,
    pub title: String,
    pub class: String,
    pub instance: String,
    pub role: String,
    pub tags: u32,
    pub monitor: usize,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub border: u32,
    pub is_focused: bool,
    pub is_floating: bool,
    pub fullscreen: String,
    pub is_sticky: bool,
    pub is_urgent: bool,
    pub is_hidden: bool,
    pub parent: Option<u32>,
    pub ancestor: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_run_serialization() {
        let cmd = Command::Run {
            action: "view".to_string(),
            args: vec![Arg::Int(4)],
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"type\":\"run\""));
        assert!(json.contains("\"action\":\"view\""));
        assert!(json.contains("\"args\":[4]"));

        let deserialized: Command = serde_json::from_str(&json).unwrap();
        match deserialized {
            Command::Run { action, args } => {
                assert_eq!(action, "view");
                assert_eq!(args, vec![Arg::Int(4)]);
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_command_run_without_args() {
        let cmd: Command = serde_json::from_str("{\"type\":\"run\",\"action\":\"zoom\"}").unwrap();
        match cmd {
            Command::Run { action, args } => {
                assert_eq!(action, "zoom");
                assert!(args.is_empty());
            }
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_untagged_args_keep_their_types() {
        let args: Vec<Arg> = serde_json::from_str("[true, 3, 0.25, \"tile\"]").unwrap();
        assert_eq!(
            args,
            vec![
                Arg::Bool(true),
                Arg::Int(3),
                Arg::Float(0.25),
                Arg::Str("tile".to_string())
            ]
        );
    }

    #[test]
    fn test_arg_parse_from_words() {
        assert_eq!(Arg::parse("false"), Arg::Bool(false));
        assert_eq!(Arg::parse("-1"), Arg::Int(-1));
        assert_eq!(Arg::parse("0.05"), Arg::Float(0.05));
        assert_eq!(Arg::parse("monocle"), Arg::Str("monocle".to_string()));
    }

    #[test]
    fn test_arg_conversions() {
        assert_eq!(Arg::Int(2).as_float(), Some(2.0));
        assert_eq!(Arg::Float(3.0).as_int(), Some(3));
        assert_eq!(Arg::Float(3.5).as_int(), None);
        assert_eq!(Arg::Str("7".to_string()).as_int(), Some(7));
        assert_eq!(Arg::Bool(true).as_str(), None);
    }

    #[test]
    fn test_describe_client_serialization() {
        let cmd = Command::DescribeClient { window: 0x1a00003 };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains("\"type\":\"describe_client\""));
    }

    #[test]
    fn test_response_ok_serialization() {
        let resp = Response::Ok;
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, "{\"type\":\"ok\"}");
    }

    #[test]
    fn test_response_error_serialization() {
        let resp = Response::Error {
            message: "unknown action".to_string(),
        };
        let json = serde_json::to_string(&resp).unwrap();

        let deserialized: Response = serde_json::from_str(&json).unwrap();
        match deserialized {
            Response::Error { message } => assert_eq!(message, "unknown action"),
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn test_response_tags_serialization() {
        let resp = Response::Tags {
            tags: vec![TagInfo {
                monitor: 0,
                tag: 3,
                occupied: true,
                selected: false,
                urgent: true,
            }],
        };
        let json = serde_json::to_string(&resp).unwrap();

        let deserialized: Response = serde_json::from_str(&json).unwrap();
        match deserialized {
            Response::Tags { tags } => {
                assert_eq!(tags.len(), 1);
                assert_eq!(tags[0].tag, 3);
                assert!(tags[0].urgent);
            }
            _ => panic!("Wrong variant"),
        }
    }
}
