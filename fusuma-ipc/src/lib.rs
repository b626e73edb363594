pub mod command;
pub mod frame;

pub use command::{
    Arg, ClientInfo, Command, LayoutInfo, MonitorInfo, Response, TagInfo,
};
pub use frame::{decode, encode, read_frame, write_frame, FrameError, MAX_FRAME_LEN};
