mod client;
mod config;
mod geometry;
mod layout;
mod monitor;
mod persist;
mod registry;
mod rules_document;
mod rules_engine;
mod state;
mod tag;

pub use client::*;
pub use config::*;
pub use geometry::*;
pub use layout::*;
pub use monitor::*;
pub use persist::*;
pub use registry::*;
pub use rules_document::*;
pub use rules_engine::*;
pub use state::*;
pub use tag::*;
