mod client;
mod server;

use std::path::PathBuf;

pub use client::IpcClient;
pub use server::{IpcRequest, IpcServer};

/// Control socket location: `$XDG_RUNTIME_DIR/fusuma.sock`, or `/tmp`
/// when no runtime directory is set.
pub fn socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("fusuma.sock")
}
