use std::os::unix::net::UnixStream;
use std::path::Path;

use anyhow::{Context, Result};

use fusuma_ipc::{Command, Response};

pub struct IpcClient {
    stream: UnixStream,
}

impl IpcClient {
    pub fn connect() -> Result<Self> {
        Self::connect_to(&super::socket_path())
    }

    pub fn connect_to(path: &Path) -> Result<Self> {
        let stream = UnixStream::connect(path)
            .with_context(|| format!("Failed to connect to fusuma at {:?}", path))?;
        Ok(Self { stream })
    }

    pub fn send(&mut self, cmd: &Command) -> Result<Response> {
        fusuma_ipc::write_frame(&mut self.stream, cmd)?;
        let payload = fusuma_ipc::read_frame(&mut self.stream)?;
        let response = fusuma_ipc::decode(&payload)?;
        Ok(response)
    }
}
