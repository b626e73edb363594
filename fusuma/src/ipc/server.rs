use std::io::Write;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::PathBuf;
use std::sync::{mpsc as std_mpsc, Arc};

use anyhow::{Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::OwnedReadHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::oneshot;

use fusuma_ipc::{Command, Response, MAX_FRAME_LEN};

/// A decoded command and the channel its response goes back on.
pub type IpcRequest = (Command, oneshot::Sender<Response>);

/// Accepts control connections and forwards each framed command to the
/// main loop, writing one byte to `waker` so its poll returns.
pub struct IpcServer {
    socket_path: PathBuf,
    cmd_tx: std_mpsc::Sender<IpcRequest>,
    waker: Arc<StdUnixStream>,
}

impl IpcServer {
    pub fn new(
        socket_path: PathBuf,
        cmd_tx: std_mpsc::Sender<IpcRequest>,
        waker: StdUnixStream,
    ) -> Self {
        Self {
            socket_path,
            cmd_tx,
            waker: Arc::new(waker),
        }
    }

    pub fn bind(&self) -> Result<UnixListener> {
        // A stale socket from a previous instance
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)
                .with_context(|| format!("Failed to remove {:?}", self.socket_path))?;
        }
        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("Failed to bind {:?}", self.socket_path))?;
        tracing::info!("IPC server listening on {:?}", self.socket_path);
        Ok(listener)
    }

    pub async fn run(&self) -> Result<()> {
        let listener = self.bind()?;
        self.serve(listener).await
    }

    pub async fn serve(&self, listener: UnixListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    let cmd_tx = self.cmd_tx.clone();
                    let waker = Arc::clone(&self.waker);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, cmd_tx, waker).await {
                            tracing::error!("Connection error: {:#}", e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Accept error: {}", e);
                }
            }
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Read one frame. `None` on a clean close between frames.
async fn read_request(reader: &mut OwnedReadHalf) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_FRAME_LEN {
        anyhow::bail!("frame of {} bytes exceeds limit", len);
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

fn wake(waker: &StdUnixStream) {
    let mut stream = waker;
    match stream.write_all(&[1]) {
        Ok(_) => {}
        // Loop already has a wakeup pending
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {}
        Err(e) => tracing::warn!("Failed to wake main loop: {}", e),
    }
}

async fn forward(
    cmd: Command,
    cmd_tx: &std_mpsc::Sender<IpcRequest>,
    waker: &StdUnixStream,
) -> Response {
    let (resp_tx, resp_rx) = oneshot::channel();
    if cmd_tx.send((cmd, resp_tx)).is_err() {
        return Response::Error {
            message: "Internal error: command channel closed".to_string(),
        };
    }
    wake(waker);
    resp_rx.await.unwrap_or(Response::Error {
        message: "Internal error: no response".to_string(),
    })
}

async fn handle_connection(
    stream: UnixStream,
    cmd_tx: std_mpsc::Sender<IpcRequest>,
    waker: Arc<StdUnixStream>,
) -> Result<()> {
    let (mut reader, mut writer) = stream.into_split();

    while let Some(payload) = read_request(&mut reader).await? {
        let response = match fusuma_ipc::decode::<Command>(&payload) {
            Ok(cmd) => {
                tracing::debug!("Received command: {:?}", cmd);
                forward(cmd, &cmd_tx, &waker).await
            }
            Err(e) => Response::Error {
                message: format!("Invalid command: {}", e),
            },
        };
        writer.write_all(&fusuma_ipc::encode(&response)?).await?;
        writer.flush().await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::IpcClient;
    use std::io::Read;

    #[tokio::test(flavor = "multi_thread")]
    async fn test_round_trip_through_main_loop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fusuma.sock");
        let (cmd_tx, cmd_rx) = std_mpsc::channel::<IpcRequest>();
        let (mut wake_rx, wake_tx) = StdUnixStream::pair().unwrap();

        let server = IpcServer::new(path.clone(), cmd_tx, wake_tx);
        let listener = server.bind().unwrap();
        tokio::spawn(async move {
            let _ = server.serve(listener).await;
        });

        // Stand-in for the main loop
        std::thread::spawn(move || {
            let mut byte = [0u8; 1];
            while wake_rx.read_exact(&mut byte).is_ok() {
                while let Ok((cmd, resp_tx)) = cmd_rx.try_recv() {
                    let response = match cmd {
                        Command::ListLayouts => Response::Layouts { layouts: vec![] },
                        _ => Response::Ok,
                    };
                    let _ = resp_tx.send(response);
                }
            }
        });

        let response = tokio::task::spawn_blocking(move || {
            let mut client = IpcClient::connect_to(&path).unwrap();
            let first = client.send(&Command::ListLayouts).unwrap();
            let second = client.send(&Command::ListClients).unwrap();
            (first, second)
        })
        .await
        .unwrap();

        assert!(matches!(response.0, Response::Layouts { .. }));
        assert!(matches!(response.1, Response::Ok));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_payload_gets_error_response() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fusuma.sock");
        let (cmd_tx, _cmd_rx) = std_mpsc::channel::<IpcRequest>();
        let (_wake_rx, wake_tx) = StdUnixStream::pair().unwrap();

        let server = IpcServer::new(path.clone(), cmd_tx, wake_tx);
        let listener = server.bind().unwrap();
        tokio::spawn(async move {
            let _ = server.serve(listener).await;
        });

        let response = tokio::task::spawn_blocking(move || {
            use std::io::Write as _;
            let mut stream = std::os::unix::net::UnixStream::connect(&path).unwrap();
            let payload = b"{\"type\":\"fly\"}";
            stream
                .write_all(&(payload.len() as u32).to_be_bytes())
                .unwrap();
            stream.write_all(payload).unwrap();
            let reply = fusuma_ipc::read_frame(&mut stream).unwrap();
            fusuma_ipc::decode::<Response>(&reply).unwrap()
        })
        .await
        .unwrap();

        match response {
            Response::Error { message } => assert!(message.starts_with("Invalid command")),
            _ => panic!("Wrong variant"),
        }
    }
}
