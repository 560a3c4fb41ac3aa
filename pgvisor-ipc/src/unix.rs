use crate::{AdminRequest, AdminResponse, MAX_FRAME_LEN, handle_request};
use pgvisor_core::{AdminControl, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

pub struct AdminServer {
    listener: UnixListener,
    path: PathBuf,
}

impl AdminServer {
    /// Binds `path`, replacing a stale socket left by an earlier run.
    pub async fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let _ = std::fs::remove_file(&path);

        let listener = UnixListener::bind(&path)?;
        info!("Admin socket listening on {}", path.display());
        Ok(Self { listener, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn accept(&self) -> Result<AdminConnection> {
        let (stream, _) = self.listener.accept().await?;
        Ok(AdminConnection { stream })
    }

    /// Accepts connections until the task is dropped; each connection is
    /// served on its own task and may carry any number of requests.
    pub async fn serve(self, control: Arc<dyn AdminControl>) -> Result<()> {
        loop {
            let mut conn = self.accept().await?;
            let control = Arc::clone(&control);

            tokio::spawn(async move {
                if let Err(e) = conn.serve(control.as_ref()).await {
                    warn!("Admin connection failed: {}", e);
                }
            });
        }
    }
}

impl Drop for AdminServer {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

pub struct AdminConnection {
    stream: UnixStream,
}

impl AdminConnection {
    /// The next request, or `None` once the client hung up.
    pub async fn recv(&mut self) -> Result<Option<AdminRequest>> {
        read_frame(&mut self.stream).await
    }

    pub async fn send(&mut self, response: &AdminResponse) -> Result<()> {
        write_frame(&mut self.stream, response).await
    }

    async fn serve(&mut self, control: &dyn AdminControl) -> Result<()> {
        while let Some(request) = self.recv().await? {
            debug!("Admin request: {:?}", request);
            let response = handle_request(control, &request);
            self.send(&response).await?;
        }
        Ok(())
    }
}

pub struct AdminClient {
    stream: UnixStream,
}

impl AdminClient {
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let stream = UnixStream::connect(path).await?;
        Ok(Self { stream })
    }

    pub async fn send(&mut self, request: &AdminRequest) -> Result<()> {
        write_frame(&mut self.stream, request).await
    }

    pub async fn recv(&mut self) -> Result<AdminResponse> {
        read_frame(&mut self.stream).await?.ok_or_else(|| {
            io::Error::new(io::ErrorKind::UnexpectedEof, "admin socket closed").into()
        })
    }

    pub async fn request(&mut self, request: &AdminRequest) -> Result<AdminResponse> {
        self.send(request).await?;
        self.recv().await
    }
}

async fn write_frame<T: Serialize>(stream: &mut UnixStream, msg: &T) -> Result<()> {
    let data = serde_json::to_vec(msg)?;
    let len = u32::try_from(data.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_LEN)
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "admin frame too large")
        })?;

    stream.write_u32(len).await?;
    stream.write_all(&data).await?;
    stream.flush().await?;
    Ok(())
}

async fn read_frame<T: DeserializeOwned>(stream: &mut UnixStream) -> Result<Option<T>> {
    let len = match stream.read_u32().await {
        Ok(len) => len,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if len > MAX_FRAME_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("admin frame of {} bytes exceeds limit", len),
        )
        .into());
    }

    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf).await?;
    Ok(Some(serde_json::from_slice(&buf)?))
}
