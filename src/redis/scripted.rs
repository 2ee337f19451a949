//! Scripted RESP server for tests
//!
//! Listens on an ephemeral local port, parses each command the client sends
//! and writes back whatever the script returns. A script returning `None`
//! leaves the command unanswered, which is how timeouts are produced.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

type Script = Arc<dyn Fn(&[String]) -> Option<String> + Send + Sync>;

pub(crate) struct ScriptedServer {
    addr: SocketAddr,
    accept: JoinHandle<()>,
}

impl ScriptedServer {
    pub(crate) async fn start<F>(script: F) -> Self
    where
        F: Fn(&[String]) -> Option<String> + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let script: Script = Arc::new(script);

        let accept = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve(socket, Arc::clone(&script)));
            }
        });

        Self { addr, accept }
    }

    pub(crate) fn url(&self) -> String {
        format!("redis://{}", self.addr)
    }
}

impl Drop for ScriptedServer {
    fn drop(&mut self) {
        self.accept.abort();
    }
}

/// Answers the `CLIENT SETINFO` pair redis-rs sends on connect
pub(crate) fn handshake(command: &[String]) -> Option<String> {
    match command.first().map(String::as_str) {
        Some("CLIENT") | Some("SELECT") | Some("AUTH") => Some("+OK\r\n".to_string()),
        _ => None,
    }
}

async fn serve(socket: TcpStream, script: Script) {
    let (read, mut write) = socket.into_split();
    let mut reader = BufReader::new(read);

    while let Some(command) = read_command(&mut reader).await {
        if let Some(reply) = script(&command) {
            if write.write_all(reply.as_bytes()).await.is_err() {
                return;
            }
        }
    }
}

/// Read one `*<n>` array of bulk strings
async fn read_command<R: AsyncBufRead + Unpin>(reader: &mut R) -> Option<Vec<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line).await.ok()? == 0 {
        return None;
    }
    let count: usize = line.trim_end().strip_prefix('*')?.parse().ok()?;

    let mut args = Vec::with_capacity(count);
    for _ in 0..count {
        line.clear();
        reader.read_line(&mut line).await.ok()?;
        let len: usize = line.trim_end().strip_prefix('$')?.parse().ok()?;

        let mut buf = vec![0; len + 2];
        reader.read_exact(&mut buf).await.ok()?;
        buf.truncate(len);
        args.push(String::from_utf8(buf).ok()?);
    }
    Some(args)
}
