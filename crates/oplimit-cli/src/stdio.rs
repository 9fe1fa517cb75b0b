//! Standard input and output as one [`Duplex`] stream.

use std::io;

use async_trait::async_trait;
use oplimit_core::Duplex;
use tokio::io::{AsyncReadExt, AsyncWriteExt, Stdin, Stdout};
use tokio::sync::Mutex;

#[derive(Debug)]
pub struct StdioStream {
    stdin: Mutex<Stdin>,
    stdout: Mutex<Stdout>,
}

impl StdioStream {
    pub fn new() -> Self {
        Self {
            stdin: Mutex::new(tokio::io::stdin()),
            stdout: Mutex::new(tokio::io::stdout()),
        }
    }
}

#[async_trait]
impl Duplex for StdioStream {
    async fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.stdin.lock().await.read(buf).await
    }

    async fn write(&self, buf: &[u8]) -> io::Result<usize> {
        let mut stdout = self.stdout.lock().await;
        let n = stdout.write(buf).await?;
        stdout.flush().await?;
        Ok(n)
    }

    async fn close(&self) -> io::Result<()> {
        self.stdout.lock().await.flush().await
    }
}
