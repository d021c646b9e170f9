//! Reference spreadsheet endpoint: accepts grid writes over HTTP and keeps
//! the sheets in memory.

pub mod book;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;

pub use book::{BookError, SheetBook, WriteSummary};
pub use routes::router;

/// HTTP server wrapping a [`SheetBook`].
pub struct EndpointServer {
    book: Arc<SheetBook>,
}

impl EndpointServer {
    pub fn new(book: SheetBook) -> Self {
        Self {
            book: Arc::new(book),
        }
    }

    pub fn book(&self) -> Arc<SheetBook> {
        self.book.clone()
    }

    /// Bind `addr` and serve until the process exits.
    pub async fn run(&self, addr: &str) -> anyhow::Result<()> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(&self, listener: TcpListener) -> anyhow::Result<()> {
        let local: SocketAddr = listener.local_addr()?;
        tracing::info!(
            "reference endpoint listening on http://{local} ({})",
            if self.book.is_strict() { "strict" } else { "open" }
        );
        axum::serve(listener, router(self.book.clone()))
            .await
            .context("endpoint server failed")?;
        Ok(())
    }
}
