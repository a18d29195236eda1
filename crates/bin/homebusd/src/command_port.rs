//! TCP command port.
//!
//! Each connection gets its own [`CommandLineExecutor`]; every line read is
//! executed and answered with one reply line. A session that sent
//! `subscribe` also receives every dispatched event, rendered as a command
//! line, through a final event listener registered for the connection.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use homebus_app::ports::FinalEventListener;
use homebus_app::server::HomeServer;
use homebus_app::services::command_line::CommandLineExecutor;
use homebus_domain::event::Event;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Lines that may wait for a slow client before forwarded events are dropped.
const OUTBOX_CAPACITY: usize = 256;

/// Accept connections until the task is cancelled.
///
/// # Errors
///
/// Returns an error when accepting fails.
pub async fn serve(listener: TcpListener, server: Arc<HomeServer>) -> io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        tracing::debug!(%peer, "command session opened");
        let server = Arc::clone(&server);
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, server).await {
                tracing::warn!(%peer, error = %err, "command session failed");
            }
            tracing::debug!(%peer, "command session closed");
        });
    }
}

/// Forwards dispatched events to a subscribed session.
///
/// Runs on the dispatcher thread, so it never waits: when the session's
/// outbox is full the event is dropped for that session.
struct EventForwarder {
    subscribed: Arc<AtomicBool>,
    outbox: mpsc::Sender<String>,
}

impl FinalEventListener for EventForwarder {
    fn receive_final_event(&self, event: &Event, _handled: bool) {
        if !self.subscribed.load(Ordering::Acquire) {
            return;
        }
        match self.outbox.try_send(event.to_string()) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    event_type = event.event_type(),
                    "command session outbox full, dropping event"
                );
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, server: Arc<HomeServer>) -> io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let (outbox, mut pending) = mpsc::channel::<String>(OUTBOX_CAPACITY);

    let executor = CommandLineExecutor::new(Arc::clone(&server));
    let forwarder: Arc<dyn FinalEventListener> = Arc::new(EventForwarder {
        subscribed: executor.subscription(),
        outbox: outbox.clone(),
    });
    server.register_final_listener(Arc::clone(&forwarder));

    let writer_task = tokio::spawn(async move {
        while let Some(line) = pending.recv().await {
            writer.write_all(line.as_bytes()).await?;
            writer.write_all(b"\n").await?;
        }
        writer.shutdown().await
    });

    let result = loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break Ok(()),
            Err(err) => break Err(err),
        };
        let session = executor.clone();
        match tokio::task::spawn_blocking(move || session.execute(&line)).await {
            Ok(Some(reply)) => {
                if outbox.send(reply).await.is_err() {
                    break Ok(());
                }
            }
            Ok(None) => break Ok(()),
            Err(err) => break Err(io::Error::other(err)),
        }
    };

    server.unregister_final_listener(&forwarder);
    drop(forwarder);
    drop(outbox);
    match writer_task.await {
        Ok(written) => result.and(written),
        Err(err) => Err(io::Error::other(err)),
    }
}
