use std::time::Duration;

use crossterm::event::{Event as CrosstermEvent, EventStream, KeyEvent, KeyEventKind};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::AppResult;

/// Terminal events.
#[derive(Clone, Copy, Debug)]
pub enum Event {
    /// Terminal tick, drives the spinners.
    Tick,
    Key(KeyEvent),
    Resize,
}

/// Terminal event handler.
#[derive(Debug)]
pub struct EventHandler {
    receiver: mpsc::UnboundedReceiver<Event>,
    cancel_token: CancellationToken,
}

impl EventHandler {
    /// Starts reading crossterm events, with a tick every `tick_rate` milliseconds.
    pub fn new(tick_rate: u64) -> Self {
        let tick_rate = Duration::from_millis(tick_rate);
        let (sender, receiver) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();
        let task_token = cancel_token.clone();
        tokio::spawn(async move {
            let mut reader = EventStream::new();
            let mut tick = tokio::time::interval(tick_rate);
            loop {
                let event = tokio::select! {
                    _ = task_token.cancelled() => break,
                    _ = tick.tick() => Event::Tick,
                    Some(crossterm_event) = reader.next() => match crossterm_event {
                        Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                            Event::Key(key)
                        }
                        Ok(CrosstermEvent::Resize(_, _)) => Event::Resize,
                        Ok(_) => continue,
                        Err(e) => {
                            error!("Terminal event error: {e}");
                            break;
                        }
                    },
                };
                if sender.send(event).is_err() {
                    break;
                }
            }
        });
        Self {
            receiver,
            cancel_token,
        }
    }

    /// Receive the next event from the handler thread.
    pub async fn next(&mut self) -> AppResult<Event> {
        self.receiver
            .recv()
            .await
            .ok_or_else(|| std::io::Error::other("Terminal event stream closed").into())
    }

    pub fn stop(&self) {
        self.cancel_token.cancel();
    }
}
