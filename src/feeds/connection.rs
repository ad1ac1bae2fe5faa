//! WebSocket connection registry.
//!
//! Owns the live sockets so the trading core never has to: one task per
//! venue, auto-reconnect with exponential backoff, application- and
//! protocol-level keepalive, and raw-frame push into the [`FeedSink`].
//! The core reaches back in through exactly one seam - `RefreshRequester`
//! - which forces every venue connection to drop and redial.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::time::{interval, sleep};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::arbitrage::RefreshRequester;
use crate::models::RawFrame;

use super::{FeedSink, VenueAdapter};

const PING_INTERVAL: Duration = Duration::from_secs(5);
const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(1);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Default)]
pub struct ConnectionRegistry {
    refresh_signals: Mutex<Vec<Arc<Notify>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Spawn the connection worker for one venue. The task lives for the
    /// session; every disconnect (or refresh request) redials.
    pub fn spawn(
        &self,
        adapter: Arc<dyn VenueAdapter>,
        symbols: Vec<String>,
        sink: Arc<dyn FeedSink>,
    ) {
        let refresh = Arc::new(Notify::new());
        self.refresh_signals.lock().push(refresh.clone());

        tokio::spawn(async move {
            let mut reconnect_delay = RECONNECT_BASE_DELAY;
            loop {
                match connect_and_stream(&*adapter, &symbols, &*sink, &refresh).await {
                    Ok(_) => {
                        reconnect_delay = RECONNECT_BASE_DELAY;
                    }
                    Err(e) => {
                        warn!(
                            venue = %adapter.info().name,
                            error = %e,
                            "feed disconnected; reconnecting"
                        );
                        sleep(reconnect_delay).await;
                        reconnect_delay = (reconnect_delay * 2).min(RECONNECT_MAX_DELAY);
                    }
                }
            }
        });
    }
}

impl RefreshRequester for ConnectionRegistry {
    fn request_refresh(&self) {
        info!("🔄 Refresh requested; redialing venue connections");
        for signal in self.refresh_signals.lock().iter() {
            signal.notify_waiters();
        }
    }
}

async fn connect_and_stream(
    adapter: &dyn VenueAdapter,
    symbols: &[String],
    sink: &dyn FeedSink,
    refresh: &Notify,
) -> Result<()> {
    let venue = adapter.venue();
    let url = adapter.ws_url();
    info!(venue = %adapter.info().name, "🔌 Connecting feed");
    let (ws_stream, resp) = connect_async(&url)
        .await
        .with_context(|| format!("connect_async {url}"))?;
    info!(
        venue = %adapter.info().name,
        status = %resp.status(),
        "✅ Feed connected"
    );

    let (mut write, mut read) = ws_stream.split();

    for frame in adapter.subscribe_frames(symbols) {
        write
            .send(Message::Text(frame))
            .await
            .context("send subscription")?;
    }

    let mut ping = interval(PING_INTERVAL);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ping.tick() => {
                match adapter.ping_frame() {
                    Some(frame) => { let _ = write.send(Message::Text(frame)).await; }
                    None => { let _ = write.send(Message::Ping(Vec::new())).await; }
                }
            }
            _ = refresh.notified() => {
                debug!(venue = ?venue, "refresh signal; dropping connection");
                return Ok(());
            }
            ws_msg = read.next() => {
                let Some(ws_msg) = ws_msg else {
                    return Err(anyhow::anyhow!("feed stream ended"));
                };

                match ws_msg {
                    Ok(Message::Text(text)) => {
                        // Venue-level keepalive text frames are echoed,
                        // never parsed as data.
                        if text.eq_ignore_ascii_case("ping") {
                            let _ = write.send(Message::Text("PONG".to_string())).await;
                        } else {
                            sink.on_frame(venue, RawFrame::Text(text));
                        }
                    }
                    Ok(Message::Binary(bytes)) => {
                        sink.on_frame(venue, RawFrame::Binary(bytes));
                    }
                    Ok(Message::Ping(payload)) => {
                        let _ = write.send(Message::Pong(payload)).await;
                    }
                    Ok(Message::Close(frame)) => {
                        debug!(venue = ?venue, ?frame, "feed close frame");
                        return Ok(());
                    }
                    Ok(_) => {}
                    Err(e) => {
                        return Err(anyhow::anyhow!("feed stream error: {e}"));
                    }
                }
            }
        }
    }
}
