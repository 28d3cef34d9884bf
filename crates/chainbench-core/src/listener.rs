//! Websocket chain listener: turns a block-header stream into a TPS
//! estimate and decides when a run is drained.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::error::{CoreError, Result};
use crate::limiter::RateLimiter;
use crate::window::{evaluate_active_window, BestObservation, BlockInfo, BlockWindow};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The drain condition: active-window total tx below this floor counts as
/// "nothing left to measure".
const MIN_ACTIVE_TX: i64 = 100;

/// Connection/subscription lifecycle of a [`ChainListener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// No socket open yet.
    Disconnected,
    /// Socket handshake in progress.
    Connecting,
    /// Subscribed to `newHeads`, actively processing frames.
    Subscribed,
    /// Socket closed; terminal state.
    Closed,
}

/// One of the three shapes an inbound websocket frame can take, or a shape
/// the listener doesn't recognize.
#[derive(Debug)]
enum InboundFrame {
    NewHeadNotification { block_number_hex: String },
    BlockBodyResponse { tx_count: usize },
    LogsResponse { log_count: usize },
    Unknown,
}

fn classify_frame(value: &Value) -> InboundFrame {
    if value.get("method").and_then(Value::as_str) == Some("eth_subscription") {
        if let Some(number) = value.pointer("/params/result/number").and_then(Value::as_str) {
            return InboundFrame::NewHeadNotification { block_number_hex: number.to_string() };
        }
        return InboundFrame::Unknown;
    }

    if let Some(result) = value.get("result") {
        if let Some(transactions) = result.get("transactions").and_then(Value::as_array) {
            return InboundFrame::BlockBodyResponse { tx_count: transactions.len() };
        }
        if let Some(logs) = result.as_array() {
            return InboundFrame::LogsResponse { log_count: logs.len() };
        }
    }

    InboundFrame::Unknown
}

fn parse_hex_i64(hex: &str) -> Option<i64> {
    i64::from_str_radix(hex.trim_start_matches("0x"), 16).ok()
}

/// Lock a mutex, recovering the inner value on poison rather than
/// propagating the panic that poisoned it — a listener frame handler
/// keeps processing the next frame even if a previous one panicked.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Websocket subscriber that tracks new block headers, maintains a rolling
/// TPS window, and feeds budget increases back into the rate limiter.
pub struct ChainListener {
    ws_url: String,
    limiter: Option<Arc<dyn RateLimiter>>,
    state: Mutex<ListenerState>,
    window: Mutex<BlockWindow>,
    best: Mutex<BestObservation>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ChainListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainListener")
            .field("ws_url", &self.ws_url)
            .field("state", &*lock(&self.state))
            .finish()
    }
}

impl ChainListener {
    /// Build a listener for `ws_url`. The listener does not connect until
    /// [`ChainListener::run`] is called.
    #[must_use]
    pub fn new(ws_url: impl Into<String>, limiter: Option<Arc<dyn RateLimiter>>) -> Self {
        Self {
            ws_url: ws_url.into(),
            limiter,
            state: Mutex::new(ListenerState::Disconnected),
            window: Mutex::new(BlockWindow::new()),
            best: Mutex::new(BestObservation::new()),
            cancel: CancellationToken::new(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ListenerState {
        *lock(&self.state)
    }

    /// The best TPS observed so far (monotonic over the run).
    #[must_use]
    pub fn best(&self) -> BestObservation {
        *lock(&self.best)
    }

    /// A handle callers can `.cancelled().await` to learn when the
    /// listener has decided to shut down. Preserves the source's `quit`
    /// signal, which was previously closed but never observed elsewhere.
    #[must_use]
    pub fn shutdown_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Connect, subscribe to `newHeads`, and process frames until the
    /// drain condition fires or the socket closes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Connect`] or [`CoreError::InvalidUrl`] if the
    /// initial connection cannot be established. Once subscribed, frame
    /// errors are logged and do not propagate.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<()> {
        *lock(&self.state) = ListenerState::Connecting;

        url::Url::parse(&self.ws_url).map_err(|e| CoreError::InvalidUrl(e.to_string()))?;
        let (mut stream, _) =
            connect_async(&self.ws_url).await.map_err(|e| CoreError::Connect(e.to_string()))?;

        let subscribe = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_subscribe",
            "params": ["newHeads"],
        });
        stream
            .send(Message::Text(subscribe.to_string().into()))
            .await
            .map_err(|e| CoreError::Connect(e.to_string()))?;

        *lock(&self.state) = ListenerState::Subscribed;
        info!("Subscribed to newHeads");

        self.reader_loop(stream).await;
        Ok(())
    }

    async fn reader_loop(&self, mut stream: WsStream) {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    debug!("Listener cancelled externally");
                    break;
                }
                frame = stream.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if self.handle_frame(&mut stream, &text).await {
                                break;
                            }
                        }
                        Some(Ok(_)) => {} // ignore ping/pong/binary/close frames
                        Some(Err(e)) => {
                            debug!(error = %e, "Socket read error, exiting reader");
                            break;
                        }
                        None => {
                            debug!("Socket closed by peer");
                            break;
                        }
                    }
                }
            }
        }

        self.close();
    }

    /// Process one text frame. Returns `true` if the drain condition fired
    /// and the caller should stop reading.
    async fn handle_frame(&self, stream: &mut WsStream, text: &str) -> bool {
        let value: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Failed to decode frame as JSON, skipping");
                return false;
            }
        };

        match classify_frame(&value) {
            InboundFrame::NewHeadNotification { block_number_hex } => {
                self.on_new_head(stream, &block_number_hex).await;
                false
            }
            InboundFrame::BlockBodyResponse { tx_count } => self.on_block_body(&value, tx_count),
            InboundFrame::LogsResponse { log_count } => {
                if log_count > 0 {
                    info!(log_count, "Received logs");
                }
                false
            }
            InboundFrame::Unknown => false,
        }
    }

    async fn on_new_head(&self, stream: &mut WsStream, block_number_hex: &str) {
        let get_block = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_getBlockByNumber",
            "params": [block_number_hex, false],
        });
        if let Err(e) = stream.send(Message::Text(get_block.to_string().into())).await {
            warn!(error = %e, "Failed to request block body");
        }

        let get_logs = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_getLogs",
            "params": [{"fromBlock": block_number_hex, "toBlock": block_number_hex}],
        });
        if let Err(e) = stream.send(Message::Text(get_logs.to_string().into())).await {
            warn!(error = %e, "Failed to request logs");
        }
    }

    /// Returns `true` if the drain condition fired.
    fn on_block_body(&self, value: &Value, tx_count: usize) -> bool {
        let Some(result) = value.get("result") else { return false };

        let (Some(time_s), Some(gas_used), Some(gas_limit)) = (
            result.get("timestamp").and_then(Value::as_str).and_then(parse_hex_i64),
            result.get("gasUsed").and_then(Value::as_str).and_then(parse_hex_i64),
            result.get("gasLimit").and_then(Value::as_str).and_then(parse_hex_i64),
        ) else {
            warn!("Block body response missing expected hex fields, skipping");
            return false;
        };

        let tx_count = tx_count as i64;
        println!("TxCount: {tx_count} GasUsed: {gas_used} GasLimit: {gas_limit}");

        if let Some(limiter) = &self.limiter {
            limiter.increase_limit(tx_count as usize);
        }

        let mut window = lock(&self.window);
        window.push(BlockInfo { time_s, tx_count, gas_used, gas_limit });

        let Some(sample) = evaluate_active_window(&window) else { return false };

        let mut best = lock(&self.best);
        best.observe(sample);

        println!("TPS: {} GasUsed%: {:.2}%", sample.tps, sample.gas_ratio * 100.0);

        if sample.total_tx < MIN_ACTIVE_TX || window.trailing_three_are_empty() {
            println!("Best TPS: {} GasUsed%: {:.2}%", best.best_tps, best.gas_used_ratio_at_best * 100.0);
            return true;
        }

        false
    }

    /// Close the listener and signal shutdown. Idempotent.
    pub fn close(&self) {
        let mut state = lock(&self.state);
        if *state == ListenerState::Closed {
            return;
        }
        *state = ListenerState::Closed;
        drop(state);
        self.cancel.cancel();
    }
}
