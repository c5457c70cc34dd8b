//! Binance Combined Stream Client
//!
//! Opens one WebSocket connection carrying an aggregate trade stream per
//! symbol and exposes it as a [`FeedSession`]. Reconnection is not handled
//! here; the connection supervisor owns that loop.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{FeedConnector, FeedError, FeedFrame, FeedSession};
use crate::domain::supervisor::Termination;

/// Default public market data endpoint.
pub const DEFAULT_BASE_URL: &str = "wss://stream.binance.com:9443";

/// Per-symbol stream suffix.
const AGG_TRADE_SUFFIX: &str = "@aggTrade";

/// Stream name for a symbol, e.g. `btcusdt@aggTrade`.
#[must_use]
pub fn stream_name(symbol: &str) -> String {
    format!("{}{AGG_TRADE_SUFFIX}", symbol.trim().to_lowercase())
}

/// Combined stream URL for a set of symbols.
#[must_use]
pub fn stream_url(base_url: &str, symbols: &[String]) -> String {
    let streams: Vec<String> = symbols.iter().map(|s| stream_name(s)).collect();
    format!(
        "{}/stream?streams={}",
        base_url.trim_end_matches('/'),
        streams.join("/")
    )
}

/// Binance feed connector configuration.
#[derive(Debug, Clone)]
pub struct BinanceClientConfig {
    /// WebSocket base URL.
    pub base_url: String,
    /// Bound on the WebSocket handshake.
    pub connect_timeout: Duration,
}

impl Default for BinanceClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Connects to the Binance combined stream.
#[derive(Debug, Clone)]
pub struct BinanceFeedConnector {
    config: BinanceClientConfig,
}

impl BinanceFeedConnector {
    /// Create a connector.
    #[must_use]
    pub const fn new(config: BinanceClientConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl FeedConnector for BinanceFeedConnector {
    async fn connect(&self, symbols: &[String]) -> Result<Box<dyn FeedSession>, FeedError> {
        if symbols.is_empty() {
            return Err(FeedError::NoSymbols);
        }

        let url = stream_url(&self.config.base_url, symbols);
        tracing::info!(url = %url, "Connecting to Binance stream");

        let handshake = tokio_tungstenite::connect_async(url.as_str());
        let (ws_stream, _response) = tokio::time::timeout(self.config.connect_timeout, handshake)
            .await
            .map_err(|_| {
                FeedError::ConnectionFailed(format!(
                    "handshake timed out after {:?}",
                    self.config.connect_timeout
                ))
            })?
            .map_err(|e| FeedError::ConnectionFailed(e.to_string()))?;

        Ok(Box::new(BinanceSession {
            ws: ws_stream,
            terminated: false,
        }))
    }
}

/// A live combined-stream connection.
pub struct BinanceSession {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
    terminated: bool,
}

impl BinanceSession {
    fn terminate(&mut self, termination: Termination) -> FeedFrame {
        self.terminated = true;
        FeedFrame::Terminated(termination)
    }
}

#[async_trait]
impl FeedSession for BinanceSession {
    async fn next_frame(&mut self) -> FeedFrame {
        if self.terminated {
            return FeedFrame::Terminated(Termination::Closed { code: None });
        }

        loop {
            match self.ws.next().await {
                Some(Ok(Message::Text(text))) => return FeedFrame::Message(text.to_string()),
                Some(Ok(Message::Ping(data))) => {
                    if let Err(e) = self.ws.send(Message::Pong(data)).await {
                        return self.terminate(Termination::Error {
                            cause: e.to_string(),
                        });
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(?frame, "Server sent close frame");
                    let code = frame.map(|f| u16::from(f.code));
                    return self.terminate(Termination::Closed { code });
                }
                Some(Ok(_)) => {
                    // Pong, binary, and raw frames carry no trades
                }
                Some(Err(e)) => {
                    return self.terminate(Termination::Error {
                        cause: e.to_string(),
                    });
                }
                None => {
                    tracing::info!("WebSocket stream ended");
                    return self.terminate(Termination::Closed { code: None });
                }
            }
        }
    }
}
