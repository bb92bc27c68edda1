//! One physical WebSocket connection.
//!
//! A `Transport` owns exactly one socket from handshake to teardown.
//! It sends the auth/binding frame before anything else, runs the
//! liveness loop (JSON ping every `ping_interval`, synthetic close if
//! the pong misses its deadline or echoes the wrong ping id), and
//! bounds `close()` by the force-close delay. Malformed frames are
//! logged and dropped without closing the connection.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::{self, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use huddle_protocol::{
    CLOSE_ABNORMAL, CLOSE_NO_STATUS, CloseEvent, OutboundFrame, ProtocolError,
    REASON_DONE_FORCED, REASON_PONG_MISMATCH, REASON_PONG_NOT_RECEIVED, encode_frame,
    parse_message,
};

use crate::config::SocketConfig;
use crate::error::{RealtimeError, RealtimeResult};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What the socket produced next.
#[derive(Debug)]
pub(crate) enum TransportEvent {
    /// A parsed, non-control inbound envelope.
    Message(huddle_protocol::InboundMessage),
    /// The connection ended; the event may be synthetic (liveness
    /// failure, stream error) when no close frame was received.
    Closed(CloseEvent),
}

/// One live socket with its liveness timers.
pub(crate) struct Transport {
    ws: Socket,
    ping_interval: Duration,
    pong_timeout: Duration,
    force_close_delay: Duration,
    ping_deadline: Instant,
    pong_deadline: Instant,
    /// Id of the ping awaiting its pong, if any.
    outstanding_ping: Option<String>,
}

impl Transport {
    /// Opens a socket and sends the auth/binding frame.
    ///
    /// Fails with [`RealtimeError::HandshakeTimeout`] if the WebSocket
    /// handshake does not complete within the configured deadline.
    /// Nothing counts as connected until the auth frame is on the wire.
    pub(crate) async fn open(url: &Url, config: &SocketConfig) -> RealtimeResult<Self> {
        let (ws, _response) = time::timeout(config.handshake_timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| RealtimeError::HandshakeTimeout {
                timeout: config.handshake_timeout,
            })??;

        let now = Instant::now();
        let mut transport = Self {
            ws,
            ping_interval: config.ping_interval,
            pong_timeout: config.pong_timeout,
            force_close_delay: config.force_close_delay,
            ping_deadline: now + config.ping_interval,
            pong_deadline: now,
            outstanding_ping: None,
        };

        let auth = match &config.binding_prefix {
            Some(prefix) => {
                OutboundFrame::auth_with_binding(config.auth_token.clone(), prefix.clone())
            }
            None => OutboundFrame::auth(config.auth_token.clone()),
        };
        transport.send(&auth).await?;

        Ok(transport)
    }

    /// Sends one control frame.
    pub(crate) async fn send(&mut self, frame: &OutboundFrame) -> RealtimeResult<()> {
        let text = encode_frame(frame)?;
        self.ws.send(Message::Text(text.into())).await?;
        Ok(())
    }

    /// Waits for the next observable event on this socket.
    ///
    /// Runs the liveness loop internally: pings are sent on schedule
    /// and pong handling never surfaces to the caller. Returns
    /// `Closed` at most once; the transport must be discarded after.
    pub(crate) async fn next_event(&mut self) -> TransportEvent {
        loop {
            tokio::select! {
                _ = time::sleep_until(self.pong_deadline), if self.outstanding_ping.is_some() => {
                    warn!(
                        timeout_ms = self.pong_timeout.as_millis() as u64,
                        "pong deadline missed, discarding socket"
                    );
                    return TransportEvent::Closed(CloseEvent::from_reason(
                        REASON_PONG_NOT_RECEIVED,
                    ));
                }

                _ = time::sleep_until(self.ping_deadline), if self.outstanding_ping.is_none() => {
                    let id = Uuid::new_v4().to_string();
                    if let Err(error) = self.send(&OutboundFrame::ping(id.clone())).await {
                        warn!(error = %error, "ping send failed");
                        return TransportEvent::Closed(CloseEvent::new(
                            CLOSE_ABNORMAL,
                            format!("ping failed: {error}"),
                        ));
                    }
                    debug!(ping_id = %id, "ping sent");
                    self.outstanding_ping = Some(id);
                    self.pong_deadline = Instant::now() + self.pong_timeout;
                    self.ping_deadline = Instant::now() + self.ping_interval;
                }

                frame = self.ws.next() => match frame {
                    Some(Ok(Message::Text(text))) => match parse_message(text.as_str()) {
                        Ok(message) if message.is_pong() => {
                            match self.outstanding_ping.take() {
                                Some(expected) if message.id == expected => {
                                    debug!(ping_id = %expected, "pong received");
                                    self.ping_deadline = Instant::now() + self.ping_interval;
                                }
                                Some(expected) => {
                                    warn!(
                                        expected = %expected,
                                        observed = %message.id,
                                        "pong id mismatch, discarding socket"
                                    );
                                    return TransportEvent::Closed(CloseEvent::from_reason(
                                        REASON_PONG_MISMATCH,
                                    ));
                                }
                                None => {
                                    debug!(pong_id = %message.id, "unsolicited pong dropped");
                                }
                            }
                        }
                        Ok(message) => return TransportEvent::Message(message),
                        Err(error) => {
                            warn!(error = %error, "malformed frame dropped");
                        }
                    },
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = self.ws.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Pong(_))) => {}
                    Some(Ok(Message::Binary(payload))) => {
                        let error = ProtocolError::unsupported("binary");
                        warn!(error = %error, len = payload.len(), "frame dropped");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        return TransportEvent::Closed(close_event_from_frame(frame));
                    }
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(error)) => {
                        warn!(error = %error, "socket error");
                        return TransportEvent::Closed(CloseEvent::new(
                            CLOSE_ABNORMAL,
                            error.to_string(),
                        ));
                    }
                    None => {
                        return TransportEvent::Closed(CloseEvent::from_code(CLOSE_ABNORMAL));
                    }
                },
            }
        }
    }

    /// Initiates closure and releases the socket.
    ///
    /// Waits up to the force-close delay for the peer's close frame;
    /// an unresponsive peer gets forcibly discarded and the returned
    /// close event carries the "done (forced)" reason.
    pub(crate) async fn close(mut self, code: u16, reason: &str) -> CloseEvent {
        let force_close_delay = self.force_close_delay;
        let frame = CloseFrame {
            code: CloseCode::from(code),
            reason: reason.to_string().into(),
        };

        if let Err(error) = self.ws.close(Some(frame)).await {
            debug!(error = %error, "close frame send failed, socket already gone");
            return CloseEvent::new(code, reason);
        }

        let drain = async {
            loop {
                match self.ws.next().await {
                    Some(Ok(Message::Close(frame))) => return close_event_from_frame(frame),
                    Some(Ok(_)) => continue,
                    Some(Err(_)) | None => return CloseEvent::new(code, reason),
                }
            }
        };

        match time::timeout(force_close_delay, drain).await {
            Ok(close) => close,
            Err(_) => {
                warn!(
                    delay_ms = force_close_delay.as_millis() as u64,
                    "peer did not acknowledge close, forcing teardown"
                );
                CloseEvent::new(code, REASON_DONE_FORCED)
            }
        }
    }
}

/// Maps a wire close frame to a close event. An absent frame means the
/// peer closed without a status code.
fn close_event_from_frame(frame: Option<CloseFrame>) -> CloseEvent {
    match frame {
        Some(frame) => {
            let code = u16::from(frame.code);
            if frame.reason.is_empty() {
                CloseEvent::from_code(code)
            } else {
                CloseEvent::new(code, frame.reason.as_str())
            }
        }
        None => CloseEvent::from_code(CLOSE_NO_STATUS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_event_from_full_frame() {
        let frame = CloseFrame {
            code: CloseCode::from(4000),
            reason: "superseded".into(),
        };
        let close = close_event_from_frame(Some(frame));
        assert_eq!(close.code, Some(4000));
        assert_eq!(close.reason.as_deref(), Some("superseded"));
    }

    #[test]
    fn close_event_from_empty_reason() {
        let frame = CloseFrame {
            code: CloseCode::from(1000),
            reason: "".into(),
        };
        let close = close_event_from_frame(Some(frame));
        assert_eq!(close.code, Some(1000));
        assert!(close.reason.is_none());
    }

    #[test]
    fn close_event_from_missing_frame() {
        let close = close_event_from_frame(None);
        assert_eq!(close.code, Some(CLOSE_NO_STATUS));
    }
}
