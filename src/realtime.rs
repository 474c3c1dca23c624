use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};
use url::Url;

use crate::messenger::{Delivery, Event, MessengerError};

const DELIVERY_BUFFER: usize = 64;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ClientFrame<'a> {
    #[serde(rename_all = "camelCase")]
    ConnectionInit { token: &'a str, client_version: &'a str },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ServerFrame {
    ConnectionOpen,
    ConnectionError {
        #[serde(default)]
        message: String,
    },
    Event {
        event: Event,
    },
    Error {
        #[serde(default)]
        message: String,
    },
}

/// Open the listen socket and forward every event into a channel until the
/// gateway closes it. The handshake runs before this returns so a bad token
/// fails here rather than as the first delivery.
pub async fn subscribe(url: &str, token: &str) -> Result<mpsc::Receiver<Delivery>, MessengerError> {
    let url = Url::parse(url)?;
    let (mut ws, _) = connect_async(url).await?;

    let init = ClientFrame::ConnectionInit {
        token,
        client_version: env!("CARGO_PKG_VERSION"),
    };
    ws.send(WsMessage::Text(serde_json::to_string(&init)?)).await?;
    wait_for_connection_open(&mut ws).await?;
    debug!("realtime connection open");

    let (tx, rx) = mpsc::channel(DELIVERY_BUFFER);
    tokio::spawn(forward_events(ws, tx));
    Ok(rx)
}

async fn wait_for_connection_open(ws: &mut WsStream) -> Result<(), MessengerError> {
    loop {
        let Some(text) = read_text_frame(ws).await? else {
            return Err(MessengerError::ConnectionError("closed during handshake".to_string()));
        };
        match serde_json::from_str::<ServerFrame>(&text)? {
            ServerFrame::ConnectionOpen => return Ok(()),
            ServerFrame::ConnectionError { message } => {
                return Err(MessengerError::ConnectionError(message));
            }
            _ => {}
        }
    }
}

async fn forward_events(mut ws: WsStream, tx: mpsc::Sender<Delivery>) {
    loop {
        let delivery = match read_text_frame(&mut ws).await {
            Ok(Some(text)) => match decode_frame(&text) {
                Some(delivery) => delivery,
                None => continue,
            },
            Ok(None) => {
                debug!("realtime connection closed by gateway");
                return;
            }
            Err(error) => {
                // A transport error ends the socket; report it once and stop.
                let _ = tx.send(Err(error)).await;
                return;
            }
        };

        if tx.send(delivery).await.is_err() {
            debug!("event receiver dropped; closing realtime connection");
            let _ = ws.close(None).await;
            return;
        }
    }
}

fn decode_frame(text: &str) -> Option<Delivery> {
    match serde_json::from_str::<ServerFrame>(text) {
        Ok(ServerFrame::Event { event }) => Some(Ok(event)),
        Ok(ServerFrame::Error { message }) | Ok(ServerFrame::ConnectionError { message }) => {
            Some(Err(MessengerError::Listener(message)))
        }
        Ok(ServerFrame::ConnectionOpen) => None,
        Err(error) => {
            warn!(%error, "unreadable realtime frame");
            Some(Err(MessengerError::Json(error)))
        }
    }
}

async fn read_text_frame(ws: &mut WsStream) -> Result<Option<String>, MessengerError> {
    loop {
        let Some(message) = ws.next().await else {
            return Ok(None);
        };
        match message? {
            WsMessage::Text(text) => return Ok(Some(text)),
            WsMessage::Close(_) => return Ok(None),
            WsMessage::Binary(_) | WsMessage::Ping(_) | WsMessage::Pong(_) => continue,
            _ => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Accept one socket, hand back the client's first frame, then play
    /// `frames` and close.
    async fn scripted_gateway(frames: Vec<&'static str>) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (init_tx, init_rx) = oneshot::channel();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            if let Some(Ok(WsMessage::Text(init))) = ws.next().await {
                let _ = init_tx.send(init);
            }
            for frame in frames {
                ws.send(WsMessage::Text(frame.to_string())).await.unwrap();
            }
            let _ = ws.close(None).await;
            // Drain until the client acknowledges the close.
            while let Some(Ok(_)) = ws.next().await {}
        });

        (format!("ws://{addr}/listen"), init_rx)
    }

    #[tokio::test]
    async fn relays_error_and_event_frames_until_close() {
        let (url, init) = scripted_gateway(vec![
            r#"{"type":"connectionOpen"}"#,
            r#"{"type":"error","message":"mqtt reconnecting"}"#,
            r#"{"type":"event","event":{"type":"message","isGroup":true,"senderID":"42","threadID":"123","body":"hello"}}"#,
        ])
        .await;

        let mut events = subscribe(&url, "secret-token").await.unwrap();

        let init: serde_json::Value = serde_json::from_str(&init.await.unwrap()).unwrap();
        assert_eq!(init["type"], "connectionInit");
        assert_eq!(init["token"], "secret-token");

        match events.recv().await {
            Some(Err(MessengerError::Listener(message))) => assert_eq!(message, "mqtt reconnecting"),
            other => panic!("expected listener error, got {other:?}"),
        }
        let event = events.recv().await.unwrap().unwrap();
        assert_eq!(event.thread_id, "123");
        assert_eq!(event.body.as_deref(), Some("hello"));
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn handshake_rejection_fails_subscribe() {
        let (url, _init) =
            scripted_gateway(vec![r#"{"type":"connectionError","message":"bad token"}"#]).await;

        match subscribe(&url, "stale-token").await {
            Err(MessengerError::ConnectionError(message)) => assert_eq!(message, "bad token"),
            Err(other) => panic!("expected connection error, got {other:?}"),
            Ok(_) => panic!("subscribe should fail when the handshake is rejected"),
        }
    }

    #[tokio::test]
    async fn close_during_handshake_fails_subscribe() {
        let (url, _init) = scripted_gateway(Vec::new()).await;

        assert!(matches!(
            subscribe(&url, "token").await,
            Err(MessengerError::ConnectionError(_))
        ));
    }

    #[test]
    fn connection_init_frame_shape() {
        let frame = ClientFrame::ConnectionInit {
            token: "abc",
            client_version: "1.2.3",
        };
        let value: serde_json::Value = serde_json::to_value(&frame).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"type": "connectionInit", "token": "abc", "clientVersion": "1.2.3"})
        );
    }

    #[test]
    fn event_frame_becomes_delivery() {
        let delivery = decode_frame(
            r#"{"type":"event","event":{"type":"message","isGroup":true,"senderID":"7","threadID":"123","body":"yo"}}"#,
        )
        .unwrap();
        let event = delivery.unwrap();
        assert_eq!(event.thread_id, "123");
        assert_eq!(event.body.as_deref(), Some("yo"));
    }

    #[test]
    fn error_frame_becomes_listener_error() {
        let delivery = decode_frame(r#"{"type":"error","message":"rate limited"}"#).unwrap();
        match delivery {
            Err(MessengerError::Listener(message)) => assert_eq!(message, "rate limited"),
            other => panic!("expected listener error, got {other:?}"),
        }
    }

    #[test]
    fn open_frame_is_skipped_and_garbage_is_an_error() {
        assert!(decode_frame(r#"{"type":"connectionOpen"}"#).is_none());
        assert!(matches!(decode_frame("not json"), Some(Err(MessengerError::Json(_)))));
    }
}
