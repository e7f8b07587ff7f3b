use std::io::{Read, Write};

use tungstenite::protocol::CloseFrame;
use tungstenite::{Error, Message, WebSocket};

/// Close code reported when a close frame carried no status.
pub const CLOSE_NO_STATUS: u16 = 1005;
/// Close code reported when the connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// How a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
    /// `true` when the peer sent a close frame.
    pub was_clean: bool,
}

impl CloseInfo {
    fn from_frame(frame: Option<CloseFrame<'_>>) -> Self {
        match frame {
            Some(frame) => Self {
                code: u16::from(frame.code),
                reason: frame.reason.into_owned(),
                was_clean: true,
            },
            None => Self {
                code: CLOSE_NO_STATUS,
                reason: String::new(),
                was_clean: true,
            },
        }
    }

    fn abnormal(error: &Error) -> Self {
        Self {
            code: CLOSE_ABNORMAL,
            reason: error.to_string(),
            was_clean: false,
        }
    }
}

/// What the session loop sees from the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Text(String),
    /// A binary frame of this many bytes.
    Binary(usize),
    Closed(CloseInfo),
}

/// A message-oriented connection owned by one session.
pub trait Transport {
    fn send_text(&mut self, text: String) -> Result<(), Error>;

    /// Block until the next data frame or the end of the connection.
    /// Control frames are handled internally.
    fn next_event(&mut self) -> TransportEvent;
}

impl<S: Read + Write> Transport for WebSocket<S> {
    fn send_text(&mut self, text: String) -> Result<(), Error> {
        self.send(Message::Text(text))
    }

    fn next_event(&mut self) -> TransportEvent {
        loop {
            match self.read() {
                Ok(Message::Text(text)) => return TransportEvent::Text(text),
                Ok(Message::Binary(data)) => return TransportEvent::Binary(data.len()),
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                Ok(Message::Close(frame)) => {
                    let info = CloseInfo::from_frame(frame);
                    // Push out the queued close reply.
                    let _ = self.flush();
                    return TransportEvent::Closed(info);
                }
                Err(Error::ConnectionClosed | Error::AlreadyClosed) => {
                    return TransportEvent::Closed(CloseInfo::from_frame(None));
                }
                Err(e) => return TransportEvent::Closed(CloseInfo::abnormal(&e)),
            }
        }
    }
}
