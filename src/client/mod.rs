//! Dashboard client: one WebSocket connection, one handshake, a stream of
//! rendered results.
//!
//! A [`DashboardSession`] owns its transport, its view, and the identity it
//! announced. The session loop is single-threaded: open, message and close
//! handling never overlap.

pub mod collector;
pub mod error;
pub mod identity;
pub mod protocol;
pub mod transport;

use std::net::TcpStream;

use tungstenite::WebSocket;
use tungstenite::stream::MaybeTlsStream;

use crate::config::RiskwatchConfig;
use crate::display::{self, DashboardView};
use crate::journal::{EventKind, Journal, JournalEntry};

use collector::{Collector, CommandCollector};
use error::{ClientError, MessageError};
use identity::{IdentitySource, SessionIdentity};
use protocol::{AuthenticationMessage, Inbound, TokenMessage};
use transport::{CloseInfo, Transport, TransportEvent};

/// The WebSocket type produced by [`connect`].
pub type WsTransport = WebSocket<MaybeTlsStream<TcpStream>>;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Everything that varies between dashboard deployments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardOptions {
    pub endpoint: String,
    pub identity: IdentitySource,
    /// Sent as a separate first frame when present.
    pub token: Option<String>,
    /// Started once the handshake has been sent.
    pub collector: Option<CollectorCommand>,
}

/// Program (and arguments) run as the session's collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl DashboardOptions {
    pub fn from_config(config: &RiskwatchConfig) -> Self {
        let identity = if config.client.prompt_user_id {
            IdentitySource::Prompt {
                default: config.client.user_id.clone(),
            }
        } else {
            IdentitySource::Fixed(config.client.user_id.clone())
        };

        Self {
            endpoint: config.client.endpoint.clone(),
            identity,
            token: config.auth.token.clone(),
            collector: config.collector.command.clone().map(|program| CollectorCommand {
                program,
                args: config.collector.args.clone(),
            }),
        }
    }

    /// The configured collector, wired to this endpoint.
    pub fn build_collector(&self) -> Option<Box<dyn Collector>> {
        self.collector.as_ref().map(|command| {
            Box::new(CommandCollector::new(
                command.program.clone(),
                command.args.clone(),
                self.endpoint.clone(),
            )) as Box<dyn Collector>
        })
    }
}

/// Open the WebSocket connection. No retry and no timeout.
pub fn connect(endpoint: &str) -> Result<WsTransport, ClientError> {
    let (socket, _response) =
        tungstenite::connect(endpoint).map_err(|source| ClientError::Connect {
            endpoint: endpoint.to_string(),
            source,
        })?;
    Ok(socket)
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Per-session message counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub rendered: usize,
    pub ignored: usize,
    pub dropped: usize,
}

/// What [`DashboardSession::on_message`] did with a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Rendered,
    Ignored,
}

pub struct DashboardSession<T: Transport, V: DashboardView> {
    transport: T,
    view: V,
    identity: SessionIdentity,
    collector: Option<Box<dyn Collector>>,
    journal: Journal,
    stats: SessionStats,
}

impl<T: Transport, V: DashboardView> DashboardSession<T, V> {
    pub fn new(transport: T, identity: SessionIdentity, view: V) -> Self {
        Self {
            transport,
            view,
            identity,
            collector: None,
            journal: Journal::disabled(),
            stats: SessionStats::default(),
        }
    }

    /// Start `collector` right after the handshake.
    pub fn with_collector(mut self, collector: Box<dyn Collector>) -> Self {
        self.collector = Some(collector);
        self
    }

    pub fn with_journal(mut self, journal: Journal) -> Self {
        self.journal = journal;
        self
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }

    /// Drive the session: handshake, then handle frames until the
    /// connection ends. Per-message failures never end the loop.
    pub fn run(&mut self) -> Result<CloseInfo, ClientError> {
        if let Err(e) = self.on_open() {
            tracing::error!(error = %e, "handshake failed");
            self.journal.record(
                &JournalEntry::new(EventKind::ConnectFailed, &self.identity)
                    .with_detail(e.to_string()),
            );
            return Err(e);
        }

        loop {
            match self.transport.next_event() {
                TransportEvent::Text(text) => {
                    // Errors are already logged and counted.
                    let _ = self.on_message(&text);
                }
                TransportEvent::Binary(len) => self.drop_message(&MessageError::Binary(len)),
                TransportEvent::Closed(info) => {
                    self.on_close(&info);
                    return Ok(info);
                }
            }
        }
    }

    /// Send the handshake (optional token frame, then the identification
    /// frame) and start the collector if one is attached. A collector that
    /// fails to start is logged; the session carries on without it.
    pub fn on_open(&mut self) -> Result<(), ClientError> {
        tracing::info!(
            user_id = %self.identity.user_id,
            session_id = %self.identity.session_id,
            "connection established"
        );
        self.journal
            .record(&JournalEntry::new(EventKind::Connected, &self.identity));

        if let Some(token) = &self.identity.auth_token {
            let frame = serde_json::to_string(&TokenMessage { token })?;
            self.transport.send_text(frame).map_err(ClientError::Send)?;
        }

        let frame = serde_json::to_string(&AuthenticationMessage {
            user_id: &self.identity.user_id,
            session_id: &self.identity.session_id,
        })?;
        self.transport.send_text(frame).map_err(ClientError::Send)?;

        tracing::debug!(with_token = self.identity.auth_token.is_some(), "handshake sent");
        self.journal
            .record(&JournalEntry::new(EventKind::HandshakeSent, &self.identity));

        if let Some(collector) = self.collector.as_mut()
            && let Err(e) = collector.start(&self.identity)
        {
            tracing::warn!(error = %e, "collector failed to start");
            self.journal.record(
                &JournalEntry::new(EventKind::CollectorFailed, &self.identity)
                    .with_detail(e.to_string()),
            );
        }

        Ok(())
    }

    /// Handle one text frame. `analysis_result` frames are rendered; all
    /// other well-formed frames leave the view untouched. Errors mean the
    /// frame was dropped.
    pub fn on_message(&mut self, text: &str) -> Result<Outcome, MessageError> {
        let inbound = match protocol::parse_inbound(text) {
            Ok(inbound) => inbound,
            Err(e) => {
                self.drop_message(&e);
                return Err(e);
            }
        };

        match inbound {
            Inbound::AnalysisResult(result) => {
                display::render(&result, &mut self.view);
                self.stats.rendered += 1;
                tracing::debug!(
                    risk_score = result.risk_score,
                    alert = ?result.alert.as_ref().map(|a| a.level.as_str()),
                    "analysis result rendered"
                );
                self.journal
                    .record(&JournalEntry::new(EventKind::ResultRendered, &self.identity));
                return Ok(Outcome::Rendered);
            }
            Inbound::AuthenticationSuccess { user_id } => {
                tracing::debug!(user_id = ?user_id, "backend accepted identification");
            }
            Inbound::ServerError { message } => {
                tracing::warn!(%message, "backend reported an error");
            }
            Inbound::FeedbackReceived { message } => {
                tracing::debug!(%message, "backend acknowledged feedback");
            }
            Inbound::Ignored { kind } => {
                tracing::trace!(kind = ?kind, "ignoring message");
            }
        }

        self.stats.ignored += 1;
        Ok(Outcome::Ignored)
    }

    /// Log the close. Nothing is retried.
    pub fn on_close(&mut self, info: &CloseInfo) {
        if info.was_clean {
            tracing::info!(code = info.code, reason = %info.reason, "connection closed cleanly");
        } else {
            tracing::warn!(code = info.code, reason = %info.reason, "connection died");
        }

        let mut entry =
            JournalEntry::new(EventKind::Closed, &self.identity).with_close_code(info.code);
        if !info.reason.is_empty() {
            entry = entry.with_detail(info.reason.clone());
        }
        self.journal.record(&entry);
    }

    fn drop_message(&mut self, error: &MessageError) {
        self.stats.dropped += 1;
        tracing::warn!(error = %error, "dropping inbound message");
        self.journal.record(
            &JournalEntry::new(EventKind::MessageDropped, &self.identity)
                .with_detail(error.to_string()),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use std::io;
    use std::rc::Rc;

    use serde_json::Value;

    use super::*;
    use crate::display::DisplayState;

    /// Scripted transport: records sent frames, replays queued events.
    #[derive(Default)]
    struct ScriptedTransport {
        sent: Vec<String>,
        events: VecDeque<TransportEvent>,
        refuse_sends: bool,
    }

    impl ScriptedTransport {
        fn with_texts(texts: &[&str]) -> Self {
            let mut events: VecDeque<TransportEvent> = texts
                .iter()
                .map(|t| TransportEvent::Text(t.to_string()))
                .collect();
            events.push_back(TransportEvent::Closed(CloseInfo {
                code: 1000,
                reason: "done".to_string(),
                was_clean: true,
            }));
            Self {
                events,
                ..Self::default()
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn send_text(&mut self, text: String) -> Result<(), tungstenite::Error> {
            if self.refuse_sends {
                return Err(tungstenite::Error::ConnectionClosed);
            }
            self.sent.push(text);
            Ok(())
        }

        fn next_event(&mut self) -> TransportEvent {
            self.events.pop_front().unwrap_or(TransportEvent::Closed(CloseInfo {
                code: transport::CLOSE_ABNORMAL,
                reason: String::new(),
                was_clean: false,
            }))
        }
    }

    struct RecordingCollector {
        started: Rc<RefCell<Vec<String>>>,
    }

    impl Collector for RecordingCollector {
        fn start(&mut self, identity: &SessionIdentity) -> io::Result<()> {
            self.started.borrow_mut().push(identity.session_id.clone());
            Ok(())
        }
    }

    struct FailingCollector;

    impl Collector for FailingCollector {
        fn start(&mut self, _identity: &SessionIdentity) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::NotFound, "no such program"))
        }
    }

    fn session(
        transport: ScriptedTransport,
        token: Option<&str>,
    ) -> DashboardSession<ScriptedTransport, DisplayState> {
        let identity = SessionIdentity::new("test-user", token.map(str::to_string));
        DashboardSession::new(transport, identity, DisplayState::default())
    }

    fn sent_json(session: &DashboardSession<ScriptedTransport, DisplayState>) -> Vec<Value> {
        session
            .transport
            .sent
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }

    #[test]
    fn handshake_without_token_is_single_frame() {
        let mut s = session(ScriptedTransport::default(), None);
        s.on_open().unwrap();

        let frames = sent_json(&s);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["type"], "user_authentication");
        assert_eq!(frames[0]["userId"], "test-user");
        assert_eq!(frames[0]["sessionId"], s.identity().session_id.as_str());
    }

    #[test]
    fn token_frame_precedes_identification() {
        let mut s = session(ScriptedTransport::default(), Some("secret"));
        s.on_open().unwrap();

        let frames = sent_json(&s);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], serde_json::json!({ "token": "secret" }));
        assert_eq!(frames[1]["type"], "user_authentication");
    }

    #[test]
    fn collector_starts_after_handshake() {
        let started = Rc::new(RefCell::new(Vec::new()));
        let mut s = session(ScriptedTransport::default(), None).with_collector(Box::new(
            RecordingCollector {
                started: Rc::clone(&started),
            },
        ));
        s.on_open().unwrap();

        assert_eq!(s.transport.sent.len(), 1);
        assert_eq!(*started.borrow(), vec![s.identity().session_id.clone()]);
    }

    #[test]
    fn session_renders_when_collector_fails_to_start() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::at(dir.path().join("sessions.jsonl"));
        let transport =
            ScriptedTransport::with_texts(&[r#"{"type":"analysis_result","riskScore":42}"#]);
        let mut s = session(transport, None)
            .with_collector(Box::new(FailingCollector))
            .with_journal(journal.clone());

        let close = s.run().unwrap();

        assert!(close.was_clean);
        assert_eq!(s.view().risk_score.as_deref(), Some("42.00"));
        let failed: Vec<_> = journal
            .read_all()
            .into_iter()
            .filter(|e| e.event == EventKind::CollectorFailed)
            .collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].detail.as_deref().unwrap().contains("no such program"));
    }

    #[test]
    fn failed_handshake_is_journaled() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::at(dir.path().join("sessions.jsonl"));
        let transport = ScriptedTransport {
            refuse_sends: true,
            ..ScriptedTransport::default()
        };
        let mut s = session(transport, Some("secret")).with_journal(journal.clone());

        assert!(matches!(s.run(), Err(ClientError::Send(_))));

        let kinds: Vec<EventKind> = journal.read_all().iter().map(|e| e.event).collect();
        assert_eq!(kinds, vec![EventKind::Connected, EventKind::ConnectFailed]);
    }

    #[test]
    fn other_message_types_leave_display_unchanged() {
        let mut s = session(ScriptedTransport::default(), None);
        s.on_message(r#"{"type":"analysis_result","riskScore":10}"#)
            .unwrap();
        let before = s.view().clone();

        for text in [
            r#"{"type":"authentication_success","userId":"test-user"}"#,
            r#"{"type":"error","message":"boom"}"#,
            r#"{"riskScore": 99}"#,
            r#""analysis_result""#,
        ] {
            assert_eq!(s.on_message(text).unwrap(), Outcome::Ignored);
        }

        assert_eq!(s.view(), &before);
        assert_eq!(s.stats().ignored, 4);
    }

    #[test]
    fn malformed_json_is_dropped_and_loop_continues() {
        let transport = ScriptedTransport::with_texts(&[
            "{oops",
            r#"{"type":"analysis_result","riskScore":87.456}"#,
            r#"{"type":"analysis_result"}"#,
            r#"{"type":"analysis_result","riskScore":1,"alert":{"level":"Critical","message":"X"}}"#,
        ]);
        let mut s = session(transport, None);

        let close = s.run().unwrap();

        assert!(close.was_clean);
        assert_eq!(close.code, 1000);
        assert_eq!(s.view().risk_score.as_deref(), Some("1.00"));
        assert_eq!(s.view().alerts.len(), 1);
        assert_eq!(s.view().alerts[0].class, "alert-critical");
        assert_eq!(
            s.stats(),
            SessionStats {
                rendered: 2,
                ignored: 0,
                dropped: 2,
            }
        );
    }

    #[test]
    fn malformed_json_does_not_touch_display() {
        let mut s = session(ScriptedTransport::default(), None);
        assert!(matches!(
            s.on_message("not json at all"),
            Err(MessageError::Malformed(_))
        ));
        assert_eq!(s.view(), &DisplayState::default());
    }

    #[test]
    fn n_alerts_accumulate() {
        let alert = r#"{"type":"analysis_result","riskScore":0.9,"alert":{"level":"Critical","message":"X"}}"#;
        let texts = vec![alert; 7];
        let mut s = session(ScriptedTransport::with_texts(&texts), None);
        s.run().unwrap();

        assert_eq!(s.view().alerts.len(), 7);
        assert!(
            s.view()
                .alerts
                .iter()
                .all(|a| a.class == "alert-critical" && a.text == "X")
        );
    }

    #[test]
    fn abrupt_end_is_reported_unclean() {
        let mut transport = ScriptedTransport::default();
        transport
            .events
            .push_back(TransportEvent::Text(r#"{"type":"analysis_result","riskScore":5}"#.into()));
        let mut s = session(transport, None);

        let close = s.run().unwrap();
        assert!(!close.was_clean);
        assert_eq!(close.code, transport::CLOSE_ABNORMAL);
        assert_eq!(s.view().risk_score.as_deref(), Some("5.00"));
    }

    #[test]
    fn binary_frames_are_dropped() {
        let mut transport = ScriptedTransport::default();
        transport.events.push_back(TransportEvent::Binary(16));
        let mut s = session(transport, None);
        s.run().unwrap();
        assert_eq!(s.stats().dropped, 1);
        assert_eq!(s.view(), &DisplayState::default());
    }

    #[test]
    fn journal_records_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::at(dir.path().join("sessions.jsonl"));
        let transport = ScriptedTransport::with_texts(&[
            r#"{"type":"analysis_result","riskScore":0.3}"#,
            "bad",
        ]);
        let mut s = session(transport, None).with_journal(journal.clone());
        s.run().unwrap();

        let kinds: Vec<EventKind> = journal.read_all().iter().map(|e| e.event).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Connected,
                EventKind::HandshakeSent,
                EventKind::ResultRendered,
                EventKind::MessageDropped,
                EventKind::Closed,
            ]
        );
    }

    #[test]
    fn options_follow_config() {
        let mut config = RiskwatchConfig::default();
        assert_eq!(
            DashboardOptions::from_config(&config).identity,
            IdentitySource::Fixed("test-user".to_string())
        );

        config.client.prompt_user_id = true;
        config.auth.token = Some("t".to_string());
        let options = DashboardOptions::from_config(&config);
        assert_eq!(
            options.identity,
            IdentitySource::Prompt {
                default: "test-user".to_string()
            }
        );
        assert_eq!(options.token.as_deref(), Some("t"));
        assert_eq!(options.endpoint, "ws://localhost:8765");
        assert!(options.collector.is_none());
        assert!(options.build_collector().is_none());
    }

    #[test]
    fn options_carry_collector_command() {
        let mut config = RiskwatchConfig::default();
        config.collector.command = Some("collect".to_string());
        config.collector.args = vec!["--fast".to_string()];

        let options = DashboardOptions::from_config(&config);
        assert_eq!(
            options.collector,
            Some(CollectorCommand {
                program: "collect".to_string(),
                args: vec!["--fast".to_string()],
            })
        );
        assert!(options.build_collector().is_some());
    }
}
