//! Per-connection command handling.
//!
//! A session reads frames from its transport one at a time, applies each
//! command through the shared [`Controller`] and echoes a confirmation on the
//! same transport. Bad frames are logged and dropped; transport and output
//! failures end the session.

use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::controller::{ApplyError, Controller};
use crate::protocol;

/// Frame I/O for one connection.
pub trait FrameTransport {
    /// Next frame's payload, or `None` once the peer has closed.
    fn recv_frame(&mut self) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;
    fn send_frame(&mut self, frame: Vec<u8>) -> impl Future<Output = Result<(), TransportError>> + Send;
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("receive failed: {0}")]
    Receive(String),
    #[error("send failed: {0}")]
    Send(String),
    #[error("no frame received for {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("output write failed: {0}")]
    Output(#[from] io::Error),
}

/// Where a session is in handling the current frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Decoding,
    Applying,
    Confirming,
    Closed,
}

pub struct Session {
    controller: Arc<Controller>,
    phase: Phase,
}

impl Session {
    pub fn new(controller: Arc<Controller>) -> Session {
        Session {
            controller,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Handle frames until the peer closes or the transport fails.
    pub async fn run<T: FrameTransport + Send>(&mut self, transport: &mut T) -> Result<(), SessionError> {
        loop {
            let frame = match transport.recv_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    info!("peer closed the connection");
                    self.phase = Phase::Closed;
                    return Ok(());
                }
                Err(err) => {
                    warn!(%err, "receive failed, closing session");
                    self.phase = Phase::Closed;
                    return Err(err.into());
                }
            };
            self.handle_frame(transport, frame).await?;
        }
    }

    /// Decode, apply and confirm a single frame.
    pub async fn handle_frame<T: FrameTransport + Send>(
        &mut self,
        transport: &mut T,
        payload: Vec<u8>,
    ) -> Result<(), SessionError> {
        if self.phase == Phase::Closed {
            return Ok(());
        }
        if payload.is_empty() {
            // Handshake or keep-alive.
            return Ok(());
        }
        debug!(len = payload.len(), "frame");

        self.phase = Phase::Decoding;
        let cmd = match protocol::decode(&payload) {
            Ok(cmd) => cmd,
            Err(err) => {
                warn!(%err, payload = %String::from_utf8_lossy(&payload), "dropping frame");
                self.phase = Phase::Idle;
                return Ok(());
            }
        };
        debug!(?cmd, "decoded");

        self.phase = Phase::Applying;
        let confirmation = match self.controller.apply(cmd) {
            Ok(confirmation) => confirmation,
            Err(ApplyError::State(err)) => {
                warn!(%err, ?cmd, "dropping command");
                self.phase = Phase::Idle;
                return Ok(());
            }
            Err(ApplyError::Output(err)) => {
                error!(%err, ?cmd, "unable to drive outputs, closing session");
                self.phase = Phase::Closed;
                return Err(err.into());
            }
        };

        self.phase = Phase::Confirming;
        if let Err(err) = transport.send_frame(protocol::encode(&confirmation)).await {
            warn!(%err, "confirmation not sent, closing session");
            self.phase = Phase::Closed;
            return Err(err.into());
        }

        self.phase = Phase::Idle;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::config::Root;
    use crate::host::MemoryHost;
    use crate::state::Snapshot;

    #[derive(Default)]
    struct Loopback {
        inbound: VecDeque<Vec<u8>>,
        sent: Vec<Vec<u8>>,
        refuse_sends: bool,
    }

    impl FrameTransport for Loopback {
        async fn recv_frame(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
            Ok(self.inbound.pop_front())
        }

        async fn send_frame(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
            if self.refuse_sends {
                return Err(TransportError::Send("peer gone".into()));
            }
            self.sent.push(frame);
            Ok(())
        }
    }

    fn session() -> (Session, Arc<Controller>) {
        let config = Root::default();
        let host = MemoryHost::new(config.output.channels.len());
        let controller = Arc::new(Controller::with_host(&config, Box::new(host)));
        (Session::new(controller.clone()), controller)
    }

    #[tokio::test]
    async fn empty_frame_is_ignored() {
        let (mut session, controller) = session();
        let mut transport = Loopback::default();
        session.handle_frame(&mut transport, vec![]).await.expect("frame");
        assert!(transport.sent.is_empty());
        assert_eq!(session.phase(), Phase::Idle);
        assert_eq!(controller.duties(), vec![0, 0, 0]);
    }

    #[tokio::test]
    async fn bad_frames_are_dropped_without_echo() {
        let (mut session, controller) = session();
        let mut transport = Loopback::default();
        for raw in [
            r#"{"type":"LED_selected"}"#,
            r#"{"type":"bogus","value":1}"#,
            r#"{"type":"LED_intensity","value":"loud"}"#,
            r#"{"type":"LED_selected","value":7}"#,
        ] {
            session
                .handle_frame(&mut transport, raw.as_bytes().to_vec())
                .await
                .expect("frame");
            assert_eq!(session.phase(), Phase::Idle);
        }
        assert!(transport.sent.is_empty());
        assert_eq!(controller.snapshot(), Snapshot { selected: 0, intensity: 50 });
        assert_eq!(controller.duties(), vec![0, 0, 0]);
    }

    #[tokio::test]
    async fn run_echoes_each_accepted_command() {
        let (mut session, controller) = session();
        let mut transport = Loopback::default();
        transport.inbound.push_back(br#"{"type":"LED_selected","value":1}"#.to_vec());
        transport.inbound.push_back(b"not json".to_vec());
        transport.inbound.push_back(br#"{"type":"LED_intensity","value":"-20"}"#.to_vec());

        session.run(&mut transport).await.expect("run");

        assert_eq!(
            transport.sent,
            vec![
                br#"{"type":"LED_selected","value":"1"}"#.to_vec(),
                br#"{"type":"LED_intensity","value":"0"}"#.to_vec(),
            ]
        );
        assert_eq!(session.phase(), Phase::Closed);
        assert_eq!(controller.snapshot(), Snapshot { selected: 1, intensity: 0 });
    }

    #[tokio::test]
    async fn send_failure_ends_the_session() {
        let (mut session, controller) = session();
        let mut transport = Loopback {
            refuse_sends: true,
            ..Loopback::default()
        };
        transport.inbound.push_back(br#"{"type":"LED_selected","value":2}"#.to_vec());
        transport.inbound.push_back(br#"{"type":"LED_intensity","value":10}"#.to_vec());

        let err = session.run(&mut transport).await.expect_err("send fails");
        assert!(matches!(err, SessionError::Transport(TransportError::Send(_))));
        assert_eq!(session.phase(), Phase::Closed);
        // The command was applied before the echo failed; the next one never ran.
        assert_eq!(controller.snapshot(), Snapshot { selected: 2, intensity: 50 });
        assert_eq!(transport.inbound.len(), 1);
    }
}
