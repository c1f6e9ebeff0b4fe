//! Single-outstanding-command gate.
//!
//! The deck answers commands strictly in order and its replies carry no
//! request id, so only one command may be in flight. The gate owns the
//! write half of the transport behind a FIFO-fair async mutex: holding the
//! lock is the right to write one command and wait for its reply.
//!
//! Replies arrive on the reader task, which hands each non-asynchronous
//! response to [`CommandGate::resolve`]. A command that was written but
//! abandoned (timed out, or its caller went away) still has a reply on
//! the way; the gate counts those and discards them in order so later
//! commands get their own replies.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use futures::{Sink, SinkExt};
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::command::Command;
use crate::error::DeckError;
use crate::response::Response;

// ── PendingCommand ───────────────────────────────────────────────

/// The one command currently waiting for a reply.
#[derive(Debug)]
struct PendingCommand {
    /// Header of the command, for logging.
    label: String,
    /// Completion signal; dropping it fails the waiter.
    reply: oneshot::Sender<Response>,
    sent_at: Instant,
}

#[derive(Debug, Default)]
struct Slot {
    pending: Option<PendingCommand>,
    /// Replies still due for abandoned commands, oldest first.
    owed: usize,
    /// Set once the session is over; nothing may be sent after it.
    closed: bool,
}

// ── Outstanding ──────────────────────────────────────────────────

/// Clears the pending slot if `send` ends without a reply, whether by
/// error, timeout or cancellation of the caller.
struct Outstanding<'a, W> {
    gate: &'a CommandGate<W>,
    /// The command has been handed to the sink and will reach the deck.
    written: bool,
}

impl<W> Drop for Outstanding<'_, W> {
    fn drop(&mut self) {
        let mut slot = self.gate.slot();
        let Some(stale) = slot.pending.take() else {
            return;
        };
        if self.written {
            slot.owed += 1;
        }
        warn!(
            command = %stale.label,
            owed = slot.owed,
            "command abandoned before its reply"
        );
    }
}

// ── CommandGate ──────────────────────────────────────────────────

pub struct CommandGate<W> {
    writer: tokio::sync::Mutex<W>,
    slot: Mutex<Slot>,
    /// Bound on write + reply; `None` waits forever.
    timeout: Option<Duration>,
}

impl<W> CommandGate<W>
where
    W: Sink<Command, Error = DeckError> + Unpin,
{
    pub fn new(writer: W, timeout: Option<Duration>) -> Self {
        Self {
            writer: tokio::sync::Mutex::new(writer),
            slot: Mutex::new(Slot::default()),
            timeout,
        }
    }

    /// Write `command` and wait for the reply that resolves it.
    ///
    /// Callers queue on the gate in arrival order. On timeout, or if the
    /// caller drops this future after the write, the gate is released and
    /// the reply still owed for `command` is discarded when it arrives.
    pub async fn send(&self, command: Command) -> Result<Response, DeckError> {
        command.validate()?;
        let mut writer = self.writer.lock().await;

        let (reply, completion) = oneshot::channel();
        {
            let mut slot = self.slot();
            if slot.closed {
                return Err(DeckError::NotConnected);
            }
            slot.pending = Some(PendingCommand {
                label: command.to_string(),
                reply,
                sent_at: Instant::now(),
            });
        }
        let mut outstanding = Outstanding {
            gate: self,
            written: false,
        };

        debug!(command = %command, "sending");
        let exchange = async {
            writer.feed(command).await?;
            outstanding.written = true;
            writer.flush().await?;
            Ok::<_, DeckError>(completion.await?)
        };

        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .unwrap_or(Err(DeckError::Timeout(limit))),
            None => exchange.await,
        }
    }
}

impl<W> CommandGate<W> {
    /// Complete the pending command with `response`.
    ///
    /// Replies owed to abandoned commands are consumed first. Returns the
    /// response back when nothing was waiting for it.
    pub fn resolve(&self, response: Response) -> Result<(), Response> {
        let mut slot = self.slot();
        if slot.owed > 0 {
            slot.owed -= 1;
            debug!(code = response.code(), owed = slot.owed, "discarding late reply");
            return Ok(());
        }
        let Some(pending) = slot.pending.take() else {
            return Err(response);
        };
        drop(slot);

        debug!(
            command = %pending.label,
            code = response.code(),
            elapsed = ?pending.sent_at.elapsed(),
            "resolved"
        );
        // The waiter may have gone away in the meantime.
        let _ = pending.reply.send(response);
        Ok(())
    }

    /// Fail the pending command, if any, with `ConnectionLost`.
    pub fn fail_pending(&self) -> bool {
        match self.slot().pending.take() {
            Some(pending) => {
                warn!(command = %pending.label, "failing command: connection lost");
                true
            }
            None => false,
        }
    }

    /// End the gate: fail the pending command and refuse later ones with
    /// `NotConnected`.
    pub fn shut(&self) -> bool {
        {
            let mut slot = self.slot();
            slot.closed = true;
            slot.owed = 0;
        }
        self.fail_pending()
    }

    pub fn is_pending(&self) -> bool {
        self.slot().pending.is_some()
    }

    /// Replies still expected for abandoned commands.
    pub fn owed(&self) -> usize {
        self.slot().owed
    }

    pub fn is_shut(&self) -> bool {
        self.slot().closed
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::StreamExt;
    use futures::channel::mpsc;

    use super::*;

    type TestSink = futures::sink::SinkMapErr<
        mpsc::UnboundedSender<Command>,
        fn(mpsc::SendError) -> DeckError,
    >;

    fn gate(
        timeout: Option<Duration>,
    ) -> (Arc<CommandGate<TestSink>>, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded();
        let sink: TestSink = tx.sink_map_err(DeckError::from as fn(mpsc::SendError) -> DeckError);
        (Arc::new(CommandGate::new(sink, timeout)), rx)
    }

    fn ok() -> Response {
        Response::from_header("200 ok").unwrap()
    }

    #[tokio::test]
    async fn send_resolves_with_reply() {
        let (gate, mut wire) = gate(None);

        let sender = tokio::spawn({
            let gate = gate.clone();
            async move { gate.send(Command::Ping).await }
        });

        assert_eq!(wire.next().await, Some(Command::Ping));
        assert!(gate.is_pending());
        gate.resolve(ok()).unwrap();

        let reply = sender.await.unwrap().unwrap();
        assert_eq!(reply.code(), 200);
        assert!(!gate.is_pending());
    }

    #[tokio::test]
    async fn resolve_without_pending_hands_response_back() {
        let (gate, _wire) = gate(None);
        let back = gate.resolve(ok()).unwrap_err();
        assert_eq!(back.code(), 200);
    }

    #[tokio::test]
    async fn second_command_waits_for_first_reply() {
        let (gate, mut wire) = gate(None);

        let first = tokio::spawn({
            let gate = gate.clone();
            async move { gate.send(Command::Record).await }
        });
        assert_eq!(wire.next().await, Some(Command::Record));

        let second = tokio::spawn({
            let gate = gate.clone();
            async move { gate.send(Command::Stop).await }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(wire.try_next().is_err(), "second command written early");

        gate.resolve(ok()).unwrap();
        assert_eq!(wire.next().await, Some(Command::Stop));
        gate.resolve(Response::from_header("101 invalid state").unwrap())
            .unwrap();

        assert_eq!(first.await.unwrap().unwrap().code(), 200);
        assert!(second.await.unwrap().unwrap().is_error());
    }

    #[tokio::test]
    async fn timeout_releases_the_gate() {
        let (gate, mut wire) = gate(Some(Duration::from_millis(50)));

        let err = gate.send(Command::Ping).await.unwrap_err();
        assert!(matches!(err, DeckError::Timeout(_)));
        assert!(!gate.is_pending());
        assert_eq!(gate.owed(), 1);
        assert_eq!(wire.next().await, Some(Command::Ping));

        // The late reply is swallowed, not handed back as an orphan.
        assert!(gate.resolve(ok()).is_ok());
        assert_eq!(gate.owed(), 0);
        assert!(gate.resolve(ok()).is_err());
    }

    #[tokio::test]
    async fn late_reply_does_not_resolve_next_command() {
        let (gate, mut wire) = gate(Some(Duration::from_millis(50)));

        assert!(gate.send(Command::Stop).await.is_err());
        assert_eq!(wire.next().await, Some(Command::Stop));

        let record = tokio::spawn({
            let gate = gate.clone();
            async move { gate.send(Command::Record).await }
        });
        assert_eq!(wire.next().await, Some(Command::Record));

        gate.resolve(Response::from_header("101 invalid state").unwrap())
            .unwrap();
        assert!(gate.is_pending());
        gate.resolve(ok()).unwrap();

        assert_eq!(record.await.unwrap().unwrap().code(), 200);
    }

    #[tokio::test]
    async fn cancelled_caller_leaves_its_reply_owed() {
        let (gate, mut wire) = gate(None);

        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), gate.send(Command::Stop)).await;
        assert!(abandoned.is_err());
        assert_eq!(wire.next().await, Some(Command::Stop));
        assert!(!gate.is_pending());
        assert_eq!(gate.owed(), 1);

        let record = tokio::spawn({
            let gate = gate.clone();
            async move { gate.send(Command::Record).await }
        });
        assert_eq!(wire.next().await, Some(Command::Record));
        gate.resolve(Response::from_header("101 invalid state").unwrap())
            .unwrap();
        gate.resolve(ok()).unwrap();

        assert!(!record.await.unwrap().unwrap().is_error());
    }

    #[tokio::test]
    async fn cancelled_before_write_owes_nothing() {
        let (gate, mut wire) = gate(None);

        let holder = tokio::spawn({
            let gate = gate.clone();
            async move { gate.send(Command::Ping).await }
        });
        assert_eq!(wire.next().await, Some(Command::Ping));

        // Still queued behind the lock when dropped.
        let queued =
            tokio::time::timeout(Duration::from_millis(50), gate.send(Command::Stop)).await;
        assert!(queued.is_err());

        gate.resolve(ok()).unwrap();
        assert!(holder.await.unwrap().is_ok());
        assert_eq!(gate.owed(), 0);
        assert!(wire.try_next().is_err(), "queued command was written");
    }

    #[tokio::test]
    async fn invalid_argument_never_reaches_the_wire() {
        let (gate, mut wire) = gate(None);

        let err = gate
            .send(Command::RecordNamed("take\r\nstop".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, DeckError::InvalidArgument(_)));
        assert!(!gate.is_pending());
        assert!(wire.try_next().is_err());
    }

    #[tokio::test]
    async fn shut_forgets_owed_replies() {
        let (gate, _wire) = gate(Some(Duration::from_millis(20)));
        assert!(gate.send(Command::Ping).await.is_err());
        assert_eq!(gate.owed(), 1);

        gate.shut();
        assert_eq!(gate.owed(), 0);
    }

    #[tokio::test]
    async fn fail_pending_reports_connection_lost() {
        let (gate, mut wire) = gate(None);

        let sender = tokio::spawn({
            let gate = gate.clone();
            async move { gate.send(Command::ClipsGet).await }
        });
        assert_eq!(wire.next().await, Some(Command::ClipsGet));

        assert!(gate.fail_pending());
        assert!(matches!(
            sender.await.unwrap(),
            Err(DeckError::ConnectionLost)
        ));
        assert!(!gate.fail_pending());
    }

    #[tokio::test]
    async fn shut_gate_refuses_new_commands() {
        let (gate, mut wire) = gate(None);

        let sender = tokio::spawn({
            let gate = gate.clone();
            async move { gate.send(Command::Stop).await }
        });
        assert_eq!(wire.next().await, Some(Command::Stop));

        assert!(gate.shut());
        assert!(gate.is_shut());
        assert!(matches!(
            sender.await.unwrap(),
            Err(DeckError::ConnectionLost)
        ));
        assert!(matches!(
            gate.send(Command::Ping).await,
            Err(DeckError::NotConnected)
        ));
        assert!(wire.try_next().is_err(), "nothing written after shut");
    }

    #[tokio::test]
    async fn closed_writer_fails_without_leaving_pending() {
        let (gate, wire) = gate(None);
        drop(wire);

        let err = gate.send(Command::Ping).await.unwrap_err();
        assert!(matches!(err, DeckError::ChannelClosed));
        assert!(!gate.is_pending());
    }
}
