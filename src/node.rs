//! # Node Trait and Runtime
//!
//! A node is a `process(input) -> output` transformation; the runtime is
//! the loop that drives one against a mailbox. Each runtime owns one
//! background task that pulls a unit from the mailbox, invokes the node,
//! and fans any result back out — paired with the mailbox's own receiver
//! loop, that makes two concurrent loops per node, communicating only
//! through the mailbox's bounded inbox.
//!
//! Failures are isolated per iteration: an `Err` from `process` or
//! `produce` is logged with the node id and the loop continues. A single
//! bad input never terminates a node, and never cascades to its peers.
//!
//! Lifecycle is `starting -> running -> stopping -> stopped`, observable at
//! any time. There is no "armed but not started" state: spawning the
//! runtime launches the loop immediately. `stop` is cooperative and
//! best-effort — it flips a flag checked at loop-iteration granularity and
//! joins with a bounded wait, so worst-case stop latency is the largest
//! in-flight poll timeout, not unbounded.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{Duration, sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::mailbox::MailboxLike;
use crate::message::Payload;

/// Default bounded wait for the loop task when stopping.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_millis(100);

/// Idle delay for a source whose `produce` returned nothing; bounds CPU
/// use at the same cadence as the mailbox poll.
const SOURCE_IDLE_DELAY: Duration = Duration::from_millis(100);

/// Error type for per-message node failures. Consumed by the runtime loop:
/// logged, swallowed, never propagated to peers.
pub type NodeError = Box<dyn std::error::Error + Send + Sync>;

/// What a node does with the dataflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
  /// Generates data: `produce` is called instead of pulling the mailbox.
  Source,
  /// Consumes one unit, may emit one unit.
  Transform,
  /// Consumes units and emits nothing.
  Sink,
}

/// A worker unit driven by a [`NodeRuntime`].
///
/// Transforms and sinks implement [`Node::process`]; sources override
/// [`Node::produce`] and report [`NodeKind::Source`] so the runtime calls
/// it instead of polling the mailbox. Payload shapes are opaque to the
/// fabric — it only passes them through.
#[async_trait]
pub trait Node<M: Payload>: Send {
  /// Role of this node in the dataflow. Defaults to a transform.
  fn kind(&self) -> NodeKind {
    NodeKind::Transform
  }

  /// Produces the next unit for a source node. `Ok(None)` means nothing
  /// to emit right now; sources pace themselves inside this call.
  async fn produce(&mut self) -> Result<Option<M>, NodeError> {
    Ok(None)
  }

  /// Processes one unit. `Ok(None)` means nothing to emit downstream.
  async fn process(&mut self, input: M) -> Result<Option<M>, NodeError>;
}

#[async_trait]
impl<M: Payload> Node<M> for Box<dyn Node<M>> {
  fn kind(&self) -> NodeKind {
    (**self).kind()
  }

  async fn produce(&mut self) -> Result<Option<M>, NodeError> {
    (**self).produce().await
  }

  async fn process(&mut self, input: M) -> Result<Option<M>, NodeError> {
    (**self).process(input).await
  }
}

/// Lifecycle state of a node runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum NodeState {
  /// Fields initialized, loop not yet scheduled.
  Starting = 0,
  /// Background loop is processing.
  Running = 1,
  /// Stop requested; loop winding down.
  Stopping = 2,
  /// Loop exited, or the join timeout elapsed — whichever came first.
  Stopped = 3,
}

#[derive(Debug)]
struct StateCell(AtomicU8);

impl StateCell {
  fn new(state: NodeState) -> Self {
    Self(AtomicU8::new(state as u8))
  }

  fn set(&self, state: NodeState) {
    self.0.store(state as u8, Ordering::SeqCst);
  }

  fn get(&self) -> NodeState {
    match self.0.load(Ordering::SeqCst) {
      0 => NodeState::Starting,
      1 => NodeState::Running,
      2 => NodeState::Stopping,
      _ => NodeState::Stopped,
    }
  }
}

/// Drives one node against one mailbox in a dedicated background task.
pub struct NodeRuntime {
  id: String,
  state: Arc<StateCell>,
  cancel: CancellationToken,
  task: Option<JoinHandle<()>>,
  join_timeout: Duration,
}

impl NodeRuntime {
  /// Launches the runtime. The loop starts immediately; the state
  /// transitions to `Running` as soon as the task is scheduled.
  pub fn spawn<M, N, B>(id: impl Into<String>, node: N, mailbox: B) -> Self
  where
    M: Payload,
    N: Node<M> + 'static,
    B: MailboxLike<M> + 'static,
  {
    let id = id.into();
    let state = Arc::new(StateCell::new(NodeState::Starting));
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_loop(
      id.clone(),
      node,
      mailbox,
      Arc::clone(&state),
      cancel.clone(),
    ));
    Self {
      id,
      state,
      cancel,
      task: Some(task),
      join_timeout: DEFAULT_JOIN_TIMEOUT,
    }
  }

  /// Sets the bounded wait used by [`NodeRuntime::stop`].
  #[must_use]
  pub fn with_join_timeout(mut self, join_timeout: Duration) -> Self {
    self.join_timeout = join_timeout;
    self
  }

  /// Returns the node id this runtime drives.
  pub fn id(&self) -> &str {
    &self.id
  }

  /// Returns the current lifecycle state.
  pub fn state(&self) -> NodeState {
    self.state.get()
  }

  /// Whether the background loop is processing.
  pub fn is_running(&self) -> bool {
    self.state.get() == NodeState::Running
  }

  /// Requests a cooperative stop: flips the stop flag, lets the loop stop
  /// its mailbox, and joins the task with a bounded wait. Returns once the
  /// loop exited or the join timeout elapsed — best-effort shutdown, not a
  /// hard kill. Idempotent.
  pub async fn stop(&mut self) {
    if self.state.get() != NodeState::Stopped {
      self.state.set(NodeState::Stopping);
    }
    self.cancel.cancel();
    if let Some(task) = self.task.take() {
      if timeout(self.join_timeout, task).await.is_err() {
        warn!(node = %self.id, "node loop did not exit within the join timeout");
      }
    }
    self.state.set(NodeState::Stopped);
  }
}

async fn run_loop<M, N, B>(
  id: String,
  mut node: N,
  mut mailbox: B,
  state: Arc<StateCell>,
  cancel: CancellationToken,
) where
  M: Payload,
  N: Node<M>,
  B: MailboxLike<M>,
{
  state.set(NodeState::Running);
  info!(node = %id, "node running");

  while !cancel.is_cancelled() {
    let outcome = match node.kind() {
      NodeKind::Source => match node.produce().await {
        Ok(None) => {
          // Drained source: idle at the poll cadence instead of spinning.
          tokio::select! {
            _ = cancel.cancelled() => break,
            _ = sleep(SOURCE_IDLE_DELAY) => {}
          }
          continue;
        }
        other => other,
      },
      NodeKind::Transform | NodeKind::Sink => match mailbox.receive().await {
        Some(input) => node.process(input).await,
        None => continue,
      },
    };

    match outcome {
      Ok(Some(output)) => {
        if let Err(e) = mailbox.send(&output).await {
          warn!(node = %id, error = %e, "failed to fan out result");
        }
      }
      Ok(None) => {}
      Err(e) => {
        // Crash isolation: one bad input never terminates the node.
        error!(node = %id, error = %e, "processing failed, continuing");
      }
    }
  }

  state.set(NodeState::Stopping);
  mailbox.stop().await;
  state.set(NodeState::Stopped);
  info!(node = %id, "node stopped");
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::FabricError;
  use std::collections::VecDeque;
  use std::sync::Mutex;

  /// In-memory mailbox: scripted inbound units, captured outbound sends.
  struct ScriptedMailbox {
    incoming: Mutex<VecDeque<String>>,
    sent: Arc<Mutex<Vec<String>>>,
  }

  impl ScriptedMailbox {
    fn new(incoming: &[&str]) -> (Self, Arc<Mutex<Vec<String>>>) {
      let sent = Arc::new(Mutex::new(Vec::new()));
      (
        Self {
          incoming: Mutex::new(incoming.iter().map(|s| s.to_string()).collect()),
          sent: Arc::clone(&sent),
        },
        sent,
      )
    }
  }

  #[async_trait]
  impl MailboxLike<String> for ScriptedMailbox {
    async fn send(&self, message: &String) -> Result<(), FabricError> {
      self.sent.lock().expect("lock").push(message.clone());
      Ok(())
    }

    async fn receive(&mut self) -> Option<String> {
      let next = self.incoming.lock().expect("lock").pop_front();
      if next.is_none() {
        sleep(Duration::from_millis(10)).await;
      }
      next
    }

    async fn stop(&mut self) {}
  }

  /// Uppercases its input; fails on the poison unit.
  struct UppercaseNode {
    processed: Arc<Mutex<usize>>,
  }

  #[async_trait]
  impl Node<String> for UppercaseNode {
    async fn process(&mut self, input: String) -> Result<Option<String>, NodeError> {
      if input == "poison" {
        return Err("poisoned input".into());
      }
      *self.processed.lock().expect("lock") += 1;
      Ok(Some(input.to_uppercase()))
    }
  }

  async fn wait_until<F: Fn() -> bool>(predicate: F) {
    for _ in 0..100 {
      if predicate() {
        return;
      }
      sleep(Duration::from_millis(20)).await;
    }
  }

  #[tokio::test]
  async fn test_transform_results_are_fanned_out() {
    let (mailbox, sent) = ScriptedMailbox::new(&["one", "two"]);
    let processed = Arc::new(Mutex::new(0));
    let node = UppercaseNode {
      processed: Arc::clone(&processed),
    };
    let mut runtime = NodeRuntime::spawn("upper", node, mailbox);

    wait_until(|| sent.lock().expect("lock").len() == 2).await;
    assert_eq!(
      *sent.lock().expect("lock"),
      vec!["ONE".to_string(), "TWO".to_string()]
    );
    runtime.stop().await;
  }

  #[tokio::test]
  async fn test_a_poisoned_input_does_not_stop_the_node() {
    let (mailbox, sent) = ScriptedMailbox::new(&["good-1", "poison", "good-2"]);
    let processed = Arc::new(Mutex::new(0));
    let node = UppercaseNode {
      processed: Arc::clone(&processed),
    };
    let mut runtime = NodeRuntime::spawn("resilient", node, mailbox);

    wait_until(|| *processed.lock().expect("lock") == 2).await;
    assert_eq!(*processed.lock().expect("lock"), 2);
    assert_eq!(
      *sent.lock().expect("lock"),
      vec!["GOOD-1".to_string(), "GOOD-2".to_string()]
    );
    assert!(runtime.is_running());
    runtime.stop().await;
  }

  /// Emits a fixed batch, then runs dry.
  struct BatchSource {
    remaining: VecDeque<String>,
  }

  #[async_trait]
  impl Node<String> for BatchSource {
    fn kind(&self) -> NodeKind {
      NodeKind::Source
    }

    async fn produce(&mut self) -> Result<Option<String>, NodeError> {
      Ok(self.remaining.pop_front())
    }

    async fn process(&mut self, _input: String) -> Result<Option<String>, NodeError> {
      Ok(None)
    }
  }

  #[tokio::test]
  async fn test_source_emissions_are_sent() {
    let (mailbox, sent) = ScriptedMailbox::new(&[]);
    let node = BatchSource {
      remaining: ["a", "b", "c"].iter().map(|s| s.to_string()).collect(),
    };
    let mut runtime = NodeRuntime::spawn("batch", node, mailbox);

    wait_until(|| sent.lock().expect("lock").len() == 3).await;
    assert_eq!(
      *sent.lock().expect("lock"),
      vec!["a".to_string(), "b".to_string(), "c".to_string()]
    );
    runtime.stop().await;
  }

  #[tokio::test]
  async fn test_stop_is_idempotent_and_bounded() {
    let (mailbox, _sent) = ScriptedMailbox::new(&[]);
    let processed = Arc::new(Mutex::new(0));
    let node = UppercaseNode { processed };
    let mut runtime = NodeRuntime::spawn("stopper", node, mailbox);

    let bounded = timeout(Duration::from_secs(2), async {
      runtime.stop().await;
      runtime.stop().await;
    })
    .await;
    assert!(bounded.is_ok());
    assert_eq!(runtime.state(), NodeState::Stopped);
  }

  #[tokio::test]
  async fn test_lifecycle_reaches_running_then_stopped() {
    let (mailbox, _sent) = ScriptedMailbox::new(&[]);
    let processed = Arc::new(Mutex::new(0));
    let node = UppercaseNode { processed };
    let mut runtime = NodeRuntime::spawn("lifecycle", node, mailbox);

    wait_until(|| runtime.is_running()).await;
    assert!(runtime.is_running());
    runtime.stop().await;
    assert_eq!(runtime.state(), NodeState::Stopped);
  }
}
