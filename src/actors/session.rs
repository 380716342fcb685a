//! Session Actor (C8): owns exactly one Agent Actor per (tenant_id,
//! node_id), registers itself with the Router, and drives a heartbeat
//! loop to keep its Reference Registry entry alive. Grounded on
//! `original_source/agents/router_actor.py`'s `SessionActor`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::domain::models::{AgentAddress, AgentMessage, RouterAddress, RouterMessage, SessionMessage};

const MAILBOX_CAPACITY: usize = 256;
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1800);

pub struct SessionActor {
    tenant_id: String,
    node_id: String,
    agent: AgentAddress,
    router: RouterAddress,
    should_run: Arc<AtomicBool>,
}

impl SessionActor {
    #[must_use]
    pub fn spawn(tenant_id: String, node_id: String, agent: AgentAddress, router: RouterAddress) -> mpsc::Sender<SessionMessage> {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        let should_run = Arc::new(AtomicBool::new(true));

        let actor = Self {
            tenant_id,
            node_id,
            agent,
            router,
            should_run: Arc::clone(&should_run),
        };

        let agent_for_run = actor.agent.clone();
        tokio::spawn(actor.register_and_heartbeat(tx.clone()));
        tokio::spawn(Self::run(rx, agent_for_run, should_run));
        tx
    }

    async fn register_and_heartbeat(self, self_address: mpsc::Sender<SessionMessage>) {
        let (reply_tx, reply_rx) = oneshot::channel();
        let registered = self
            .router
            .send(RouterMessage::RegisterActor {
                tenant_id: self.tenant_id.clone(),
                node_id: self.node_id.clone(),
                address: self_address,
                reply_to: reply_tx,
            })
            .await;
        if registered.is_err() {
            warn!("router mailbox closed before session could register");
            return;
        }
        let _ = reply_rx.await;

        while self.should_run.load(Ordering::Relaxed) {
            tokio::time::sleep(HEARTBEAT_INTERVAL).await;
            if !self.should_run.load(Ordering::Relaxed) {
                break;
            }
            let _ = self
                .router
                .send(RouterMessage::Heartbeat { tenant_id: self.tenant_id.clone(), node_id: self.node_id.clone() })
                .await;
        }
    }

    async fn run(mut mailbox: mpsc::Receiver<SessionMessage>, agent: AgentAddress, should_run: Arc<AtomicBool>) {
        while let Some(msg) = mailbox.recv().await {
            match msg {
                SessionMessage::Initialize { .. } => {
                    // Handled at spawn time; kept for protocol completeness
                    // in case a caller re-initializes an existing session.
                }
                SessionMessage::Forward { request, reply_to } => {
                    if agent.send(AgentMessage::NewTask { request, reply_to }).await.is_err() {
                        warn!("agent actor mailbox closed");
                    }
                }
                SessionMessage::Stop => {
                    should_run.store(false, Ordering::Relaxed);
                    break;
                }
            }
        }
    }
}
