//! The actor hierarchy (C7-C11): Router -> Session -> Agent -> Aggregator
//! -> Leaf -> Execution. Each long-lived actor is a tokio task owning one
//! `mpsc::Receiver` mailbox; its "address" is a clone of the matching
//! `mpsc::Sender`. See SPEC_FULL.md §2 for why this crate implements
//! actors as plain tokio tasks rather than pulling in an actor framework.

pub mod aggregator;
pub mod agent;
pub mod directory;
pub mod execution;
pub mod leaf;
pub mod router;
pub mod session;

pub use agent::AgentActor;
pub use directory::AddressDirectory;
pub use execution::ExecutionActor;
pub use leaf::LeafActor;
pub use router::RouterActor;
pub use session::SessionActor;
