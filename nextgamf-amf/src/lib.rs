//! nextgamf-amf - 5G AMF signaling engine
#![allow(missing_docs)]
//!
//! This crate implements the NAS side of an Access and Mobility Management
//! Function:
//!
//! - Registration, authentication, security mode control and identification
//! - PDU session establishment, modification and release towards session
//!   management
//! - Service request, paging, deregistration and UE context release
//! - Snapshots of registered UE contexts to an external state store
//!
//! # Architecture
//!
//! The AMF uses an actor-based task model where each component runs as an
//! independent async task communicating via typed message channels.
//!
//! ```text
//! ┌────────────────────────────────────────────────────┐
//! │                        AMF                          │
//! │  ┌─────────┐   ┌─────────┐   ┌─────────┐            │
//! │  │  NGAP   │◄─►│   AMF   │◄─►│ Client  │◄──► collaborators
//! │  │  Task   │   │  Task   │   │  Task   │            │
//! │  └────┬────┘   └────┬────┘   └─────────┘            │
//! │       │             │        ┌─────────────┐        │
//! │       │             └───────►│ Persistence │──► state store
//! │       │                      │    Task     │        │
//! └───────┼──────────────────────┴─────────────┴────────┘
//!         ▼
//!    radio node
//! ```
//!
//! The AMF task owns every UE context. Its logic lives in [`AmfCore`], a
//! synchronous state machine that turns one event into a list of actions.
//!
//! # Example
//!
//! ```rust,ignore
//! use nextgamf_amf::{AmfApp, LocalServices, StartOptions};
//! use nextgamf_amf::persistence::open_store;
//!
//! let config = nextgamf_common::AmfConfig::from_yaml_file("config/amf.yaml")?;
//! let collaborators = LocalServices::from_config(&config.local_services)?;
//! let state = open_store(&config.persistence)?;
//! let (radio_tx, radio_rx) = tokio::sync::mpsc::channel(256);
//! let app = AmfApp::start(config, collaborators, state, radio_tx, StartOptions::default()).await?;
//! ```

pub mod amf;
pub mod app;
pub mod context;
pub mod ngap;
pub mod persistence;
pub(crate) mod procedures;
pub mod services;
pub mod tasks;
pub mod timer;

pub use amf::{Action, AmfCore, AmfEvent, AmfTask, NetworkEvent, ProcedureError, ProcedureResult};
pub use app::{AmfApp, StartOptions};
pub use context::{AmfUeNgapId, CmState, MmState, SessionState, UeContext, UeContextStore};
pub use ngap::{NgapTask, RanDownlink, RanUplink, UeNgapIds};
pub use persistence::{FileStore, MemoryStore, PersistOp, PersistenceError, PersistenceTask, StateStore};
pub use services::{ClientTask, Collaborators, LocalServices};

// Re-export task framework types
pub use tasks::{
    AmfMessage, AmfTaskBase, Inbox, NgapInbox, NgapMessage, PersistenceMessage, Task, TaskHandle, TaskMessage,
    UnboundedTaskHandle, DEFAULT_CHANNEL_CAPACITY,
};

// Re-export lifecycle management types
pub use tasks::{TaskError, TaskId, TaskManager, TaskState, DEFAULT_SHUTDOWN_TIMEOUT_MS, SHUTDOWN_ORDER};
