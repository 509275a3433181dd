//! Dojo rendezvous registry
//!
//! Teams register the address of their server with a secret-derived token.
//! The registry polls `<address>message` for every registered team once per
//! interval and exposes each team's address and last status.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                 HTTP layer (rpc)                         │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐  ┌──────────────────┐  ┌─────────────┐  │
//! │  │ TokenTable  │  │ Registration     │  │ Team        │  │
//! │  │             │◄─┤ Service          ├─►│ Monitors    │  │
//! │  └─────────────┘  └────────┬─────────┘  └──────┬──────┘  │
//! ├────────────────────────────┴───────────────────┴─────────┤
//! │                 Team Registry (health records)           │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod health;
pub mod monitor;
pub mod poll;
pub mod registry;
pub mod rpc;
pub mod service;
pub mod tokens;

pub use config::DojoConfig;
pub use error::{AddressError, AuthError, RegistryError, RegistryResult};
pub use health::{HealthRecord, HealthStatus};
pub use monitor::{poll_with_timeout, MonitorConfig, MonitorSet, TeamMonitor};
pub use poll::{HttpProber, PollError, Prober};
pub use registry::{TeamRegistry, Upsert};
pub use rpc::{DojoRpc, RpcConfig};
pub use service::{normalize_address, RegistrationService};
pub use tokens::{TeamId, TokenTable, DEFAULT_TEAM_COUNT};
