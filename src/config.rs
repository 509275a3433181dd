//! Registry configuration
//!
//! Everything the process needs at startup:
//! - the shared secret and number of team slots the token table is derived from
//! - monitor cadence and timeouts
//! - where the HTTP server listens

use crate::monitor::MonitorConfig;
use crate::poll::HttpProber;
use crate::registry::TeamRegistry;
use crate::rpc::RpcConfig;
use crate::service::RegistrationService;
use crate::tokens::{TokenTable, DEFAULT_TEAM_COUNT};
use std::sync::Arc;

/// Complete registry configuration
#[derive(Clone, Debug)]
pub struct DojoConfig {
    /// Secret the team tokens are derived from
    pub secret: String,
    /// Number of team slots
    pub team_count: usize,
    pub monitor: MonitorConfig,
    pub rpc: RpcConfig,
}

impl Default for DojoConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            team_count: DEFAULT_TEAM_COUNT,
            monitor: MonitorConfig::default(),
            rpc: RpcConfig::default(),
        }
    }
}

impl DojoConfig {
    /// Derive the token table for this configuration
    pub fn token_table(&self) -> TokenTable {
        TokenTable::derive(&self.secret, self.team_count)
    }

    /// Build a registration service with an empty registry that polls team
    /// servers over HTTP
    pub fn build_service(&self) -> Result<RegistrationService, reqwest::Error> {
        let prober = HttpProber::new(self.monitor.request_timeout)?;
        Ok(RegistrationService::new(
            Arc::new(self.token_table()),
            Arc::new(TeamRegistry::new()),
            Arc::new(prober),
            self.monitor.clone(),
        ))
    }
}
