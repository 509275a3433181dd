//! Registration and deregistration of team servers

use crate::error::{AddressError, AuthError, RegistryResult};
use crate::monitor::{MonitorConfig, MonitorSet};
use crate::poll::Prober;
use crate::registry::{TeamRegistry, Upsert};
use crate::tokens::{TeamId, TokenTable};
use parking_lot::Mutex;
use reqwest::Url;
use std::sync::Arc;
use tracing::info;

/// Scheme assumed when a registered address has none
pub const DEFAULT_SCHEME: &str = "http";

/// Normalize a registered address so that appending a resource name to it
/// yields a valid URL: the scheme defaults to `http` and the path always ends
/// in `/`.
pub fn normalize_address(raw: &str) -> Result<String, AddressError> {
    if raw.is_empty() {
        return Err(AddressError::Missing);
    }

    // A scheme is only present when `://` comes before any path, query or fragment
    let has_scheme = raw
        .find("://")
        .map(|i| !raw[..i].contains(|c| matches!(c, '/' | '?' | '#')))
        .unwrap_or(false);
    let with_scheme = if has_scheme {
        raw.to_string()
    } else {
        format!("{}://{}", DEFAULT_SCHEME, raw)
    };

    let mut url = Url::parse(&with_scheme).map_err(|e| AddressError::Malformed(e.to_string()))?;
    if url.cannot_be_a_base() {
        return Err(AddressError::Malformed(format!(
            "{} cannot hold a path",
            raw
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url.to_string())
}

/// Entry point for mutating the registry
///
/// Registration and deregistration are serialized against each other so a
/// team's record and its monitor are always created and torn down together.
pub struct RegistrationService {
    tokens: Arc<TokenTable>,
    registry: Arc<TeamRegistry>,
    monitors: MonitorSet,
    lifecycle: Mutex<()>,
}

impl RegistrationService {
    pub fn new(
        tokens: Arc<TokenTable>,
        registry: Arc<TeamRegistry>,
        prober: Arc<dyn Prober>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            monitors: MonitorSet::new(registry.clone(), prober, config),
            tokens,
            registry,
            lifecycle: Mutex::new(()),
        }
    }

    pub fn registry(&self) -> &Arc<TeamRegistry> {
        &self.registry
    }

    pub fn tokens(&self) -> &Arc<TokenTable> {
        &self.tokens
    }

    fn resolve(&self, token: &str) -> Result<TeamId, AuthError> {
        if token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        self.tokens
            .lookup(token)
            .ok_or_else(|| AuthError::UnknownToken(token.to_string()))
    }

    /// Register `raw_address` for the team owning `token`.
    ///
    /// The first registration of a team starts its monitor; later ones only
    /// replace the address, which the monitor picks up on its next tick.
    /// Must be called from within a tokio runtime.
    pub fn register(&self, token: &str, raw_address: &str) -> RegistryResult<TeamId> {
        let team = self.resolve(token)?;
        let address = normalize_address(raw_address)?;

        let _guard = self.lifecycle.lock();
        match self.registry.insert_or_update_address(team, address.clone()) {
            Upsert::Inserted { generation } => {
                info!(team = %team, address = %address, "Team registered");
                self.monitors.start(team, generation);
            }
            Upsert::Updated => {
                info!(team = %team, address = %address, "Team address updated");
            }
        }
        Ok(team)
    }

    /// Remove `team`'s entry. The token must belong to that same team.
    pub fn deregister(&self, token: &str, team: TeamId) -> RegistryResult<()> {
        let owner = self.resolve(token)?;
        if owner != team {
            return Err(AuthError::TokenMismatch(team).into());
        }

        let _guard = self.lifecycle.lock();
        let removed = self.registry.remove(team).is_some();
        self.monitors.stop(team);
        if removed {
            info!(team = %team, "Team deregistered");
        }
        Ok(())
    }

    /// Whether `team` currently has a running monitor
    pub fn is_monitored(&self, team: TeamId) -> bool {
        self.monitors.is_running(team)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RegistryError;
    use crate::health::HealthStatus;
    use crate::poll::PollError;
    use async_trait::async_trait;
    use std::time::Duration;

    struct UnreachableProber;

    #[async_trait]
    impl Prober for UnreachableProber {
        async fn fetch_message(&self, _address: &str) -> Result<String, PollError> {
            Err(PollError::Request("connection refused".to_string()))
        }
    }

    fn service() -> RegistrationService {
        let tokens = Arc::new(TokenTable::derive("test-secret", 20));
        let config = MonitorConfig {
            poll_interval: Duration::from_millis(20),
            poll_timeout: Duration::from_millis(100),
            request_timeout: Duration::from_secs(1),
        };
        RegistrationService::new(
            tokens,
            Arc::new(TeamRegistry::new()),
            Arc::new(UnreachableProber),
            config,
        )
    }

    fn token(service: &RegistrationService, team: usize) -> String {
        service.tokens().token(TeamId(team)).unwrap().to_string()
    }

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address("0.1.2.3:3294").unwrap(), "http://0.1.2.3:3294/");
        assert_eq!(normalize_address("https://0.1.2.4").unwrap(), "https://0.1.2.4/");
        assert_eq!(normalize_address("0.1.2.6").unwrap(), "http://0.1.2.6/");
        assert_eq!(
            normalize_address("http://example.com/team").unwrap(),
            "http://example.com/team/"
        );
        assert_eq!(
            normalize_address("example.com/team/").unwrap(),
            "http://example.com/team/"
        );
        assert_eq!(
            normalize_address("localhost:8081").unwrap(),
            "http://localhost:8081/"
        );
    }

    #[test]
    fn test_normalize_address_with_url_in_query() {
        assert_eq!(
            normalize_address("localhost:8081/p?next=http://x").unwrap(),
            "http://localhost:8081/p/?next=http://x"
        );
        assert_eq!(
            normalize_address("team.example#ref=https://x").unwrap(),
            "http://team.example/#ref=https://x"
        );
        assert_eq!(
            normalize_address("https://team.example/p?next=http://x").unwrap(),
            "https://team.example/p/?next=http://x"
        );
    }

    #[test]
    fn test_normalize_address_errors() {
        assert_eq!(normalize_address(""), Err(AddressError::Missing));
        assert!(matches!(
            normalize_address("http://"),
            Err(AddressError::Malformed(_))
        ));
        assert!(matches!(
            normalize_address("http://[::1"),
            Err(AddressError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_tokens() {
        let service = service();

        assert_eq!(
            service.register("", "0.1.2.3"),
            Err(RegistryError::Auth(AuthError::MissingToken))
        );
        assert_eq!(
            service.register("nope", "0.1.2.3"),
            Err(RegistryError::Auth(AuthError::UnknownToken("nope".to_string())))
        );
        assert!(service.registry().is_empty());
    }

    #[tokio::test]
    async fn test_register_rejects_bad_address() {
        let service = service();
        let tok = token(&service, 4);

        assert_eq!(
            service.register(&tok, ""),
            Err(RegistryError::Address(AddressError::Missing))
        );
        assert!(matches!(
            service.register(&tok, "http://"),
            Err(RegistryError::Address(AddressError::Malformed(_)))
        ));
        assert!(service.registry().is_empty());
        assert!(!service.is_monitored(TeamId(4)));
    }

    #[tokio::test]
    async fn test_register_normalizes_and_starts_monitor() {
        let service = service();
        let tok = token(&service, 4);

        assert_eq!(service.register(&tok, "0.1.2.3:3294"), Ok(TeamId(4)));

        let record = service.registry().get(TeamId(4)).unwrap();
        assert_eq!(record.address, "http://0.1.2.3:3294/");
        assert!(service.is_monitored(TeamId(4)));
    }

    #[tokio::test]
    async fn test_reregister_updates_address_only() {
        let service = service();
        let tok = token(&service, 4);
        service.register(&tok, "0.1.2.3:3294").unwrap();

        for _ in 0..100 {
            if service.registry().get(TeamId(4)).unwrap().status.is_error() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let before = service.registry().get(TeamId(4)).unwrap().status;
        assert!(before.is_error());

        service.register(&tok, "0.1.2.6").unwrap();
        let after = service.registry().get(TeamId(4)).unwrap();
        assert_eq!(after.address, "http://0.1.2.6/");
        assert_eq!(after.status, before);
        assert!(service.is_monitored(TeamId(4)));
    }

    #[tokio::test]
    async fn test_deregister_requires_own_token() {
        let service = service();
        let tok4 = token(&service, 4);
        let tok11 = token(&service, 11);
        service.register(&tok4, "0.1.2.3").unwrap();
        service.register(&tok11, "0.1.2.4").unwrap();

        assert_eq!(
            service.deregister(&tok4, TeamId(11)),
            Err(RegistryError::Auth(AuthError::TokenMismatch(TeamId(11))))
        );
        assert!(service.registry().get(TeamId(11)).is_some());

        assert_eq!(service.deregister(&tok11, TeamId(11)), Ok(()));
        assert!(service.registry().get(TeamId(11)).is_none());
        assert!(!service.is_monitored(TeamId(11)));
        assert!(service.registry().get(TeamId(4)).is_some());

        // Deleting an absent entry is fine.
        assert_eq!(service.deregister(&tok11, TeamId(11)), Ok(()));
    }

    #[tokio::test]
    async fn test_reregister_after_deregister_starts_fresh() {
        let service = service();
        let tok = token(&service, 2);
        service.register(&tok, "0.1.2.3").unwrap();
        service.deregister(&tok, TeamId(2)).unwrap();

        service.register(&tok, "0.1.2.9").unwrap();
        let record = service.registry().get(TeamId(2)).unwrap();
        assert_eq!(record.address, "http://0.1.2.9/");
        assert!(matches!(
            record.status,
            HealthStatus::Pending | HealthStatus::Error(_)
        ));
        assert!(service.is_monitored(TeamId(2)));
    }
}
