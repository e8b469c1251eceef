//! Wallet authentication and first-time registration
//!
//! The wallet address is the platform's identity key: connecting a known
//! wallet logs the user in, an unknown one triggers registration. Profile
//! data (name, email) comes from the embedding application: each
//! registration opens its own response channel keyed by a request id and
//! publishes a [`ProfileRequest`] event, so any number of registrations can
//! be in flight concurrently.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument};
use uuid::Uuid;

use kredible_common::{KredibleError, ProfileInfo, Result, User, WalletError};
use kredible_store::Ledger;

type WalletResult<T> = std::result::Result<T, WalletError>;

/// Wallet collaborator: connection state and transaction signing
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WalletConnector: Send + Sync {
    /// Connect and return the wallet address
    async fn connect(&self) -> WalletResult<String>;

    /// Drop the connection
    async fn disconnect(&self) -> WalletResult<()>;

    /// Currently connected address, if any
    async fn public_key(&self) -> WalletResult<Option<String>>;

    /// Sign a transaction payload for the given network
    async fn sign_transaction(&self, payload: &str, network: &str) -> WalletResult<String>;
}

/// Simulated wallet: fixed address, fake signatures, no real keys
#[derive(Debug)]
pub struct SimulatedWallet {
    address: String,
    connected: RwLock<bool>,
}

impl SimulatedWallet {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            connected: RwLock::new(false),
        }
    }
}

#[async_trait]
impl WalletConnector for SimulatedWallet {
    async fn connect(&self) -> WalletResult<String> {
        *self.connected.write() = true;
        Ok(self.address.clone())
    }

    async fn disconnect(&self) -> WalletResult<()> {
        *self.connected.write() = false;
        Ok(())
    }

    async fn public_key(&self) -> WalletResult<Option<String>> {
        Ok(self.connected.read().then(|| self.address.clone()))
    }

    async fn sign_transaction(&self, _payload: &str, network: &str) -> WalletResult<String> {
        if !*self.connected.read() {
            return Err(WalletError::NotConnected);
        }
        Ok(format!("simulated-signature:{network}:{}", self.address))
    }
}

/// A pending registration published to the embedding application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRequest {
    pub request_id: Uuid,
    pub wallet_address: String,
}

/// Request/response registry for profile prompts.
///
/// Each registration gets its own oneshot answer channel under a fresh
/// request id; the embedder consumes [`ProfileRequest`] events and answers
/// with [`ProfilePrompts::fulfill`] (or gives up with `cancel`).
pub struct ProfilePrompts {
    pending: DashMap<Uuid, oneshot::Sender<ProfileInfo>>,
    requests: mpsc::UnboundedSender<ProfileRequest>,
}

impl ProfilePrompts {
    /// Create the registry and the event stream the embedder listens on
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ProfileRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                pending: DashMap::new(),
                requests: tx,
            }),
            rx,
        )
    }

    /// Open a prompt for a wallet and return the answer channel
    fn open(&self, wallet_address: &str) -> Result<oneshot::Receiver<ProfileInfo>> {
        let request_id = Uuid::new_v4();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(request_id, tx);

        let request = ProfileRequest {
            request_id,
            wallet_address: wallet_address.to_string(),
        };
        if self.requests.send(request).is_err() {
            self.pending.remove(&request_id);
            return Err(KredibleError::Internal(
                "profile request listener is gone".to_string(),
            ));
        }
        Ok(rx)
    }

    /// Answer a pending prompt
    pub fn fulfill(&self, request_id: Uuid, info: ProfileInfo) -> Result<()> {
        let (_, tx) = self.pending.remove(&request_id).ok_or_else(|| {
            KredibleError::not_found("profile request", request_id.to_string())
        })?;
        tx.send(info).map_err(|_| {
            KredibleError::Internal("registration is no longer waiting".to_string())
        })
    }

    /// Abandon a pending prompt; the waiting registration fails
    pub fn cancel(&self, request_id: Uuid) -> bool {
        self.pending.remove(&request_id).is_some()
    }

    /// Prompts currently awaiting an answer
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

/// Result of a wallet authentication
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub user: User,
    pub is_new_user: bool,
}

/// Login/registration flow over the wallet collaborator
pub struct AuthFlow {
    ledger: Ledger,
    wallet: Arc<dyn WalletConnector>,
    prompts: Arc<ProfilePrompts>,
    session: RwLock<Option<String>>,
}

impl AuthFlow {
    pub fn new(
        ledger: Ledger,
        wallet: Arc<dyn WalletConnector>,
        prompts: Arc<ProfilePrompts>,
    ) -> Self {
        Self {
            ledger,
            wallet,
            prompts,
            session: RwLock::new(None),
        }
    }

    /// Connect the wallet and log in or register
    #[instrument(skip(self))]
    pub async fn login(&self) -> Result<AuthOutcome> {
        let address = self.wallet.connect().await?;
        self.handle_wallet_auth(&address).await
    }

    /// Log in a connected wallet address, registering it on first contact
    pub async fn handle_wallet_auth(&self, wallet_address: &str) -> Result<AuthOutcome> {
        if let Some(user) = self.ledger.user_by_wallet(wallet_address).await? {
            *self.session.write() = Some(wallet_address.to_string());
            return Ok(AuthOutcome {
                user,
                is_new_user: false,
            });
        }

        // First connection: collect profile data through a dedicated prompt
        let answer = self.prompts.open(wallet_address)?;
        let info = answer
            .await
            .map_err(|_| KredibleError::Internal("profile prompt was cancelled".to_string()))?;

        let user = User::new(wallet_address, info.name, info.email);
        self.ledger.users.insert(&user).await?;
        debug!(wallet = %wallet_address, "registered new user");

        *self.session.write() = Some(wallet_address.to_string());
        Ok(AuthOutcome {
            user,
            is_new_user: true,
        })
    }

    /// Clear the session flag and drop the wallet connection
    pub async fn logout(&self) -> Result<()> {
        *self.session.write() = None;
        self.wallet.disconnect().await?;
        Ok(())
    }

    /// Wallet address of the logged-in user, if any
    pub fn current_session(&self) -> Option<String> {
        self.session.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kredible_store::InMemoryStore;

    fn flow() -> (Arc<AuthFlow>, mpsc::UnboundedReceiver<ProfileRequest>) {
        let ledger = Ledger::new(Arc::new(InMemoryStore::new()));
        let (prompts, requests) = ProfilePrompts::new();
        let wallet = Arc::new(SimulatedWallet::new("GAXB...K2M4"));
        (Arc::new(AuthFlow::new(ledger, wallet, prompts)), requests)
    }

    #[tokio::test]
    async fn test_known_wallet_logs_in_without_prompt() {
        let (flow, mut requests) = flow();

        // Register once
        let prompts = Arc::clone(&flow.prompts);
        let registration = tokio::spawn({
            let flow = Arc::clone(&flow);
            async move { flow.handle_wallet_auth("GAXB...K2M4").await }
        });
        let request = requests.recv().await.unwrap();
        prompts
            .fulfill(request.request_id, ProfileInfo::new("Alice", None))
            .unwrap();
        let outcome = registration.await.unwrap().unwrap();
        assert!(outcome.is_new_user);

        // Second login finds the user and never opens a prompt
        let outcome = flow.handle_wallet_auth("GAXB...K2M4").await.unwrap();
        assert!(!outcome.is_new_user);
        assert_eq!(outcome.user.name, "Alice");
        assert!(requests.try_recv().is_err());
        assert_eq!(flow.current_session().as_deref(), Some("GAXB...K2M4"));
    }

    #[tokio::test]
    async fn test_concurrent_registrations() {
        let (flow, mut requests) = flow();

        let first = tokio::spawn({
            let flow = Arc::clone(&flow);
            async move { flow.handle_wallet_auth("GAAA").await }
        });
        let second = tokio::spawn({
            let flow = Arc::clone(&flow);
            async move { flow.handle_wallet_auth("GBBB").await }
        });

        // Both prompts are pending at once, each under its own id
        let a = requests.recv().await.unwrap();
        let b = requests.recv().await.unwrap();
        assert_ne!(a.request_id, b.request_id);
        assert_eq!(flow.prompts.pending_count(), 2);

        // Answer each prompt for its own wallet, in arrival order reversed
        for request in [b, a] {
            let name = if request.wallet_address == "GAAA" {
                "Alice"
            } else {
                "Bob"
            };
            flow.prompts
                .fulfill(request.request_id, ProfileInfo::new(name, None))
                .unwrap();
        }

        let first = first.await.unwrap().unwrap();
        let second = second.await.unwrap().unwrap();

        // Each registration got its own answer
        let (alice, bob) = if first.user.wallet_address == "GAAA" {
            (&first.user, &second.user)
        } else {
            (&second.user, &first.user)
        };
        assert_eq!(alice.name, "Alice");
        assert_eq!(bob.name, "Bob");
        assert_eq!(flow.prompts.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_fulfill_unknown_request() {
        let (prompts, _requests) = ProfilePrompts::new();
        let err = prompts
            .fulfill(Uuid::new_v4(), ProfileInfo::new("Alice", None))
            .unwrap_err();
        assert!(matches!(err, KredibleError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_cancelled_prompt_fails_registration() {
        let (flow, mut requests) = flow();

        let registration = tokio::spawn({
            let flow = Arc::clone(&flow);
            async move { flow.handle_wallet_auth("GAAA").await }
        });
        let request = requests.recv().await.unwrap();
        assert!(flow.prompts.cancel(request.request_id));

        let err = registration.await.unwrap().unwrap_err();
        assert!(matches!(err, KredibleError::Internal(_)));
    }

    #[tokio::test]
    async fn test_login_logout_toggles_session() {
        let (flow, mut requests) = flow();

        let login = tokio::spawn({
            let flow = Arc::clone(&flow);
            async move { flow.login().await }
        });
        let request = requests.recv().await.unwrap();
        flow.prompts
            .fulfill(request.request_id, ProfileInfo::new("Alice", None))
            .unwrap();
        login.await.unwrap().unwrap();
        assert!(flow.current_session().is_some());

        flow.logout().await.unwrap();
        assert!(flow.current_session().is_none());
    }

    #[tokio::test]
    async fn test_connect_failure_propagates() {
        let ledger = Ledger::new(Arc::new(InMemoryStore::new()));
        let (prompts, _requests) = ProfilePrompts::new();

        let mut wallet = MockWalletConnector::new();
        wallet
            .expect_connect()
            .returning(|| Err(WalletError::ConnectionFailed("kit unavailable".into())));

        let flow = AuthFlow::new(ledger, Arc::new(wallet), prompts);
        let err = flow.login().await.unwrap_err();
        assert!(matches!(err, KredibleError::Wallet(_)));
        assert!(flow.current_session().is_none());
    }

    #[tokio::test]
    async fn test_simulated_wallet_signing() {
        let wallet = SimulatedWallet::new("GAXB...K2M4");
        assert!(matches!(
            wallet.sign_transaction("payload", "testnet").await,
            Err(WalletError::NotConnected)
        ));

        wallet.connect().await.unwrap();
        let signature = wallet.sign_transaction("payload", "testnet").await.unwrap();
        assert!(signature.contains("testnet"));
        assert_eq!(
            wallet.public_key().await.unwrap().as_deref(),
            Some("GAXB...K2M4")
        );
    }
}
