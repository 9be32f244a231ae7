use crate::{
    chain::{
        ChainDescriptor,
        WalletTransport,
    },
    errors::GameError,
    storage::AccountStore,
};
use alloy::{
    primitives::Address,
    signers::local::PrivateKeySigner,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use rpassword::prompt_password;
use serde::Deserialize;
use serde_json::{
    Value,
    json,
};
use std::{
    fmt,
    fs,
    future::Future,
    path::{
        Path,
        PathBuf,
    },
    sync::{
        Arc,
        Mutex,
        PoisonError,
        atomic::{
            AtomicU64,
            Ordering,
        },
    },
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{
        self,
        MissedTickBehavior,
    },
};
use tracing::{
    debug,
    info,
    warn,
};

pub const USER_REJECTED: i64 = 4001;
pub const DISCONNECTED: i64 = 4900;
pub const UNRECOGNIZED_CHAIN: i64 = 4902;

pub const DEFAULT_WALLET_RPC_URL: &str = "http://127.0.0.1:1248";

/// EIP-1193 error: a numeric code plus the wallet's message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderError {
    pub code: i64,
    pub message: String,
}

impl ProviderError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message, self.code)
    }
}

impl std::error::Error for ProviderError {}

impl From<ProviderError> for GameError {
    fn from(err: ProviderError) -> Self {
        match err.code {
            USER_REJECTED => GameError::ConnectionRejected,
            DISCONNECTED => GameError::WalletUnavailable,
            _ => GameError::Other(err.message),
        }
    }
}

/// The subset of an EIP-1193 wallet this client talks to.
pub trait WalletProvider: Clone + Send + Sync + 'static {
    /// `eth_accounts`: exposed accounts, never prompts.
    fn accounts(&self) -> impl Future<Output = Result<Vec<Address>, ProviderError>> + Send;

    /// `eth_requestAccounts`: may prompt the user.
    fn request_accounts(
        &self,
    ) -> impl Future<Output = Result<Vec<Address>, ProviderError>> + Send;

    fn chain_id(&self) -> impl Future<Output = Result<u64, ProviderError>> + Send;

    fn switch_chain(&self, chain_id: u64)
    -> impl Future<Output = Result<(), ProviderError>> + Send;

    fn add_chain(
        &self,
        chain: &ChainDescriptor,
    ) -> impl Future<Output = Result<(), ProviderError>> + Send;

    fn transport(&self) -> WalletTransport;
}

/// `wallet_addEthereumChain` parameters for `chain`.
pub fn add_chain_params(chain: &ChainDescriptor) -> Value {
    json!([{
        "chainId": chain.hex_id(),
        "chainName": chain.name,
        "nativeCurrency": {
            "name": chain.native_currency.name,
            "symbol": chain.native_currency.symbol,
            "decimals": chain.native_currency.decimals,
        },
        "rpcUrls": chain.rpc.all(),
        "blockExplorerUrls": [chain.explorer.url],
    }])
}

fn parse_hex_chain_id(raw: &str) -> Result<u64, ProviderError> {
    let digits = raw.trim_start_matches("0x").trim_start_matches("0X");
    u64::from_str_radix(digits, 16)
        .map_err(|_| ProviderError::new(-32603, format!("invalid chain id {raw}")))
}

fn parse_accounts(raw: Vec<String>) -> Result<Vec<Address>, ProviderError> {
    raw.iter()
        .map(|a| {
            a.parse()
                .map_err(|_| ProviderError::new(-32603, format!("invalid account {a}")))
        })
        .collect()
}

#[derive(Deserialize)]
struct RpcErrorDto {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct RpcResponseDto {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorDto>,
}

/// Wallet bridge speaking EIP-1193 methods as JSON-RPC over HTTP.
#[derive(Clone)]
pub struct HttpWallet {
    url: String,
    http: reqwest::Client,
    next_id: Arc<AtomicU64>,
}

impl HttpWallet {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .wrap_err("failed to build HTTP client for wallet bridge")?;
        Ok(Self {
            url: url.into(),
            http,
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        debug!(method, id, "wallet request");
        let res = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|err| ProviderError::new(DISCONNECTED, err.to_string()))?;
        let dto: RpcResponseDto = res
            .json()
            .await
            .map_err(|err| ProviderError::new(DISCONNECTED, err.to_string()))?;
        if let Some(err) = dto.error {
            return Err(ProviderError::new(err.code, err.message));
        }
        Ok(dto.result.unwrap_or(Value::Null))
    }

    async fn request_addresses(&self, method: &str) -> Result<Vec<Address>, ProviderError> {
        let value = self.request(method, json!([])).await?;
        let raw: Vec<String> = serde_json::from_value(value)
            .map_err(|err| ProviderError::new(-32603, err.to_string()))?;
        parse_accounts(raw)
    }
}

impl WalletProvider for HttpWallet {
    async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.request_addresses("eth_accounts").await
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        self.request_addresses("eth_requestAccounts").await
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        let value = self.request("eth_chainId", json!([])).await?;
        let raw = value
            .as_str()
            .ok_or_else(|| ProviderError::new(-32603, "eth_chainId returned a non-string"))?;
        parse_hex_chain_id(raw)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError> {
        let params = json!([{ "chainId": format!("{chain_id:#x}") }]);
        self.request("wallet_switchEthereumChain", params).await?;
        Ok(())
    }

    async fn add_chain(&self, chain: &ChainDescriptor) -> Result<(), ProviderError> {
        self.request("wallet_addEthereumChain", add_chain_params(chain))
            .await?;
        Ok(())
    }

    fn transport(&self) -> WalletTransport {
        WalletTransport::Injected {
            url: self.url.clone(),
        }
    }
}

#[derive(Debug)]
struct KeystoreChains {
    active: u64,
    known: Vec<u64>,
}

/// A locally unlocked key presented through the same wallet interface.
/// It only knows the chain it was opened for until another is added.
#[derive(Clone)]
pub struct KeystoreWallet {
    signer: PrivateKeySigner,
    chains: Arc<Mutex<KeystoreChains>>,
}

impl KeystoreWallet {
    pub fn new(signer: PrivateKeySigner, chain_id: u64) -> Self {
        Self {
            signer,
            chains: Arc::new(Mutex::new(KeystoreChains {
                active: chain_id,
                known: vec![chain_id],
            })),
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }
}

impl WalletProvider for KeystoreWallet {
    async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        Ok(vec![self.signer.address()])
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        Ok(vec![self.signer.address()])
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        let chains = self.chains.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(chains.active)
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError> {
        let mut chains = self.chains.lock().unwrap_or_else(PoisonError::into_inner);
        if !chains.known.contains(&chain_id) {
            return Err(ProviderError::new(
                UNRECOGNIZED_CHAIN,
                format!("Unrecognized chain ID {chain_id:#x}"),
            ));
        }
        chains.active = chain_id;
        Ok(())
    }

    async fn add_chain(&self, chain: &ChainDescriptor) -> Result<(), ProviderError> {
        let mut chains = self.chains.lock().unwrap_or_else(PoisonError::into_inner);
        if !chains.known.contains(&chain.id) {
            chains.known.push(chain.id);
        }
        Ok(())
    }

    fn transport(&self) -> WalletTransport {
        WalletTransport::Local {
            signer: self.signer.clone(),
        }
    }
}

/// The wallet backends selectable from the command line.
#[derive(Clone)]
pub enum AnyWallet {
    Http(HttpWallet),
    Keystore(KeystoreWallet),
}

impl WalletProvider for AnyWallet {
    async fn accounts(&self) -> Result<Vec<Address>, ProviderError> {
        match self {
            AnyWallet::Http(w) => w.accounts().await,
            AnyWallet::Keystore(w) => w.accounts().await,
        }
    }

    async fn request_accounts(&self) -> Result<Vec<Address>, ProviderError> {
        match self {
            AnyWallet::Http(w) => w.request_accounts().await,
            AnyWallet::Keystore(w) => w.request_accounts().await,
        }
    }

    async fn chain_id(&self) -> Result<u64, ProviderError> {
        match self {
            AnyWallet::Http(w) => w.chain_id().await,
            AnyWallet::Keystore(w) => w.chain_id().await,
        }
    }

    async fn switch_chain(&self, chain_id: u64) -> Result<(), ProviderError> {
        match self {
            AnyWallet::Http(w) => w.switch_chain(chain_id).await,
            AnyWallet::Keystore(w) => w.switch_chain(chain_id).await,
        }
    }

    async fn add_chain(&self, chain: &ChainDescriptor) -> Result<(), ProviderError> {
        match self {
            AnyWallet::Http(w) => w.add_chain(chain).await,
            AnyWallet::Keystore(w) => w.add_chain(chain).await,
        }
    }

    fn transport(&self) -> WalletTransport {
        match self {
            AnyWallet::Http(w) => w.transport(),
            AnyWallet::Keystore(w) => w.transport(),
        }
    }
}

/// Requests account access and puts the wallet on the target chain.
pub struct WalletConnector<W> {
    provider: Option<W>,
    chain: ChainDescriptor,
}

impl<W: WalletProvider> WalletConnector<W> {
    pub fn new(provider: Option<W>, chain: ChainDescriptor) -> Self {
        Self { provider, chain }
    }

    pub fn provider(&self) -> Option<&W> {
        self.provider.as_ref()
    }

    pub fn chain(&self) -> &ChainDescriptor {
        &self.chain
    }

    pub fn transport(&self) -> WalletTransport {
        self.provider
            .as_ref()
            .map_or(WalletTransport::Unavailable, WalletProvider::transport)
    }

    /// Returns the wallet's primary account once it is on the target chain.
    pub async fn connect(&self) -> Result<Address, GameError> {
        let provider = self.provider.as_ref().ok_or(GameError::WalletUnavailable)?;
        let accounts = provider.request_accounts().await?;
        let account = *accounts.first().ok_or(GameError::NoAccounts)?;
        self.ensure_chain(provider).await?;
        info!(%account, chain_id = self.chain.id, "wallet connected");
        Ok(account)
    }

    /// Switches to the target chain, adding it once when the wallet does
    /// not know it and then retrying the switch once.
    async fn ensure_chain(&self, provider: &W) -> Result<(), GameError> {
        let current = provider.chain_id().await?;
        if current == self.chain.id {
            return Ok(());
        }
        info!(current, target = self.chain.id, "switching wallet chain");
        let mismatch = |err: ProviderError| match err.code {
            USER_REJECTED => GameError::ConnectionRejected,
            _ => GameError::NetworkMismatch {
                expected: self.chain.id,
                actual: current,
            },
        };
        match provider.switch_chain(self.chain.id).await {
            Ok(()) => Ok(()),
            Err(err) if err.code == UNRECOGNIZED_CHAIN => {
                info!(chain = %self.chain.name, "wallet does not know chain; adding it");
                provider.add_chain(&self.chain).await.map_err(|err| {
                    GameError::NetworkAddFailed {
                        network: self.chain.short_name.clone(),
                        reason: err.message,
                    }
                })?;
                provider.switch_chain(self.chain.id).await.map_err(mismatch)
            }
            Err(err) => Err(mismatch(err)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccountChange {
    Unchanged,
    Switched(Address),
    Cleared,
}

/// The connected account, owned explicitly and handed to whoever needs it.
pub struct WalletSession<W> {
    connector: WalletConnector<W>,
    store: AccountStore,
    account: Option<Address>,
}

impl<W: WalletProvider> WalletSession<W> {
    pub fn new(connector: WalletConnector<W>, store: AccountStore) -> Self {
        Self {
            connector,
            store,
            account: None,
        }
    }

    pub fn account(&self) -> Option<Address> {
        self.account
    }

    pub fn connector(&self) -> &WalletConnector<W> {
        &self.connector
    }

    /// Interactive connection. A failure leaves the session untouched.
    pub async fn connect(&mut self) -> Result<Address, GameError> {
        let account = self.connector.connect().await?;
        self.set_account(account);
        Ok(account)
    }

    /// Silent reconnection at startup: only reuses the stored account if the
    /// wallet still exposes it without prompting.
    pub async fn restore(&mut self) -> Option<Address> {
        let stored = self.store.load()?;
        let provider = self.connector.provider()?;
        match provider.accounts().await {
            Ok(accounts) if accounts.contains(&stored) => {
                info!(account = %stored, "restored wallet session");
                self.account = Some(stored);
                Some(stored)
            }
            Ok(_) => {
                info!(account = %stored, "stored account no longer exposed; forgetting it");
                self.forget();
                None
            }
            Err(err) => {
                warn!(%err, "could not query wallet accounts");
                None
            }
        }
    }

    pub fn disconnect(&mut self) {
        if let Some(account) = self.account {
            info!(%account, "wallet disconnected");
        }
        self.account = None;
        self.forget();
    }

    /// Reconciles the session with a fresh account list from the wallet.
    pub fn accounts_changed(&mut self, accounts: &[Address]) -> AccountChange {
        let Some(current) = self.account else {
            return AccountChange::Unchanged;
        };
        match accounts.first() {
            Some(primary) if *primary == current => AccountChange::Unchanged,
            Some(primary) => {
                info!(from = %current, to = %primary, "wallet account switched");
                self.set_account(*primary);
                AccountChange::Switched(*primary)
            }
            None => {
                info!(account = %current, "wallet no longer exposes account");
                self.account = None;
                self.forget();
                AccountChange::Cleared
            }
        }
    }

    fn set_account(&mut self, account: Address) {
        self.account = Some(account);
        if let Err(err) = self.store.save(account) {
            warn!(?err, "failed to persist connected account");
        }
    }

    fn forget(&mut self) {
        if let Err(err) = self.store.clear() {
            warn!(?err, "failed to clear stored account");
        }
    }
}

/// Polls `eth_accounts` and forwards each change. The first answer is the
/// baseline and is not sent.
pub fn watch_accounts<W: WalletProvider>(
    provider: W,
    interval: Duration,
    changes: mpsc::UnboundedSender<Vec<Address>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last: Option<Vec<Address>> = None;
        loop {
            ticker.tick().await;
            let accounts = match provider.accounts().await {
                Ok(accounts) => accounts,
                Err(err) => {
                    debug!(%err, "eth_accounts poll failed");
                    continue;
                }
            };
            if last.as_ref() == Some(&accounts) {
                continue;
            }
            let baseline = last.is_none();
            last = Some(accounts.clone());
            if !baseline && changes.send(accounts).is_err() {
                break;
            }
        }
    })
}

#[derive(Clone, Debug)]
pub struct KeystoreDescriptor {
    pub name: String,
    pub path: PathBuf,
}

pub fn default_keystore_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".foundry").join("keystores"))
}

pub fn resolve_keystore_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_keystore_dir(),
    }
}

pub fn list_keystores(dir: &Path) -> Result<Vec<KeystoreDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut keystores = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read keystore directory")? {
        let entry = entry.wrap_err("Failed to read keystore entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if file_name.starts_with('.') {
            continue;
        }
        let name = file_name.trim_end_matches(".json").to_owned();
        keystores.push(KeystoreDescriptor { name, path });
    }
    keystores.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(keystores)
}

pub fn find_keystore(dir: &Path, name: &str) -> Result<KeystoreDescriptor> {
    list_keystores(dir)?
        .into_iter()
        .find(|k| k.name == name)
        .ok_or_else(|| eyre!("Keystore '{name}' not found in {}", dir.to_string_lossy()))
}

pub fn decrypt_keystore(descriptor: &KeystoreDescriptor, password: &str) -> Result<PrivateKeySigner> {
    let secret = decrypt_key(&descriptor.path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for keystore '{}'", descriptor.name))?;
    PrivateKeySigner::from_slice(&secret)
        .map_err(|_| eyre!("Keystore '{}' contained unsupported key material", descriptor.name))
}

pub fn unlock_keystore(descriptor: &KeystoreDescriptor) -> Result<PrivateKeySigner> {
    let prompt = format!("Enter password for keystore '{}': ", descriptor.name);
    let password = prompt_password(prompt).wrap_err("Failed to read keystore password")?;
    decrypt_keystore(descriptor, &password)
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn add_chain_params__carry_full_descriptor() {
        // given
        let chain = ChainDescriptor::somnia_testnet();

        // when
        let params = add_chain_params(&chain);

        // then
        let entry = &params[0];
        assert_eq!(entry["chainId"], "0xc488");
        assert_eq!(entry["chainName"], "Somnia Testnet");
        assert_eq!(entry["nativeCurrency"]["symbol"], "STT");
        assert_eq!(entry["nativeCurrency"]["decimals"], 18);
        assert_eq!(entry["rpcUrls"][0], "https://dream-rpc.somnia.network");
        assert_eq!(
            entry["blockExplorerUrls"][0],
            "https://shannon-explorer.somnia.network"
        );
    }

    #[test]
    fn parse_hex_chain_id__reads_prefixed_hex() {
        assert_eq!(parse_hex_chain_id("0xc488"), Ok(50312));
        assert_eq!(parse_hex_chain_id("0x1"), Ok(1));
        assert!(parse_hex_chain_id("somnia").is_err());
    }

    #[test]
    fn provider_error__maps_eip1193_codes() {
        assert_eq!(
            GameError::from(ProviderError::new(USER_REJECTED, "nope")),
            GameError::ConnectionRejected
        );
        assert_eq!(
            GameError::from(ProviderError::new(DISCONNECTED, "gone")),
            GameError::WalletUnavailable
        );
        assert_eq!(
            GameError::from(ProviderError::new(-32000, "boom")),
            GameError::Other("boom".to_string())
        );
    }

    #[tokio::test]
    async fn keystore_wallet__rejects_unknown_chain_until_added() {
        // given
        let wallet = KeystoreWallet::new(PrivateKeySigner::random(), 1);
        let chain = ChainDescriptor::somnia_testnet();

        // when
        let before = wallet.switch_chain(chain.id).await;
        wallet.add_chain(&chain).await.unwrap();
        let after = wallet.switch_chain(chain.id).await;

        // then
        assert_eq!(before.unwrap_err().code, UNRECOGNIZED_CHAIN);
        assert!(after.is_ok());
        assert_eq!(wallet.chain_id().await.unwrap(), chain.id);
    }

    #[test]
    fn list_keystores__skips_hidden_files_and_sorts() {
        // given
        let tmp = TempDir::new("keystores").unwrap();
        fs::write(tmp.path().join("zeta"), b"{}").unwrap();
        fs::write(tmp.path().join("alpha.json"), b"{}").unwrap();
        fs::write(tmp.path().join(".DS_Store"), b"").unwrap();
        fs::create_dir(tmp.path().join("nested")).unwrap();

        // when
        let names: Vec<String> = list_keystores(tmp.path())
            .unwrap()
            .into_iter()
            .map(|k| k.name)
            .collect();

        // then
        assert_eq!(names, vec!["alpha".to_string(), "zeta".to_string()]);
    }

    #[test]
    fn find_keystore__fails_for_unknown_name() {
        // given
        let tmp = TempDir::new("keystores").unwrap();

        // when
        let result = find_keystore(tmp.path(), "missing");

        // then
        assert!(result.is_err());
    }

    #[test]
    fn decrypt_keystore__rejects_garbage_file() {
        // given
        let tmp = TempDir::new("keystores").unwrap();
        let path = tmp.path().join("broken");
        fs::write(&path, b"not a keystore").unwrap();
        let descriptor = KeystoreDescriptor {
            name: "broken".to_string(),
            path,
        };

        // when
        let result = decrypt_keystore(&descriptor, "hunter2");

        // then
        assert!(result.is_err());
    }
}
