use crate::errors::GameError;
use alloy::{
    network::EthereumWallet,
    primitives::Address,
    providers::{
        DynProvider,
        Provider,
        ProviderBuilder,
    },
    rpc::client::ClientBuilder,
    signers::local::PrivateKeySigner,
    transports::{
        RpcError,
        TransportError,
        TransportErrorKind,
        http::reqwest::Url,
        layers::{
            OrRetryPolicyFn,
            RateLimitRetryPolicy,
            RetryBackoffLayer,
        },
    },
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use tracing::{
    debug,
    warn,
};

pub const SOMNIA_CHAIN_ID: u64 = 50312;
pub const SOMNIA_RPC_URL: &str = "https://dream-rpc.somnia.network";
pub const SOMNIA_EXPLORER_URL: &str = "https://shannon-explorer.somnia.network";

const READ_MAX_RETRIES: u32 = 5;
const READ_INITIAL_BACKOFF_MS: u64 = 300;
const READ_COMPUTE_UNITS_PER_SECOND: u64 = 330;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NativeCurrency {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockExplorer {
    pub name: String,
    pub url: String,
}

/// Ordered RPC endpoints for one chain. Only the first is dialed; the list
/// exists so a fallback endpoint can be declared without changing callers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RpcEndpoints(Vec<String>);

impl RpcEndpoints {
    pub fn new(urls: Vec<String>) -> Self {
        Self(urls)
    }

    pub fn primary(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    pub fn all(&self) -> &[String] {
        &self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChainDescriptor {
    pub id: u64,
    pub name: String,
    /// Network family name used in wallet-facing messages.
    pub short_name: String,
    pub native_currency: NativeCurrency,
    pub rpc: RpcEndpoints,
    pub explorer: BlockExplorer,
}

impl ChainDescriptor {
    pub fn somnia_testnet() -> Self {
        Self {
            id: SOMNIA_CHAIN_ID,
            name: "Somnia Testnet".to_string(),
            short_name: "Somnia".to_string(),
            native_currency: NativeCurrency {
                name: "Somnia Token".to_string(),
                symbol: "STT".to_string(),
                decimals: 18,
            },
            rpc: RpcEndpoints::new(vec![SOMNIA_RPC_URL.to_string()]),
            explorer: BlockExplorer {
                name: "Shannon Explorer".to_string(),
                url: SOMNIA_EXPLORER_URL.to_string(),
            },
        }
    }

    /// Chain id in the `0x`-prefixed form wallets expect.
    pub fn hex_id(&self) -> String {
        format!("{:#x}", self.id)
    }

    pub fn rpc_url(&self) -> Result<Url> {
        let raw = self
            .rpc
            .primary()
            .ok_or_else(|| eyre!("chain {} has no RPC endpoint configured", self.name))?;
        raw.parse()
            .wrap_err_with(|| format!("invalid RPC URL for {}: {raw}", self.name))
    }
}

/// Read-only access to the target chain.
#[derive(Clone)]
pub struct ReadClient {
    provider: DynProvider,
    chain_id: u64,
}

impl ReadClient {
    pub fn from_provider(provider: DynProvider, chain_id: u64) -> Self {
        Self { provider, chain_id }
    }

    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }
}

pub fn read_client(chain: &ChainDescriptor) -> Result<ReadClient> {
    if chain.rpc.all().len() > 1 {
        warn!(
            endpoints = chain.rpc.all().len(),
            "multiple RPC endpoints configured; only the primary is used"
        );
    }
    let url = chain.rpc_url()?;
    debug!(%url, chain_id = chain.id, "building read client");
    let policy = OrRetryPolicyFn::new(RateLimitRetryPolicy::default(), is_transient);
    let client = ClientBuilder::default()
        .layer(RetryBackoffLayer::new_with_policy(
            READ_MAX_RETRIES,
            READ_INITIAL_BACKOFF_MS,
            READ_COMPUTE_UNITS_PER_SECOND,
            policy,
        ))
        .http(url);
    let provider = ProviderBuilder::new().connect_client(client).erased();
    Ok(ReadClient {
        provider,
        chain_id: chain.id,
    })
}

/// Failures worth another attempt on a read: the connection never produced
/// a response, or the node answered with a server error.
fn is_transient(err: &TransportError) -> bool {
    match err {
        RpcError::Transport(TransportErrorKind::Custom(_))
        | RpcError::Transport(TransportErrorKind::BackendGone) => true,
        RpcError::Transport(TransportErrorKind::HttpError(http)) => http.status >= 500,
        _ => false,
    }
}

/// How a wallet lets this client send transactions.
#[derive(Clone, Debug)]
pub enum WalletTransport {
    /// An EIP-1193 wallet reachable over JSON-RPC; the wallet signs.
    Injected { url: String },
    /// A signer unlocked locally; transactions go out through the chain RPC.
    Local { signer: PrivateKeySigner },
    Unavailable,
}

/// Transaction-capable access bound to a single account.
#[derive(Clone)]
pub struct WriteClient {
    provider: DynProvider,
    account: Address,
}

impl WriteClient {
    pub fn provider(&self) -> &DynProvider {
        &self.provider
    }

    pub fn account(&self) -> Address {
        self.account
    }
}

pub fn write_client(
    chain: &ChainDescriptor,
    transport: WalletTransport,
    account: Address,
) -> Result<WriteClient, GameError> {
    let provider = match transport {
        WalletTransport::Unavailable => return Err(GameError::WalletUnavailable),
        WalletTransport::Injected { url } => {
            let url: Url = url.parse().map_err(|_| GameError::WalletUnavailable)?;
            ProviderBuilder::new().connect_http(url).erased()
        }
        WalletTransport::Local { signer } => {
            if signer.address() != account {
                return Err(GameError::Other(format!(
                    "Unlocked key does not match account {account}"
                )));
            }
            let url = chain.rpc_url().map_err(|_| GameError::Network)?;
            ProviderBuilder::new()
                .wallet(EthereumWallet::from(signer))
                .connect_http(url)
                .erased()
        }
    };
    debug!(%account, chain_id = chain.id, "built write client");
    Ok(WriteClient { provider, account })
}
