use crate::ui;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use spectra::{
    chain::{
        self,
        ChainDescriptor,
        ReadClient,
    },
    errors::GameError,
    game::{
        GameClient,
        GameKind,
        GameView,
    },
    gateway::{
        MysteryGateway,
        SurvivalGateway,
    },
    poller::{
        PollHandle,
        PollUpdate,
        spawn_poller,
    },
    session::{
        Color,
        MysterySession,
        SurvivalSession,
        short_address,
    },
    storage::AccountStore,
    wallet::{
        AccountChange,
        AnyWallet,
        HttpWallet,
        KeystoreWallet,
        WalletConnector,
        WalletSession,
        find_keystore,
        unlock_keystore,
        watch_accounts,
    },
};
use alloy::primitives::Address;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
    time::Duration,
};
use tokio::sync::mpsc;
use tracing::{
    error,
    info,
    warn,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_DATA_DIR: &str = "~/.spectra";
const ACCOUNT_WATCH_INTERVAL: Duration = Duration::from_secs(3);
const MAX_ERRORS: usize = 50;

#[derive(Clone, Debug)]
pub enum WalletConfig {
    Injected { url: String },
    Keystore { name: String, dir: PathBuf },
    None,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub wallet: WalletConfig,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Screen {
    Connect,
    Lobby,
    Game(GameKind),
}

#[derive(Clone, Debug)]
pub struct NetworkInfo {
    pub name: String,
    pub chain_id: u64,
    pub currency: String,
    pub rpc_url: String,
    pub explorer: String,
}

#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub screen: Screen,
    pub network: NetworkInfo,
    pub wallet_label: String,
    pub account: Option<Address>,
    pub connect_error: Option<String>,
    pub game: Option<GameView>,
    pub status: String,
    pub errors: Vec<String>,
}

pub enum PollEvent {
    Survival(PollUpdate<SurvivalSession>),
    Mystery(PollUpdate<MysterySession>),
}

pub struct AppController {
    reader: ReadClient,
    wallet: WalletSession<AnyWallet>,
    wallet_label: String,
    screen: Screen,
    survival: GameClient<SurvivalGateway>,
    mystery: GameClient<MysteryGateway>,
    poller: Option<PollHandle>,
    poll_tx: mpsc::UnboundedSender<PollEvent>,
    connect_error: Option<String>,
    pub status: String,
    errors: Vec<String>,
}

fn open_wallet(config: &WalletConfig, chain: &ChainDescriptor) -> Result<(Option<AnyWallet>, String)> {
    match config {
        WalletConfig::Injected { url } => {
            let wallet = HttpWallet::new(url.clone())?;
            let label = format!("Wallet bridge at {}", wallet.url());
            Ok((Some(AnyWallet::Http(wallet)), label))
        }
        WalletConfig::Keystore { name, dir } => {
            let descriptor = find_keystore(dir, name)?;
            let signer = unlock_keystore(&descriptor)?;
            info!(keystore = %name, address = %signer.address(), "unlocked keystore");
            let wallet = KeystoreWallet::new(signer, chain.id);
            Ok((Some(AnyWallet::Keystore(wallet)), format!("Keystore '{name}'")))
        }
        WalletConfig::None => Ok((None, "No wallet".to_string())),
    }
}

impl AppController {
    pub fn new(config: &AppConfig, poll_tx: mpsc::UnboundedSender<PollEvent>) -> Result<Self> {
        let chain = ChainDescriptor::somnia_testnet();
        let reader = chain::read_client(&chain).wrap_err("failed to build read client")?;
        let (provider, wallet_label) = open_wallet(&config.wallet, &chain)?;
        let store = AccountStore::new(&config.data_dir);
        let wallet = WalletSession::new(WalletConnector::new(provider, chain.clone()), store);
        let survival = GameClient::new(SurvivalGateway::new(&reader, None));
        let mystery = GameClient::new(MysteryGateway::new(&reader, None));
        Ok(Self {
            reader,
            wallet,
            wallet_label,
            screen: Screen::Connect,
            survival,
            mystery,
            poller: None,
            poll_tx,
            connect_error: None,
            status: String::new(),
            errors: Vec::new(),
        })
    }

    pub fn wallet_provider(&self) -> Option<&AnyWallet> {
        self.wallet.connector().provider()
    }

    pub async fn bootstrap(&mut self) {
        if let Some(account) = self.wallet.restore().await {
            self.on_connected(account);
            self.set_status(format!("Reconnected {}", short_address(&account)));
        }
    }

    pub async fn connect(&mut self) {
        self.connect_error = None;
        match self.wallet.connect().await {
            Ok(account) => {
                self.on_connected(account);
                self.set_status(format!("Connected {}", short_address(&account)));
            }
            Err(err) => {
                self.connect_error = Some(err.to_string());
                self.push_errors(vec![err.to_string()]);
            }
        }
    }

    fn on_connected(&mut self, account: Address) {
        let connector = self.wallet.connector();
        let writer = match chain::write_client(connector.chain(), connector.transport(), account) {
            Ok(writer) => Some(writer),
            Err(err) => {
                self.push_errors(vec![format!("Transactions unavailable: {err}")]);
                None
            }
        };
        self.survival
            .connect(SurvivalGateway::new(&self.reader, writer.as_ref()), account);
        self.mystery
            .connect(MysteryGateway::new(&self.reader, writer.as_ref()), account);
        self.connect_error = None;
        match self.screen {
            Screen::Game(kind) => self.restart_poller(kind),
            Screen::Connect | Screen::Lobby => self.screen = Screen::Lobby,
        }
    }

    pub fn disconnect(&mut self) {
        self.stop_poller();
        self.wallet.disconnect();
        self.teardown_games();
        self.set_status("Wallet disconnected");
    }

    fn teardown_games(&mut self) {
        self.survival.disconnect();
        self.mystery.disconnect();
        self.screen = Screen::Connect;
    }

    pub fn handle_accounts_changed(&mut self, accounts: &[Address]) {
        match self.wallet.accounts_changed(accounts) {
            AccountChange::Unchanged => {}
            AccountChange::Switched(account) => {
                self.stop_poller();
                self.on_connected(account);
                self.set_status(format!("Switched to {}", short_address(&account)));
            }
            AccountChange::Cleared => {
                self.stop_poller();
                self.teardown_games();
                self.set_status("Wallet account removed");
            }
        }
    }

    pub fn select_game(&mut self, kind: GameKind) {
        if self.wallet.account().is_none() {
            return;
        }
        self.screen = Screen::Game(kind);
        self.restart_poller(kind);
        self.set_status(format!("Playing {}", kind.name()));
    }

    pub fn back_to_lobby(&mut self) {
        self.stop_poller();
        if self.wallet.account().is_some() {
            self.screen = Screen::Lobby;
        }
    }

    fn restart_poller(&mut self, kind: GameKind) {
        self.stop_poller();
        let Some(player) = self.wallet.account() else {
            return;
        };
        let handle = match kind {
            GameKind::Survival => spawn_poller(
                self.survival.gateway().clone(),
                player,
                self.survival.timings().poll_interval,
                self.poll_tx.clone(),
                PollEvent::Survival,
            ),
            GameKind::Mystery => spawn_poller(
                self.mystery.gateway().clone(),
                player,
                self.mystery.timings().poll_interval,
                self.poll_tx.clone(),
                PollEvent::Mystery,
            ),
        };
        self.poller = Some(handle);
    }

    fn stop_poller(&mut self) {
        if let Some(handle) = self.poller.take() {
            handle.shutdown();
        }
    }

    pub fn shutdown(&mut self) {
        self.stop_poller();
    }

    fn request_refresh(&self) {
        if let Some(handle) = &self.poller {
            handle.fetch_now();
        }
    }

    pub fn apply_poll(&mut self, event: PollEvent) {
        match event {
            PollEvent::Survival(update) => {
                self.survival
                    .apply_poll(update.player, update.session, update.potential_reward);
            }
            PollEvent::Mystery(update) => {
                self.mystery
                    .apply_poll(update.player, update.session, update.potential_reward);
            }
        }
    }

    fn current_game(&self) -> Option<GameKind> {
        match self.screen {
            Screen::Game(kind) => Some(kind),
            Screen::Connect | Screen::Lobby => None,
        }
    }

    pub fn pending_message(&self, action: &ui::UserEvent) -> Option<String> {
        let kind = self.current_game()?;
        let message = match action {
            ui::UserEvent::Start(stake) => format!("Starting {} with {stake} STT...", kind.name()),
            ui::UserEvent::Pick(color) => format!("Submitting {}...", color.name()),
            ui::UserEvent::Claim => "Claiming reward...".to_string(),
            _ => return None,
        };
        Some(message)
    }

    pub async fn start_game(&mut self, stake: &str) {
        let outcome = match self.current_game() {
            Some(GameKind::Survival) => self.survival.start(stake).await,
            Some(GameKind::Mystery) => self.mystery.start(stake).await,
            None => return,
        };
        self.after_action(outcome, "Game started");
    }

    pub async fn pick(&mut self, color: Color) {
        let outcome = match self.current_game() {
            Some(GameKind::Survival) => self.survival.act(color).await,
            Some(GameKind::Mystery) => self.mystery.act(color).await,
            None => return,
        };
        self.after_action(outcome, "Round settled");
    }

    pub async fn claim(&mut self) {
        let outcome = match self.current_game() {
            Some(GameKind::Survival) => self.survival.claim().await,
            Some(GameKind::Mystery) => self.mystery.claim().await,
            None => return,
        };
        self.after_action(outcome, "Reward claimed");
    }

    pub fn continue_round(&mut self) {
        match self.current_game() {
            Some(GameKind::Survival) => self.survival.continue_round(),
            Some(GameKind::Mystery) => self.mystery.continue_round(),
            None => {}
        }
    }

    pub fn new_game(&mut self) {
        match self.current_game() {
            Some(GameKind::Survival) => self.survival.new_game(),
            Some(GameKind::Mystery) => self.mystery.new_game(),
            None => return,
        }
        self.set_status("Board cleared");
    }

    fn after_action(&mut self, outcome: Result<(), GameError>, done: &str) {
        match outcome {
            Ok(()) => self.set_status(done),
            Err(err) => {
                self.set_status("Action failed");
                self.push_errors(vec![err.to_string()]);
            }
        }
        self.request_refresh();
    }

    pub fn snapshot(&self) -> AppSnapshot {
        let game = match self.screen {
            Screen::Game(GameKind::Survival) => Some(self.survival.view()),
            Screen::Game(GameKind::Mystery) => Some(self.mystery.view()),
            Screen::Connect | Screen::Lobby => None,
        };
        let chain = self.wallet.connector().chain();
        AppSnapshot {
            screen: self.screen,
            network: NetworkInfo {
                name: chain.name.clone(),
                chain_id: chain.id,
                currency: chain.native_currency.symbol.clone(),
                rpc_url: chain.rpc.primary().unwrap_or_default().to_string(),
                explorer: format!("{} ({})", chain.explorer.name, chain.explorer.url),
            },
            wallet_label: self.wallet_label.clone(),
            account: self.wallet.account(),
            connect_error: self.connect_error.clone(),
            game,
            status: self.status.clone(),
            errors: self.errors.clone(),
        }
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
        info!(status = %self.status, "status");
    }

    fn push_errors(&mut self, mut items: Vec<String>) {
        if items.is_empty() {
            return;
        }
        for item in &items {
            error!("{}", item);
        }
        self.errors.append(&mut items);
        if self.errors.len() > MAX_ERRORS {
            let drain = self.errors.len() - MAX_ERRORS;
            self.errors.drain(0..drain);
        }
    }
}

/// Routes logs to a daily file under `log_dir`; the terminal belongs to the UI.
pub fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("Failed to create log directory {}", log_dir.display()))?;
    let appender = tracing_appender::rolling::daily(log_dir, "spectra.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|err| eyre!(err))?;
    Ok(guard)
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let (poll_tx, poll_rx) = mpsc::unbounded_channel();
    let (account_tx, account_rx) = mpsc::unbounded_channel();
    let mut controller = AppController::new(&config, poll_tx)?;
    controller.bootstrap().await;
    let watcher = controller
        .wallet_provider()
        .cloned()
        .map(|provider| watch_accounts(provider, ACCOUNT_WATCH_INTERVAL, account_tx.clone()));

    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(
        &mut controller,
        &mut ui_state,
        &mut input_events,
        poll_rx,
        account_rx,
    )
    .await;
    controller.shutdown();
    if let Some(watcher) = watcher {
        watcher.abort();
    }
    ui::terminal_exit()?;
    drop(account_tx);
    res
}

fn show_processing_status(
    controller: &mut AppController,
    ui_state: &mut ui::UiState,
    message: impl Into<String>,
    context: &'static str,
) -> Result<()> {
    controller.status = message.into();
    ui::draw(ui_state, &controller.snapshot()).wrap_err(context)
}

async fn run_loop(
    controller: &mut AppController,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
    mut poll_rx: mpsc::UnboundedReceiver<PollEvent>,
    mut account_rx: mpsc::UnboundedReceiver<Vec<Address>>,
) -> Result<()> {
    info!("Running app loop");
    ui::draw(ui_state, &controller.snapshot()).wrap_err("initial draw failed")?;

    loop {
        tokio::select! {
            maybe_update = poll_rx.recv() => {
                let Some(update) = maybe_update else {
                    warn!("poll channel closed");
                    break;
                };
                controller.apply_poll(update);
                ui::draw(ui_state, &controller.snapshot())
                    .wrap_err("draw after poll failed")?;
            }
            maybe_accounts = account_rx.recv() => {
                let Some(accounts) = maybe_accounts else {
                    warn!("account watcher channel closed");
                    break;
                };
                controller.handle_accounts_changed(&accounts);
                ui::draw(ui_state, &controller.snapshot())
                    .wrap_err("draw after account change failed")?;
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                if let Some(message) = controller.pending_message(&ev) {
                    show_processing_status(controller, ui_state, message, "draw before action failed")?;
                }
                match ev {
                    ui::UserEvent::Quit => break,
                    ui::UserEvent::Redraw => {}
                    ui::UserEvent::Connect => {
                        show_processing_status(
                            controller,
                            ui_state,
                            "Connecting wallet...",
                            "draw before connect failed",
                        )?;
                        controller.connect().await;
                    }
                    ui::UserEvent::Disconnect => controller.disconnect(),
                    ui::UserEvent::SelectGame(kind) => controller.select_game(kind),
                    ui::UserEvent::BackToLobby => controller.back_to_lobby(),
                    ui::UserEvent::Start(stake) => controller.start_game(&stake).await,
                    ui::UserEvent::Pick(color) => controller.pick(color).await,
                    ui::UserEvent::ContinueRound => controller.continue_round(),
                    ui::UserEvent::Claim => controller.claim().await,
                    ui::UserEvent::NewGame => controller.new_game(),
                }
                ui::draw(ui_state, &controller.snapshot())
                    .wrap_err("draw after input failed")?;
            }
        }
    }
    Ok(())
}
