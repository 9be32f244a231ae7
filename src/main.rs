use color_eyre::eyre::{
    Result,
    eyre,
};
use spectra::wallet;
use std::path::PathBuf;

mod client;
mod ui;

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: spectra [--wallet-rpc <url> | --keystore <name> | --no-wallet]\n\
         [--keystore-dir <path>] [--data-dir <path>] [--log-dir <path>]\n\
         \n\
         Flags:\n\
           --wallet-rpc <url>    JSON-RPC wallet endpoint (default {})\n\
           --keystore <name>     Sign locally with a keystore from --keystore-dir\n\
           --keystore-dir <path> Override keystore directory (defaults to ~/.foundry/keystores)\n\
           --no-wallet           Start without a wallet (read-only)\n\
           --data-dir <path>     Where the last connected account is kept (default {})\n\
           --log-dir <path>      Log file directory (defaults to <data-dir>/logs)",
        wallet::DEFAULT_WALLET_RPC_URL,
        client::DEFAULT_DATA_DIR,
    );
    std::process::exit(0);
}

fn parse_cli_args() -> Result<client::AppConfig> {
    let mut args = std::env::args().skip(1);
    let mut wallet_rpc: Option<String> = None;
    let mut keystore: Option<String> = None;
    let mut keystore_dir: Option<String> = None;
    let mut no_wallet = false;
    let mut data_dir: Option<String> = None;
    let mut log_dir: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--wallet-rpc" => {
                let url = args
                    .next()
                    .ok_or_else(|| eyre!("--wallet-rpc requires a URL argument"))?;
                if wallet_rpc.is_some() {
                    return Err(eyre!("--wallet-rpc may only be specified once"));
                }
                wallet_rpc = Some(url);
            }
            "--keystore" => {
                let name = args
                    .next()
                    .ok_or_else(|| eyre!("--keystore requires a keystore name"))?;
                if keystore.is_some() {
                    return Err(eyre!("--keystore may only be specified once"));
                }
                keystore = Some(name);
            }
            "--keystore-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--keystore-dir requires a path argument"))?;
                if keystore_dir.is_some() {
                    return Err(eyre!("--keystore-dir may only be specified once"));
                }
                keystore_dir = Some(dir);
            }
            "--no-wallet" => no_wallet = true,
            "--data-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--data-dir requires a path argument"))?;
                if data_dir.is_some() {
                    return Err(eyre!("--data-dir may only be specified once"));
                }
                data_dir = Some(dir);
            }
            "--log-dir" => {
                let dir = args
                    .next()
                    .ok_or_else(|| eyre!("--log-dir requires a path argument"))?;
                if log_dir.is_some() {
                    return Err(eyre!("--log-dir may only be specified once"));
                }
                log_dir = Some(dir);
            }
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    let chosen = [wallet_rpc.is_some(), keystore.is_some(), no_wallet]
        .into_iter()
        .filter(|set| *set)
        .count();
    if chosen > 1 {
        return Err(eyre!(
            "Multiple wallet flags provided; choose one of --wallet-rpc/--keystore/--no-wallet"
        ));
    }
    if keystore_dir.is_some() && keystore.is_none() {
        return Err(eyre!("--keystore-dir requires --keystore <name>"));
    }

    let wallet = match (wallet_rpc, keystore) {
        (Some(url), _) => client::WalletConfig::Injected { url },
        (None, Some(name)) => client::WalletConfig::Keystore {
            name,
            dir: wallet::resolve_keystore_dir(keystore_dir.as_deref())?,
        },
        (None, None) if no_wallet => client::WalletConfig::None,
        (None, None) => client::WalletConfig::Injected {
            url: wallet::DEFAULT_WALLET_RPC_URL.to_string(),
        },
    };

    let data_dir = expand_path(data_dir.as_deref().unwrap_or(client::DEFAULT_DATA_DIR));
    let log_dir = match log_dir {
        Some(dir) => expand_path(&dir),
        None => data_dir.join("logs"),
    };

    Ok(client::AppConfig {
        wallet,
        data_dir,
        log_dir,
    })
}

fn expand_path(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).into_owned())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let app_config = parse_cli_args()?;
    let _guard = client::init_tracing(&app_config.log_dir)?;
    tracing::info!(wallet = ?app_config.wallet, "starting spectra client");
    client::run_app(app_config).await
}
