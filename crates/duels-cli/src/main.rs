//! duels - command-line companion for the duels client.
//!
//! Signs in with a keypair wallet, shows the stored session and the user's
//! duels, runs wallet-signed duel actions and logs out. Uses the same
//! keychain entries and user cache as any other client built on
//! `duels-core`.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use duels_core::api::{ApiClient, DuelsService, RemoteService};
use duels_core::auth::{CredentialStore, KeyringStore, MemoryStore, SessionManager};
use duels_core::cache::CacheManager;
use duels_core::config::Config;
use duels_core::flow::{AuthFlow, TransactionFlow};
use duels_core::models::{CreateDuelParams, JoinDuelParams, ResolveDuelParams, WalletAction};
use duels_core::notifications::NotificationCenter;
use duels_core::wallet::{
    parse_pubkey, KeypairConnector, KeypairWallet, Pubkey, RpcConnector, WalletSession,
};

const USAGE: &str = "Usage: duels <command>

Commands:
  init [keypair]                           Write the config file, optionally setting the keypair
  login                                    Sign in with the configured keypair wallet
  status                                   Show session, cached user and balance
  balance [owner]                          Token balance for an owner address
  ata <owner>                              Print the associated token account address
  duels                                    List your duels and how many await resolution
  duel <id>                                Show a duel and its players
  stats                                    Show your duel statistics
  create <question> <price> <date> <answer> [commission]
                                           Create a duel (date as RFC 3339)
  join <duel-id> <answer>                  Join a duel
  resolve <duel-id> <answer>               Resolve one of your duels
  logout                                   Clear stored credentials and cached user";

/// Commission used by `create` when none is given.
const DEFAULT_COMMISSION: u64 = 3;

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

type Wallet = WalletSession<KeypairConnector, RpcConnector>;

/// Everything a command may need, wired from the config.
struct Client {
    config: Config,
    session: Arc<SessionManager<ApiClient>>,
    remote: Arc<DuelsService>,
    wallet: Arc<Wallet>,
    cache: Arc<CacheManager>,
    auth: AuthFlow<DuelsService, ApiClient, KeypairConnector, RpcConnector>,
    transactions: TransactionFlow<DuelsService, KeypairConnector, RpcConnector>,
}

impl Client {
    fn new(config: Config) -> Result<Self> {
        let api = ApiClient::new(&config.api_url, config.request_timeout())
            .context("Failed to create API client")?;

        let keyring = KeyringStore::new();
        let store: Arc<dyn CredentialStore> = if keyring.is_available() {
            Arc::new(keyring)
        } else {
            warn!("OS keychain unavailable, session will not persist");
            Arc::new(MemoryStore::new())
        };
        let session = Arc::new(SessionManager::new(store, Arc::new(api.clone())));

        let cache = match config.cache_dir().and_then(CacheManager::new) {
            Ok(cache) => Arc::new(cache),
            Err(e) => {
                warn!(error = %e, "Falling back to in-memory user cache");
                Arc::new(CacheManager::in_memory())
            }
        };

        let notifications = NotificationCenter::new();
        let wallet = Arc::new(WalletSession::new(
            KeypairConnector::new(config.keypair_path.clone()),
            RpcConnector::new(config.rpc_url.clone(), config.request_timeout()),
            config.token_mint().context("Invalid token mint in config")?,
            notifications.clone(),
            config.wallet_timeout(),
        ));

        let remote = Arc::new(DuelsService::new(api, session.clone()));
        let auth = AuthFlow::new(
            remote.clone(),
            session.clone(),
            wallet.clone(),
            cache.clone(),
            notifications.clone(),
        );
        let transactions = TransactionFlow::new(remote.clone(), wallet.clone(), notifications);

        Ok(Self {
            config,
            session,
            remote,
            wallet,
            cache,
            auth,
            transactions,
        })
    }

    /// Owner for balance lookups: explicit argument, then the cached user's
    /// address on file, then the configured keypair.
    fn resolve_owner(&self, arg: Option<&str>) -> Result<Pubkey> {
        if let Some(arg) = arg {
            return parse_pubkey(arg).context("Invalid owner address");
        }
        if let Some(address) = self.cache.user().and_then(|u| u.public_address) {
            return parse_pubkey(&address).context("Invalid address on file");
        }
        if let Some(path) = &self.config.keypair_path {
            return Ok(KeypairWallet::from_file(path)?.pubkey());
        }
        bail!("No owner given, no signed-in user and no keypair configured")
    }

    fn require_session(&self) -> Result<()> {
        if !self.session.has_session() {
            bail!("Not signed in. Run `duels login` first.");
        }
        Ok(())
    }
}

fn init(keypair: Option<&str>) -> Result<()> {
    let mut config = Config::load().context("Failed to load config")?;
    if let Some(keypair) = keypair {
        let path = PathBuf::from(keypair);
        KeypairWallet::from_file(&path)
            .with_context(|| format!("Unreadable keypair file {}", path.display()))?;
        config.keypair_path = Some(path);
    }
    let path = config.save().context("Failed to save config")?;
    println!("Config written to {}", path.display());
    Ok(())
}

async fn login(client: &Client) -> Result<()> {
    let user = client.auth.sign_in().await.context("Sign-in failed")?;
    match user {
        Some(user) => println!("Signed in as {} (id {})", user.display_name(), user.id),
        None => println!("Signed in, profile unavailable"),
    }
    if let Some(balance) = client.wallet.last_balance() {
        println!("Balance: {} USDC", balance);
    }
    Ok(())
}

async fn status(client: &Client) -> Result<()> {
    if !client.session.has_session() {
        println!("Not signed in");
        return Ok(());
    }

    match client.auth.load_user().await {
        Some(user) => {
            println!("Signed in as {} (id {})", user.display_name(), user.id);
            if let Some(address) = &user.public_address {
                println!("Wallet: {}", address);
            }
            if let Some(balance) = client.wallet.last_balance() {
                println!("Balance: {} USDC", balance);
            }
            if let Some(cached) = client.cache.cached_user() {
                println!("Profile cached {}m ago", cached.age_minutes());
            }
        }
        None => println!("Session stored, profile unavailable"),
    }
    Ok(())
}

async fn balance(client: &Client, owner: Option<&str>) -> Result<()> {
    let owner = client.resolve_owner(owner)?;
    let amount = client
        .wallet
        .balance(Some(&owner))
        .await
        .with_context(|| format!("Failed to fetch balance for {}", owner))?;
    println!("{} USDC", amount);
    Ok(())
}

fn ata(client: &Client, owner: &str) -> Result<()> {
    let owner = parse_pubkey(owner).context("Invalid owner address")?;
    println!("{}", client.wallet.mint().associated_token_address(&owner));
    Ok(())
}

async fn list_duels(client: &Client) -> Result<()> {
    client.require_session()?;
    let duels = client.remote.my_duels().await.context("Failed to load duels")?;
    for duel in &duels {
        println!(
            "{}  {:?}  {} players  {}",
            duel.id, duel.status, duel.players_count, duel.question
        );
    }
    let pending = client.auth.resolve_count().await?;
    println!("{} duels, {} awaiting resolution", duels.len(), pending);
    Ok(())
}

async fn show_duel(client: &Client, duel_id: &str) -> Result<()> {
    client.require_session()?;
    let detail = client
        .remote
        .duel(duel_id)
        .await
        .with_context(|| format!("Failed to load duel {}", duel_id))?;
    let duel = &detail.duel;
    println!("{}", duel.question);
    println!("Status: {:?}", duel.status);
    println!("Price: {} USDC, commission {}%", duel.duel_price, duel.commission);
    if let Some(event_date) = duel.event_date {
        println!("Event date: {}", event_date);
    }
    if let Some(result) = duel.final_result {
        println!("Final result: {}", result);
    }
    println!("Players: {}", detail.players.len());
    Ok(())
}

async fn stats(client: &Client) -> Result<()> {
    client.require_session()?;
    let stats = client.remote.user_stats().await.context("Failed to load stats")?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn parse_answer(raw: &str) -> Result<u8> {
    raw.parse().with_context(|| format!("Invalid answer {:?}", raw))
}

async fn run_action(client: &Client, action: WalletAction) -> Result<()> {
    client.require_session()?;
    let result = client
        .transactions
        .execute(&action)
        .await
        .with_context(|| format!("{} failed", action.name()))?;
    info!(action = action.name(), "Wallet action completed");
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn create_action(args: &[String]) -> Result<WalletAction> {
    let [question, price, date, answer, rest @ ..] = args else {
        bail!("create needs <question> <price> <date> <answer> [commission]");
    };
    let event_date: DateTime<Utc> = date
        .parse()
        .with_context(|| format!("Invalid event date {:?}", date))?;
    let commission = match rest.first() {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("Invalid commission {:?}", raw))?,
        None => DEFAULT_COMMISSION,
    };
    Ok(WalletAction::CreateDuel(CreateDuelParams {
        image_url: String::new(),
        bg_url: String::new(),
        question: question.clone(),
        duel_price: price
            .parse()
            .with_context(|| format!("Invalid price {:?}", price))?,
        commission,
        duel_info: Default::default(),
        event_date,
        answer: parse_answer(answer)?,
    }))
}

fn duel_and_answer<'a>(args: &'a [String], command: &str) -> Result<(&'a str, u8)> {
    match args {
        [duel_id, answer, ..] => Ok((duel_id.as_str(), parse_answer(answer)?)),
        _ => bail!("{} needs <duel-id> <answer>", command),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };
    let rest = &args[1..];

    match command.as_str() {
        "-h" | "--help" | "help" => {
            println!("{}", USAGE);
            return Ok(());
        }
        "init" => return init(rest.first().map(String::as_str)),
        _ => {}
    }

    let config = Config::load().context("Failed to load config")?;
    debug!(api_url = %config.api_url, rpc_url = %config.rpc_url, "Config loaded");
    let client = Client::new(config)?;

    match command.as_str() {
        "login" => login(&client).await,
        "status" => status(&client).await,
        "balance" => balance(&client, rest.first().map(String::as_str)).await,
        "ata" => {
            let owner = rest.first().context("ata needs an owner address")?;
            ata(&client, owner)
        }
        "duels" => list_duels(&client).await,
        "duel" => {
            let duel_id = rest.first().context("duel needs a duel id")?;
            show_duel(&client, duel_id).await
        }
        "stats" => stats(&client).await,
        "create" => run_action(&client, create_action(rest)?).await,
        "join" => {
            let (duel_id, answer) = duel_and_answer(rest, "join")?;
            let action = WalletAction::JoinDuel(JoinDuelParams {
                duel_id: duel_id.to_string(),
                answer,
                invited_by: None,
                external_source: None,
            });
            run_action(&client, action).await
        }
        "resolve" => {
            client.require_session()?;
            let (duel_id, answer) = duel_and_answer(rest, "resolve")?;
            let result = client
                .transactions
                .resolve_duel(&ResolveDuelParams {
                    duel_id: duel_id.to_string(),
                    answer,
                })
                .await
                .context("Resolve failed")?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(())
        }
        "logout" => {
            client.auth.log_out().await;
            info!("Logged out from CLI");
            println!("Logged out");
            Ok(())
        }
        other => {
            eprintln!("{}", USAGE);
            bail!("Unknown command: {}", other)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_create_action_uses_default_commission() {
        let action = create_action(&args(&["Will it rain?", "2.5", "2026-11-01T00:00:00Z", "1"]))
            .expect("valid create args");
        match action {
            WalletAction::CreateDuel(params) => {
                assert_eq!(params.question, "Will it rain?");
                assert_eq!(params.duel_price, 2.5);
                assert_eq!(params.commission, DEFAULT_COMMISSION);
                assert_eq!(params.answer, 1);
                assert_eq!(params.event_date.to_rfc3339(), "2026-11-01T00:00:00+00:00");
            }
            other => panic!("unexpected {:?}", other),
        }

        let action = create_action(&args(&["q", "1", "2026-11-01T00:00:00Z", "0", "7"]))
            .expect("valid create args");
        assert!(matches!(action, WalletAction::CreateDuel(ref p) if p.commission == 7));
    }

    #[test]
    fn test_create_action_rejects_bad_args() {
        assert!(create_action(&args(&["q", "1", "2026-11-01T00:00:00Z"])).is_err());
        assert!(create_action(&args(&["q", "cheap", "2026-11-01T00:00:00Z", "1"])).is_err());
        assert!(create_action(&args(&["q", "1", "tomorrow", "1"])).is_err());
        assert!(create_action(&args(&["q", "1", "2026-11-01T00:00:00Z", "yes"])).is_err());
    }

    #[test]
    fn test_duel_and_answer() {
        let raw = args(&["duel-1", "2"]);
        let (duel_id, answer) = duel_and_answer(&raw, "join").expect("valid join args");
        assert_eq!((duel_id, answer), ("duel-1", 2));

        let err = duel_and_answer(&args(&["duel-1"]), "resolve").expect_err("missing answer");
        assert!(err.to_string().contains("resolve"));
    }
}
