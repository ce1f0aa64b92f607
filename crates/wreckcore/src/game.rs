use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};
use wreckproto::command::{self, Command};
use wreckproto::gateway::{Card, ChannelRef, GatewayDown};
use wreckproto::{ChannelId, UserId};

use crate::battle::Battle;
use crate::catalog::{Catalog, ObjectDefinition};
use crate::encounter::EncounterSlot;
use crate::ledger::Ledger;
use crate::render;
use crate::rng::Rng64;
use crate::GameError;

/// A successful beg pays a uniformly random amount in this range.
pub const BEG_MIN_GRANT: i64 = 500;
pub const BEG_MAX_GRANT: i64 = 5_000;

#[derive(Debug, Clone)]
pub struct GameConfig {
    pub starting_balance: i64,
    pub spawn_period: Duration,
    pub action_timeout: Duration,
    pub beg_cooldown: Duration,
    /// Non-spawnable boss tier, by name.
    pub boss_ships: Vec<String>,
    /// Fixed seed for reproducible sessions; `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            starting_balance: 30_000,
            spawn_period: Duration::from_secs(60),
            action_timeout: Duration::from_secs(30),
            beg_cooldown: Duration::from_secs(3600),
            boss_ships: vec!["Leviathan".to_string()],
            seed: None,
        }
    }
}

/// Shared game state plus the command surface the gateway dispatches into.
/// One instance per community; all tasks (scheduler, battles, dispatch) hold
/// it behind an `Arc`.
pub struct Game {
    cfg: GameConfig,
    catalog: Catalog,
    ledger: Arc<Mutex<Ledger>>,
    slot: Arc<Mutex<EncounterSlot>>,
    channels: Mutex<Vec<ChannelRef>>,
    /// Routing table: a participant with a live battle has a sender here, and
    /// every directive they issue goes to that battle instead of the command
    /// grammar.
    battles: Mutex<HashMap<UserId, mpsc::Sender<String>>>,
    out: mpsc::Sender<GatewayDown>,
    seed_salt: AtomicU64,
}

impl Game {
    pub fn new(
        cfg: GameConfig,
        catalog: Catalog,
        ledger: Ledger,
        out: mpsc::Sender<GatewayDown>,
    ) -> Arc<Self> {
        Arc::new(Self {
            cfg,
            catalog,
            ledger: Arc::new(Mutex::new(ledger)),
            slot: Arc::new(Mutex::new(EncounterSlot::new())),
            channels: Mutex::new(Vec::new()),
            battles: Mutex::new(HashMap::new()),
            out,
            seed_salt: AtomicU64::new(0),
        })
    }

    /// Per-task RNG: independent streams under a fixed seed, entropy otherwise.
    fn task_rng(&self) -> Rng64 {
        match self.cfg.seed {
            Some(s) => {
                let salt = self.seed_salt.fetch_add(1, Ordering::Relaxed);
                Rng64::from_seed(s ^ salt.wrapping_mul(0x9e3779b97f4a7c15))
            }
            None => Rng64::from_entropy(),
        }
    }

    /// Install the eligible-channel set from the adapter's `hello`.
    pub async fn set_channels(&self, channels: Vec<ChannelRef>) {
        info!(count = channels.len(), "eligible channels updated");
        *self.channels.lock().await = channels;
    }

    /// Entry point for every directive line from the adapter.
    pub async fn handle_directive(self: &Arc<Self>, user: UserId, channel: ChannelId, text: String) {
        {
            let mut battles = self.battles.lock().await;
            if let Some(tx) = battles.get(&user) {
                match tx.try_send(text.clone()) {
                    Ok(()) => return,
                    // Battle is behind on input; drop the extra chatter.
                    Err(mpsc::error::TrySendError::Full(_)) => return,
                    Err(mpsc::error::TrySendError::Closed(_)) => {
                        battles.remove(&user);
                    }
                }
            }
        }

        let Some(cmd) = command::parse_command(&text) else {
            return;
        };
        let result = match cmd {
            Command::Register => self.register(&user).await.map(Some),
            Command::Hangar => self.hangar(&user).await.map(Some),
            Command::Balance => self.balance(&user).await.map(Some),
            Command::Buy { name } => self.buy(&user, &name).await.map(Some),
            Command::Select { name } => self.select(&user, &name).await.map(Some),
            Command::Beg => self.beg(&user).await.map(Some),
            // The battle announces itself in the encounter's channel.
            Command::Engage => self.engage(&user).await.map(|_| None),
        };
        match result {
            Ok(Some(card)) => self.send(channel, card).await,
            Ok(None) => {}
            Err(e) => self.send(channel, render::error_card(&e)).await,
        }
    }

    pub async fn register(&self, user: &UserId) -> Result<Card, GameError> {
        let rec = self
            .ledger
            .lock()
            .await
            .register(user, self.cfg.starting_balance)?;
        info!(user = %user, "participant registered");
        Ok(
            Card::new("Enlisted", format!("{user} signs on with the wreckers."))
                .field("Balance", rec.balance.to_string()),
        )
    }

    pub async fn hangar(&self, user: &UserId) -> Result<Card, GameError> {
        let led = self.ledger.lock().await;
        let rec = led.get(user).ok_or(GameError::NotRegistered)?;
        let ships = if rec.owned.is_empty() {
            "none".to_string()
        } else {
            rec.owned.iter().cloned().collect::<Vec<_>>().join(", ")
        };
        Ok(Card::new("Hangar", format!("{user}'s hangar"))
            .field("Ships", ships)
            .field(
                "Selected",
                rec.selected.clone().unwrap_or_else(|| "none".to_string()),
            )
            .field("Record", format!("{}-{}", rec.wins, rec.losses)))
    }

    pub async fn balance(&self, user: &UserId) -> Result<Card, GameError> {
        let led = self.ledger.lock().await;
        let rec = led.get(user).ok_or(GameError::NotRegistered)?;
        Ok(Card::new("Balance", format!("{user}'s account"))
            .field("Credits", rec.balance.to_string()))
    }

    pub async fn buy(&self, user: &UserId, name: &str) -> Result<Card, GameError> {
        let def = self
            .catalog
            .lookup(name)
            .ok_or_else(|| GameError::UnknownShip(name.to_string()))?;
        let canonical = def.name.clone();
        let price = def.price();

        let rec = self.ledger.lock().await.mutate(user, |r| {
            if r.owned.contains(&canonical) {
                return Err(GameError::AlreadyOwned(canonical.clone()));
            }
            if r.balance < price {
                return Err(GameError::InsufficientFunds {
                    name: canonical.clone(),
                    price,
                    balance: r.balance,
                });
            }
            r.balance -= price;
            r.owned.insert(canonical.clone());
            Ok(())
        })?;
        info!(user = %user, ship = %canonical, price, "ship purchased");
        Ok(Card::new(
            "Purchase complete",
            format!("{user} takes delivery of the {canonical}."),
        )
        .field("Price", price.to_string())
        .field("Balance", rec.balance.to_string()))
    }

    /// One-time ship selection. A free starter hull (Price 0 or absent) is
    /// granted to the roster and selected in the same mutation; anything else
    /// must already be owned.
    pub async fn select(&self, user: &UserId, name: &str) -> Result<Card, GameError> {
        let def = self
            .catalog
            .lookup(name)
            .ok_or_else(|| GameError::UnknownShip(name.to_string()))?;
        let canonical = def.name.clone();
        let starter = def.price() == 0;

        self.ledger.lock().await.mutate(user, |r| {
            if r.selected.is_some() {
                return Err(GameError::AlreadySelected);
            }
            if !r.owned.contains(&canonical) {
                if !starter {
                    return Err(GameError::NotOwned(canonical.clone()));
                }
                r.owned.insert(canonical.clone());
            }
            r.selected = Some(canonical.clone());
            Ok(())
        })?;
        info!(user = %user, ship = %canonical, "ship selected");
        Ok(Card::new(
            "Ship selected",
            format!("{user} will fly the {canonical}. The choice is permanent."),
        ))
    }

    pub async fn beg(&self, user: &UserId) -> Result<Card, GameError> {
        let now = Utc::now().timestamp();
        let cooldown = self.cfg.beg_cooldown.as_secs() as i64;
        let mut rng = self.task_rng();
        let amount = rng.roll_range(BEG_MIN_GRANT, BEG_MAX_GRANT);

        let rec = self.ledger.lock().await.mutate(user, |r| {
            if let Some(last) = r.last_beg_unix {
                let elapsed = now - last;
                if elapsed < cooldown {
                    return Err(GameError::OnCooldown {
                        remaining_s: cooldown - elapsed,
                    });
                }
            }
            r.balance += amount;
            r.last_beg_unix = Some(now);
            Ok(())
        })?;
        Ok(Card::new(
            "Charity",
            format!("A passing hauler tosses {user} {amount} credits."),
        )
        .field("Balance", rec.balance.to_string()))
    }

    /// Start a battle against the active encounter. The encounter slot is
    /// read exactly once here; the spawned battle writes it at most once at
    /// termination.
    pub async fn engage(self: &Arc<Self>, user: &UserId) -> Result<(), GameError> {
        let ship = {
            let led = self.ledger.lock().await;
            let rec = led.get(user).ok_or(GameError::NotRegistered)?;
            let name = rec.selected.clone().ok_or(GameError::NoShipSelected)?;
            self.catalog.lookup(&name).cloned().ok_or_else(|| {
                GameError::DataUnavailable(format!("selected ship \"{name}\" missing from catalog"))
            })?
        };
        let encounter = self
            .slot
            .lock()
            .await
            .current()
            .cloned()
            .ok_or(GameError::NoEncounterActive)?;

        let (tx, rx) = mpsc::channel(8);
        {
            let mut battles = self.battles.lock().await;
            if battles.contains_key(user) {
                warn!(user = %user, "engage while already battling; ignored");
                return Ok(());
            }
            battles.insert(user.clone(), tx);
        }

        let battle = Battle {
            user: user.clone(),
            ship,
            encounter,
            ledger: Arc::clone(&self.ledger),
            slot: Arc::clone(&self.slot),
            out: self.out.clone(),
            actions: rx,
            action_timeout: self.cfg.action_timeout,
            rng: self.task_rng(),
        };
        let game = Arc::clone(self);
        let user = user.clone();
        tokio::spawn(async move {
            let outcome = battle.run().await;
            info!(user = %user, ?outcome, "battle finished");
            game.battles.lock().await.remove(&user);
        });
        Ok(())
    }

    /// The spawn scheduler: one tick per period, jitter before committing,
    /// publish only into an empty slot.
    pub async fn run_spawn_scheduler(self: Arc<Self>) {
        let mut rng = self.task_rng();
        let mut warned_idle = false;
        loop {
            tokio::time::sleep(self.cfg.spawn_period).await;

            if self.slot.lock().await.present() {
                continue;
            }

            // A capture can race in while we hold nothing; the jitter plus
            // the publish refusal below closes that window.
            let jitter = rng.roll_range(0, 1_000) as u64;
            tokio::time::sleep(Duration::from_millis(jitter)).await;

            let channels = self.channels.lock().await.clone();
            if channels.is_empty() {
                if !warned_idle {
                    warn!("no eligible channels; spawner stays idle");
                    warned_idle = true;
                }
                continue;
            }
            warned_idle = false;

            let spawnable: Vec<ObjectDefinition> = self
                .catalog
                .spawnable(&self.cfg.boss_ships)
                .into_iter()
                .cloned()
                .collect();
            let ship = match rng.pick(&spawnable) {
                Some(s) => s.clone(),
                None => {
                    warn!("catalog has no spawnable ships");
                    continue;
                }
            };
            let channel = match rng.pick(&channels) {
                Some(c) => c.clone(),
                None => continue,
            };

            // The adapter may have re-announced channels while we slept; do
            // not spawn into a void.
            if !self
                .channels
                .lock()
                .await
                .iter()
                .any(|c| c.id == channel.id)
            {
                let err = GameError::ChannelUnresolvable(channel.id.0);
                warn!(channel = %channel.id, err = %err, "skipping spawn");
                continue;
            }

            let card = {
                let mut slot = self.slot.lock().await;
                match slot.publish(ship, channel.id) {
                    Some(enc) => {
                        info!(
                            seq = enc.seq,
                            ship = %enc.ship.name,
                            channel = %channel.name,
                            "encounter spawned"
                        );
                        Some(render::encounter_card(&enc.ship))
                    }
                    // Slot filled while we slept; invariant held, spawn aborted.
                    None => None,
                }
            };
            if let Some(card) = card {
                self.send(channel.id, card).await;
            }
        }
    }

    async fn send(&self, channel: ChannelId, card: Card) {
        let _ = self.out.send(GatewayDown::Render { channel, card }).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::testdefs::ship;
    use crate::ledger::ParticipantRecord;

    fn test_catalog() -> Catalog {
        Catalog::from_defs(vec![
            ship("Titanic", 400, 0, &[("Deck Gun", 50)]),
            ship("Corsair", 800, 500, &[("Railgun", 90)]),
            ship("Reaper", 1200, 45_000, &[("Lance", 500)]),
            ship("Leviathan", 9000, 0, &[("Doom Cannon", 800)]),
        ])
        .expect("catalog")
    }

    fn rig(tag: &str, cfg: GameConfig) -> (Arc<Game>, mpsc::Receiver<GatewayDown>) {
        let dir = std::env::temp_dir().join(format!("wreck_game_{tag}_{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("ledger.json");
        let _ = std::fs::remove_file(&path);
        let ledger = Ledger::load(path).expect("ledger");
        let (out_tx, out_rx) = mpsc::channel(256);
        (Game::new(cfg, test_catalog(), ledger, out_tx), out_rx)
    }

    async fn record(game: &Game, user: &UserId) -> ParticipantRecord {
        game.ledger
            .lock()
            .await
            .get(user)
            .cloned()
            .expect("record")
    }

    #[tokio::test]
    async fn register_is_once_only() {
        let (game, _out) = rig("register", GameConfig::default());
        let alice = UserId::new("alice");
        game.register(&alice).await.expect("register");
        assert_eq!(
            game.register(&alice).await.unwrap_err(),
            GameError::AlreadyRegistered
        );
    }

    #[tokio::test]
    async fn starter_hull_is_granted_on_first_selection() {
        let (game, _out) = rig("starter", GameConfig::default());
        let alice = UserId::new("alice");
        game.register(&alice).await.expect("register");

        game.select(&alice, "titanic").await.expect("select");

        let rec = record(&game, &alice).await;
        assert_eq!(rec.balance, 30_000);
        assert!(rec.owned.contains("Titanic"));
        assert_eq!(rec.owned.len(), 1);
        assert_eq!(rec.selected.as_deref(), Some("Titanic"));
    }

    #[tokio::test]
    async fn selection_is_permanent_whatever_name_comes_next() {
        let (game, _out) = rig("permanent", GameConfig::default());
        let alice = UserId::new("alice");
        game.register(&alice).await.expect("register");
        game.select(&alice, "Titanic").await.expect("select");

        assert_eq!(
            game.select(&alice, "Titanic").await.unwrap_err(),
            GameError::AlreadySelected
        );
        assert_eq!(
            game.select(&alice, "Corsair").await.unwrap_err(),
            GameError::AlreadySelected
        );
    }

    #[tokio::test]
    async fn selecting_an_unowned_priced_hull_fails() {
        let (game, _out) = rig("unowned", GameConfig::default());
        let alice = UserId::new("alice");
        game.register(&alice).await.expect("register");

        assert_eq!(
            game.select(&alice, "Corsair").await.unwrap_err(),
            GameError::NotOwned("Corsair".to_string())
        );
        assert_eq!(
            game.select(&alice, "Ghost Ship").await.unwrap_err(),
            GameError::UnknownShip("Ghost Ship".to_string())
        );
    }

    #[tokio::test]
    async fn purchase_needs_funds_and_happens_once() {
        let (game, _out) = rig(
            "purchase",
            GameConfig {
                starting_balance: 100,
                ..GameConfig::default()
            },
        );
        let bob = UserId::new("bob");
        game.register(&bob).await.expect("register");

        let err = game.buy(&bob, "Corsair").await.unwrap_err();
        assert_eq!(
            err,
            GameError::InsufficientFunds {
                name: "Corsair".to_string(),
                price: 500,
                balance: 100,
            }
        );
        assert_eq!(record(&game, &bob).await.balance, 100);
    }

    #[tokio::test]
    async fn repurchase_fails_without_touching_the_balance() {
        let (game, _out) = rig("repurchase", GameConfig::default());
        let bob = UserId::new("bob");
        game.register(&bob).await.expect("register");

        game.buy(&bob, "corsair").await.expect("buy");
        let rec = record(&game, &bob).await;
        assert_eq!(rec.balance, 29_500);
        assert!(rec.owned.contains("Corsair"));

        assert_eq!(
            game.buy(&bob, "CORSAIR").await.unwrap_err(),
            GameError::AlreadyOwned("Corsair".to_string())
        );
        assert_eq!(record(&game, &bob).await.balance, 29_500);
    }

    #[tokio::test]
    async fn beg_pays_once_per_cooldown() {
        let (game, _out) = rig("beg", GameConfig::default());
        let alice = UserId::new("alice");
        game.register(&alice).await.expect("register");

        game.beg(&alice).await.expect("first beg");
        let rec = record(&game, &alice).await;
        let granted = rec.balance - 30_000;
        assert!((BEG_MIN_GRANT..=BEG_MAX_GRANT).contains(&granted));
        assert!(rec.last_beg_unix.is_some());

        let err = game.beg(&alice).await.unwrap_err();
        assert!(matches!(err, GameError::OnCooldown { remaining_s } if remaining_s > 0));
        assert_eq!(record(&game, &alice).await.balance, 30_000 + granted);
    }

    #[tokio::test]
    async fn engage_preconditions_fail_fast() {
        let (game, _out) = rig("preconditions", GameConfig::default());
        let alice = UserId::new("alice");

        assert_eq!(
            game.engage(&alice).await.unwrap_err(),
            GameError::NotRegistered
        );

        game.register(&alice).await.expect("register");
        assert_eq!(
            game.engage(&alice).await.unwrap_err(),
            GameError::NoShipSelected
        );

        game.select(&alice, "Titanic").await.expect("select");
        assert_eq!(
            game.engage(&alice).await.unwrap_err(),
            GameError::NoEncounterActive
        );
    }

    #[tokio::test]
    async fn dispatched_battle_runs_to_capture() {
        let (game, _out) = rig(
            "flow",
            GameConfig {
                seed: Some(7),
                ..GameConfig::default()
            },
        );
        let alice = UserId::new("alice");
        let channel = ChannelId(9);
        game.register(&alice).await.expect("register");
        game.select(&alice, "Titanic").await.expect("select");

        game.slot
            .lock()
            .await
            .publish(ship("Junker", 40, 0, &[("Pop", 5)]), channel)
            .expect("publish");

        game.handle_directive(alice.clone(), channel, "engage".to_string())
            .await;
        // Routed to the battle, not the command grammar.
        game.handle_directive(alice.clone(), channel, "attack".to_string())
            .await;

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            if record(&game, &alice).await.wins == 1 {
                break;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "battle never finished"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        let rec = record(&game, &alice).await;
        assert!(rec.owned.contains("Junker"));
        assert_eq!(rec.losses, 0);
        assert!(rec.balance >= 30_000);
        assert!(!game.slot.lock().await.present());
    }
}

