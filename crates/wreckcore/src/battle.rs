use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};
use wreckproto::command::BattleAction;
use wreckproto::gateway::{Card, GatewayDown};
use wreckproto::UserId;

use crate::catalog::ObjectDefinition;
use crate::encounter::{Encounter, EncounterSlot};
use crate::ledger::Ledger;
use crate::render;
use crate::rng::Rng64;

/// Victory pays a uniformly random bounty in [0, this].
pub const VICTORY_PRIZE_MAX: i64 = 50_000;
/// Floor of the enemy's retaliation roll.
const RETALIATION_MIN: i64 = 10;
/// Floor of a Defend action's defense gain.
const DEFEND_MIN_GAIN: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Victory,
    Defeat,
    Fled,
    /// The challenger won the fight, but another crew had already claimed
    /// this spawn. No ledger change.
    AlreadyClaimed,
    /// The fight was won but the ledger could not be persisted; nothing was
    /// applied and the encounter stays up.
    Aborted,
}

enum ActionWait {
    Chosen(BattleAction),
    TimedOut,
    /// The directive channel closed under us (adapter gone, daemon shutting
    /// down). Treated like a flight: no ledger change, encounter untouched.
    Gone,
}

/// One turn-based challenge: one challenger's selected ship against the
/// encounter snapshot read when the challenge started. The only shared state
/// a battle touches is the ledger (one terminal mutation) and the encounter
/// slot (one terminal claim).
pub struct Battle {
    pub user: UserId,
    pub ship: ObjectDefinition,
    pub encounter: Encounter,
    pub ledger: Arc<Mutex<Ledger>>,
    pub slot: Arc<Mutex<EncounterSlot>>,
    pub out: mpsc::Sender<GatewayDown>,
    pub actions: mpsc::Receiver<String>,
    pub action_timeout: Duration,
    pub rng: Rng64,
}

impl Battle {
    pub async fn run(mut self) -> Outcome {
        let mut player_hp = self.ship.hp();
        let mut enemy_hp = self.encounter.ship.hp();
        // Effective defense starts at the hull's rating and only grows.
        let mut defense = self.ship.defense_value();
        let enemy_attack = self.encounter.ship.attack_value();

        let mut opening = Card::new(
            format!("{} engages the {}", self.user, self.encounter.ship.name),
            format!(
                "{} closes in aboard the {}. Actions: attack, defend, flee.",
                self.user, self.ship.name
            ),
        )
        .field("Your hull", player_hp.to_string())
        .field("Enemy hull", enemy_hp.to_string())
        .field("Enemy attack", enemy_attack.to_string());
        if let Some(url) = &self.encounter.ship.image {
            opening = opening.image(url.clone());
        }
        self.render(opening).await;

        loop {
            self.render(
                Card::new(
                    "Your move".to_string(),
                    format!(
                        "attack, defend, or flee ({}s to decide)",
                        self.action_timeout.as_secs()
                    ),
                )
                .field("Your hull", player_hp.to_string())
                .field("Enemy hull", enemy_hp.to_string()),
            )
            .await;

            match self.await_action().await {
                ActionWait::Chosen(BattleAction::Attack) => {
                    let (weapon, damage) = match self.rng.pick(&self.ship.weapons) {
                        Some(w) => (w.name.clone(), w.damage),
                        None => ("bare hull".to_string(), 0),
                    };
                    enemy_hp -= damage;
                    // Module pick is flavor attribution only; no mechanical effect.
                    let target = self
                        .rng
                        .pick(&self.encounter.ship.modules)
                        .map(|m| m.name.clone());
                    let hit = match target {
                        Some(m) => format!(
                            "{} rakes the {}'s {} with the {} for {}.",
                            self.user, self.encounter.ship.name, m, weapon, damage
                        ),
                        None => format!(
                            "{} hits the {} with the {} for {}.",
                            self.user, self.encounter.ship.name, weapon, damage
                        ),
                    };
                    self.render(
                        Card::new("Direct hit", hit)
                            .field("Enemy hull", enemy_hp.max(0).to_string()),
                    )
                    .await;
                }
                ActionWait::Chosen(BattleAction::Defend) => {
                    let gain = self
                        .rng
                        .roll_range(DEFEND_MIN_GAIN, defense.max(DEFEND_MIN_GAIN));
                    defense += gain;
                    self.render(
                        Card::new(
                            "Shields up",
                            format!("{} angles the deflectors (+{gain} defense).", self.user),
                        )
                        .field("Defense", defense.to_string()),
                    )
                    .await;
                }
                ActionWait::Chosen(BattleAction::Flee) => {
                    self.render(Card::new(
                        "Fled",
                        format!(
                            "{} burns hard for open space. The {} is still out there.",
                            self.user, self.encounter.ship.name
                        ),
                    ))
                    .await;
                    return Outcome::Fled;
                }
                ActionWait::TimedOut => {
                    // Asymmetric timeout penalty: the round's initiative is
                    // lost, the enemy still acts below.
                    self.render(Card::new(
                        "Hesitation",
                        format!("{} freezes at the controls.", self.user),
                    ))
                    .await;
                }
                ActionWait::Gone => {
                    info!(user = %self.user, "challenger vanished mid-battle; treating as fled");
                    return Outcome::Fled;
                }
            }

            if enemy_hp > 0 {
                let roll = self
                    .rng
                    .roll_range(RETALIATION_MIN, enemy_attack.max(RETALIATION_MIN));
                let taken = (roll - defense).max(1);
                player_hp -= taken;
                self.render(
                    Card::new(
                        "Return fire",
                        format!(
                            "The {} answers with its full arsenal for {taken}.",
                            self.encounter.ship.name
                        ),
                    )
                    .field("Your hull", player_hp.max(0).to_string()),
                )
                .await;
            }

            if player_hp <= 0 {
                return self.finish_defeat().await;
            }
            if enemy_hp <= 0 {
                return self.finish_victory().await;
            }
        }
    }

    /// Wait for the challenger's next recognizable action, bounded by one
    /// deadline per round. Unrecognized chatter is ignored and does not
    /// extend the deadline.
    async fn await_action(&mut self) -> ActionWait {
        let deadline = tokio::time::Instant::now() + self.action_timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.actions.recv()).await {
                Err(_) => return ActionWait::TimedOut,
                Ok(None) => return ActionWait::Gone,
                Ok(Some(text)) => {
                    if let Some(action) = BattleAction::parse(&text) {
                        return ActionWait::Chosen(action);
                    }
                }
            }
        }
    }

    async fn finish_defeat(self) -> Outcome {
        let res = self
            .ledger
            .lock()
            .await
            .mutate(&self.user, |r| {
                r.losses += 1;
                Ok(())
            });
        if let Err(e) = res {
            warn!(user = %self.user, err = %e, "could not record defeat");
        }
        // The wreck stays up; someone else may finish what this crew started.
        self.render(Card::new(
            "Defeat",
            format!(
                "The {} breaks {}'s ship apart. The wreck remains unclaimed.",
                self.encounter.ship.name, self.user
            ),
        ))
        .await;
        Outcome::Defeat
    }

    async fn finish_victory(mut self) -> Outcome {
        let prize = self.rng.roll_range(0, VICTORY_PRIZE_MAX);
        let name = self.encounter.ship.name.clone();

        // Slot lock held across the ledger write so the claim and the payout
        // commit together; lock order is always slot -> ledger.
        let mut slot = self.slot.lock().await;
        let still_ours = slot
            .current()
            .map(|e| e.seq == self.encounter.seq)
            .unwrap_or(false);
        if !still_ours {
            drop(slot);
            self.render(Card::new(
                "Too slow",
                format!("The {} was already claimed by another crew.", name),
            ))
            .await;
            return Outcome::AlreadyClaimed;
        }

        let res = self.ledger.lock().await.mutate(&self.user, |r| {
            r.wins += 1;
            r.owned.insert(name.clone());
            r.balance += prize;
            Ok(())
        });
        match res {
            Ok(rec) => {
                slot.claim(self.encounter.seq);
                drop(slot);
                info!(user = %self.user, ship = %name, prize, "encounter captured");
                self.render(
                    Card::new(
                        "Victory",
                        format!(
                            "{} guts the {} and hauls the wreck home. Salvage bounty: {prize}.",
                            self.user, name
                        ),
                    )
                    .field("Captured", name.clone())
                    .field("Balance", rec.balance.to_string())
                    .field("Record", format!("{}-{}", rec.wins, rec.losses)),
                )
                .await;
                Outcome::Victory
            }
            Err(e) => {
                drop(slot);
                warn!(user = %self.user, err = %e, "victory could not be persisted");
                self.render(render::error_card(&e)).await;
                Outcome::Aborted
            }
        }
    }

    async fn render(&self, card: Card) {
        let _ = self
            .out
            .send(GatewayDown::Render {
                channel: self.encounter.channel,
                card,
            })
            .await;
    }
}
