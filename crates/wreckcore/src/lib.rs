//! `wreckcore`: the encounter-game core.
//!
//! Everything with real state-machine or concurrency concerns lives here:
//! the immutable ship [`catalog`], the durable participant [`ledger`], the
//! single-slot active [`encounter`] plus its spawn scheduler, the per-challenge
//! [`battle`] engine, and the [`game`] command surface that ties them together.
//! Presentation and the chat-platform connection stay on the far side of the
//! `wreckproto` gateway contract.

pub mod battle;
pub mod catalog;
pub mod encounter;
pub mod error;
pub mod game;
pub mod ledger;
mod render;
pub mod rng;

pub use error::GameError;
pub use game::{Game, GameConfig};
