//! # mudlink - client session engine for text multiplayer worlds
//!
//! mudlink turns typed player input into world actions, renders a live, ordered stream of
//! room events, and keeps an ambient audio layer in step with where the player stands. The
//! simulation itself belongs to a remote authority reached through the traits in
//! [`services`]; [`backend::LocalWorld`] implements them in-process so the client runs
//! standalone.
//!
//! ## Features
//!
//! - **Command interpreter** with login/register/password-reset flows, character
//!   selection, movement aliases and conversation mode.
//! - **Realtime pipeline**: one room subscription at a time, per-room dedup, a staleness
//!   window and privacy filtering before anything is rendered.
//! - **Typed display lines** with image/portrait/alias directives and room sections.
//! - **Autocomplete** over exits, NPCs and characters, with cycling.
//! - **Ambient playlists** resolved per room, driven through one shared playback resource.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mudlink::audio::{LogOutput, PlaybackHub, PlaybackSynchronizer};
//! use mudlink::backend::{LocalWorld, WorldSeed};
//! use mudlink::config::Config;
//! use mudlink::services::Services;
//! use mudlink::session::Session;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let world = Arc::new(LocalWorld::new(WorldSeed::load(&config.world.file).await?)?);
//!     let playback = PlaybackSynchronizer::attach(PlaybackHub::global(), LogOutput::boxed);
//!     let mut session = Session::new(config.session, Services::from_backend(world), playback);
//!
//!     session.handle_input("register").await;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`session`] - the engine: interpreter, auth flow, channel manager, renderer,
//!   conversation mode, autocomplete, history and the display log
//! - [`audio`] - playlist resolution and the shared playback resource
//! - [`services`] - traits for the remote command, realtime, store and auth services
//! - [`backend`] - in-process implementation of those services
//! - [`config`] - configuration management and validation
//! - [`errors`] - engine error taxonomy
//! - [`term`] - terminal presentation used by the binary
//! - [`validation`], [`logutil`], [`metrics`] - shared helpers

pub mod audio;
pub mod backend;
pub mod config;
pub mod errors;
pub mod logutil;
pub mod metrics;
pub mod services;
pub mod session;
pub mod term;
pub mod validation;
