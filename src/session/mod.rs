//! # Session Engine
//!
//! A [`Session`] is one player's view of the world. It owns every piece of client-side
//! state and is the only thing that mutates it:
//!
//! - **Input** goes through [`Session::handle_input`]. An active authentication flow gets
//!   the whole line (except `cancel`), then an active conversation (except `exit`), then
//!   the command parser. Every executed line is echoed before any result line.
//! - **Events** come from [`Session::next_event`], which waits on the current room feed,
//!   the location feed and background room-context loads. [`Session::handle_event`]
//!   applies them.
//! - **Display** lines accumulate in a bounded [`DisplayLog`].
//!
//! Every failure is turned into an inline error line; nothing here is fatal.
//!
//! ## Room switches
//!
//! Entering a room tears down the old subscription (clearing conversation mode), opens the
//! new one, then loads room context in the background. A context load is applied only if
//! the room and actor it was started for are still current when it completes. Once applied,
//! the playlist is re-resolved and the arrival `look` is submitted.
//!
//! ```rust,no_run
//! # async fn demo(services: mudlink::services::Services) {
//! use mudlink::audio::{LogOutput, PlaybackHub, PlaybackSynchronizer};
//! use mudlink::config::SessionConfig;
//! use mudlink::session::Session;
//!
//! let playback = PlaybackSynchronizer::attach(PlaybackHub::global(), LogOutput::boxed);
//! let mut session = Session::new(SessionConfig::default(), services, playback);
//! session.handle_input("login").await;
//! # }
//! ```

pub mod actor;
pub mod auth;
pub mod autocomplete;
pub mod channel;
pub mod commands;
pub mod context;
pub mod conversation;
pub mod display;
pub mod history;
pub mod render;

use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::audio::{PlaybackSynchronizer, PlaylistResolution};
use crate::config::SessionConfig;
use crate::errors::{EngineError, PlaybackError, ValidationError};
use crate::logutil::{escape_log, mask_email};
use crate::metrics;
use crate::services::{
    Account, LocationChange, LocationFeed, MessageKind, RoomMessage, ServiceError, Services,
    SubmitRequest,
};
use crate::validation::{validate_character_name, NameRules};

use actor::{Actor, ActorResolver};
use auth::{AuthFlow, AuthMode, AuthTransition};
use autocomplete::{resolve_exit, Autocompleter, CompletionContext};
use channel::RoomChannelManager;
use commands::{Command, CommandParser};
use context::{ContextLoaded, RoomContext};
use conversation::{ConversationController, ConversationTurn, Role};
use display::{DisplayLine, DisplayLog, LineKind};
use history::CommandHistory;
use render::{render, RenderContext};

macro_rules! sec_log {
    ($($arg:tt)*) => { log::warn!(target: "security", $($arg)*); };
}

const HELP_LINES: &[&str] = &[
    "Account: LOGIN, REGISTER, FORGOT, CANCEL, LOGOUT, WHOAMI",
    "Characters: CHARACTERS, CREATE <name>, ENTER <name>, DISENGAGE",
    "World: SAY <msg>, LOOK, EXITS, GO <dir> (or n/s/e/w/ne/nw/se/sw/u/d), WHO",
    "People: INSPECT <name>, TALK <npc> [msg], PET <name>, WHISPER <name> <msg>",
    "Local: HELP or ?, CLEAR, EXIT (leave a conversation)",
];

/// Something the session can react to without user input.
#[derive(Debug)]
pub enum SessionEvent {
    Message(RoomMessage),
    /// The current room feed was closed by the transport.
    FeedClosed,
    Location(LocationChange),
    LocationsClosed,
    ContextLoaded(ContextLoaded),
}

pub struct Session {
    config: SessionConfig,
    services: Services,
    parser: CommandParser,
    actors: ActorResolver,
    auth: Option<AuthFlow>,
    conversation: ConversationController,
    channel: RoomChannelManager,
    context: Option<RoomContext>,
    locations: Option<LocationFeed>,
    completions_tx: mpsc::UnboundedSender<ContextLoaded>,
    completions_rx: mpsc::UnboundedReceiver<ContextLoaded>,
    display: DisplayLog,
    history: CommandHistory,
    autocompleter: Autocompleter,
    /// Names of the account's characters, refreshed on login and roster changes.
    roster: Vec<String>,
    pending_move: Option<String>,
    playback: PlaybackSynchronizer,
}

impl Session {
    pub fn new(config: SessionConfig, services: Services, playback: PlaybackSynchronizer) -> Self {
        let (completions_tx, completions_rx) = mpsc::unbounded_channel();
        let mut session = Self {
            parser: CommandParser::new(),
            actors: ActorResolver::new(),
            auth: None,
            conversation: ConversationController::new(config.conversation_history_cap),
            channel: RoomChannelManager::new(config.staleness_tolerance()),
            context: None,
            locations: None,
            completions_tx,
            completions_rx,
            display: DisplayLog::new(config.display_cap),
            history: CommandHistory::new(),
            autocompleter: Autocompleter::new(),
            roster: Vec::new(),
            pending_move: None,
            playback,
            services,
            config,
        };
        session.push(DisplayLine::system(
            "Welcome. Type LOGIN or REGISTER to begin, or HELP for commands.",
        ));
        session
    }

    pub fn display(&self) -> &DisplayLog {
        &self.display
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn active_actor(&self) -> Option<&Actor> {
        self.actors.active()
    }

    pub fn account(&self) -> Option<&Account> {
        self.actors.account()
    }

    pub fn current_room(&self) -> Option<&str> {
        self.channel.current_room()
    }

    pub fn room_context(&self) -> Option<&RoomContext> {
        self.context.as_ref()
    }

    pub fn auth_flow(&self) -> Option<&AuthFlow> {
        self.auth.as_ref()
    }

    pub fn conversation(&self) -> &ConversationController {
        &self.conversation
    }

    pub fn pending_move(&self) -> Option<&str> {
        self.pending_move.as_deref()
    }

    pub fn playback(&self) -> &PlaybackSynchronizer {
        &self.playback
    }

    /// The next line must not be echoed (password or confirmation step).
    pub fn expects_secret(&self) -> bool {
        self.auth.as_ref().is_some_and(AuthFlow::is_secret_step)
    }

    pub fn prompt(&self) -> String {
        if let Some(flow) = &self.auth {
            return flow.prompt().to_string();
        }
        if let Some(target) = self.conversation.target() {
            return format!("[{}]> ", target.npc_name);
        }
        match self.actors.active() {
            Some(actor) => format!("{}> ", actor.name()),
            None => "> ".to_string(),
        }
    }

    pub fn recall_previous(&mut self) -> Option<String> {
        self.history.previous().map(str::to_string)
    }

    pub fn recall_next(&mut self) -> Option<String> {
        self.history.next().map(str::to_string)
    }

    /// Complete `input` against the current room. Calling again with the returned value
    /// cycles to the next candidate.
    pub fn autocomplete(&mut self, input: &str) -> Option<String> {
        let self_id = self.actors.active().map(|a| a.id().to_string());
        let (exits, npcs, here) = match &self.context {
            Some(ctx) => (
                ctx.exit_names(),
                ctx.npcs.as_slice(),
                ctx.others_here(self_id.as_deref()),
            ),
            None => (Vec::new(), &[][..], Vec::new()),
        };
        let ctx = CompletionContext {
            exits: &exits,
            npcs,
            characters_here: &here,
            roster: &self.roster,
        };
        self.autocompleter.next(input, &ctx)
    }

    fn push(&mut self, line: DisplayLine) {
        self.display.push(line);
    }

    fn push_error(&mut self, err: &EngineError) {
        debug!("inline error: {}", err);
        self.push(DisplayLine::error(err.to_string()));
    }

    /// Process one line of user input.
    pub async fn handle_input(&mut self, raw: &str) {
        self.autocompleter.reset();

        if let Some(flow) = self.auth.take() {
            if raw.trim().eq_ignore_ascii_case("cancel") {
                self.push(DisplayLine::input(format!("> {}", raw.trim())));
                sec_log!("{:?} flow cancelled", flow.mode());
                self.push(DisplayLine::system("Cancelled."));
                return;
            }
            self.push(DisplayLine::masked_input(&self.config.password_mask));
            self.advance_auth(flow, raw).await;
            return;
        }

        let line = raw.trim();
        if line.is_empty() {
            return;
        }
        self.push(DisplayLine::input(format!("> {}", line)));
        self.history.push(line);
        metrics::inc_commands_dispatched();

        let result = if self.conversation.is_active() {
            if line.eq_ignore_ascii_case("exit") {
                if let Some(closing) = self.conversation.exit() {
                    self.push(closing);
                }
                Ok(())
            } else {
                self.converse(line).await
            }
        } else {
            let command = self.parser.parse(line);
            self.execute(command).await
        };
        if let Err(err) = result {
            self.push_error(&err);
        }
    }

    async fn advance_auth(&mut self, flow: AuthFlow, input: &str) {
        match flow.submit(input) {
            AuthTransition::Continue(next) => {
                self.push(DisplayLine::help(next.prompt()));
                self.auth = Some(next);
            }
            AuthTransition::Retry(same, err) => {
                self.push_error(&EngineError::from(err));
                self.push(DisplayLine::help(same.prompt()));
                self.auth = Some(same);
            }
            AuthTransition::Abort(err) => {
                sec_log!("auth flow aborted: {}", err);
                self.push_error(&EngineError::from(err));
            }
            AuthTransition::SignIn { email, password } => {
                let result = self.services.auth.sign_in(&email, &password).await;
                self.finish_auth("sign-in", &email, result, "Welcome back").await;
            }
            AuthTransition::SignUp { email, password } => {
                let result = self.services.auth.sign_up(&email, &password).await;
                self.finish_auth("sign-up", &email, result, "Account created").await;
            }
            AuthTransition::Reset { email } => {
                match self.services.auth.request_password_reset(&email).await {
                    Ok(()) => {
                        info!(target: "security", "password reset requested for {}", mask_email(&email));
                        self.push(DisplayLine::system(
                            "If that address has an account, a reset link is on its way.",
                        ));
                    }
                    Err(e) => {
                        sec_log!("password reset for {} failed: {}", mask_email(&email), e);
                        self.push_error(&EngineError::remote("password reset", e.0));
                    }
                }
            }
        }
    }

    async fn finish_auth(
        &mut self,
        what: &'static str,
        email: &str,
        result: Result<Account, ServiceError>,
        greeting: &str,
    ) {
        match result {
            Ok(account) => {
                info!(target: "security", "{} succeeded for {}", what, mask_email(email));
                if let Err(err) = self.establish(account, greeting).await {
                    self.push_error(&err);
                }
            }
            Err(e) => {
                sec_log!("{} failed for {}: {}", what, mask_email(email), e);
                self.push_error(&EngineError::remote(what, e.0));
            }
        }
    }

    /// Start a logged-in session as the account's observer.
    async fn establish(&mut self, account: Account, greeting: &str) -> Result<(), EngineError> {
        let observer = self
            .services
            .store
            .observer_for(&account.user_id)
            .await
            .map_err(|e| EngineError::remote("observer lookup", e.0))?;
        if self.locations.is_none() {
            let feed = self
                .services
                .realtime
                .watch_locations()
                .await
                .map_err(|e| EngineError::remote("realtime", e.0))?;
            self.locations = Some(feed);
        }
        let room = observer.current_room.clone();
        let user_id = account.user_id.clone();
        self.push(DisplayLine::system(format!(
            "{}, {}. You are observing. Type CHARACTERS to list your characters or CREATE <name>.",
            greeting, account.email
        )));
        self.actors.establish(account, observer);
        self.refresh_roster(&user_id).await;
        self.enter_room(&room).await
    }

    async fn refresh_roster(&mut self, user_id: &str) {
        match self.services.store.characters_for(user_id).await {
            Ok(records) => self.roster = records.into_iter().map(|r| r.name).collect(),
            Err(e) => warn!("could not refresh roster: {}", e),
        }
    }

    fn require_account(&self) -> Result<Account, EngineError> {
        self.actors
            .account()
            .cloned()
            .ok_or(EngineError::NotAuthenticated)
    }

    fn require_actor(&self) -> Result<&Actor, EngineError> {
        self.actors.active().ok_or(EngineError::NotAuthenticated)
    }

    fn start_auth(&mut self, mode: AuthMode) {
        if mode != AuthMode::Reset && self.actors.is_logged_in() {
            self.push(DisplayLine::system(
                "You are already logged in. Type LOGOUT first.",
            ));
            return;
        }
        let flow = AuthFlow::start(mode, self.config.min_password_len);
        self.push(DisplayLine::help(flow.prompt()));
        self.auth = Some(flow);
    }

    async fn execute(&mut self, command: Command) -> Result<(), EngineError> {
        match command {
            Command::Empty => Ok(()),
            Command::Help => {
                for line in HELP_LINES {
                    self.push(DisplayLine::help(*line));
                }
                Ok(())
            }
            Command::Login => {
                self.start_auth(AuthMode::Login);
                Ok(())
            }
            Command::Register => {
                self.start_auth(AuthMode::Register);
                Ok(())
            }
            Command::Forgot => {
                self.start_auth(AuthMode::Reset);
                Ok(())
            }
            Command::Cancel => {
                self.push(DisplayLine::system("Nothing to cancel."));
                Ok(())
            }
            Command::Logout => self.logout().await,
            Command::WhoAmI => {
                let account = self.require_account()?;
                let text = match self.actors.active() {
                    Some(actor) if actor.is_observer() => format!(
                        "Logged in as {}, observing from {}.",
                        account.email,
                        actor.current_room()
                    ),
                    Some(actor) => format!(
                        "Logged in as {}, playing {} in {}.",
                        account.email,
                        actor.name(),
                        actor.current_room()
                    ),
                    None => format!("Logged in as {}.", account.email),
                };
                self.push(DisplayLine::system(text));
                Ok(())
            }
            Command::Characters => {
                let account = self.require_account()?;
                let records = self
                    .services
                    .store
                    .characters_for(&account.user_id)
                    .await
                    .map_err(|e| EngineError::remote("character lookup", e.0))?;
                if records.is_empty() {
                    self.push(DisplayLine::system(
                        "You have no characters yet. Type CREATE <name>.",
                    ));
                } else {
                    self.push(DisplayLine::system("Your characters:"));
                    for record in &records {
                        self.push(DisplayLine::system(format!(
                            "  {} ({})",
                            record.name, record.current_room
                        )));
                    }
                }
                self.roster = records.into_iter().map(|r| r.name).collect();
                Ok(())
            }
            Command::Create(name) => {
                let account = self.require_account()?;
                if name.is_empty() {
                    return Err(ValidationError::MissingArgument("create <name>").into());
                }
                let name = validate_character_name(&name, &NameRules::default())
                    .map_err(ValidationError::from)?;
                let record = self
                    .services
                    .store
                    .create_character(&account.user_id, &name)
                    .await
                    .map_err(|e| EngineError::remote("character creation", e.0))?;
                info!("account {} created character {}", account.user_id, record.name);
                self.push(DisplayLine::system(format!(
                    "{} has been created. Type ENTER {} to play.",
                    record.name, record.name
                )));
                self.refresh_roster(&account.user_id).await;
                Ok(())
            }
            Command::Enter(name) => self.enter_character(&name).await,
            Command::Disengage => {
                self.require_account()?;
                if !self.actors.disengage() {
                    self.push(DisplayLine::system("You are not controlling a character."));
                    return Ok(());
                }
                self.push(DisplayLine::system("You step back and observe."));
                let room = self.require_actor()?.current_room().to_string();
                self.enter_room(&room).await
            }
            Command::Say(message) => {
                self.require_actor()?;
                if message.is_empty() {
                    return Err(ValidationError::MissingArgument("say <message>").into());
                }
                self.submit(format!("say {}", message), None).await
            }
            Command::Look => {
                self.require_actor()?;
                self.submit("look".to_string(), None).await
            }
            Command::Exits => {
                self.require_actor()?;
                match self.context.as_ref().map(RoomContext::exit_names) {
                    Some(exits) if exits.is_empty() => {
                        self.push(DisplayLine::system("There are no obvious exits."));
                        Ok(())
                    }
                    Some(exits) => {
                        self.push(DisplayLine::system(format!("Exits: {}", exits.join(", "))));
                        Ok(())
                    }
                    None => self.submit("exits".to_string(), None).await,
                }
            }
            Command::Go(direction) => {
                self.require_actor()?;
                if direction.is_empty() {
                    return Err(ValidationError::MissingArgument("go <direction>").into());
                }
                self.move_towards(&direction).await
            }
            Command::Move(direction) => {
                self.require_actor()?;
                self.move_towards(direction.as_str()).await
            }
            Command::Who => {
                self.require_actor()?;
                self.submit("who".to_string(), None).await
            }
            Command::Inspect(target) => {
                self.require_actor()?;
                if target.is_empty() {
                    return Err(ValidationError::MissingArgument("inspect <name>").into());
                }
                self.submit(format!("inspect {}", target), None).await
            }
            Command::Talk { target, message } => {
                self.require_actor()?;
                if target.is_empty() {
                    return Err(ValidationError::MissingArgument("talk <name> [message]").into());
                }
                let npc = self
                    .context
                    .as_ref()
                    .and_then(|ctx| ctx.find_npc(&target))
                    .cloned()
                    .ok_or_else(|| ValidationError::UnknownTarget(target.clone()))?;
                let opening = self.conversation.enter(&npc.name, npc.handle());
                self.push(opening);
                match message {
                    Some(message) => self.converse(&message).await,
                    None => Ok(()),
                }
            }
            Command::Pet(target) => {
                self.require_actor()?;
                if target.is_empty() {
                    return Err(ValidationError::MissingArgument("pet <name>").into());
                }
                self.submit(format!("pet {}", target), None).await
            }
            Command::Whisper { target, message } => {
                self.require_actor()?;
                if target.is_empty() || message.is_empty() {
                    return Err(
                        ValidationError::MissingArgument("whisper <name> <message>").into(),
                    );
                }
                self.submit(format!("whisper {} {}", target, message), None)
                    .await
            }
            Command::Clear => {
                self.display.clear();
                Ok(())
            }
            Command::Exit => {
                self.push(DisplayLine::system("You are not in a conversation."));
                Ok(())
            }
            Command::Action(text) => {
                self.require_actor()?;
                self.submit(text, None).await
            }
        }
    }

    async fn enter_character(&mut self, name: &str) -> Result<(), EngineError> {
        let account = self.require_account()?;
        if name.is_empty() {
            return Err(ValidationError::MissingArgument("enter <name>").into());
        }
        let records = self
            .services
            .store
            .characters_for(&account.user_id)
            .await
            .map_err(|e| EngineError::remote("character lookup", e.0))?;
        let record = records
            .into_iter()
            .find(|r| r.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| ValidationError::UnknownCharacter(name.to_string()))?;
        let room = record.current_room.clone();
        self.push(DisplayLine::system(format!("You are now playing {}.", record.name)));
        info!("account {} entered character {}", account.user_id, record.id);
        self.actors.select_character(record);
        self.enter_room(&room).await
    }

    /// Submit a movement. The exit list takes precedence over alias expansion; the move
    /// completes when the location feed reports the new room.
    async fn move_towards(&mut self, token: &str) -> Result<(), EngineError> {
        let exits = self
            .context
            .as_ref()
            .map(RoomContext::exit_names)
            .unwrap_or_default();
        let direction = resolve_exit(token, &exits).unwrap_or_else(|| token.to_lowercase());
        self.submit(format!("go {}", direction), None).await?;
        self.pending_move = Some(direction);
        Ok(())
    }

    async fn converse(&mut self, text: &str) -> Result<(), EngineError> {
        let Some(target) = self.conversation.target().cloned() else {
            return Ok(());
        };
        let history = self.conversation.history_with(Role::User, text);
        self.submit(
            format!("talk {} {}", target.npc_alias, text),
            Some(history),
        )
        .await?;
        self.conversation.add_turn(Role::User, text);
        Ok(())
    }

    async fn submit(
        &mut self,
        text: String,
        conversation: Option<Vec<ConversationTurn>>,
    ) -> Result<(), EngineError> {
        let actor = self.require_actor()?;
        let request = SubmitRequest {
            room_id: self
                .channel
                .current_room()
                .unwrap_or(actor.current_room())
                .to_string(),
            character_id: actor.character_id().map(str::to_string),
            observer_id: actor.observer_id().map(str::to_string),
            text,
            conversation,
        };
        debug!(
            "submitting '{}' as {} in {}",
            escape_log(&request.text),
            actor.name(),
            request.room_id
        );
        self.services.commands.submit(request).await.map_err(|e| {
            metrics::inc_submissions_failed();
            EngineError::remote("command", e.0)
        })
    }

    async fn logout(&mut self) -> Result<(), EngineError> {
        let account = self.require_account()?;
        self.services
            .auth
            .sign_out(&account.user_id)
            .await
            .map_err(|e| EngineError::remote("sign-out", e.0))?;
        info!(target: "security", "signed out {}", mask_email(&account.email));
        self.leave_room();
        self.actors.clear();
        self.locations = None;
        self.roster.clear();
        self.pending_move = None;
        if let Err(err) = self.playback.sync(PlaylistResolution::silent()).await {
            debug!("silencing playback on logout: {}", err);
        }
        self.display.clear();
        self.push(DisplayLine::system("You have logged out."));
        Ok(())
    }

    /// Drop the current subscription and everything tied to being in that room.
    fn leave_room(&mut self) {
        self.channel.unsubscribe();
        self.conversation.force_clear();
        self.context = None;
    }

    async fn enter_room(&mut self, room_id: &str) -> Result<(), EngineError> {
        self.leave_room();
        self.pending_move = None;
        self.channel
            .subscribe(self.services.realtime.as_ref(), room_id)
            .await
            .map_err(|e| EngineError::remote("realtime", e.0))?;
        self.spawn_context_load(room_id, true);
        Ok(())
    }

    fn spawn_context_load(&self, room_id: &str, announce: bool) {
        let Some(actor_id) = self.actors.active().map(|a| a.id().to_string()) else {
            return;
        };
        let store = self.services.store.clone();
        let tx = self.completions_tx.clone();
        let room_id = room_id.to_string();
        tokio::spawn(async move {
            let result = RoomContext::load(store.as_ref(), &room_id).await;
            let done = ContextLoaded {
                room_id,
                actor_id,
                announce,
                result,
            };
            if tx.send(done).is_err() {
                debug!("session gone before room context arrived");
            }
        });
    }

    /// Wait for the next event. Pends while nothing is subscribed or in flight.
    pub async fn next_event(&mut self) -> SessionEvent {
        tokio::select! {
            msg = self.channel.next_message() => match msg {
                Some(msg) => SessionEvent::Message(msg),
                None => SessionEvent::FeedClosed,
            },
            change = next_location(&mut self.locations) => match change {
                Some(change) => SessionEvent::Location(change),
                None => SessionEvent::LocationsClosed,
            },
            Some(done) = self.completions_rx.recv() => SessionEvent::ContextLoaded(done),
            else => SessionEvent::FeedClosed,
        }
    }

    pub async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Message(msg) => self.on_message(msg),
            SessionEvent::FeedClosed => {
                self.push(DisplayLine::error(
                    "Lost connection to the room. Type LOOK to refresh.",
                ));
            }
            SessionEvent::Location(change) => {
                if let Err(err) = self.on_location(change).await {
                    self.push_error(&err);
                }
            }
            SessionEvent::LocationsClosed => {
                warn!(target: "mudlink::channel", "location feed closed");
                self.locations = None;
            }
            SessionEvent::ContextLoaded(done) => self.apply_context(done).await,
        }
    }

    /// Process events until none arrive for `quiet`.
    pub async fn settle(&mut self, quiet: Duration) {
        while let Ok(event) = tokio::time::timeout(quiet, self.next_event()).await {
            self.handle_event(event).await;
        }
    }

    fn on_message(&mut self, msg: RoomMessage) {
        let viewer = self.actors.active().map(|a| a.id().to_string());
        if self.channel.admit(&msg, viewer.as_deref()).is_err() {
            return;
        }
        let npcs = self
            .context
            .as_ref()
            .map(|ctx| ctx.npcs.as_slice())
            .unwrap_or(&[]);
        let line = render(
            &msg,
            &RenderContext {
                self_id: viewer.as_deref(),
                npcs,
            },
        );
        if matches!(msg.kind, MessageKind::NpcSpeech | MessageKind::NpcWhisper) {
            self.record_npc_turn(&line);
        }
        metrics::inc_lines_rendered();
        self.push(line);
    }

    fn record_npc_turn(&mut self, line: &DisplayLine) {
        let Some(speaker) = line.hints.speaker.as_deref() else {
            return;
        };
        if !self.conversation.is_partner(speaker) {
            return;
        }
        let content = line
            .text
            .split_once(':')
            .map(|(_, rest)| rest.trim())
            .unwrap_or(line.text.as_str())
            .to_string();
        self.conversation.add_turn(Role::Npc, content);
    }

    async fn on_location(&mut self, change: LocationChange) -> Result<(), EngineError> {
        let moved_active = self
            .actors
            .apply_location(&change.actor_id, &change.room_id);
        if moved_active {
            if self.channel.current_room() == Some(change.room_id.as_str()) {
                self.pending_move = None;
                return Ok(());
            }
            info!(
                "active actor {} moved to {}",
                change.actor_id, change.room_id
            );
            return self.enter_room(&change.room_id).await;
        }

        let Some(current) = self.channel.current_room().map(str::to_string) else {
            return Ok(());
        };
        let affects_room = change.room_id == current
            || self.context.as_ref().is_some_and(|ctx| {
                ctx.characters_here.iter().any(|c| c.id == change.actor_id)
            });
        if affects_room {
            self.spawn_context_load(&current, false);
        }
        Ok(())
    }

    async fn apply_context(&mut self, done: ContextLoaded) {
        let room_current = self.channel.current_room() == Some(done.room_id.as_str());
        let actor_current = self.actors.active().map(Actor::id) == Some(done.actor_id.as_str());
        if !room_current || !actor_current {
            debug!(
                "ignoring context for {} loaded after a switch",
                escape_log(&done.room_id)
            );
            return;
        }
        let ctx = match done.result {
            Ok(ctx) => ctx,
            Err(e) => {
                self.push_error(&EngineError::remote("room lookup", e.0));
                return;
            }
        };
        let playlist = ctx.playlist();
        self.context = Some(ctx);
        if let Err(err) = self.playback.sync(playlist).await {
            self.push_error(&EngineError::from(err));
        }
        if done.announce {
            if let Err(err) = self.submit("look".to_string(), None).await {
                self.push_error(&err);
            }
        }
    }

    pub async fn set_audio(&mut self, enabled: bool) {
        let result = self.playback.set_enabled(enabled).await;
        self.report_playback(result);
        let state = if enabled { "on" } else { "off" };
        self.push(DisplayLine::system(format!("Ambient audio {}.", state)));
    }

    /// Advance the ambient playlist after the current track finishes.
    pub async fn on_track_end(&mut self) {
        let result = self.playback.on_track_end().await;
        self.report_playback(result);
    }

    fn report_playback(&mut self, result: Result<(), PlaybackError>) {
        if let Err(err) = result {
            self.push_error(&EngineError::from(err));
        }
    }

    /// Lines of the given kind currently in the log.
    pub fn lines_of(&self, kind: LineKind) -> Vec<&DisplayLine> {
        self.display.iter().filter(|l| l.kind == kind).collect()
    }
}

async fn next_location(feed: &mut Option<LocationFeed>) -> Option<LocationChange> {
    match feed.as_mut() {
        Some(feed) => feed.recv().await,
        None => std::future::pending().await,
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("actor", &self.actors.active())
            .field("room", &self.channel.current_room())
            .field("auth", &self.auth)
            .field("conversation", &self.conversation.target())
            .finish_non_exhaustive()
    }
}
