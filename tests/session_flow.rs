//! End-to-end session behaviour against the in-process world: authentication, movement,
//! feed filtering, room switches, conversation mode and ambient playlist selection.

mod common;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mudlink::audio::{LogOutput, PlaybackHub, PlaybackState, PlaybackSynchronizer, SourceKey};
use mudlink::config::SessionConfig;
use mudlink::services::{
    CharacterRecord, CommandService, Exit, Npc, Region, RoomDetails, ServiceResult,
    SubmitRequest, WorldStore,
};
use mudlink::session::conversation::Role;
use mudlink::session::display::{Directive, LineKind};
use mudlink::session::Session;

#[tokio::test]
async fn register_masks_secrets_and_starts_as_observer() {
    let world = common::world();
    let (mut session, recorder) = common::session_for(&world);

    common::register(&mut session, "ada@example.com", "secret1").await;

    assert!(
        common::texts(&session).iter().all(|t| !t.contains("secret1")),
        "password leaked into the transcript"
    );
    let masked = session
        .display()
        .iter()
        .filter(|l| l.hints.masked)
        .count();
    assert_eq!(masked, 3, "email, password and confirmation are all masked");
    assert_eq!(session.recall_previous().as_deref(), Some("register"));
    assert!(session.auth_flow().is_none());

    let actor = session.active_actor().expect("observer after sign-up");
    assert!(actor.is_observer());
    assert_eq!(session.current_room(), Some("square"));
    assert!(session.room_context().is_some());

    // Arrival look goes out once the room context is in.
    let look = recorder.last().expect("arrival look");
    assert_eq!(look.text, "look");
    assert!(look.character_id.is_none());
    assert!(look.observer_id.is_some());
}

#[tokio::test]
async fn observer_moves_with_direction_alias() {
    let world = common::world();
    let (mut session, recorder) = common::session_for(&world);
    common::register(&mut session, "obs@example.com", "secret1").await;

    session.handle_input("nw").await;
    let go = recorder.last().expect("move submitted");
    assert_eq!(go.text, "go northwest");
    assert_eq!(go.room_id, "square");
    assert!(go.character_id.is_none());
    assert!(go.observer_id.is_some());
    assert_eq!(session.pending_move(), Some("northwest"));

    common::settle(&mut session).await;
    assert_eq!(session.current_room(), Some("orchard"));
    assert_eq!(
        session.active_actor().map(|a| a.current_room()),
        Some("orchard")
    );
    assert!(session.pending_move().is_none());
}

#[tokio::test]
async fn mismatched_confirmation_discards_the_flow() {
    let world = common::world();
    let (mut session, _) = common::session_for(&world);
    for line in ["register", "bo@example.com", "secret1", "secret2"] {
        session.handle_input(line).await;
    }
    assert!(session.auth_flow().is_none());
    assert!(session.account().is_none());
    let last = session.display().last().expect("error line");
    assert_eq!(last.kind, LineKind::Error);
    assert!(last.text.contains("do not match"));
}

#[tokio::test]
async fn cancel_leaves_the_flow_in_plain_text() {
    let world = common::world();
    let (mut session, _) = common::session_for(&world);
    session.handle_input("login").await;
    assert!(session.auth_flow().is_some());
    session.handle_input("cancel").await;
    assert!(session.auth_flow().is_none());
    let texts = common::texts(&session);
    assert!(texts.contains(&"> cancel".to_string()));
    assert_eq!(texts.last().map(String::as_str), Some("Cancelled."));
}

#[tokio::test]
async fn short_password_keeps_the_step() {
    let world = common::world();
    let (mut session, _) = common::session_for(&world);
    for line in ["register", "cy@example.com", "abc"] {
        session.handle_input(line).await;
    }
    assert!(session.expects_secret());
    assert!(session
        .lines_of(LineKind::Error)
        .iter()
        .any(|l| l.text.contains("at least 6")));
}

#[tokio::test]
async fn world_commands_need_a_login() {
    let world = common::world();
    let (mut session, recorder) = common::session_for(&world);
    session.handle_input("say hello").await;
    let last = session.display().last().expect("error line");
    assert_eq!(last.kind, LineKind::Error);
    assert!(last.text.contains("log in"));
    assert!(recorder.texts().is_empty());
}

#[tokio::test]
async fn wrong_password_is_reported_inline() {
    let world = common::world();
    let (mut session, _) = common::session_for(&world);
    common::register(&mut session, "dee@example.com", "secret1").await;
    session.handle_input("logout").await;
    assert!(session.account().is_none());
    assert_eq!(session.current_room(), None);

    for line in ["login", "dee@example.com", "nope-nope"] {
        session.handle_input(line).await;
    }
    assert!(session.account().is_none());
    assert!(session
        .lines_of(LineKind::Error)
        .iter()
        .any(|l| l.text.contains("Invalid email or password")));
}

#[tokio::test]
async fn feed_filters_duplicates_strangers_and_stale_events() {
    let world = common::world();
    let (mut session, _) = common::session_for(&world);
    common::play_as(&mut session, "eve@example.com", "Eve").await;
    assert_eq!(session.current_room(), Some("square"));

    let fresh = common::message("m-1", "square", "A bell rings.");
    world.broadcast(fresh.clone());
    world.broadcast(fresh);

    let mut private = common::message("m-2", "square", "Psst.");
    private.target_character_id = Some("someone-else".into());
    world.broadcast(private);

    let mut stale = common::message("m-3", "square", "Yesterday's news.");
    stale.created_at = Utc::now() - chrono::Duration::seconds(60);
    world.broadcast(stale);

    common::settle(&mut session).await;
    let texts = common::texts(&session);
    assert_eq!(texts.iter().filter(|t| *t == "A bell rings.").count(), 1);
    assert!(!texts.iter().any(|t| t.contains("Psst")));
    assert!(!texts.iter().any(|t| t.contains("Yesterday")));
}

#[tokio::test]
async fn own_speech_and_private_replies_render() {
    let world = common::world();
    let (mut session, _) = common::session_for(&world);
    common::play_as(&mut session, "fay@example.com", "Fay").await;

    session.handle_input("say good morning").await;
    session.handle_input("inspect odo").await;
    common::settle(&mut session).await;

    let said = session
        .display()
        .iter()
        .find(|l| l.text == "Fay: good morning")
        .expect("own speech rendered");
    assert!(said.hints.own);
    let inspected = session
        .display()
        .iter()
        .find(|l| l.text.starts_with("Odo the Crier:"))
        .expect("inspect reply");
    assert!(inspected.hints.private);
}

#[tokio::test]
async fn switching_rooms_drops_the_old_feed() {
    let world = common::world();
    let (mut session, recorder) = common::session_for(&world);
    common::play_as(&mut session, "gil@example.com", "Gil").await;

    session.handle_input("n").await;
    common::settle(&mut session).await;
    assert_eq!(session.current_room(), Some("bakery"));
    let look = recorder.last().expect("arrival look");
    assert_eq!((look.text.as_str(), look.room_id.as_str()), ("look", "bakery"));

    world.broadcast(common::message("sq-1", "square", "Back in the square."));
    world.broadcast(common::message("bk-1", "bakery", "The oven door creaks."));
    common::settle(&mut session).await;

    let texts = common::texts(&session);
    assert!(!texts.iter().any(|t| t.contains("Back in the square")));
    assert!(texts.iter().any(|t| t == "The oven door creaks."));
}

#[tokio::test]
async fn exits_and_completion_use_room_context() {
    let world = common::world();
    let (mut session, recorder) = common::session_for(&world);
    common::play_as(&mut session, "hal@example.com", "Hal").await;
    let before = recorder.texts().len();

    session.handle_input("exits").await;
    assert_eq!(
        session.display().last().map(|l| l.text.as_str()),
        Some("Exits: north, northwest")
    );
    assert_eq!(recorder.texts().len(), before, "answered locally");

    assert_eq!(session.autocomplete("go nor").as_deref(), Some("go north"));
    assert_eq!(session.autocomplete("go north").as_deref(), Some("go northwest"));
    assert_eq!(session.autocomplete("talk od").as_deref(), Some("talk odo"));
}

#[tokio::test]
async fn repeated_completion_cycles_through_exits() {
    let world = common::world();
    let (mut session, _) = common::session_for(&world);
    common::play_as(&mut session, "max@example.com", "Max").await;

    let picks: Vec<Option<String>> = (0..3).map(|_| session.autocomplete("n")).collect();
    assert_eq!(
        picks,
        vec![
            Some("north".to_string()),
            Some("northwest".to_string()),
            Some("north".to_string())
        ]
    );

    session.handle_input("look").await;
    assert_eq!(session.autocomplete("n").as_deref(), Some("north"), "input restarts the cycle");
}

#[tokio::test]
async fn inspect_completes_npc_aliases() {
    let world = common::world();
    let (mut session, _) = common::session_for(&world);
    common::play_as(&mut session, "ned@example.com", "Ned").await;
    session.handle_input("n").await;
    common::settle(&mut session).await;
    assert_eq!(session.current_room(), Some("bakery"));
    assert_eq!(session.autocomplete("inspect bak").as_deref(), Some("inspect Mira"));
}

#[tokio::test]
async fn conversation_with_npc_tracks_turns() {
    let world = common::world();
    let (mut session, recorder) = common::session_for(&world);
    common::play_as(&mut session, "ivy@example.com", "Ivy").await;
    session.handle_input("n").await;
    common::settle(&mut session).await;
    assert_eq!(session.current_room(), Some("bakery"));

    session.handle_input("talk mira").await;
    assert!(session.conversation().is_active());
    assert_eq!(session.prompt(), "[Mira]> ");

    session.handle_input("what smells so good?").await;
    let sent = recorder.last().expect("conversation submit");
    assert_eq!(sent.text, "talk baker what smells so good?");
    let history = sent.conversation.expect("history sent along");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].role, Role::User);

    common::settle(&mut session).await;
    let reply = session
        .display()
        .iter()
        .find(|l| l.text.starts_with("Mira:"))
        .expect("npc reply");
    assert!(reply
        .hints
        .directives
        .contains(&Directive::Portrait("images/mira.png".into())));
    assert!(
        !session.display().iter().any(|l| l.hints.transient),
        "typing indicator is replaced by the reply"
    );

    let turns = session.conversation().history();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[1].role, Role::Npc);

    session.handle_input("exit").await;
    assert!(!session.conversation().is_active());
    assert_eq!(
        session.display().last().map(|l| l.text.as_str()),
        Some("You end your conversation with Mira.")
    );
}

#[tokio::test]
async fn being_moved_ends_the_conversation() {
    let world = common::world();
    let (mut session, _) = common::session_for(&world);
    common::play_as(&mut session, "jo@example.com", "Jo").await;

    session.handle_input("talk odo").await;
    assert!(session.conversation().is_active());

    // Moved by the server rather than by typed input.
    let id = session.active_actor().map(|a| a.id().to_string());
    world
        .submit(SubmitRequest {
            text: "go north".into(),
            character_id: id,
            observer_id: None,
            room_id: "square".into(),
            conversation: None,
        })
        .await
        .expect("move accepted");
    common::settle(&mut session).await;

    assert_eq!(session.current_room(), Some("bakery"));
    assert!(!session.conversation().is_active());
    assert_eq!(session.prompt(), "Jo> ");

    session.handle_input("talk odo").await;
    assert!(!session.conversation().is_active());
    assert!(session
        .display()
        .last()
        .is_some_and(|l| l.kind == LineKind::Error && l.text.contains("odo")));
}

#[tokio::test]
async fn playlist_follows_room_override_and_region() {
    let world = common::world();
    let (mut session, _) = common::session_for(&world);
    common::play_as(&mut session, "kit@example.com", "Kit").await;
    assert_eq!(
        session.playback().source().await,
        Some(SourceKey::Region("town".into()))
    );

    session.handle_input("n").await;
    common::settle(&mut session).await;
    assert_eq!(
        session.playback().source().await,
        Some(SourceKey::Override("bakery".into()))
    );
    assert_eq!(
        session.playback().current_track().await.as_deref(),
        Some("audio/bakery-hearth.ogg")
    );

    session.handle_input("logout").await;
    assert_eq!(session.playback().source().await, Some(SourceKey::Silent));
}

/// Store whose lookups for one room take a while.
struct SlowRoom {
    inner: Arc<mudlink::backend::LocalWorld>,
    slow_room: &'static str,
    delay: Duration,
}

#[async_trait]
impl WorldStore for SlowRoom {
    async fn room(&self, room_id: &str) -> ServiceResult<RoomDetails> {
        if room_id == self.slow_room {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.room(room_id).await
    }
    async fn exits(&self, room_id: &str) -> ServiceResult<Vec<Exit>> {
        self.inner.exits(room_id).await
    }
    async fn npcs(&self, room_id: &str) -> ServiceResult<Vec<Npc>> {
        self.inner.npcs(room_id).await
    }
    async fn characters_in_room(&self, room_id: &str) -> ServiceResult<Vec<CharacterRecord>> {
        self.inner.characters_in_room(room_id).await
    }
    async fn characters_for(&self, user_id: &str) -> ServiceResult<Vec<CharacterRecord>> {
        self.inner.characters_for(user_id).await
    }
    async fn create_character(&self, user_id: &str, name: &str) -> ServiceResult<CharacterRecord> {
        self.inner.create_character(user_id, name).await
    }
    async fn observer_for(&self, user_id: &str) -> ServiceResult<CharacterRecord> {
        self.inner.observer_for(user_id).await
    }
    async fn region(&self, name: &str) -> ServiceResult<Option<Region>> {
        self.inner.region(name).await
    }
}

#[tokio::test]
async fn context_loaded_after_a_switch_is_ignored() {
    let world = common::world();
    let (mut services, recorder) = common::services_for(&world);
    services.store = Arc::new(SlowRoom {
        inner: world.clone(),
        slow_room: "bakery",
        delay: Duration::from_millis(300),
    });
    let playback =
        PlaybackSynchronizer::attach(PlaybackHub::new(PlaybackState::default()), LogOutput::boxed);
    let mut session = Session::new(SessionConfig::default(), services, playback);
    common::play_as(&mut session, "lu@example.com", "Lu").await;

    // Into the bakery, whose context is still loading when we walk back out.
    session.handle_input("n").await;
    session.settle(Duration::from_millis(50)).await;
    assert_eq!(session.current_room(), Some("bakery"));
    assert!(session.room_context().is_none());

    session.handle_input("s").await;
    session.settle(Duration::from_millis(500)).await;

    assert_eq!(session.current_room(), Some("square"));
    let ctx = session.room_context().expect("square context");
    assert_eq!(ctx.room.id, "square");
    assert_eq!(
        session.playback().source().await,
        Some(SourceKey::Region("town".into()))
    );
    let sent = recorder.last().expect("arrival look");
    assert_eq!((sent.text.as_str(), sent.room_id.as_str()), ("look", "square"));
    assert!(
        !recorder
            .sent()
            .iter()
            .any(|r| r.text == "look" && r.room_id == "bakery"),
        "late bakery context must not trigger an arrival look"
    );
}
