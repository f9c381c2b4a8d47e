//! End-to-end reducer tests: raw relay frames go through the decoder and
//! into the state, and the returned effects are checked.

use peerlink_protocol::{ChannelId, Command, EventDecoder, PeerId};
use peerlink_state::{ChatState, Effect, dm_channel};
use peerlink_transport::ConnectionStatus;
use serde_json::json;

// =========================================================================
// Helpers
// =========================================================================

fn decoder() -> EventDecoder {
    EventDecoder::new().with_clock(|| 99.0)
}

/// Feeds one JSON frame through decoder and reducer.
fn feed(state: &mut ChatState, frame: serde_json::Value) -> Vec<Effect> {
    let event = decoder()
        .decode(&frame.to_string())
        .expect("test frames are valid JSON");
    state.apply(event)
}

fn sent(effects: &[Effect]) -> Vec<&Command> {
    effects
        .iter()
        .filter_map(|e| match e {
            Effect::Send(cmd) => Some(cmd),
            Effect::Notice(_) => None,
        })
        .collect()
}

fn connect_cmd(peer: &str) -> Command {
    Command::Connect {
        peer_id: PeerId::new(peer),
    }
}

fn go_online(state: &mut ChatState) -> Vec<Effect> {
    let mut effects = state.set_status(ConnectionStatus::Connecting);
    effects.extend(state.set_status(ConnectionStatus::Connected));
    effects
}

fn peers_frame() -> serde_json::Value {
    json!({
        "type": "peers",
        "peers": {
            "p1": { "ip": "10.0.0.1", "port": 7001 },
            "p2": { "ip": "10.0.0.2", "port": 7002 }
        }
    })
}

fn chat_frame(channel: &str, text: &str) -> serde_json::Value {
    json!({ "type": "msg", "channel": channel, "from": "p2", "text": text })
}

// =========================================================================
// Scenarios
// =========================================================================

#[test]
fn test_handshake_adopts_identity_and_auto_connects() {
    let mut state = ChatState::new(None);
    let effects = go_online(&mut state);
    assert_eq!(sent(&effects), vec![&Command::ListPeers]);

    feed(&mut state, json!({ "type": "connected", "peer_id": "p1" }));
    assert_eq!(state.me().as_str(), "p1");

    let effects = feed(&mut state, peers_frame());
    assert_eq!(sent(&effects), vec![&connect_cmd("p1"), &connect_cmd("p2")]);
}

#[test]
fn test_bare_payload_auto_joins_general() {
    let mut state = ChatState::with_default_channel(None, "lobby".into());
    assert!(!state.is_joined(&ChannelId::general()));

    feed(
        &mut state,
        json!({ "payload": { "channel": "general", "from": "p2", "text": "hi", "ts": 1000 } }),
    );
    assert!(state.is_joined(&ChannelId::general()));
    let history = state.messages(&ChannelId::general());
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].text, "hi");
    assert_eq!(history[0].timestamp, 1000.0);
}

#[test]
fn test_clear_messages_keeps_channels() {
    let mut state = ChatState::new(None);
    feed(&mut state, chat_frame("general", "a"));
    feed(&mut state, chat_frame("dev", "b"));
    feed(&mut state, chat_frame("dev", "c"));
    let joined_before: Vec<_> = state.joined_channels().cloned().collect();
    assert_eq!(state.unread_count(&"dev".into()), 2);

    state.clear_messages();

    for channel in ["general", "dev"] {
        let channel = ChannelId::new(channel);
        assert!(state.messages(&channel).is_empty());
        assert_eq!(state.read_marker(&channel), 0);
        assert_eq!(state.unread_count(&channel), 0);
    }
    let joined_after: Vec<_> = state.joined_channels().cloned().collect();
    assert_eq!(joined_before, joined_after);
}

// =========================================================================
// Properties
// =========================================================================

#[test]
fn test_peers_replay_is_idempotent() {
    let mut once = ChatState::new(None);
    feed(&mut once, peers_frame());

    let mut twice = ChatState::new(None);
    feed(&mut twice, peers_frame());
    feed(&mut twice, peers_frame());

    assert_eq!(once.peers(), twice.peers());
}

#[test]
fn test_peers_replace_not_merge() {
    let mut state = ChatState::new(None);
    feed(&mut state, peers_frame());
    feed(
        &mut state,
        json!({ "type": "peers", "peers": { "p3": { "ip": "10.0.0.3", "port": 7003 } } }),
    );
    let ids: Vec<_> = state.peers().keys().map(PeerId::as_str).collect();
    assert_eq!(ids, vec!["p3"]);
}

#[test]
fn test_history_is_append_only_in_arrival_order() {
    let mut state = ChatState::new(None);
    let frames = [
        json!({ "type": "msg", "channel": "dev", "text": "first", "ts": 300 }),
        json!({ "type": "message", "channel": "dev", "msg": "second", "ts": 100 }),
        json!({ "type": "msg", "channel": "other", "text": "elsewhere" }),
        json!({ "payload": { "channel": "dev", "text": "third", "ts": 200 } }),
    ];
    for frame in frames {
        feed(&mut state, frame);
    }

    let texts: Vec<_> = state
        .messages(&"dev".into())
        .iter()
        .map(|m| m.text.as_str())
        .collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
}

#[test]
fn test_unread_grows_while_inactive_and_clears_on_select() {
    let mut state = ChatState::new(None);
    let mut last = 0;
    for n in 0..5 {
        feed(&mut state, chat_frame("dev", &format!("m{n}")));
        let unread = state.unread_count(&"dev".into());
        assert!(unread >= last, "unread count went down");
        last = unread;
    }
    assert_eq!(last, 5);

    state.select_channel("dev".into()).expect("dev is selectable");
    assert_eq!(state.unread_count(&"dev".into()), 0);

    // New messages in the active channel are read as they arrive.
    feed(&mut state, chat_frame("dev", "live"));
    assert_eq!(state.unread_count(&"dev".into()), 0);
}

#[test]
fn test_joined_channels_always_have_unread_entry() {
    let mut state = ChatState::new(None);
    feed(&mut state, json!({ "type": "joined_channel", "channel": "quiet" }));
    let counts = state.unread_counts();
    for channel in state.joined_channels() {
        assert!(counts.contains_key(channel), "{channel} missing an unread entry");
    }
    assert_eq!(counts[&ChannelId::new("quiet")], 0);
}

#[test]
fn test_dm_channel_is_symmetric() {
    let ids = ["alice", "bob", "p1", "p10", "p2", "", "Zed"];
    for a in ids {
        for b in ids {
            let (a, b) = (PeerId::new(a), PeerId::new(b));
            assert_eq!(dm_channel(&a, &b), dm_channel(&b, &a));
        }
    }
}

#[test]
fn test_both_sides_of_a_dm_converge() {
    let mut alice = ChatState::new(Some("alice".into()));
    let mut bob = ChatState::new(Some("bob".into()));
    alice.start_direct_message("bob".into()).expect("local dm");
    bob.start_direct_message("alice".into()).expect("local dm");
    assert_eq!(alice.current_channel(), bob.current_channel());
}

#[test]
fn test_meta_never_surfaces() {
    let mut state = ChatState::new(None);
    feed(&mut state, json!({ "type": "joined_channel", "channel": "__meta__" }));
    feed(&mut state, chat_frame("__meta__", "bookkeeping"));

    let view = state.view();
    assert!(view.channels.iter().all(|c| !c.is_meta()));
    assert!(view.unread.keys().all(|c| !c.is_meta()));
    assert!(state.joined_channels().all(|c| !c.is_meta()));
}

#[test]
fn test_auto_connect_fires_once_per_connection() {
    let mut state = ChatState::new(Some("me".into()));
    go_online(&mut state);

    let first = feed(&mut state, peers_frame());
    let second = feed(&mut state, peers_frame());
    assert_eq!(sent(&first).len(), 2);
    assert!(sent(&second).is_empty());

    // A fresh connection re-arms it.
    state.set_status(ConnectionStatus::Closed);
    go_online(&mut state);
    let third = feed(&mut state, peers_frame());
    assert_eq!(sent(&third).len(), 2);
}

#[test]
fn test_garbage_frame_changes_nothing() {
    let mut state = ChatState::new(None);
    let before = state.view();
    assert!(decoder().decode("{{{").is_err());
    feed(&mut state, json!({ "type": "mystery", "x": 1 }));
    assert_eq!(state.view(), before);
}
