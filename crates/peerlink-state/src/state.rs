//! The chat state and its transition functions.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use peerlink_protocol::{ChannelId, ChatMessage, Command, InboundEvent, PeerId, PeerInfo};
use peerlink_transport::ConnectionStatus;

use crate::{ChatView, CommandRejected, Effect, Notice, dm_channel};

/// Client-side chat state, rebuilt purely from inbound events and local
/// user actions.
///
/// Every mutating method returns the [`Effect`]s the caller must carry
/// out. Nothing here does I/O.
///
/// # Read markers
///
/// After every mutation the active channel's read marker is set to its
/// history length. Since histories only grow (until
/// [`clear_messages`](Self::clear_messages) resets both), markers never
/// decrease. Unread counts are derived on read, never cached.
#[derive(Debug, Clone)]
pub struct ChatState {
    me: PeerId,
    status: ConnectionStatus,
    peers: BTreeMap<PeerId, PeerInfo>,
    connections: BTreeSet<PeerId>,
    /// Insertion-ordered set. May contain the reserved channel.
    joined: Vec<ChannelId>,
    current: ChannelId,
    messages: HashMap<ChannelId, Vec<ChatMessage>>,
    read: HashMap<ChannelId, usize>,
    /// Set by the first `peers` event after a fresh connection.
    auto_connected: bool,
}

impl ChatState {
    /// Creates a state joined to and viewing `"general"`.
    ///
    /// `me` is the identity handed over by the authentication exchange;
    /// `None` starts with the `"unknown"` sentinel until the relay
    /// assigns one.
    pub fn new(me: Option<PeerId>) -> Self {
        Self::with_default_channel(me, ChannelId::general())
    }

    /// Creates a state joined to and viewing `default_channel`.
    pub fn with_default_channel(me: Option<PeerId>, default_channel: ChannelId) -> Self {
        Self {
            me: me.unwrap_or_else(PeerId::unknown),
            status: ConnectionStatus::Idle,
            peers: BTreeMap::new(),
            connections: BTreeSet::new(),
            joined: vec![default_channel.clone()],
            current: default_channel,
            messages: HashMap::new(),
            read: HashMap::new(),
            auto_connected: false,
        }
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Folds one classified inbound event into the state.
    pub fn apply(&mut self, event: InboundEvent) -> Vec<Effect> {
        tracing::debug!(kind = event.kind(), "applying event");

        let effects = match event {
            InboundEvent::Connected { peer_id } => {
                self.adopt_identity(peer_id);
                Vec::new()
            }
            InboundEvent::Peers(peers) => self.replace_peers(peers),
            InboundEvent::Chat(message) => {
                self.append(message);
                Vec::new()
            }
            InboundEvent::JoinedChannel(channel) => {
                if channel.is_meta() {
                    tracing::debug!("ignoring join of reserved channel");
                } else {
                    self.join_local(channel);
                }
                Vec::new()
            }
            InboundEvent::PeerConnected(peer) => {
                self.connections.insert(peer);
                Vec::new()
            }
            InboundEvent::PeerDisconnected(peer) => {
                self.connections.remove(&peer);
                Vec::new()
            }
            InboundEvent::ConnectResult { ok: true, .. } => Vec::new(),
            InboundEvent::ConnectResult { ok: false, info } => {
                tracing::warn!(%info, "relay rejected peer connect");
                vec![Effect::Notice(Notice::ConnectFailed { info })]
            }
            InboundEvent::Unrecognized { kind } => {
                tracing::debug!(?kind, "ignoring unrecognized event");
                Vec::new()
            }
        };

        self.mark_current_read();
        effects
    }

    /// Records a transport status transition.
    ///
    /// Reaching `Connected` re-arms the auto-connect latch and asks the
    /// relay for the current peer list.
    pub fn set_status(&mut self, status: ConnectionStatus) -> Vec<Effect> {
        if status == self.status {
            return Vec::new();
        }
        self.status = status;

        let mut effects = vec![Effect::Notice(Notice::StatusChanged(status))];
        if status.is_connected() {
            self.auto_connected = false;
            effects.push(Effect::Send(Command::ListPeers));
        }
        effects
    }

    fn adopt_identity(&mut self, peer_id: Option<PeerId>) {
        match peer_id {
            Some(id) if self.me.is_unknown() => {
                tracing::info!(peer_id = %id, "identity assigned by relay");
                self.me = id;
            }
            Some(id) if id != self.me => {
                tracing::debug!(peer_id = %id, me = %self.me, "keeping existing identity");
            }
            _ => {}
        }
    }

    fn replace_peers(&mut self, peers: BTreeMap<PeerId, PeerInfo>) -> Vec<Effect> {
        self.peers = peers;

        if self.auto_connected || !self.status.is_connected() {
            return Vec::new();
        }
        self.auto_connected = true;
        tracing::info!(count = self.peers.len(), "auto-connecting to known peers");
        self.connect_commands()
    }

    fn append(&mut self, message: ChatMessage) {
        self.join_local(message.channel.clone());
        self.messages
            .entry(message.channel.clone())
            .or_default()
            .push(message);
    }

    // -----------------------------------------------------------------------
    // Local commands
    // -----------------------------------------------------------------------

    /// Asks the relay for the peer list.
    pub fn list_peers(&self) -> Result<Vec<Effect>, CommandRejected> {
        self.require_connected()?;
        Ok(vec![Effect::Send(Command::ListPeers)])
    }

    /// Asks the relay for membership of `channel`. The local joined set
    /// changes only once the relay answers with `joined_channel`.
    pub fn join(&self, channel: ChannelId) -> Result<Vec<Effect>, CommandRejected> {
        check_channel(&channel)?;
        self.require_connected()?;
        Ok(vec![Effect::Send(Command::Join { channel })])
    }

    /// Makes `channel` the active channel, which clears its unread count,
    /// and requests membership when connected.
    pub fn select_channel(&mut self, channel: ChannelId) -> Result<Vec<Effect>, CommandRejected> {
        check_channel(&channel)?;
        self.current = channel.clone();
        self.mark_current_read();

        if self.status.is_connected() {
            Ok(vec![Effect::Send(Command::Join { channel })])
        } else {
            Ok(Vec::new())
        }
    }

    /// Joins and activates `channel` immediately, then asks the relay to
    /// create it if connected. The local join is optimistic and is not
    /// undone if the relay never acknowledges.
    pub fn create_room(
        &mut self,
        channel: ChannelId,
        to_peer: Option<PeerId>,
    ) -> Result<Vec<Effect>, CommandRejected> {
        check_channel(&channel)?;
        self.join_local(channel.clone());
        self.current = channel.clone();
        self.mark_current_read();

        if self.status.is_connected() {
            Ok(vec![Effect::Send(Command::CreateRoom { channel, to_peer })])
        } else {
            tracing::debug!(%channel, "room created locally only, not connected");
            Ok(Vec::new())
        }
    }

    /// Asks the relay to link us with `peer_id`.
    pub fn connect_peer(&self, peer_id: PeerId) -> Result<Vec<Effect>, CommandRejected> {
        check_peer(&peer_id)?;
        self.require_connected()?;
        Ok(vec![Effect::Send(Command::Connect { peer_id })])
    }

    /// Sends `connect` for every known peer, whatever the auto-connect
    /// latch says.
    pub fn connect_all_known_peers(&self) -> Result<Vec<Effect>, CommandRejected> {
        self.require_connected()?;
        Ok(self.connect_commands())
    }

    /// Publishes `text` on `channel`.
    pub fn broadcast(&self, channel: ChannelId, text: String) -> Result<Vec<Effect>, CommandRejected> {
        if text.trim().is_empty() {
            return Err(CommandRejected::EmptyText);
        }
        check_channel(&channel)?;
        self.require_connected()?;
        Ok(vec![Effect::Send(Command::Broadcast { channel, text })])
    }

    /// Publishes `text` on the active channel.
    pub fn send_message(&self, text: String) -> Result<Vec<Effect>, CommandRejected> {
        self.broadcast(self.current.clone(), text)
    }

    /// Opens the direct-message channel shared with `peer_id`.
    ///
    /// Both sides derive the same channel name, so whoever starts first,
    /// both end up in one room. When connected this also sends a
    /// `connect` and a peer-scoped `create_room`.
    pub fn start_direct_message(&mut self, peer_id: PeerId) -> Result<Vec<Effect>, CommandRejected> {
        check_peer(&peer_id)?;
        let channel = dm_channel(&self.me, &peer_id);
        self.join_local(channel.clone());
        self.current = channel.clone();
        self.mark_current_read();

        if !self.status.is_connected() {
            return Ok(Vec::new());
        }
        Ok(vec![
            Effect::Send(Command::Connect {
                peer_id: peer_id.clone(),
            }),
            Effect::Send(Command::CreateRoom {
                channel,
                to_peer: Some(peer_id),
            }),
        ])
    }

    /// Wipes every channel's history and read marker. Joined channels and
    /// peers are kept.
    pub fn clear_messages(&mut self) {
        self.messages.clear();
        self.read.clear();
        self.mark_current_read();
    }

    fn require_connected(&self) -> Result<(), CommandRejected> {
        if self.status.is_connected() {
            Ok(())
        } else {
            Err(CommandRejected::NotConnected(self.status))
        }
    }

    fn connect_commands(&self) -> Vec<Effect> {
        self.peers
            .keys()
            .map(|peer_id| {
                Effect::Send(Command::Connect {
                    peer_id: peer_id.clone(),
                })
            })
            .collect()
    }

    fn join_local(&mut self, channel: ChannelId) {
        if !self.joined.contains(&channel) {
            tracing::debug!(%channel, "joined channel");
            self.joined.push(channel);
        }
    }

    fn mark_current_read(&mut self) {
        let total = self.messages.get(&self.current).map_or(0, Vec::len);
        self.read.insert(self.current.clone(), total);
    }

    // -----------------------------------------------------------------------
    // Projections
    // -----------------------------------------------------------------------

    pub fn me(&self) -> &PeerId {
        &self.me
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn peers(&self) -> &BTreeMap<PeerId, PeerInfo> {
        &self.peers
    }

    pub fn connections(&self) -> &BTreeSet<PeerId> {
        &self.connections
    }

    pub fn current_channel(&self) -> &ChannelId {
        &self.current
    }

    /// Whether the auto-connect for the current connection already ran.
    pub fn auto_connected(&self) -> bool {
        self.auto_connected
    }

    /// Joined channels in join order, without the reserved channel.
    pub fn joined_channels(&self) -> impl Iterator<Item = &ChannelId> {
        self.joined.iter().filter(|c| !c.is_meta())
    }

    /// Raw membership test. Unlike [`joined_channels`](Self::joined_channels)
    /// this does see the reserved channel.
    pub fn is_joined(&self, channel: &ChannelId) -> bool {
        self.joined.contains(channel)
    }

    /// History of `channel` in arrival order.
    pub fn messages(&self, channel: &ChannelId) -> &[ChatMessage] {
        self.messages
            .get(channel)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn read_marker(&self, channel: &ChannelId) -> usize {
        self.read.get(channel).copied().unwrap_or(0)
    }

    pub fn unread_count(&self, channel: &ChannelId) -> usize {
        self.messages(channel)
            .len()
            .saturating_sub(self.read_marker(channel))
    }

    /// Unread counts for every visible channel that has messages or is
    /// joined.
    pub fn unread_counts(&self) -> BTreeMap<ChannelId, usize> {
        let mut counts: BTreeMap<ChannelId, usize> = self
            .messages
            .keys()
            .filter(|c| !c.is_meta())
            .map(|c| (c.clone(), self.unread_count(c)))
            .collect();
        for channel in self.joined_channels() {
            counts.entry(channel.clone()).or_insert(0);
        }
        counts
    }

    /// Snapshot for the presentation layer.
    pub fn view(&self) -> ChatView {
        ChatView {
            me: self.me.clone(),
            status: self.status,
            peers: self.peers.clone(),
            connections: self.connections.clone(),
            channels: self.joined_channels().cloned().collect(),
            current: self.current.clone(),
            messages: self.messages(&self.current).to_vec(),
            unread: self.unread_counts(),
        }
    }
}

fn check_channel(channel: &ChannelId) -> Result<(), CommandRejected> {
    if channel.as_str().is_empty() {
        Err(CommandRejected::EmptyChannel)
    } else if channel.is_meta() {
        Err(CommandRejected::ReservedChannel(channel.clone()))
    } else {
        Ok(())
    }
}

fn check_peer(peer_id: &PeerId) -> Result<(), CommandRejected> {
    if peer_id.as_str().is_empty() {
        Err(CommandRejected::EmptyPeer)
    } else {
        Ok(())
    }
}
