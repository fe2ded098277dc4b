//! P2pClient - the relay-mediated peer communication orchestrator
//!
//! Owns N relay replica connections, runs the channel-open discovery
//! handshake over them, and multiplexes encrypted application messages.
//! Messages are broadcast redundantly across `replication_count x
//! connections` paths; duplicate delivery is expected and must be tolerated
//! by the consumer, and there is no cross-path ordering guarantee.
//!
//! # Example
//!
//! ```ignore
//! use peerlink_core::{IdentityKeypair, P2pClient, P2pConfig};
//!
//! let keypair = IdentityKeypair::generate();
//! let client = P2pClient::new(P2pConfig::new("wallet", 2), keypair, connector)?;
//! client.start().await?;
//!
//! // Exchange handshake info out of band (e.g. a scannable code)
//! let info = client.handshake_info()?;
//!
//! client.listen_for_channel_opening(|payload| {
//!     // payload is the peer's sealed discovery message, already opened
//! });
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::crypto::payload;
use crate::crypto::session::{requester_keys, responder_keys};
use crate::error::{P2pError, P2pResult};
use crate::identity::address::{address_prefix, decode_public_key, recipient_string, short_hash};
use crate::identity::keypair::IdentityKeypair;
use crate::relay::connection::{is_channel_open_message, RelayConnection, CHANNEL_OPEN_PREFIX};
use crate::relay::protocol::RelayConnector;
use crate::relay::selector::select_relay;

/// Default relay candidate list for deployments that do not override it
pub const DEFAULT_RELAY_SERVERS: &[&str] = &["matrix.papers.tech"];

/// Configuration for a [`P2pClient`]
#[derive(Debug, Clone)]
pub struct P2pConfig {
    /// Display name advertised in the handshake info
    pub name: String,
    /// Static ordered relay candidate list; must be non-empty
    pub relay_servers: Vec<String>,
    /// Number of redundant relay replicas to maintain
    pub replication_count: u32,
}

impl P2pConfig {
    /// Create a configuration with the default relay candidate list
    pub fn new(name: impl Into<String>, replication_count: u32) -> Self {
        Self {
            name: name.into(),
            relay_servers: DEFAULT_RELAY_SERVERS.iter().map(|s| s.to_string()).collect(),
            replication_count,
        }
    }

    /// Override the relay candidate list.
    ///
    /// Order matters: selection tie-breaks resolve to the earlier entry.
    pub fn with_relay_servers(mut self, relay_servers: Vec<String>) -> Self {
        self.relay_servers = relay_servers;
        self
    }

    fn validate(&self) -> P2pResult<()> {
        if self.relay_servers.is_empty() {
            return Err(P2pError::Configuration(
                "relay candidate list must not be empty".to_string(),
            ));
        }
        if self.replication_count == 0 {
            return Err(P2pError::Configuration(
                "replication count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Out-of-band handshake payload exchanged before any relay traffic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandshakeInfo {
    pub name: String,
    /// Hex-encoded identity public key (32 bytes)
    pub pub_key: String,
    /// Advertised rendezvous relay for this identity
    pub relay_server: String,
}

/// Lifecycle states; `Stopped` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ClientState {
    Idle,
    Starting,
    Started,
    Stopped,
}

type Callback = Arc<dyn Fn(Vec<u8>) + Send + Sync>;

struct MessageListener {
    /// `"@" + short hash` of the sender's public key
    sender_prefix: String,
    /// Derived session receive key for this sender
    receive_key: [u8; 32],
    callback: Callback,
}

/// Per-instance listener registry.
///
/// Shared with every connection's event pump; protected by locks since any
/// replica may dispatch concurrently. Decryption failures and malformed
/// payloads are dropped per message and never unregister a listener.
pub(crate) struct ListenerRegistry {
    keypair: IdentityKeypair,
    self_public_key: [u8; 32],
    message_listeners: RwLock<HashMap<String, MessageListener>>,
    channel_open_listeners: RwLock<Vec<Callback>>,
}

impl ListenerRegistry {
    fn new(keypair: IdentityKeypair) -> Self {
        let self_public_key = keypair.public_key_bytes();
        Self {
            keypair,
            self_public_key,
            message_listeners: RwLock::new(HashMap::new()),
            channel_open_listeners: RwLock::new(Vec::new()),
        }
    }

    /// Register a per-sender listener. No-op if the sender is already
    /// registered.
    fn register_message_listener(
        &self,
        sender_public_key: &str,
        receive_key: [u8; 32],
        callback: Callback,
    ) {
        let mut listeners = self.message_listeners.write();
        if listeners.contains_key(sender_public_key) {
            debug!(sender = sender_public_key, "listener already registered, ignoring");
            return;
        }
        let sender_prefix = match decode_public_key(sender_public_key) {
            Ok(key) => address_prefix(&key),
            // Callers validate before registering; keep the map consistent anyway.
            Err(_) => return,
        };
        listeners.insert(
            sender_public_key.to_string(),
            MessageListener {
                sender_prefix,
                receive_key,
                callback,
            },
        );
    }

    fn contains_sender(&self, sender_public_key: &str) -> bool {
        self.message_listeners.read().contains_key(sender_public_key)
    }

    fn add_channel_open_listener(&self, callback: Callback) {
        self.channel_open_listeners.write().push(callback);
    }

    fn remove_message_listener(&self, sender_public_key: &str) {
        self.message_listeners.write().remove(sender_public_key);
    }

    fn clear_message_listeners(&self) {
        self.message_listeners.write().clear();
    }

    fn clear_all(&self) {
        self.message_listeners.write().clear();
        self.channel_open_listeners.write().clear();
    }

    /// Dispatch one inbound text message from any replica.
    ///
    /// Never returns an error: anything that does not match a listener, does
    /// not decode, or does not decrypt is dropped as noise.
    pub(crate) fn dispatch(&self, sender: &str, text: &str) {
        if is_channel_open_message(text, &self.self_public_key) {
            self.dispatch_channel_open(text);
        }
        self.dispatch_to_message_listeners(sender, text);
    }

    fn dispatch_channel_open(&self, text: &str) {
        // The sealed payload is the last colon-separated segment.
        let payload_hex = match text.rsplit(':').next() {
            Some(segment) => segment,
            None => return,
        };
        let payload = match hex::decode(payload_hex) {
            Ok(bytes) => bytes,
            Err(_) => return,
        };
        if payload.len() < payload::MIN_PAYLOAD_SIZE {
            return;
        }

        match payload::open(&payload, &self.keypair) {
            Ok(plaintext) => {
                debug!("channel-open message received");
                // Snapshot the callbacks so one of them can re-register
                // without deadlocking on the listener lock.
                let callbacks: Vec<Callback> =
                    self.channel_open_listeners.read().iter().cloned().collect();
                for callback in callbacks {
                    callback(plaintext.clone());
                }
            }
            Err(e) => debug!(error = %e, "dropping undecryptable channel-open payload"),
        }
    }

    fn dispatch_to_message_listeners(&self, sender: &str, text: &str) {
        let matching: Vec<([u8; 32], Callback)> = self
            .message_listeners
            .read()
            .values()
            .filter(|listener| sender.starts_with(&listener.sender_prefix))
            .map(|listener| (listener.receive_key, listener.callback.clone()))
            .collect();

        for (receive_key, callback) in matching {
            let payload = match hex::decode(text) {
                Ok(bytes) => bytes,
                Err(_) => continue,
            };
            if payload.len() < payload::MIN_PAYLOAD_SIZE {
                // Non-matching noise, not an error
                continue;
            }
            match payload::decrypt(&receive_key, &payload) {
                Ok(plaintext) => callback(plaintext),
                Err(e) => debug!(sender, error = %e, "dropping undecryptable message"),
            }
        }
    }
}

/// Top-level orchestrator for relay-mediated encrypted peer channels
pub struct P2pClient {
    config: P2pConfig,
    keypair: IdentityKeypair,
    connector: Arc<dyn RelayConnector>,
    registry: Arc<ListenerRegistry>,
    connections: tokio::sync::RwLock<Vec<RelayConnection>>,
    state: Mutex<ClientState>,
}

impl P2pClient {
    /// Create a client.
    ///
    /// The identity keypair is owned by the caller conceptually: it must be
    /// created before the client and outlives its usefulness; this crate
    /// never persists it.
    ///
    /// # Errors
    ///
    /// Returns `P2pError::Configuration` for an empty relay list or zero
    /// replication count.
    pub fn new(
        config: P2pConfig,
        keypair: IdentityKeypair,
        connector: Arc<dyn RelayConnector>,
    ) -> P2pResult<Self> {
        config.validate()?;
        let registry = Arc::new(ListenerRegistry::new(keypair.clone()));
        Ok(Self {
            config,
            keypair,
            connector,
            registry,
            connections: tokio::sync::RwLock::new(Vec::new()),
            state: Mutex::new(ClientState::Idle),
        })
    }

    /// Hex-encoded identity public key
    pub fn public_key_hex(&self) -> String {
        self.keypair.public_key_hex()
    }

    /// Short identity hash used for addressing and relay selection
    pub fn public_key_hash(&self) -> String {
        short_hash(&self.keypair.public_key_bytes())
    }

    /// Resolve the relay for a target identity hash and replica nonce
    fn relay_for(&self, target_hash: &str, nonce: &str) -> P2pResult<String> {
        select_relay(target_hash, nonce, &self.config.relay_servers).map(str::to_string)
    }

    /// The handshake payload to exchange out of band.
    ///
    /// The advertised relay is the nonce-less selection for our own identity
    /// hash, which the peer uses as the rendezvous point for the discovery
    /// handshake.
    pub fn handshake_info(&self) -> P2pResult<HandshakeInfo> {
        Ok(HandshakeInfo {
            name: self.config.name.clone(),
            pub_key: self.public_key_hex(),
            relay_server: self.relay_for(&self.public_key_hash(), "")?,
        })
    }

    /// Open one relay connection per replica index and log in.
    ///
    /// Replicas are attempted in sequence; the call resolves only once all
    /// logins completed, and the first login failure aborts the whole
    /// startup (no partial-success state). On failure the client returns to
    /// idle and already-established replicas are torn down.
    pub async fn start(&self) -> P2pResult<()> {
        {
            let mut state = self.state.lock();
            match *state {
                ClientState::Idle => *state = ClientState::Starting,
                other => {
                    return Err(P2pError::InvalidState(format!(
                        "start() called in state {:?}",
                        other
                    )))
                }
            }
        }

        info!(
            name = %self.config.name,
            replication = self.config.replication_count,
            "starting p2p client"
        );

        let self_hash = self.public_key_hash();
        let mut established = Vec::new();

        for index in 0..self.config.replication_count {
            let result = async {
                let relay = self.relay_for(&self_hash, &index.to_string())?;
                debug!(replica = index, relay = %relay, user = %self_hash, "logging in");
                RelayConnection::establish(
                    relay,
                    self.connector.as_ref(),
                    &self.keypair,
                    self.registry.clone(),
                )
                .await
            }
            .await;

            match result {
                Ok(connection) => established.push(connection),
                Err(e) => {
                    warn!(replica = index, error = %e, "startup aborted");
                    for connection in &established {
                        connection.shutdown();
                    }
                    *self.state.lock() = ClientState::Idle;
                    return Err(e);
                }
            }
        }

        *self.connections.write().await = established;
        *self.state.lock() = ClientState::Started;
        info!(connections = self.config.replication_count, "p2p client started");
        Ok(())
    }

    fn ensure_started(&self) -> P2pResult<()> {
        match *self.state.lock() {
            ClientState::Started => Ok(()),
            other => Err(P2pError::InvalidState(format!(
                "client is not started (state {:?})",
                other
            ))),
        }
    }

    /// Send the channel-open discovery message to a peer.
    ///
    /// The peer's public key and relay come from the out-of-band handshake.
    /// The payload is seal-encrypted (not session-keyed) because session
    /// keys are not mutually established yet; it bootstraps discovery by
    /// carrying our public key to the peer.
    ///
    /// Best-effort across connections: a failure on one connection does not
    /// roll back sends already issued on others. An error is returned only
    /// if no connection succeeded.
    pub async fn open_channel(
        &self,
        peer_public_key: &str,
        peer_relay_server: &str,
    ) -> P2pResult<()> {
        self.ensure_started()?;
        let peer_key = decode_public_key(peer_public_key)?;
        let recipient = recipient_string(&short_hash(&peer_key), peer_relay_server);

        let connections = self.connections.read().await;
        info!(recipient = %recipient, connections = connections.len(), "opening channel");

        let mut delivered = 0usize;
        let mut last_error = None;
        for connection in connections.iter() {
            let result = async {
                let room = connection.find_or_create_room(&recipient).await?;
                let sealed = payload::seal(self.public_key_hex().as_bytes(), &peer_key)?;
                let text = format!("{}:{}:{}", CHANNEL_OPEN_PREFIX, recipient, sealed);
                connection.send_text(&room, &text).await
            }
            .await;

            match result {
                Ok(_) => delivered += 1,
                Err(e) => {
                    warn!(relay = %connection.relay_server(), error = %e, "channel-open send failed");
                    last_error = Some(e);
                }
            }
        }

        match (delivered, last_error) {
            (0, Some(e)) => Err(e),
            _ => Ok(()),
        }
    }

    /// Listen for channel-open messages addressed to us.
    ///
    /// The callback receives the opened seal payload (the peer's handshake
    /// bytes). No deduplication is performed: repeated opens from the same
    /// peer invoke the callback repeatedly.
    pub fn listen_for_channel_opening(&self, callback: impl Fn(Vec<u8>) + Send + Sync + 'static) {
        debug!("registering channel-open listener");
        self.registry.add_channel_open_listener(Arc::new(callback));
    }

    /// Listen for encrypted messages from a specific sender.
    ///
    /// Derives the session receive key for the sender and registers at most
    /// one listener per sender: a second registration for an
    /// already-registered sender is a silent no-op and keeps the original
    /// key and callback. Callers that need a key rotation must unsubscribe
    /// first.
    ///
    /// Inbound payloads that are too short are dropped as non-matching
    /// noise; undecryptable ones are dropped without unregistering.
    pub fn listen_for_encrypted_message(
        &self,
        sender_public_key: &str,
        callback: impl Fn(Vec<u8>) + Send + Sync + 'static,
    ) -> P2pResult<()> {
        if self.registry.contains_sender(sender_public_key) {
            return Ok(());
        }
        let keys = responder_keys(&self.keypair, sender_public_key)?;
        debug!(sender = sender_public_key, "registering message listener");
        self.registry
            .register_message_listener(sender_public_key, keys.receive, Arc::new(callback));
        Ok(())
    }

    /// Encrypt and broadcast a message to a peer.
    ///
    /// For every replica index the peer's relay is re-selected and the
    /// message sent on every active connection, so the peer sees up to
    /// `replication_count x connections` copies; consumers must tolerate
    /// duplicates. Encryption is fresh per path (distinct nonces).
    ///
    /// Best-effort: per-path failures are logged and skipped; an error is
    /// returned only if no path succeeded.
    pub async fn send_message(&self, peer_public_key: &str, message: &[u8]) -> P2pResult<()> {
        self.ensure_started()?;
        let keys = requester_keys(&self.keypair, peer_public_key)?;
        let peer_key = decode_public_key(peer_public_key)?;
        let peer_hash = short_hash(&peer_key);

        let connections = self.connections.read().await;
        let mut delivered = 0usize;
        let mut last_error = None;

        for index in 0..self.config.replication_count {
            let relay = self.relay_for(&peer_hash, &index.to_string())?;
            let recipient = recipient_string(&peer_hash, &relay);

            for connection in connections.iter() {
                let result = async {
                    let room = connection.find_or_create_room(&recipient).await?;
                    let ciphertext = payload::encrypt(&keys.send, message)?;
                    connection.send_text(&room, &ciphertext).await
                }
                .await;

                match result {
                    Ok(_) => delivered += 1,
                    Err(e) => {
                        warn!(
                            relay = %connection.relay_server(),
                            recipient = %recipient,
                            error = %e,
                            "send failed on one path"
                        );
                        last_error = Some(e);
                    }
                }
            }
        }

        debug!(recipient = %peer_hash, delivered, "message broadcast complete");
        match (delivered, last_error) {
            (0, Some(e)) => Err(e),
            _ => Ok(()),
        }
    }

    /// Remove the listener registration for one sender, if any
    pub fn unsubscribe_from_encrypted_message(&self, sender_public_key: &str) {
        self.registry.remove_message_listener(sender_public_key);
    }

    /// Remove all per-sender listener registrations
    pub fn unsubscribe_from_encrypted_messages(&self) {
        self.registry.clear_message_listeners();
    }

    /// Release all connections and listeners. Terminal: a stopped client
    /// cannot be restarted.
    pub async fn stop(&self) {
        *self.state.lock() = ClientState::Stopped;
        let mut connections = self.connections.write().await;
        for connection in connections.iter() {
            connection.shutdown();
        }
        connections.clear();
        self.registry.clear_all();
        info!("p2p client stopped");
    }
}
