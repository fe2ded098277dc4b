//! External pub/sub relay protocol contract
//!
//! The relay server's own wire protocol (login, room membership, event sync)
//! is out of scope; this module defines exactly the operations the core
//! consumes from it, as an object-safe async trait. Implementations wrap a
//! concrete protocol client; tests use an in-memory hub.
//!
//! Inbound state events arrive as tagged [`RelayEvent`] variants over a
//! broadcast channel, so classification is plain pattern matching.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::P2pResult;
use crate::identity::address::{blake2b_digest, short_hash};
use crate::identity::keypair::IdentityKeypair;

/// Opaque room identifier assigned by the relay
pub type RoomId = String;

/// Opaque event identifier assigned by the relay
pub type EventId = String;

/// Width of the login-bucket window in seconds.
///
/// Signing `floor(now / 300)` instead of `now` tolerates clock drift between
/// client and relay without re-deriving credentials on every call.
const LOGIN_BUCKET_SECONDS: u64 = 300;

/// Credentials for one relay login session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginCredentials {
    /// Short identity hash, hex
    pub user_id: String,
    /// `"ed:" + hex(signature) + ":" + hex(public_key)`
    pub password: String,
    /// Hex public key
    pub device_id: String,
}

/// A room as seen by one logged-in session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomHandle {
    pub id: RoomId,
    /// Member addresses, invited members included
    pub members: Vec<String>,
}

/// Inbound relay state events, already classified by kind
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// We were invited to a room
    Invite { room_id: RoomId },
    /// A member joined a room we are in
    Joined { room_id: RoomId, member: String },
    /// A room we are in was created
    RoomCreated { room_id: RoomId },
    /// A text message in a room we are in
    Message {
        room_id: RoomId,
        sender: String,
        text: String,
    },
}

/// One logged-in session against a single relay server.
///
/// All operations the core consumes from the external pub/sub protocol.
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Authenticate this session
    async fn login(&self, credentials: LoginCredentials) -> P2pResult<()>;

    /// Create a room and invite the given recipient address
    async fn create_room(&self, invitee: &str) -> P2pResult<RoomId>;

    /// Join a room we were invited to (or just created)
    async fn join_room(&self, room_id: &str) -> P2pResult<()>;

    /// Send a text message into a room
    async fn send_text(&self, room_id: &str, text: &str) -> P2pResult<EventId>;

    /// Rooms this session has joined, with member-address lists
    async fn joined_rooms(&self) -> P2pResult<Vec<RoomHandle>>;

    /// Rooms this session has a pending invite for
    async fn invited_rooms(&self) -> P2pResult<Vec<RoomId>>;

    /// Subscribe to inbound state events.
    ///
    /// Each call returns an independent receiver; events published after the
    /// call are delivered to it.
    fn events(&self) -> broadcast::Receiver<RelayEvent>;
}

/// Factory for relay sessions, one per (replica, relay host).
///
/// This is the seam between the core and a concrete protocol
/// implementation.
#[async_trait]
pub trait RelayConnector: Send + Sync {
    async fn connect(&self, relay_server: &str) -> P2pResult<Arc<dyn RelayClient>>;
}

/// Derive login credentials for a relay session at the given Unix time.
///
/// The password proves control of the identity key: an Ed25519 signature
/// over `blake2b256("login:" + floor(now / 300))`.
pub fn login_credentials(keypair: &IdentityKeypair, unix_seconds: u64) -> LoginCredentials {
    let bucket = unix_seconds / LOGIN_BUCKET_SECONDS;
    let digest = blake2b_digest(format!("login:{}", bucket).as_bytes(), 32);
    let signature = keypair.sign(&digest);

    LoginCredentials {
        user_id: short_hash(&keypair.public_key_bytes()),
        password: format!(
            "ed:{}:{}",
            hex::encode(signature.to_bytes()),
            keypair.public_key_hex()
        ),
        device_id: keypair.public_key_hex(),
    }
}

/// Current Unix time in seconds
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
