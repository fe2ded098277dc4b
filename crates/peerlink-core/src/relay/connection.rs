//! One logged-in relay replica session
//!
//! Wraps a [`RelayClient`] with the core-owned logic: login, invite
//! auto-join, find-or-create room routing for a recipient address, and the
//! event pump task that feeds inbound messages through the listener
//! registry.
//!
//! A malformed or undecryptable inbound message is isolated to that single
//! message: the pump logs and moves on, listeners stay registered, and
//! sibling connections are untouched.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::ListenerRegistry;
use crate::error::{P2pError, P2pResult};
use crate::identity::address::short_hash;
use crate::identity::keypair::IdentityKeypair;
use crate::relay::protocol::{
    login_credentials, unix_now, RelayClient, RelayConnector, RelayEvent, RoomId,
};

/// Control-message prefix announcing a channel opening
pub const CHANNEL_OPEN_PREFIX: &str = "@channel-open";

/// Whether a text message is a channel-open control message addressed to the
/// given identity public key.
pub fn is_channel_open_message(text: &str, self_public_key: &[u8; 32]) -> bool {
    text.starts_with(&format!(
        "{}:@{}",
        CHANNEL_OPEN_PREFIX,
        short_hash(self_public_key)
    ))
}

/// One relay replica: a logged-in session bound to a selected relay host
pub struct RelayConnection {
    relay_server: String,
    client: Arc<dyn RelayClient>,
    pump: JoinHandle<()>,
}

impl RelayConnection {
    /// Connect, log in, join pending invites, and start the event pump.
    ///
    /// The event receiver is subscribed before login so invites arriving
    /// during startup are not lost; the pump drains it once spawned. The
    /// pump is spawned last: any failure here returns with no background
    /// task left behind.
    ///
    /// # Errors
    ///
    /// Returns `P2pError::RelayLoginFailed` if the login is rejected; other
    /// relay errors pass through unchanged.
    pub async fn establish(
        relay_server: String,
        connector: &dyn RelayConnector,
        keypair: &IdentityKeypair,
        registry: Arc<ListenerRegistry>,
    ) -> P2pResult<Self> {
        let client = connector.connect(&relay_server).await?;
        let events = client.events();

        client
            .login(login_credentials(keypair, unix_now()))
            .await
            .map_err(|e| P2pError::RelayLoginFailed(format!("{}: {}", relay_server, e)))?;

        for room_id in client.invited_rooms().await? {
            client.join_room(&room_id).await?;
        }

        let pump = tokio::spawn(run_event_pump(
            client.clone(),
            relay_server.clone(),
            events,
            registry,
        ));

        Ok(Self {
            relay_server,
            client,
            pump,
        })
    }

    /// The relay host this replica is bound to
    pub fn relay_server(&self) -> &str {
        &self.relay_server
    }

    /// Find the room already containing the recipient address, or create and
    /// join one.
    ///
    /// A room is reused whenever its member set (invited members included)
    /// contains the recipient, so repeated sends to the same peer share one
    /// room per connection.
    pub async fn find_or_create_room(&self, recipient: &str) -> P2pResult<RoomId> {
        let rooms = self.client.joined_rooms().await?;
        if let Some(room) = rooms
            .iter()
            .find(|room| room.members.iter().any(|member| member == recipient))
        {
            debug!(room = %room.id, recipient, "reusing existing room");
            return Ok(room.id.clone());
        }

        debug!(recipient, relay = %self.relay_server, "no relevant room, creating one");
        let room_id = self.client.create_room(recipient).await?;
        self.client.join_room(&room_id).await?;
        Ok(room_id)
    }

    /// Send a text message into a room on this replica
    pub async fn send_text(&self, room_id: &str, text: &str) -> P2pResult<String> {
        self.client.send_text(room_id, text).await
    }

    /// Stop the event pump. The underlying session is dropped with `self`.
    pub fn shutdown(&self) {
        self.pump.abort();
    }
}

impl Drop for RelayConnection {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

async fn run_event_pump(
    client: Arc<dyn RelayClient>,
    relay_server: String,
    mut events: broadcast::Receiver<RelayEvent>,
    registry: Arc<ListenerRegistry>,
) {
    loop {
        match events.recv().await {
            Ok(RelayEvent::Invite { room_id }) => {
                debug!(relay = %relay_server, room = %room_id, "auto-joining invited room");
                if let Err(e) = client.join_room(&room_id).await {
                    warn!(relay = %relay_server, room = %room_id, error = %e, "failed to join invited room");
                }
            }
            Ok(RelayEvent::Message { sender, text, .. }) => {
                // Dispatch failures are contained per message inside the registry.
                registry.dispatch(&sender, &text);
            }
            Ok(RelayEvent::Joined { .. }) | Ok(RelayEvent::RoomCreated { .. }) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(relay = %relay_server, skipped, "event stream lagged, messages dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    debug!(relay = %relay_server, "event pump stopped");
}
