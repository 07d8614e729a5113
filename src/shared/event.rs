/**
 * Realtime Event Envelope
 *
 * This module defines the typed envelope that every realtime frame travels in,
 * in both directions, plus the small payload structs the hub itself produces.
 *
 * # Wire Format
 *
 * ```json
 * {"type": "message.new", "channel_id": "<uuid>", "payload": { ... }}
 * ```
 *
 * `channel_id` is omitted for events that are not channel-scoped (presence,
 * signaling). The payload is kept as raw JSON: the component that produces an
 * event serializes its domain object once, and the hub routes the envelope by
 * `type` and `channel_id` without ever looking inside it.
 */
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::value::RawValue;
use std::fmt;
use uuid::Uuid;

/// Type of realtime event
///
/// Known types map to their dot-namespaced wire name. Anything else
/// round-trips through `Custom` so new namespaces do not break decoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EventType {
    MessageNew,
    MessageUpdated,
    MessageDeleted,
    ReactionAdded,
    ReactionRemoved,
    Typing,
    PresenceUpdate,
    ChannelCreated,
    ChannelUpdated,
    ChannelDeleted,
    MemberJoined,
    MemberLeft,
    DmCreated,
    MentionNew,
    CallInitiate,
    CallRinging,
    CallAccept,
    CallAccepted,
    CallDecline,
    CallDeclined,
    CallOffer,
    CallAnswer,
    CallIceCandidate,
    CallHangup,
    CallEnded,
    CallMissed,
    /// Event type outside the built-in catalog
    Custom(String),
}

impl EventType {
    /// Wire name of this event type
    pub fn as_str(&self) -> &str {
        match self {
            Self::MessageNew => "message.new",
            Self::MessageUpdated => "message.updated",
            Self::MessageDeleted => "message.deleted",
            Self::ReactionAdded => "reaction.added",
            Self::ReactionRemoved => "reaction.removed",
            Self::Typing => "typing",
            Self::PresenceUpdate => "presence.update",
            Self::ChannelCreated => "channel.created",
            Self::ChannelUpdated => "channel.updated",
            Self::ChannelDeleted => "channel.deleted",
            Self::MemberJoined => "member.joined",
            Self::MemberLeft => "member.left",
            Self::DmCreated => "dm.created",
            Self::MentionNew => "mention.new",
            Self::CallInitiate => "call.initiate",
            Self::CallRinging => "call.ringing",
            Self::CallAccept => "call.accept",
            Self::CallAccepted => "call.accepted",
            Self::CallDecline => "call.decline",
            Self::CallDeclined => "call.declined",
            Self::CallOffer => "call.offer",
            Self::CallAnswer => "call.answer",
            Self::CallIceCandidate => "call.ice_candidate",
            Self::CallHangup => "call.hangup",
            Self::CallEnded => "call.ended",
            Self::CallMissed => "call.missed",
            Self::Custom(name) => name.as_str(),
        }
    }

    /// Whether this is one of the client-originated call events the
    /// coordinator consumes (lifecycle requests and signaling relay).
    pub fn is_call_request(&self) -> bool {
        matches!(
            self,
            Self::CallInitiate
                | Self::CallAccept
                | Self::CallDecline
                | Self::CallOffer
                | Self::CallAnswer
                | Self::CallIceCandidate
                | Self::CallHangup
        )
    }

    /// Whether this is an SDP/ICE signaling event relayed point-to-point
    pub fn is_signaling(&self) -> bool {
        matches!(self, Self::CallOffer | Self::CallAnswer | Self::CallIceCandidate)
    }
}

impl From<String> for EventType {
    fn from(name: String) -> Self {
        match name.as_str() {
            "message.new" => Self::MessageNew,
            "message.updated" => Self::MessageUpdated,
            "message.deleted" => Self::MessageDeleted,
            "reaction.added" => Self::ReactionAdded,
            "reaction.removed" => Self::ReactionRemoved,
            "typing" => Self::Typing,
            "presence.update" => Self::PresenceUpdate,
            "channel.created" => Self::ChannelCreated,
            "channel.updated" => Self::ChannelUpdated,
            "channel.deleted" => Self::ChannelDeleted,
            "member.joined" => Self::MemberJoined,
            "member.left" => Self::MemberLeft,
            "dm.created" => Self::DmCreated,
            "mention.new" => Self::MentionNew,
            "call.initiate" => Self::CallInitiate,
            "call.ringing" => Self::CallRinging,
            "call.accept" => Self::CallAccept,
            "call.accepted" => Self::CallAccepted,
            "call.decline" => Self::CallDecline,
            "call.declined" => Self::CallDeclined,
            "call.offer" => Self::CallOffer,
            "call.answer" => Self::CallAnswer,
            "call.ice_candidate" => Self::CallIceCandidate,
            "call.hangup" => Self::CallHangup,
            "call.ended" => Self::CallEnded,
            "call.missed" => Self::CallMissed,
            _ => Self::Custom(name),
        }
    }
}

impl From<&str> for EventType {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<EventType> for String {
    fn from(event_type: EventType) -> Self {
        match event_type {
            EventType::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Realtime event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Dot-namespaced event type
    #[serde(rename = "type")]
    pub event_type: EventType,
    /// Channel this event is scoped to, if any
    ///
    /// A value that is not a UUID decodes as `None` so the rest of the frame
    /// (call requests carry their ids in the payload) is still routed.
    #[serde(
        default,
        deserialize_with = "lenient_channel_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub channel_id: Option<Uuid>,
    /// Pre-serialized domain payload
    #[serde(default = "null_payload")]
    pub payload: Box<RawValue>,
}

fn null_payload() -> Box<RawValue> {
    RawValue::NULL.to_owned()
}

fn lenient_channel_id<'de, D>(deserializer: D) -> Result<Option<Uuid>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok()))
}

impl Event {
    /// Build an event by serializing `payload` once
    pub fn new<T: Serialize + ?Sized>(
        event_type: EventType,
        channel_id: Option<Uuid>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            event_type,
            channel_id,
            payload: serde_json::value::to_raw_value(payload)?,
        })
    }

    /// Build an event around an already-serialized payload
    pub fn from_raw(event_type: EventType, channel_id: Option<Uuid>, payload: Box<RawValue>) -> Self {
        Self {
            event_type,
            channel_id,
            payload,
        }
    }

    /// Decode an inbound frame
    pub fn decode(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }

    /// Serialize the envelope for the wire
    pub fn to_bytes(&self) -> Result<Bytes, serde_json::Error> {
        serde_json::to_vec(self).map(Bytes::from)
    }

    /// Decode the payload into a concrete type
    pub fn payload_as<'a, T: Deserialize<'a>>(&'a self) -> Result<T, serde_json::Error> {
        serde_json::from_str(self.payload.get())
    }
}

/// Typing indicator re-broadcast to a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingPayload {
    pub user_id: Uuid,
    pub channel_id: Uuid,
    pub user_name: String,
}

/// Presence change broadcast on register/unregister
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresencePayload {
    pub user_id: Uuid,
    pub online: bool,
}

/// SDP offer/answer or ICE candidate forwarded between two peers
///
/// `data` is opaque to the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalingMessage {
    pub call_id: Uuid,
    #[serde(default = "Uuid::nil")]
    pub from_user: Uuid,
    pub to_user: Uuid,
    #[serde(default = "null_payload")]
    pub data: Box<RawValue>,
}
