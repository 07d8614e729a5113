//! Call Types
//!
//! Data model for audio/video calls. A call lives in exactly one channel and
//! moves through a small state machine:
//!
//! ```text
//! ringing --accept--> in_progress --hangup(last participant)--> ended
//! ringing --decline--> declined
//! ringing --timeout--> missed
//! ```
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use crate::shared::error::SharedError;

/// Lifecycle status of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    Ringing,
    InProgress,
    Ended,
    Missed,
    Declined,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ringing => "ringing",
            Self::InProgress => "in_progress",
            Self::Ended => "ended",
            Self::Missed => "missed",
            Self::Declined => "declined",
        }
    }

    /// Ringing and in-progress calls block a new call in the same channel
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Ringing | Self::InProgress)
    }
}

impl FromStr for CallStatus {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ringing" => Ok(Self::Ringing),
            "in_progress" => Ok(Self::InProgress),
            "ended" => Ok(Self::Ended),
            "missed" => Ok(Self::Missed),
            "declined" => Ok(Self::Declined),
            other => Err(SharedError::validation(
                "status",
                format!("unknown call status '{}'", other),
            )),
        }
    }
}

/// Media kind of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    Audio,
    Video,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
        }
    }
}

impl FromStr for CallType {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "audio" => Ok(Self::Audio),
            "video" => Ok(Self::Video),
            other => Err(SharedError::validation(
                "call_type",
                format!("unknown call type '{}'", other),
            )),
        }
    }
}

/// A call in a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Call {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub initiator_id: Uuid,
    pub call_type: CallType,
    pub status: CallStatus,
    /// User whose accept moved the call to `in_progress`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_by: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Call {
    /// New ringing call created now
    pub fn ringing(channel_id: Uuid, initiator_id: Uuid, call_type: CallType) -> Self {
        Self {
            id: Uuid::new_v4(),
            channel_id,
            initiator_id,
            call_type,
            status: CallStatus::Ringing,
            accepted_by: None,
            started_at: None,
            ended_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Membership of a user in a call
///
/// A participant is active while `left_at` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallParticipant {
    pub call_id: Uuid,
    pub user_id: Uuid,
    pub joined_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_at: Option<DateTime<Utc>>,
}

/// Payload of an inbound `call.initiate` frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiateCallRequest {
    pub channel_id: Uuid,
    pub call_type: CallType,
}

/// Payload of inbound `call.accept`, `call.decline` and `call.hangup` frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallIdPayload {
    pub call_id: Uuid,
}
