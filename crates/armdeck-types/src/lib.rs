//! `armdeck-types` – shared types and the WebSocket wire protocol.
//!
//! Every message exchanged between the demo server and its clients is a
//! JSON object with a `type` tag. [`ClientMessage`] covers the inbound
//! direction, [`ServerMessage`] the outbound one. The enums here are the
//! single source of truth for the wire format; the server never builds
//! ad-hoc JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Joint name → position (normalised units). `BTreeMap` keeps wire output
/// and test assertions deterministic.
pub type JointMap = BTreeMap<String, f64>;

// ─────────────────────────────────────────────────────────────────────────────
// Client → server
// ─────────────────────────────────────────────────────────────────────────────

/// A message received from a connected client.
///
/// `Command::action` is kept as a plain string so that unknown actions still
/// parse; the server answers them with an [`ServerMessage::Error`] addressed
/// to the sender only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Free-text chat, routed to the chat engine. A missing `text` field is
    /// treated as an empty message rather than a protocol error.
    Chat {
        #[serde(default)]
        text: String,
    },
    /// A control command (`start_stream`, `stop_stream`, `search_and_grasp`).
    Command {
        action: String,
        /// Target object name for `search_and_grasp`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        object: Option<String>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Server → client
// ─────────────────────────────────────────────────────────────────────────────

/// Coarse phase reported in [`ServerMessage::Status`] events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Streaming,
    Searching,
    Grasping,
    Done,
    Error,
}

/// A message sent to one client or broadcast to all of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// One streaming observation: image shape `[h, w, c]`, a bounded-size
    /// base64 JPEG thumbnail, and the joint snapshot taken with the frame.
    Frame {
        shape: [u32; 3],
        image_b64: String,
        joints: JointMap,
    },
    /// Phase transition or command acknowledgment.
    Status {
        phase: Phase,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        detail: Option<String>,
    },
    /// Narration line emitted by the scripted behavior.
    Reasoning { thought: String },
    /// Chat reply.
    Chat { text: String },
    /// Malformed input or unsupported request, sent to the offender only.
    Error { text: String },
}

impl ServerMessage {
    /// Shorthand for a bare phase-transition status.
    pub fn phase(phase: Phase) -> Self {
        ServerMessage::Status {
            phase,
            text: None,
            detail: None,
        }
    }

    /// Status with an accompanying acknowledgment text.
    pub fn status(phase: Phase, text: impl Into<String>) -> Self {
        ServerMessage::Status {
            phase,
            text: Some(text.into()),
            detail: None,
        }
    }

    pub fn reasoning(thought: impl Into<String>) -> Self {
        ServerMessage::Reasoning {
            thought: thought.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        ServerMessage::Error { text: text.into() }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Global error type spanning frame-source faults, encoding failures, and
/// unconfigured collaborators.
#[derive(Error, Debug)]
pub enum ArmError {
    #[error("Hardware Fault on {component}: {details}")]
    Hardware { component: String, details: String },

    #[error("Frame source is not connected")]
    NotConnected,

    #[error("Image Encoding Error: {0}")]
    Encode(String),

    #[error("Policy Unavailable: {0}")]
    PolicyUnavailable(String),

    #[error("Chat Engine Unavailable: {0}")]
    ChatUnavailable(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}
