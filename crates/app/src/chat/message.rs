use std::fmt;

use chrono::{DateTime, Utc};

/// Sequence identity of one message.
///
/// Derived from the creation time in milliseconds and bumped when two messages land in the
/// same millisecond, so ids are strictly increasing in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl MessageId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Hands out timestamp-derived ids. Never rewinds, including across conversation resets.
#[derive(Debug, Default)]
pub struct MessageIdAllocator {
    last: Option<u64>,
}

impl MessageIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self, now: DateTime<Utc>) -> MessageId {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or_default();
        let raw = match self.last {
            Some(last) if millis <= last => last.saturating_add(1),
            _ => millis,
        };
        self.last = Some(raw);
        MessageId::new(raw)
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Model,
}

/// One chat message. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub is_error: bool,
}

impl Message {
    pub fn new(
        id: MessageId,
        role: Role,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
        is_error: bool,
    ) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            timestamp,
            is_error,
        }
    }

    pub fn user(id: MessageId, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(id, Role::User, content, timestamp, false)
    }

    pub fn model(id: MessageId, content: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self::new(id, Role::Model, content, timestamp, false)
    }

    /// Model-side placeholder shown in place of a reply that could not be produced.
    pub fn model_error(
        id: MessageId,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(id, Role::Model, content, timestamp, true)
    }
}

/// Request lifecycle of a conversation.
///
/// `AwaitingResponse` carries the id of the user message whose reply is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    AwaitingResponse(MessageId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseTransition {
    Dispatch(MessageId),
    Settle(MessageId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRejection {
    AlreadyAwaiting {
        active: MessageId,
        attempted: MessageId,
    },
    NotAwaiting {
        attempted: MessageId,
    },
    TurnMismatch {
        active: MessageId,
        attempted: MessageId,
    },
}

pub type TransitionResult = Result<Phase, TransitionRejection>;

impl Phase {
    pub fn is_awaiting(&self) -> bool {
        matches!(self, Self::AwaitingResponse(_))
    }

    pub fn active_turn(&self) -> Option<MessageId> {
        match self {
            Self::AwaitingResponse(turn) => Some(*turn),
            Self::Idle => None,
        }
    }

    /// Only one turn may be outstanding, and only that turn may settle it.
    pub fn apply(&self, transition: PhaseTransition) -> TransitionResult {
        match (self, transition) {
            (Self::Idle, PhaseTransition::Dispatch(turn)) => Ok(Self::AwaitingResponse(turn)),
            (Self::AwaitingResponse(active), PhaseTransition::Dispatch(attempted)) => {
                Err(TransitionRejection::AlreadyAwaiting {
                    active: *active,
                    attempted,
                })
            }
            (Self::AwaitingResponse(active), PhaseTransition::Settle(attempted))
                if *active == attempted =>
            {
                Ok(Self::Idle)
            }
            (Self::AwaitingResponse(active), PhaseTransition::Settle(attempted)) => {
                Err(TransitionRejection::TurnMismatch {
                    active: *active,
                    attempted,
                })
            }
            (Self::Idle, PhaseTransition::Settle(attempted)) => {
                Err(TransitionRejection::NotAwaiting { attempted })
            }
        }
    }
}

/// The single in-memory conversation owned by a controller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConversationState {
    pub messages: Vec<Message>,
    pub phase: Phase,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loading(&self) -> bool {
        self.phase.is_awaiting()
    }

    pub fn apply_transition(&mut self, transition: PhaseTransition) -> TransitionResult {
        let next = self.phase.apply(transition)?;
        self.phase = next;
        Ok(next)
    }
}
