/// Single-conversation controller and its gateway sequencing.
pub mod controller;
/// Message entities and the request lifecycle state machine.
pub mod message;

pub use controller::{
    APOLOGY_MESSAGE, ChatController, ConversationSnapshot, PendingTurn, SubmitOutcome,
    SubmitRejection,
};
pub use message::{
    ConversationState, Message, MessageId, MessageIdAllocator, Phase, PhaseTransition, Role,
    TransitionRejection, TransitionResult,
};
