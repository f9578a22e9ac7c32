//! Conversation state plus its message history

use crate::message::Message;
use crate::state_machine::{transition, ConvContext, ConvState, Effect, Event, TransitionError};

/// A single conversation: the reducer's state and the messages it produced.
///
/// Message effects are applied here so that the rest of the runtime only
/// ever sees I/O effects. Terminal messages are never touched again.
#[derive(Debug)]
pub struct Conversation {
    context: ConvContext,
    state: ConvState,
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(context: ConvContext) -> Self {
        Self {
            context,
            state: ConvState::Idle,
            messages: Vec::new(),
        }
    }

    pub fn context(&self) -> &ConvContext {
        &self.context
    }

    pub fn state(&self) -> &ConvState {
        &self.state
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Feed one event through the reducer.
    ///
    /// On success the new state is committed, message effects are applied,
    /// and the remaining effects are returned for the caller to execute.
    /// On error nothing changes.
    pub fn apply(&mut self, event: Event) -> Result<Vec<Effect>, TransitionError> {
        let result = transition(&self.state, &self.context, event)?;
        self.state = result.new_state;

        let mut pending = Vec::new();
        for effect in result.effects {
            if effect.is_message_effect() {
                self.apply_message_effect(effect);
            } else {
                pending.push(effect);
            }
        }
        Ok(pending)
    }

    fn apply_message_effect(&mut self, effect: Effect) {
        match effect {
            Effect::AppendMessage(message) => {
                if self.messages.iter().any(|m| m.id == message.id) {
                    tracing::error!(message_id = %message.id, "Duplicate message id, ignoring");
                    return;
                }
                self.messages.push(message);
            }
            Effect::AppendText { message_id, text } => {
                if let Some(message) = self.open_message(&message_id) {
                    message.append_text(&text);
                }
            }
            Effect::AppendPart { message_id, part } => {
                if let Some(message) = self.open_message(&message_id) {
                    message.parts.push(part);
                }
            }
            Effect::FinalizeMessage { message_id, status } => {
                if let Some(message) = self.open_message(&message_id) {
                    message.status = status;
                }
            }
            _ => {}
        }
    }

    /// The in-progress message with this id, if any
    fn open_message(&mut self, message_id: &str) -> Option<&mut Message> {
        let found = self
            .messages
            .iter_mut()
            .rev()
            .find(|m| m.id == message_id && !m.is_terminal());
        if found.is_none() {
            tracing::error!(%message_id, "No open message for effect");
        }
        found
    }
}
