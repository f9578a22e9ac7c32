//! Property-based tests for the state machine
//!
//! These tests drive a [`Conversation`] (reducer plus message bookkeeping)
//! with generated event sequences and check the invariants hold.

use super::state::reply_id;
use super::*;
use crate::message::{MessageStatus, Role};
use crate::runtime::Conversation;
use proptest::prelude::*;

// ============================================================================
// Test Helpers
// ============================================================================

fn submitted_conversation(request_id: &str) -> Conversation {
    let mut conv = Conversation::new(ConvContext::new("prop-conv"));
    conv.apply(Event::UserSubmit {
        text: "What services do you offer?".to_string(),
        message_id: request_id.to_string(),
    })
    .unwrap();
    conv
}

fn fragment(request_id: &str, text: &str) -> Event {
    Event::Fragment {
        request_id: request_id.to_string(),
        text: text.to_string(),
    }
}

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_fragment_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,!?\n]{0,12}"
}

fn arb_fragments() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec(arb_fragment_text(), 1..20)
}

fn arb_whitespace() -> impl Strategy<Value = String> {
    "[ \t\r\n]{0,10}"
}

fn arb_busy_state() -> impl Strategy<Value = ConvState> {
    prop_oneof![
        "[a-z0-9]{6}".prop_map(|request_id| ConvState::Submitted { request_id }),
        "[a-z0-9]{6}".prop_map(|request_id| ConvState::Streaming {
            message_id: reply_id(&request_id),
            request_id,
        }),
    ]
}

fn arb_session_event() -> impl Strategy<Value = Event> {
    prop_oneof![
        Just(Event::UserSpeechStarted),
        Just(Event::UserSpeechStopped),
        Just(Event::AiSpeechStarted),
        ("[a-z]{4}", "[a-z ]{0,10}").prop_map(|(message_id, text)| Event::TurnCommitted {
            message_id,
            role: Role::Assistant,
            text,
        }),
        ("[a-z]{4}", "[a-z ]{0,10}").prop_map(|(message_id, text)| Event::TurnCommitted {
            message_id,
            role: Role::User,
            text,
        }),
        "[a-z ]{1,10}".prop_map(|message| Event::SessionError { message }),
    ]
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Final assistant text equals the in-order concatenation of fragments
    #[test]
    fn prop_fragments_concatenate_in_order(fragments in arb_fragments()) {
        let mut conv = submitted_conversation("req");
        for text in &fragments {
            conv.apply(fragment("req", text)).unwrap();
        }
        conv.apply(Event::Complete { request_id: "req".to_string() }).unwrap();

        prop_assert_eq!(conv.state(), &ConvState::Idle);
        prop_assert_eq!(conv.messages().len(), 2);
        let reply = &conv.messages()[1];
        prop_assert_eq!(reply.role, Role::Assistant);
        prop_assert_eq!(reply.status, MessageStatus::Complete);
        prop_assert_eq!(reply.text(), fragments.concat());
    }

    /// Submitting while a request is outstanding changes nothing
    #[test]
    fn prop_submit_while_busy_is_noop(
        fragments in proptest::collection::vec(arb_fragment_text(), 0..5),
        text in "[a-zA-Z ]{1,20}",
    ) {
        let mut conv = submitted_conversation("req");
        for f in &fragments {
            conv.apply(fragment("req", f)).unwrap();
        }
        let state_before = conv.state().clone();
        let messages_before = conv.messages().to_vec();

        let result = conv.apply(Event::user_submit(text));

        prop_assert!(result.is_err());
        prop_assert_eq!(conv.state(), &state_before);
        prop_assert_eq!(conv.messages(), messages_before.as_slice());
    }

    /// The reducer alone rejects submissions from every busy state
    #[test]
    fn prop_busy_states_reject_submit(state in arb_busy_state(), text in "[a-z]{1,10}") {
        let result = transition(&state, &ConvContext::new("c"), Event::user_submit(text));
        prop_assert_eq!(result.unwrap_err(), TransitionError::Busy);
    }

    /// Whitespace-only input never produces a submission
    #[test]
    fn prop_whitespace_submit_is_noop(text in arb_whitespace()) {
        let mut conv = Conversation::new(ConvContext::new("prop-conv"));
        let result = conv.apply(Event::user_submit(text));

        prop_assert!(result.is_err());
        prop_assert_eq!(conv.state(), &ConvState::Idle);
        prop_assert!(conv.messages().is_empty());
    }

    /// A transport error mid-stream returns to idle, keeps the partial
    /// reply, and nothing can modify it afterwards
    #[test]
    fn prop_error_preserves_partial(
        before in arb_fragments(),
        after in arb_fragments(),
    ) {
        let mut conv = submitted_conversation("req");
        for text in &before {
            conv.apply(fragment("req", text)).unwrap();
        }
        conv.apply(Event::TransportError {
            request_id: "req".to_string(),
            message: "Connection lost".to_string(),
            retryable: false,
        }).unwrap();

        prop_assert_eq!(conv.state(), &ConvState::Idle);
        let partial = conv.messages()[1].clone();
        prop_assert_eq!(partial.status, MessageStatus::Incomplete);
        prop_assert_eq!(partial.text(), before.concat());

        for text in &after {
            prop_assert!(conv.apply(fragment("req", text)).is_err());
        }
        let complete = Event::Complete { request_id: "req".to_string() };
        prop_assert!(conv.apply(complete).is_err());
        prop_assert_eq!(&conv.messages()[1], &partial);
    }

    /// Cancellation behaves like an error for the partial reply
    #[test]
    fn prop_cancel_freezes_partial(before in arb_fragments(), late in arb_fragment_text()) {
        let mut conv = submitted_conversation("req");
        for text in &before {
            conv.apply(fragment("req", text)).unwrap();
        }
        let effects = conv.apply(Event::Cancel).unwrap();
        let abort = Effect::AbortTransport { request_id: "req".to_string() };
        prop_assert!(effects.contains(&abort));

        let frozen = conv.messages()[1].clone();
        prop_assert!(conv.apply(fragment("req", &late)).is_err());
        prop_assert_eq!(&conv.messages()[1], &frozen);
        prop_assert_eq!(frozen.status, MessageStatus::Incomplete);
    }

    /// While connected, exactly one speech state holds and it tracks the
    /// most recent speech boundary
    #[test]
    fn prop_session_speech_states_exclusive(events in proptest::collection::vec(arb_session_event(), 0..30)) {
        let ctx = ConvContext::new("voice");
        let mut state = ConvState::ConnectedIdle;
        for event in events {
            let expected = match (&state, &event) {
                (_, Event::UserSpeechStarted) => Some(ConvState::UserSpeaking),
                (_, Event::AiSpeechStarted) => Some(ConvState::AiSpeaking),
                (ConvState::UserSpeaking, Event::UserSpeechStopped) => Some(ConvState::ConnectedIdle),
                (ConvState::AiSpeaking, Event::TurnCommitted { role: Role::Assistant, .. }) => {
                    Some(ConvState::ConnectedIdle)
                }
                _ => None,
            };
            let result = transition(&state, &ctx, event).unwrap();
            prop_assert!(result.new_state.is_connected());
            if let Some(expected) = expected {
                prop_assert_eq!(&result.new_state, &expected);
            }
            state = result.new_state;
        }
    }
}
