// Copyright (c) 2026 Hopwire
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! Sans-io negotiation state machines.
//!
//! Both machines consume raw frame payloads and return what to send next.
//! Transitions are plain methods on an explicit state enum, so every path can
//! be exercised without a stream.

use super::message::Message;
use super::NegotiationError;

/// The listener's view of its handler table.
pub trait Registry {
    /// Index of the first handler the proposal selects.
    fn lookup(&self, proposal: &str) -> Option<usize>;
    /// Registered protocol ids, for `ls`.
    fn protocols(&self) -> Vec<String>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum ListenerState {
    AwaitHeader,
    AwaitProposal,
    Done,
}

/// Outcome of one listener transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ListenerStep {
    /// Send this and keep reading.
    Reply(Message),
    /// Send the echo and hand the stream to handler `index`.
    Accept {
        /// The proposal, echoed verbatim.
        protocol: String,
        /// Handler index in the registry.
        index: usize,
    },
}

/// Listener side: `AwaitHeader -> AwaitProposal (loop) -> Done`.
#[derive(Debug)]
pub struct ListenerMachine {
    state: ListenerState,
}

impl Default for ListenerMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ListenerMachine {
    /// Fresh machine awaiting the dialer's header.
    pub fn new() -> Self {
        Self { state: ListenerState::AwaitHeader }
    }

    /// True once a protocol was accepted.
    pub fn is_done(&self) -> bool {
        self.state == ListenerState::Done
    }

    /// Feed one frame payload.
    pub fn on_frame<R: Registry + ?Sized>(
        &mut self,
        payload: &[u8],
        registry: &R,
    ) -> Result<ListenerStep, NegotiationError> {
        let msg = Message::decode_line(payload)?;
        match (&self.state, msg) {
            (ListenerState::AwaitHeader, Message::Header) => {
                self.state = ListenerState::AwaitProposal;
                Ok(ListenerStep::Reply(Message::Header))
            }
            (ListenerState::AwaitProposal, Message::Protocol(p)) => match registry.lookup(&p) {
                Some(index) => {
                    self.state = ListenerState::Done;
                    Ok(ListenerStep::Accept { protocol: p, index })
                }
                None => Ok(ListenerStep::Reply(Message::Na)),
            },
            (ListenerState::AwaitProposal, Message::Ls) => {
                Ok(ListenerStep::Reply(Message::List(registry.protocols())))
            }
            (_, other) => Err(NegotiationError::UnexpectedMessage(format!("{other:?}"))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum DialerState {
    Start,
    AwaitHeaderEcho,
    Ready,
    AwaitReply(String),
    AwaitList,
    Selected(String),
}

/// Outcome of one dialer transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DialerEvent {
    /// Header echoed; proposals may follow.
    HandshakeDone,
    /// The proposal was echoed back.
    Accepted(String),
    /// The proposal was answered `na`; another may follow.
    Rejected(String),
    /// Answer to `ls`.
    Listed(Vec<String>),
}

/// Dialer side:
/// `Start -> AwaitHeaderEcho -> Ready -> AwaitReply | AwaitList -> Ready | Selected`.
#[derive(Debug)]
pub struct DialerMachine {
    state: DialerState,
}

impl Default for DialerMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl DialerMachine {
    /// Fresh machine; call [`DialerMachine::start`] first.
    pub fn new() -> Self {
        Self { state: DialerState::Start }
    }

    /// Header completed and nothing in flight.
    pub fn is_ready(&self) -> bool {
        self.state == DialerState::Ready
    }

    /// Protocol agreed on, if any.
    pub fn selected(&self) -> Option<&str> {
        match &self.state {
            DialerState::Selected(p) => Some(p),
            _ => None,
        }
    }

    /// Emit the header.
    pub fn start(&mut self) -> Result<Message, NegotiationError> {
        self.expect(DialerState::Start, "start")?;
        self.state = DialerState::AwaitHeaderEcho;
        Ok(Message::Header)
    }

    /// Emit a proposal.
    pub fn propose(&mut self, protocol: &str) -> Result<Message, NegotiationError> {
        self.expect(DialerState::Ready, "propose")?;
        self.state = DialerState::AwaitReply(protocol.to_string());
        Ok(Message::Protocol(protocol.to_string()))
    }

    /// Emit `ls`.
    pub fn request_list(&mut self) -> Result<Message, NegotiationError> {
        self.expect(DialerState::Ready, "ls")?;
        self.state = DialerState::AwaitList;
        Ok(Message::Ls)
    }

    fn expect(&self, want: DialerState, op: &str) -> Result<(), NegotiationError> {
        if self.state != want {
            return Err(NegotiationError::UnexpectedMessage(format!(
                "{op} in state {:?}",
                self.state
            )));
        }
        Ok(())
    }

    /// Feed one frame payload.
    pub fn on_frame(&mut self, payload: &[u8]) -> Result<DialerEvent, NegotiationError> {
        let state = std::mem::replace(&mut self.state, DialerState::Ready);
        match state {
            DialerState::AwaitHeaderEcho => match Message::decode_line(payload)? {
                Message::Header => Ok(DialerEvent::HandshakeDone),
                other => Err(NegotiationError::UnexpectedMessage(format!("{other:?}"))),
            },
            DialerState::AwaitReply(proposed) => match Message::decode_line(payload)? {
                Message::Na => Ok(DialerEvent::Rejected(proposed)),
                Message::Protocol(got) if got == proposed => {
                    self.state = DialerState::Selected(got.clone());
                    Ok(DialerEvent::Accepted(got))
                }
                Message::Protocol(got) => Err(NegotiationError::ProtocolMismatch { proposed, got }),
                other => Err(NegotiationError::UnexpectedMessage(format!("{other:?}"))),
            },
            DialerState::AwaitList => match Message::decode_list(payload)? {
                Message::List(protocols) => Ok(DialerEvent::Listed(protocols)),
                other => Err(NegotiationError::UnexpectedMessage(format!("{other:?}"))),
            },
            other => {
                self.state = other;
                Err(NegotiationError::UnexpectedMessage("frame while idle".into()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Only(&'static str);

    impl Registry for Only {
        fn lookup(&self, proposal: &str) -> Option<usize> {
            (proposal == self.0).then_some(0)
        }
        fn protocols(&self) -> Vec<String> {
            vec![self.0.to_string()]
        }
    }

    fn payload(m: &Message) -> Vec<u8> {
        let framed = m.encode();
        let (len, used) = crate::framing::varint::decode(&framed).expect("prefix");
        assert_eq!(framed.len(), used + len as usize);
        framed[used..].to_vec()
    }

    #[test]
    fn exactly_one_na_before_second_candidate() {
        let registry = Only("b");
        let mut dialer = DialerMachine::new();
        let mut listener = ListenerMachine::new();

        let hdr = dialer.start().expect("start");
        let ListenerStep::Reply(echo) = listener.on_frame(&payload(&hdr), &registry).expect("hdr")
        else {
            panic!("header must be echoed");
        };
        assert_eq!(dialer.on_frame(&payload(&echo)).expect("echo"), DialerEvent::HandshakeDone);

        let mut nas = 0;
        for candidate in ["a", "b"] {
            let proposal = dialer.propose(candidate).expect("ready");
            match listener.on_frame(&payload(&proposal), &registry).expect("proposal") {
                ListenerStep::Reply(Message::Na) => {
                    nas += 1;
                    let ev = dialer.on_frame(&payload(&Message::Na)).expect("na");
                    assert_eq!(ev, DialerEvent::Rejected(candidate.into()));
                }
                ListenerStep::Accept { protocol, index } => {
                    assert_eq!(index, 0);
                    let ev = dialer.on_frame(&payload(&Message::Protocol(protocol))).expect("echo");
                    assert_eq!(ev, DialerEvent::Accepted("b".into()));
                }
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(nas, 1);
        assert_eq!(dialer.selected(), Some("b"));
        assert!(listener.is_done());
    }

    #[test]
    fn proposal_before_header_is_rejected() {
        let mut listener = ListenerMachine::new();
        let err = listener.on_frame(b"/x\n", &Only("/x")).unwrap_err();
        assert!(matches!(err, NegotiationError::UnexpectedMessage(_)));
    }

    #[test]
    fn mismatched_echo() {
        let mut dialer = DialerMachine::new();
        dialer.start().expect("start");
        dialer.on_frame(&payload(&Message::Header)).expect("echo");
        dialer.propose("/a").expect("propose");
        let err = dialer.on_frame(b"/b\n").unwrap_err();
        assert!(matches!(err, NegotiationError::ProtocolMismatch { .. }));
    }

    #[test]
    fn list_roundtrip_through_machines() {
        let mut dialer = DialerMachine::new();
        dialer.start().expect("start");
        dialer.on_frame(&payload(&Message::Header)).expect("echo");
        dialer.request_list().expect("ls");
        let list = Message::List(vec!["/a/1.0.0".into(), "/b".into()]);
        assert_eq!(payload(&list).len(), list.payload_len());
        let ev = dialer.on_frame(&payload(&list)).expect("list");
        assert_eq!(ev, DialerEvent::Listed(vec!["/a/1.0.0".into(), "/b".into()]));
        assert!(dialer.is_ready());
    }
}
