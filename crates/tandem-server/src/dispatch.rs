//! Line dispatch for authenticated sessions.
//!
//! Order matters: a pending pairing request captures the next line as its
//! answer before anything is parsed, so `/exit` typed at the yes/no prompt is
//! a decline, not a disconnect.

use tandem_core::{Environment, PairKey, Rejection, SessionId};
use tandem_proto::{ClientInput, Command, Outbound, replies};

use crate::{
    auth::Authenticator,
    driver::{LogLevel, ServerAction, ServerDriver},
    pairing,
    storage::TranscriptStore,
    turn,
};

impl<E, A, T> ServerDriver<E, A, T>
where
    E: Environment,
    A: Authenticator,
    T: TranscriptStore,
{
    pub(crate) fn dispatch(&mut self, session: SessionId, line: &str) -> Vec<ServerAction> {
        let answering =
            self.registry.member(session).is_some_and(|m| m.pending_request_from().is_some());
        if answering {
            return pairing::respond(&mut self.registry, &self.transcripts, session, line);
        }

        match ClientInput::parse(line) {
            Ok(ClientInput::Command(command)) => match command {
                Command::Connect(target) => {
                    pairing::request_connect(&mut self.registry, session, &target)
                },
                Command::Vote => turn::pass_turn(&mut self.registry, session),
                Command::End => turn::end_conversation(&mut self.registry, session),
                Command::Help => vec![ServerAction::send(session, replies::help())],
                Command::Exit => self.exit(session),
            },
            Ok(ClientInput::Text(text)) => match self.relay(session, &text) {
                Ok(actions) => actions,
                Err(rejection) => vec![ServerAction::send(session, rejection.reply())],
            },
            Err(e) => vec![ServerAction::send(session, Rejection::from(e).reply())],
        }
    }

    /// Chat text from the speaker goes to the partner and the transcript.
    fn relay(&mut self, session: SessionId, text: &str) -> Result<Vec<ServerAction>, Rejection> {
        let member = self.registry.member(session).ok_or(Rejection::NotPaired)?;
        let partner_identity = member.partner().ok_or(Rejection::NotPaired)?;
        if !member.is_speaker() {
            return Err(Rejection::NotSpeaker);
        }
        let partner = self.registry.session_for(partner_identity).ok_or(Rejection::NotPaired)?;

        let chat = replies::chat_line(&self.env.timestamp(), member.identity(), text);
        let pair = PairKey::new(member.identity(), partner_identity);

        let mut actions = vec![ServerAction::send(partner, Outbound::Chat(chat.clone()))];
        if let Err(e) = self.transcripts.append(&pair, &format!("{chat}\n")) {
            actions.push(ServerAction::log(
                LogLevel::Warn,
                format!("transcript append for {pair} failed: {e}"),
            ));
        }
        Ok(actions)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveDateTime};

    use super::*;
    use crate::{
        auth::MemoryAuthenticator,
        driver::{DriverConfig, ServerEvent},
        storage::{ChaoticTranscripts, MemoryTranscripts},
    };

    #[derive(Clone)]
    struct NoonEnv;

    impl Environment for NoonEnv {
        fn local_time(&self) -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2024, 5, 6)
                .and_then(|d| d.and_hms_opt(12, 30, 0))
                .unwrap_or_default()
        }

        fn random_bytes(&self, buffer: &mut [u8]) {
            buffer.fill(1);
        }
    }

    struct Fixture<S: TranscriptStore> {
        driver: ServerDriver<NoonEnv, MemoryAuthenticator, S>,
        alice: SessionId,
        bob: SessionId,
    }

    impl<S: TranscriptStore> Fixture<S> {
        fn paired(transcripts: S) -> Self {
            let mut driver = ServerDriver::new(
                NoonEnv,
                MemoryAuthenticator::new(),
                transcripts,
                DriverConfig::default(),
            );
            let alice = Self::login(&mut driver, "alice");
            let bob = Self::login(&mut driver, "bob");
            let mut fixture = Self { driver, alice, bob };
            fixture.line(alice, "/connect bob");
            fixture.line(bob, "yes");
            fixture
        }

        fn login(
            driver: &mut ServerDriver<NoonEnv, MemoryAuthenticator, S>,
            identity: &str,
        ) -> SessionId {
            let (session, _) = driver.accept_connection().unwrap();
            driver
                .process_event(ServerEvent::LineReceived { session, line: identity.to_string() })
                .unwrap();
            let code = driver.authenticator().last_code(identity).unwrap();
            driver.process_event(ServerEvent::LineReceived { session, line: code }).unwrap();
            session
        }

        fn line(&mut self, session: SessionId, text: &str) -> Vec<ServerAction> {
            self.driver
                .process_event(ServerEvent::LineReceived { session, line: text.to_string() })
                .unwrap()
        }
    }

    fn only_send(actions: &[ServerAction]) -> (SessionId, Outbound) {
        let sends: Vec<_> = actions
            .iter()
            .filter_map(|a| match a {
                ServerAction::Send { session, message } => Some((*session, message.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(sends.len(), 1, "expected exactly one send, got {sends:?}");
        sends[0].clone()
    }

    #[test]
    fn speaker_text_is_relayed_and_recorded() {
        let mut f = Fixture::paired(MemoryTranscripts::new());
        let alice = f.alice;
        let bob = f.bob;

        let actions = f.line(alice, "hello bob");
        assert_eq!(
            only_send(&actions),
            (bob, Outbound::Chat("[2024-05-06 12:30] alice: hello bob".to_string()))
        );
        assert_eq!(
            f.driver.transcripts().load(&PairKey::new("bob", "alice")).unwrap(),
            "[2024-05-06 12:30] alice: hello bob\n"
        );
    }

    #[test]
    fn listener_text_is_refused() {
        let mut f = Fixture::paired(MemoryTranscripts::new());
        let bob = f.bob;

        let actions = f.line(bob, "me too");
        assert_eq!(only_send(&actions), (bob, replies::not_speaker()));
        assert_eq!(f.driver.transcripts().pair_count(), 0);
    }

    #[test]
    fn unpaired_text_is_refused() {
        let mut f = Fixture::paired(MemoryTranscripts::new());
        let alice = f.alice;
        f.line(alice, "/end");

        let actions = f.line(alice, "anyone?");
        assert_eq!(only_send(&actions), (alice, replies::not_paired()));
    }

    #[test]
    fn storage_failure_still_relays() {
        let mut f = Fixture::paired(ChaoticTranscripts::new(MemoryTranscripts::new(), 1.0));
        let alice = f.alice;
        let bob = f.bob;

        let actions = f.line(alice, "still there?");
        let (to, message) = only_send(&actions);
        assert_eq!(to, bob);
        assert!(!message.is_reply());
        assert!(actions.iter().any(|a| matches!(a, ServerAction::Log { level: LogLevel::Warn, .. })));
    }

    #[test]
    fn protocol_errors_get_one_reply() {
        let mut f = Fixture::paired(MemoryTranscripts::new());
        let alice = f.alice;

        assert_eq!(only_send(&f.line(alice, "/dance")), (alice, replies::usage()));
        assert_eq!(only_send(&f.line(alice, "/connect")), (alice, replies::connect_usage()));
        assert_eq!(only_send(&f.line(alice, "   ")), (alice, replies::empty_message()));
        assert_eq!(only_send(&f.line(alice, "/help")), (alice, replies::help()));
        assert!(f.driver.registry().member(alice).unwrap().is_speaker());
    }

    #[test]
    fn exit_at_prompt_is_a_decline() {
        let mut driver = ServerDriver::new(
            NoonEnv,
            MemoryAuthenticator::new(),
            MemoryTranscripts::new(),
            DriverConfig::default(),
        );
        let alice = Fixture::login(&mut driver, "alice");
        let bob = Fixture::login(&mut driver, "bob");
        driver
            .process_event(ServerEvent::LineReceived { session: alice, line: "/connect bob".into() })
            .unwrap();

        let actions = driver
            .process_event(ServerEvent::LineReceived { session: bob, line: "/exit".into() })
            .unwrap();
        assert!(actions.contains(&ServerAction::send(alice, replies::rejected())));
        assert!(driver.registry().contains(bob));
    }
}
