//! Pairing handshake: `/connect`, then a yes/no from the target.
//!
//! A request lives on the target as a [`tandem_core::PendingRequest`] naming
//! the asking connection, not just its identity. While it is set, the
//! target's next line is the answer, whatever it says. A target holds at
//! most one request; a requester may have sent several, and the first one
//! accepted wins: the rest are cancelled at commit time so a pending request
//! never sits on a paired session.

use tandem_core::{PairKey, Rejection, SessionId};
use tandem_proto::{Answer, replies};

use crate::{
    driver::{LogLevel, ServerAction},
    registry::SessionRegistry,
    storage::TranscriptStore,
};

/// `/connect <target>` from an authenticated session.
pub(crate) fn request_connect(
    registry: &mut SessionRegistry,
    requester: SessionId,
    target: &str,
) -> Vec<ServerAction> {
    match try_request(registry, requester, target) {
        Ok(actions) => actions,
        Err(rejection) => vec![ServerAction::send(requester, rejection.reply())],
    }
}

fn try_request(
    registry: &mut SessionRegistry,
    requester: SessionId,
    target: &str,
) -> Result<Vec<ServerAction>, Rejection> {
    let Some(member) = registry.member(requester) else {
        return Ok(Vec::new());
    };
    let requester_identity = member.identity().to_string();

    if requester_identity == target {
        return Err(Rejection::SelfConnect);
    }
    if member.is_paired() {
        return Err(Rejection::AlreadyInConversation);
    }

    let target_id = registry.session_for(target).ok_or(Rejection::TargetNotFound)?;
    let target_member = registry.member(target_id).ok_or(Rejection::TargetNotFound)?;

    if target_member.pending_request_from().is_some() {
        return Err(Rejection::TargetBusyPending);
    }
    if target_member.is_paired() {
        return Ok(vec![
            ServerAction::send(target_id, replies::contact_attempt(&requester_identity)),
            ServerAction::send(requester, Rejection::TargetAlreadyPaired.reply()),
        ]);
    }

    if let Some(target_member) = registry.member_mut(target_id) {
        target_member.set_pending_request(&requester_identity, requester);
    }

    Ok(vec![
        ServerAction::send(target_id, replies::connect_prompt(&requester_identity)),
        ServerAction::send(requester, replies::request_sent(target)),
        ServerAction::log(
            LogLevel::Debug,
            format!("{requester_identity} asked {target} to connect"),
        ),
    ])
}

/// Answer line from a session holding a pending request. The request is
/// consumed whatever the outcome.
pub(crate) fn respond<T: TranscriptStore>(
    registry: &mut SessionRegistry,
    transcripts: &T,
    responder: SessionId,
    line: &str,
) -> Vec<ServerAction> {
    let Some(member) = registry.member_mut(responder) else {
        return Vec::new();
    };
    let Some(request) = member.take_pending_request() else {
        return Vec::new();
    };
    let responder_identity = member.identity().to_string();
    let requester_identity = request.identity.clone();

    let Some(requester) = registry.requester_of(&request) else {
        return vec![ServerAction::send(responder, Rejection::RequesterGone.reply())];
    };
    if registry.member(requester).is_some_and(|m| m.is_paired()) {
        return vec![ServerAction::send(
            responder,
            Rejection::RequesterBusy(requester_identity).reply(),
        )];
    }

    match Answer::parse(line) {
        Answer::Decline => vec![
            ServerAction::send(requester, replies::rejected()),
            ServerAction::send(responder, replies::declined()),
        ],
        Answer::Accept => {
            commit(registry, transcripts, requester, &requester_identity, responder, &responder_identity)
        },
    }
}

fn commit<T: TranscriptStore>(
    registry: &mut SessionRegistry,
    transcripts: &T,
    requester: SessionId,
    requester_identity: &str,
    responder: SessionId,
    responder_identity: &str,
) -> Vec<ServerAction> {
    let mut actions = Vec::new();

    // The requester may itself be holding someone's request.
    let cancelled = registry.member_mut(requester).and_then(|m| m.take_pending_request());

    registry.pair(requester, responder);

    let pair = PairKey::new(requester_identity, responder_identity);
    match transcripts.load(&pair) {
        Ok(history) if !history.is_empty() => {
            actions.push(ServerAction::send(requester, replies::history(&history)));
            actions.push(ServerAction::send(responder, replies::history(&history)));
        },
        Ok(_) => {},
        Err(e) => {
            actions.push(ServerAction::log(
                LogLevel::Warn,
                format!("history for {pair} unavailable: {e}"),
            ));
        },
    }

    actions.push(ServerAction::send(requester, replies::accepted_speaking()));
    actions.push(ServerAction::send(responder, replies::established_listening()));
    actions.push(ServerAction::log(LogLevel::Info, format!("paired {pair}")));

    if let Some(waiting) = cancelled {
        if let Some(waiting_id) = registry.requester_of(&waiting) {
            actions.push(ServerAction::send(waiting_id, replies::requester_busy(requester_identity)));
        }
        actions.push(ServerAction::send(requester, replies::request_cancelled(&waiting.identity)));
    }

    actions
}
