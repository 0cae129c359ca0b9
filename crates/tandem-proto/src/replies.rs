//! Fixed server texts.
//!
//! Keeping every user-visible string in one place keeps the wording
//! consistent between the server and anything that scripts against it.

use crate::Outbound;

/// Command list shown by `/help` and after login.
pub const HELP_TEXT: &str = "Available commands:\n\
/connect <ID> - request chat with user\n\
/vote         - pass speaker role\n\
/end          - end current conversation\n\
/exit         - exit the chat completely\n\
/help         - show this message";

/// Reply for unrecognised or malformed commands.
pub const USAGE_TEXT: &str = "Only /connect <ID>, /vote, /end, /help, /exit are allowed.";

fn reply(text: impl Into<String>) -> Outbound {
    Outbound::Reply(text.into())
}

/// First prompt on a fresh connection.
pub fn identity_prompt() -> Outbound {
    reply("Enter your ID:")
}

/// The claimed identity was empty.
pub fn empty_identity() -> Outbound {
    reply("Chat ID cannot be empty. Try again:")
}

/// A one-time code was delivered to the claimed identity.
pub fn code_sent() -> Outbound {
    reply("Login code sent. Enter the code to log in:")
}

/// The external channel refused the code.
pub fn delivery_failed() -> Outbound {
    reply(
        "Failed to deliver the login code.\nUse command /exit to exit.\nCheck the ID and write it \
         again:",
    )
}

/// The entered code does not match.
pub fn incorrect_code() -> Outbound {
    reply("Incorrect code. Try again:")
}

/// Successful login.
pub fn welcome(identity: &str) -> Outbound {
    reply(format!("Welcome, {identity}!\n{HELP_TEXT}"))
}

/// `/help`.
pub fn help() -> Outbound {
    reply(HELP_TEXT)
}

/// Unknown or malformed command.
pub fn usage() -> Outbound {
    reply(USAGE_TEXT)
}

/// `/connect` without an identity.
pub fn connect_usage() -> Outbound {
    reply("Usage: /connect <ID>")
}

/// Empty chat line.
pub fn empty_message() -> Outbound {
    reply("Empty messages are not sent.")
}

/// `/connect` target is not logged in.
pub fn target_not_found() -> Outbound {
    reply("User not found.")
}

/// `/connect` target already has a request waiting.
pub fn target_busy() -> Outbound {
    reply("User is busy with another request.")
}

/// `/connect` target is mid-conversation.
pub fn target_already_paired() -> Outbound {
    reply("User is already connected.")
}

/// Tells a paired client that someone tried to reach them.
pub fn contact_attempt(requester: &str) -> Outbound {
    reply(format!(
        "User '{requester}' attempted to connect to you, but you are already in a conversation."
    ))
}

/// `/connect` to oneself.
pub fn self_connect() -> Outbound {
    reply("You cannot connect to yourself.")
}

/// `/connect` while already paired.
pub fn already_in_conversation() -> Outbound {
    reply("You are already in a conversation. Use /end first.")
}

/// Yes/no prompt shown to the target of a request.
pub fn connect_prompt(requester: &str) -> Outbound {
    reply(format!("User '{requester}' wants to connect. Accept? (yes/no)"))
}

/// Acknowledges a request that is now waiting on the target.
pub fn request_sent(target: &str) -> Outbound {
    reply(format!("Request sent to '{target}'. Waiting for an answer."))
}

/// The requester left before the answer arrived.
pub fn requester_gone() -> Outbound {
    reply("Requester disconnected.")
}

/// The requester paired with someone else before the answer arrived.
pub fn requester_busy(requester: &str) -> Outbound {
    reply(format!("User '{requester}' is already in another conversation."))
}

/// The target left before answering.
pub fn request_withdrawn(target: &str) -> Outbound {
    reply(format!("User '{target}' disconnected before answering your request."))
}

/// A pending request was dropped because its target just paired.
pub fn request_cancelled(requester: &str) -> Outbound {
    reply(format!("The request from '{requester}' was cancelled."))
}

/// Stored transcript delivered on pairing.
pub fn history(transcript: &str) -> Outbound {
    reply(format!("Chat history:\n{transcript}"))
}

/// Sent to the requester once the pair is established.
pub fn accepted_speaking() -> Outbound {
    reply("Connection accepted. You are now speaking.")
}

/// Sent to the responder once the pair is established.
pub fn established_listening() -> Outbound {
    reply("Connection established. You are listening.")
}

/// Sent to the requester on a declined request.
pub fn rejected() -> Outbound {
    reply("Connection rejected.")
}

/// Sent to the responder on a declined request.
pub fn declined() -> Outbound {
    reply("Connection declined.")
}

/// `/vote` succeeded.
pub fn passed_turn() -> Outbound {
    reply("You passed the microphone.")
}

/// The partner passed the turn.
pub fn now_speaking() -> Outbound {
    reply("You are now speaking.")
}

/// Action reserved for the speaker.
pub fn not_speaker() -> Outbound {
    reply("You are not the current speaker.")
}

/// Chat text without a partner.
pub fn not_paired() -> Outbound {
    reply("You are not in a conversation. Use /connect <ID> to start chatting.")
}

/// `/end` confirmation.
pub fn left_conversation() -> Outbound {
    reply("You have left the conversation.")
}

/// Partner used `/end`.
pub fn partner_ended() -> Outbound {
    reply("Your conversation partner has ended the chat.")
}

/// Partner disconnected.
pub fn partner_left() -> Outbound {
    reply("Your conversation partner has left the chat.")
}

/// The same identity logged in on another connection.
pub fn signed_in_elsewhere() -> Outbound {
    reply("Signed in from another connection. Closing this session.")
}

/// `/exit`.
pub fn goodbye() -> Outbound {
    reply("Goodbye.")
}

/// Operator shutdown broadcast.
pub fn server_shutdown() -> Outbound {
    reply("Server is shutting down.")
}

/// Connection refused at capacity.
pub fn server_full() -> Outbound {
    reply("Server is full. Try again later.")
}

/// A relayed chat line: `[<timestamp>] <sender>: <text>`.
pub fn chat_line(timestamp: &str, sender: &str, text: &str) -> String {
    format!("[{timestamp}] {sender}: {text}")
}
