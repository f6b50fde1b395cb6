//! Event names carried in the `type` field of broadcast frames
//!
//! The overlay switches on these strings, so producers must use them verbatim.

/// Greeting frame sent once when a subscription opens
pub const CONNECTED: &str = "connected";

/// Keep-alive frame sent on idle subscriptions
pub const PING: &str = "ping";

/// A new challenge was opened on the stream
pub const CHALLENGE_NEW: &str = "challenge:new";

/// A challenge was resolved and a winning option selected
pub const CHALLENGE_WINNER: &str = "challenge:winner";

/// Diagnostic message from `POST /api/test-broadcast`
pub const TEST_MESSAGE: &str = "test:message";

/// Diagnostic message from `POST /api/test-simple-broadcast`
pub const TEST_SIMPLE: &str = "test:simple";
