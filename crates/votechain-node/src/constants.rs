pub(crate) const DEFAULT_MIN_DELAY_MS: u64 = 4_000;
pub(crate) const DEFAULT_MAX_DELAY_MS: u64 = 15_000;
pub(crate) const DEFAULT_PEER_TIMEOUT_MS: u64 = 3_000;
pub(crate) const ENV_PREFIX: &str = "VOTECHAIN";
/// Heartbeat value reported for a peer that did not answer.
pub const UNREACHABLE_LENGTH: i64 = -1;
