pub mod challenge;
pub mod event;
pub mod id;

pub use challenge::{
    Challenge, ChallengeMetadata, ChallengeOption, ChallengeState, ChallengeWinnerEvent,
    ResolvedOption, WinnerMetadata, WinnerSelection,
};
pub use id::{generate_id, StreamId};
