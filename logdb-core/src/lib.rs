//! `logdb-core`: shared types for the LogDB replicated log.
//!
//! Everything that crosses a crate or a network boundary lives here:
//! proposal numbers, phase and outcome enums, the acceptor wire replies,
//! slot path builders and the record payload format.

mod errors;
pub use errors::{LogDbError, Result};

pub mod paths;
pub mod payload;
pub use payload::Tags;

mod proposal;
pub use proposal::{ProposalSeq, DEFAULT_SEQ, LEARNED_SEQ, PROPOSAL_LEN};

mod outcome;
pub use outcome::{Phase, RoundOutcome};

mod reply;
pub use reply::{AcceptorReply, PriorAccept};
