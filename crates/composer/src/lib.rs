pub mod autocomplete;
pub mod state;

pub use autocomplete::{rank, CandidateList, FocusDirection, MAX_CANDIDATES};
pub use state::{Composer, EditMode};
