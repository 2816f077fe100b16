pub mod document;
pub mod money;
pub mod period;

pub use document::{DocumentKind, MatchCandidate};
pub use money::Money;
pub use period::DateRange;
