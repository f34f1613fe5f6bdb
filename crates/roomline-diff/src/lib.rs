//! Diff engine for the line-list mirror: the O(NP) shortest edit script
//! (§4.1), the extended-change folder that fuses add/delete pairs into
//! `replaced` edits (§4.2), and the translator that anchors a folded
//! script onto pre-image line-ids as change-ops (§4.3).

pub mod fold;
pub mod ops;
pub mod ses;

pub use fold::{fold, FoldedTag};
pub use ops::diff_to_changes;
pub use ses::{diff, DiffTag, SesResult};
