//! Footprint-to-board matching.

pub mod engine;
pub mod near_miss;
pub mod net_search;
pub mod post;
pub mod score;
pub mod types;

pub use engine::{MatchEngine, MatchMode};
pub use near_miss::find_near_misses;
pub use net_search::{matches_on_net, matches_on_pad, pad_window};
pub use post::{attach_nets, check_isolated_pins, conflicting_nets, dedupe_and_rank, isolated_only};
pub use types::{ComponentMatch, Intervention, MissingPin};
