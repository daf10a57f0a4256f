//! Signal generation module
//!
//! Maps order-book imbalance onto a directional signal and debounces it

mod confirmation;
mod types;

pub use confirmation::ConfirmationFilter;
pub use types::{signal_from_imbalance, Signal};
