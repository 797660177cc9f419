//! vm-messages
//!
//! Operator-facing text for the guest VM provider.
//! Templates live in [`messages`], [`builder::MessageBuilder`] and the
//! [`msg!`] macro fill in `{placeholders}`.

pub mod builder;
pub mod categories;
pub mod errors;
pub mod macros;
pub mod messages;

pub use messages::MESSAGES;
