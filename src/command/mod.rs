//! The command module turns symbolic command identifiers into validated
//! command lines: the static catalog, the template/argument schema and the
//! resolved [`Command`] handed to the transaction layer.

pub mod catalog;
pub mod template;

pub use catalog::{CommandCatalog, CommandId};
pub use template::{ArgKind, Args, Command, CommandTemplate, HexLen, Placeholder};
