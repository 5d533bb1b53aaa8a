mod account;
mod catalog;
mod entry;
mod ledger;
mod money;
mod purchase;

pub use account::*;
pub use catalog::*;
pub use entry::*;
pub use ledger::*;
pub use money::*;
pub use purchase::*;
