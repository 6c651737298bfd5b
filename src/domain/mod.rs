mod category;
mod integrity;
mod ledger;
mod loan;
mod money;
mod transaction;
mod transfer;
mod validation;
mod wallet;

pub use category::*;
pub use integrity::*;
pub use ledger::*;
pub use loan::*;
pub use money::*;
pub use transaction::*;
pub use transfer::*;
pub use validation::*;
pub use wallet::*;
