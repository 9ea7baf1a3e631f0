mod balances;
mod expense;
mod group;
mod member;
mod money;
mod payment;
pub mod settlement;

pub use balances::*;
pub use expense::*;
pub use group::*;
pub use member::*;
pub use money::*;
pub use payment::*;
pub use settlement::SettlementInstruction;
