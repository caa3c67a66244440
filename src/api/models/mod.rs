pub mod ledger;
pub mod sensors;
