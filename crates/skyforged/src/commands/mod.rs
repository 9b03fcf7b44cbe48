pub mod credential;
pub mod inventory;
pub mod provision;
pub mod serve;
pub mod sync;
