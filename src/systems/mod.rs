mod bookkeeping;
mod demand;

pub use bookkeeping::BookkeepingSystem;
pub use demand::DemandSystem;
