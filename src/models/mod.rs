pub mod cost;
pub mod delivery;
pub mod event;
pub mod money;
pub mod staff;
