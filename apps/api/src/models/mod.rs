pub mod history;
pub mod usage;
