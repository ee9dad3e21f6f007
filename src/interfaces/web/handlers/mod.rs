pub mod flows;
pub mod providers;
pub mod stores;
