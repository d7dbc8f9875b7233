pub mod assets;
pub mod calculate;
pub mod prices;
pub mod rates;
pub mod setup;
pub mod ui;
