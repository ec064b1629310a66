pub mod commit;
pub mod config;
pub mod error;
pub mod logging;
pub mod rank;
pub mod round;
pub mod session;
pub mod source;
pub mod store;
pub mod verify;
