pub mod config;
pub mod display;
pub mod tap;
pub mod top;
