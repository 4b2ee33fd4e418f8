pub mod bootstrap;
pub mod commands;
pub mod countdown_controller;
pub mod history;
pub mod ticker;
