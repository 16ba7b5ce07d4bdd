//! Fiefdom simulation core: action registry, lazy time advancement,
//! spatial placement and morale aggregation over a SQLite store.

pub mod action;
pub mod action_support;
pub mod clock;
pub mod command;
pub mod config;
pub mod construction_actions;
pub mod engine;
pub mod error;
pub mod model;
pub mod morale;
pub mod name_generator;
pub mod placement;
pub mod rng;
pub mod roster_actions;
pub mod snapshot;
pub mod store;
pub mod sync_action;
pub mod time_engine;
pub mod types;
pub mod wall_actions;
