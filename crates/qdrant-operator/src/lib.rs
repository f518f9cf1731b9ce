pub mod adapters;
pub mod backup_controller;
pub mod cluster_controller;
pub mod config;
pub mod crds;
pub mod domain;
pub mod error;
pub mod factory;
pub mod ports;
pub mod restore_controller;
pub mod schedule_controller;
pub mod usecases;
