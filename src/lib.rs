pub mod accession_db;
pub mod acquire;
pub mod alphafold;
pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod layout;
pub mod output;
pub mod resolver;
pub mod table;
