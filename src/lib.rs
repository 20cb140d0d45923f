pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod jgi;
pub mod listing;
pub mod output;
pub mod policy;
pub mod previous;
pub mod projects;
pub mod selector;
pub mod tree;
