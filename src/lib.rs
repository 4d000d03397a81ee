// src/lib.rs

//! novel-notify: chapter update tracker for serialized web novels

pub mod error;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;
