// src/application/mod.rs
// Use cases orchestrating the engine and its collaborators

pub mod dto;
pub mod usecase;
