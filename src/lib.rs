//! Stellar Planner: guided material and house-layout intake over Groq.

pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod wizard;
