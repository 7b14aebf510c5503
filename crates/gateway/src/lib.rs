//! The Wayfarer gateway: HTTP chat API, interactive CLI, and the turn
//! runtime (router, consent gate, planner, actor loop, ledger, blend).

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod metrics;
pub mod runtime;
pub mod state;
