//! HTTP handlers: a thin shell translating routes into service calls.

pub mod extract;
pub mod file_handlers;
pub mod folder_handlers;
pub mod health_handlers;
pub mod share_handlers;
pub mod user_handlers;
