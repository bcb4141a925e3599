//! services/mod.rs
//! Módulo que agrupa las capas de negocio: almacén, alta, panel y avisos.

pub mod admin_service;
pub mod consultation_store;
pub mod intake_service;
pub mod notification_service;
