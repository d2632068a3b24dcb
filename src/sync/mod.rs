//! # Synchronization Primitives
//!
//! Primitivas de sincronização do kernel.
//!
//! ## Regras
//!
//! - **Spinlock**: única primitiva necessária neste kernel single-core.
//!   Desabilita interrupções durante a seção crítica e restaura o estado
//!   anterior ao soltar, permitindo aninhamento correto.
//! - **Ordem de Lock**: Sempre adquirir na mesma ordem para evitar deadlock.

pub mod spinlock;

pub use spinlock::{Spinlock, SpinlockGuard};
