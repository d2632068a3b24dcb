//! Utilitários internos do kernel.

pub mod bitmap;
