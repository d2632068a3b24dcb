//! Núcleo do Kernel: inicialização, logging, panic e contrato de boot.

pub mod entry;
pub mod handoff;
pub mod logging;
pub mod panic;

#[cfg(feature = "self_test")]
pub mod test;
