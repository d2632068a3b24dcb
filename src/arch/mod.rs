//! # Hardware Abstraction Layer (HAL)
//!
//! O módulo `arch` atua como a **única** ponte entre o *Kernel Core* (lógica
//! agnóstica) e o hardware real. Toda interação com registradores, instruções
//! privilegiadas e controle de CPU deve passar por aqui.
//!
//! ## Propósito e Responsabilidade
//! - **Isolamento:** O resto do kernel (`ember::core`, `ember::mm`, `ember::fs`)
//!   não deve saber em qual CPU está rodando.
//! - **Abstração:** Define traits (em `traits/`) que as implementações
//!   (ex: `x86_64/`) devem satisfazer.
//! - **Seleção de Plataforma:** Usa `cfg` attributes para compilar apenas o
//!   código da arquitetura alvo.

pub mod traits;

// Seleção de Arquitetura: x86_64
#[cfg(target_arch = "x86_64")]
pub mod x86_64;

#[cfg(target_arch = "x86_64")]
pub use x86_64 as platform;

// Re-exports globais para o kernel usar
// Exemplo: arch::Cpu::halt();
pub use platform::Cpu;
pub use traits::CpuOps;
