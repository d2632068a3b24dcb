//! Ember Kernel Library.
//!
//! Ponto central de exportação dos módulos do Kernel.
//! Define a estrutura hierárquica do sistema operacional.

#![no_std]

// Habilitar alocação dinâmica (necessário para Vec/Box/Arc)
extern crate alloc;

// --- Módulos de Baixo Nível (Hardware) ---
pub mod arch; // HAL (CPU, GDT, IDT, stubs de interrupção)
pub mod drivers; // Drivers Específicos (Serial, Dispositivos de Bloco)

// --- Módulos Centrais (Lógica do Kernel) ---
pub mod core; // Inicialização, Logging, Panic, Handoff
pub mod interrupts; // Núcleo de despacho de interrupções (IDT + PIC + handlers)
pub mod klib; // Utilitários Internos (Bitmap)
pub mod mm; // Gerenciamento de Memória (PMM, Heap)
pub mod sync; // Primitivas de Sincronização (Spinlock)

// --- Subsistemas ---
pub mod fs; // Sistema de Arquivos Virtual (VFS + memfs + FAT)

// Re-exportar BootInfo para acesso fácil no binário
pub use crate::core::handoff::BootInfo;
