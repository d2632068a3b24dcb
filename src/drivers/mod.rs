//! Drivers de dispositivo.
//!
//! Apenas o essencial para este kernel: a porta serial (sink de logging) e a
//! camada de dispositivos de bloco consumida pelo backend FAT do VFS.

pub mod block;
pub mod serial;
