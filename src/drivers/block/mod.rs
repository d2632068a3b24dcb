//! # Dispositivos de Bloco
//!
//! Camada de abstração e registro global de dispositivos de bloco.
//!
//! | Driver      | Status      | Descrição                    |
//! |-------------|-------------|------------------------------|
//! | Ramdisk     | Funcional   | Disco em memória             |

pub mod ramdisk;
pub mod traits;

pub use ramdisk::Ramdisk;
pub use traits::{BlockDevice, BlockError, SECTOR_SIZE};

use crate::sync::Spinlock;
use alloc::sync::Arc;
use alloc::vec::Vec;

/// Registro global de dispositivos de bloco
static BLOCK_DEVICES: Spinlock<Vec<Arc<dyn BlockDevice>>> = Spinlock::new(Vec::new());

/// Registra um dispositivo de bloco
pub fn register_device(device: Arc<dyn BlockDevice>) {
    let mut devices = BLOCK_DEVICES.lock();
    crate::kinfo!("(Block) Dispositivo registrado ({} blocos)", device.block_count());
    devices.push(device);
}

/// Retorna o primeiro dispositivo registrado, se houver
pub fn first_device() -> Option<Arc<dyn BlockDevice>> {
    BLOCK_DEVICES.lock().first().cloned()
}

/// Número de dispositivos registrados
pub fn device_count() -> usize {
    BLOCK_DEVICES.lock().len()
}
