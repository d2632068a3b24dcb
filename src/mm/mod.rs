//! Gerenciamento de Memória (MM).
//!
//! Dois níveis, de baixo para cima:
//! - `pmm`: alocador físico de páginas de 4 KiB sobre um bitmap.
//! - `heap`: alocador dinâmico (pools de potência de dois) em cima do PMM,
//!   exposto ao Rust via `GlobalAlloc`.
//!
//! Não há paginação nem tradução de endereços: o kernel roda com memória
//! física plana e identidade-mapeada.

pub mod heap;
pub mod pmm;

#[cfg(feature = "self_test")]
pub mod test;

use crate::core::handoff::{BootInfo, MAX_MEM_RANGES};

/// Tamanho de página física (bytes).
pub const PAGE_SIZE: usize = 4096;

/// Converte endereço físico em índice de página.
#[inline]
pub fn addr_to_page(addr: u64) -> usize {
    (addr >> 12) as usize
}

/// Converte índice de página em endereço físico.
#[inline]
pub fn page_to_addr(page: usize) -> u64 {
    (page as u64) << 12
}

/// Quantas páginas são necessárias para `bytes`.
#[inline]
pub fn bytes_to_pages(bytes: usize) -> usize {
    (bytes + PAGE_SIZE - 1) >> 12
}

// Fim da imagem do kernel (símbolo do linker). O bitmap do PMM é carved
// imediatamente depois deste endereço.
extern "C" {
    static __kernel_end: u8;
}

/// Inicializa o subsistema de memória.
///
/// Valida o mapa de memória do bootloader (mapa ausente ou com contagem
/// absurda é fatal), loga as faixas e constrói o alocador de páginas global.
/// O heap não precisa de init: os pools puxam páginas sob demanda.
pub fn init(boot_info: &BootInfo) {
    let count = boot_info.mem_map_len as usize;
    if count == 0 || count > MAX_MEM_RANGES {
        panic!("mapa de memória inválido reportado pelo bootloader: {}", count);
    }

    let map = boot_info.memory_map();

    crate::kinfo!("(MM) Mapa de memória:");
    for range in map {
        crate::kinfo!(
            "(MM)  start: {:#010x} - size: {:#010x}",
            range.start,
            range.size
        );
    }

    // SAFETY: símbolo fornecido pelo linker script; só o endereço é usado.
    let kernel_end = unsafe { &__kernel_end as *const u8 as u64 };

    pmm::init_global(map, kernel_end);
}
