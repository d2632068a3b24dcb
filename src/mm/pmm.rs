//! Physical Memory Manager (PMM).
//!
//! Gerencia a alocação de páginas físicas (4 KiB) usando um Bitmap: um bit
//! por página, 1 = ocupada/reservada. O alocador é um objeto explícito
//! indexado por página (nunca por ponteiro); a instância global vive atrás de
//! um Spinlock que desabilita interrupções, já que alocações acontecem tanto
//! no fluxo normal quanto dentro de handlers.
//!
//! # Estratégia de scan
//! Uma dica ("word mais baixa com bit livre conhecida") evita varrer o bitmap
//! desde o início a cada alocação: frees abaixo da dica a puxam para trás,
//! scans bem-sucedidos a empurram para frente. É só amortização; a correção
//! nunca depende da dica.
//!
//! # Contratos fatais
//! - Liberar uma página já livre é pânico (detecta double-free cedo).
//! - O mapa de memória do bootloader pode sobrepor a imagem do kernel; o
//!   `init` recorta tudo abaixo do fim da imagem.

use crate::core::handoff::MemRange;
use crate::klib::bitmap::{digest_words, Bitmap};
use crate::mm::{addr_to_page, bytes_to_pages, page_to_addr, PAGE_SIZE};
use crate::sync::Spinlock;

/// Onde procurar páginas livres.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocArea {
    /// Scan normal, de baixo para cima a partir da dica.
    Any,
    /// Perto do topo da RAM, de cima para baixo. Usado por chamadores que
    /// querem manter a memória baixa desimpedida (ex: buffers de DMA legado).
    High,
}

/// O alocador global de páginas físicas.
pub static PAGE_ALLOCATOR: Spinlock<PageAllocator> = Spinlock::new(PageAllocator::empty());

pub struct PageAllocator {
    /// Bitmap: um bit por página. 1 = ocupada.
    bitmap: &'static mut [u64],
    /// Total de páginas rastreadas.
    total_pages: usize,
    /// Dica: índice da word mais baixa que pode conter um bit livre.
    hint: usize,
    /// Contador de páginas ocupadas.
    used_pages: usize,
}

impl PageAllocator {
    pub const fn empty() -> Self {
        Self {
            bitmap: &mut [],
            total_pages: 0,
            hint: 0,
            used_pages: 0,
        }
    }

    /// Inicializa o alocador sobre `storage`.
    ///
    /// Fases:
    /// 1. Marca TODAS as páginas como ocupadas.
    /// 2. Libera cada faixa do mapa de memória, recortada em `clip_floor`
    ///    (fim da imagem do kernel): nada abaixo dele é liberado.
    /// 3. Re-marca como ocupado tudo em [0, reserve_end) — cobre a própria
    ///    região do bitmap e a imagem do kernel, que a fase 2 pode ter
    ///    tocado parcialmente.
    ///
    /// A marcação em duas fases evita precisar saber o tamanho final do
    /// bitmap antes de varrer o mapa de memória.
    pub fn init(
        &mut self,
        storage: &'static mut [u64],
        total_pages: usize,
        map: &[MemRange],
        clip_floor: u64,
        reserve_end: u64,
    ) {
        self.bitmap = storage;
        self.total_pages = total_pages;
        self.hint = 0;

        let total = self.total_pages;
        let mut bits = Bitmap::new(self.bitmap, total);

        // Fase 1: tudo ocupado.
        bits.fill();
        self.used_pages = total;

        // Fase 2: liberar faixas do mapa, recortadas no fim do kernel.
        for range in map {
            let start = range.start.max(clip_floor);
            let end = range.start.saturating_add(range.size);
            if end <= start {
                continue;
            }
            // Apenas páginas inteiramente contidas na faixa.
            let first = bytes_to_pages(start as usize);
            let last = addr_to_page(end).min(total);
            for page in first..last {
                if bits.test(page) {
                    bits.clear(page);
                    self.used_pages -= 1;
                }
            }
        }

        // Fase 3: reservar kernel + bitmap.
        let reserve_pages = bytes_to_pages(reserve_end as usize).min(total);
        for page in 0..reserve_pages {
            if !bits.test(page) {
                bits.set(page);
                self.used_pages += 1;
            }
        }

        crate::kinfo!(
            "(PMM) {} páginas rastreadas, {} livres ({} KB)",
            total,
            total - self.used_pages,
            (total - self.used_pages) * PAGE_SIZE / 1024
        );
    }

    /// Aloca `count` páginas contíguas. Retorna o índice da primeira página
    /// da faixa reservada, ou `None` se nenhuma sequência couber.
    pub fn alloc(&mut self, count: usize, area: AllocArea) -> Option<usize> {
        if count == 0 || count > self.total_pages {
            return None;
        }
        match area {
            AllocArea::Any => self.alloc_forward(count),
            AllocArea::High => self.alloc_backward(count),
        }
    }

    fn alloc_forward(&mut self, count: usize) -> Option<usize> {
        let total = self.total_pages;
        let hint_bit = (self.hint * 64).min(total);

        let (candidate, found_word) = {
            let bits = Bitmap::new(&mut self.bitmap[..], total);
            let mut candidate = bits.find_zero_at(hint_bit)?;
            loop {
                if candidate + count > total {
                    return None;
                }
                // Verificar a faixa toda; se houver página ocupada no meio,
                // continuar o scan depois dela.
                let mut blocked = None;
                for page in candidate..candidate + count {
                    if bits.test(page) {
                        blocked = Some(page);
                        break;
                    }
                }
                match blocked {
                    None => break (candidate, candidate / 64),
                    Some(used) => {
                        candidate = bits.find_zero_at(used + 1)?;
                    }
                }
            }
        };

        let mut bits = Bitmap::new(&mut self.bitmap[..], total);
        bits.set_range(candidate, count);
        self.used_pages += count;
        // Avançar a dica: o scan provou que tudo abaixo da word candidata
        // está ocupado.
        self.hint = found_word;
        Some(candidate)
    }

    fn alloc_backward(&mut self, count: usize) -> Option<usize> {
        let total = self.total_pages;

        let start = {
            let bits = Bitmap::new(&mut self.bitmap[..], total);
            let mut limit = total - 1;
            loop {
                let top = bits.find_zero_backward_from(limit)?;
                if top + 1 < count {
                    return None;
                }
                let start = top + 1 - count;
                let mut blocked = None;
                for page in (start..=top).rev() {
                    if bits.test(page) {
                        blocked = Some(page);
                        break;
                    }
                }
                match blocked {
                    None => break start,
                    Some(used) => {
                        if used == 0 {
                            return None;
                        }
                        limit = used - 1;
                    }
                }
            }
        };

        let mut bits = Bitmap::new(&mut self.bitmap[..], total);
        bits.set_range(start, count);
        self.used_pages += count;
        // Alocações no topo não mexem na dica baixa.
        Some(start)
    }

    /// Reserva exatamente a faixa [start, start+count). Tudo-ou-nada: falha
    /// sem efeito se qualquer página da faixa já estiver ocupada.
    pub fn alloc_range(&mut self, start: usize, count: usize) -> Option<usize> {
        if count == 0 || start + count > self.total_pages {
            return None;
        }
        let mut bits = Bitmap::new(&mut self.bitmap[..], self.total_pages);
        for page in start..start + count {
            if bits.test(page) {
                return None;
            }
        }
        bits.set_range(start, count);
        self.used_pages += count;
        Some(start)
    }

    /// Libera uma página. Liberar página já livre é violação de contrato
    /// fatal: não pode ser silenciosa, é assim que double-frees aparecem.
    pub fn free(&mut self, page: usize) {
        let mut bits = Bitmap::new(&mut self.bitmap[..], self.total_pages);
        if !bits.test(page) {
            panic!("PMM: free de página já livre: {}", page);
        }
        bits.clear(page);
        self.used_pages -= 1;
        // Frees abaixo da dica a puxam para trás, senão a página recém
        // liberada nunca seria encontrada pelo scan.
        let word = page / 64;
        if word < self.hint {
            self.hint = word;
        }
    }

    /// Libera uma faixa de páginas.
    pub fn free_range(&mut self, start: usize, count: usize) {
        for page in start..start + count {
            self.free(page);
        }
    }

    /// Página está marcada como ocupada?
    pub fn is_used(&self, page: usize) -> bool {
        let word = page / 64;
        let bit = page % 64;
        (self.bitmap[word] & (1 << bit)) != 0
    }

    /// Total de páginas rastreadas.
    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    /// Páginas atualmente ocupadas.
    pub fn used_pages(&self) -> usize {
        self.used_pages
    }

    /// Digest do bitmap para comparação de estados nos self-tests.
    pub fn digest(&self) -> u64 {
        digest_words(self.bitmap)
    }
}

/// Constrói o alocador global: o storage do bitmap é carved imediatamente
/// após a imagem do kernel, e o total de páginas cobre o maior endereço
/// reportado no mapa.
pub fn init_global(map: &[MemRange], kernel_end: u64) {
    let max_end = map
        .iter()
        .map(|r| r.start.saturating_add(r.size))
        .max()
        .unwrap_or(0);
    if max_end == 0 {
        panic!("mapa de memória sem faixas utilizáveis");
    }

    let total_pages = bytes_to_pages(max_end as usize);
    let words = (total_pages + 63) / 64;

    // Bitmap logo após o fim da imagem (alinhado a 8).
    let bitmap_base = (kernel_end + 7) & !7;
    let bitmap_end = bitmap_base + (words as u64) * 8;

    // SAFETY: a região [bitmap_base, bitmap_end) fica fora da imagem do
    // kernel e é re-reservada pela fase 3 do init antes de qualquer alocação.
    let storage = unsafe { core::slice::from_raw_parts_mut(bitmap_base as *mut u64, words) };

    PAGE_ALLOCATOR
        .lock()
        .init(storage, total_pages, map, kernel_end, bitmap_end);
}

// =============================================================================
// API de conveniência sobre o alocador global
// =============================================================================

/// Aloca uma página física. Retorna o índice da página.
pub fn alloc_page() -> Option<usize> {
    PAGE_ALLOCATOR.lock().alloc(1, AllocArea::Any)
}

/// Aloca `count` páginas físicas contíguas.
pub fn alloc_pages(count: usize) -> Option<usize> {
    PAGE_ALLOCATOR.lock().alloc(count, AllocArea::Any)
}

/// Aloca `count` páginas contíguas perto do topo da RAM.
pub fn alloc_pages_high(count: usize) -> Option<usize> {
    PAGE_ALLOCATOR.lock().alloc(count, AllocArea::High)
}

/// Reserva uma faixa específica de páginas (tudo-ou-nada).
pub fn alloc_page_range(start: usize, count: usize) -> Option<usize> {
    PAGE_ALLOCATOR.lock().alloc_range(start, count)
}

/// Libera uma página.
pub fn free_page(page: usize) {
    PAGE_ALLOCATOR.lock().free(page);
}

/// Libera uma faixa de páginas.
pub fn free_pages(start: usize, count: usize) {
    PAGE_ALLOCATOR.lock().free_range(start, count);
}

/// Ponteiro para o início de uma página.
#[inline]
pub fn page_ptr(page: usize) -> *mut u8 {
    page_to_addr(page) as *mut u8
}
