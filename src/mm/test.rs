//! Testes de Memória do Kernel
//!
//! Executa testes de integridade do PMM e do Heap no boot.
//! Todos os resultados são enviados para a serial.
//!
//! # Uso
//! Chamado por `core::test::run_all()` logo após `mm::init()` no boot.

use crate::core::handoff::MemRange;
use crate::core::test::{run_test_suite, TestCase, TestResult};
use crate::mm::pmm::{self, AllocArea, PageAllocator};
use crate::mm::PAGE_SIZE;
use alloc::vec;
use alloc::vec::Vec;

macro_rules! check {
    ($cond:expr, $($msg:tt)*) => {
        if !$cond {
            crate::kerror!($($msg)*);
            return TestResult::Failed;
        }
    };
}

/// Executa a suite de memória. Retorna (passed, failed, skipped).
pub fn run() -> (usize, usize, usize) {
    run_test_suite(
        "mm",
        &[
            TestCase {
                name: "pmm_scratch_basico",
                func: test_pmm_scratch_basic,
            },
            TestCase {
                name: "pmm_scratch_range",
                func: test_pmm_scratch_range,
            },
            TestCase {
                name: "pmm_scratch_topo",
                func: test_pmm_scratch_high,
            },
            TestCase {
                name: "pmm_global_roundtrip",
                func: test_pmm_global_roundtrip,
            },
            TestCase {
                name: "heap_roundtrip",
                func: test_heap_roundtrip,
            },
            TestCase {
                name: "heap_sem_overlap",
                func: test_heap_no_overlap,
            },
            TestCase {
                name: "heap_realloc_calloc",
                func: test_heap_realloc_calloc,
            },
        ],
    )
}

/// Monta um PageAllocator de teste sobre storage do heap.
///
/// Mapa sintético: uma faixa única de `pages` páginas começando em 1 MiB,
/// sem recorte de kernel (clip_floor igual ao início da faixa).
fn scratch_allocator(pages: usize) -> PageAllocator {
    const BASE: u64 = 0x100000;
    let words = (super::bytes_to_pages(BASE as usize) + pages + 63) / 64;
    let storage: &'static mut [u64] = Vec::leak(vec![0u64; words]);
    let map = [MemRange {
        start: BASE,
        size: (pages * PAGE_SIZE) as u64,
    }];
    let total = super::addr_to_page(BASE) + pages;
    let mut pa = PageAllocator::empty();
    pa.init(storage, total, &map, BASE, BASE);
    pa
}

fn test_pmm_scratch_basic() -> TestResult {
    let mut pa = scratch_allocator(256);
    let base = super::addr_to_page(0x100000);
    let free_before = pa.total_pages() - pa.used_pages();
    check!(free_before == 256, "(PMM) esperava 256 livres, tem {}", free_before);

    let digest_before = pa.digest();

    // Aloca uma página e uma faixa de 4 contíguas.
    let Some(p1) = pa.alloc(1, AllocArea::Any) else {
        crate::kerror!("(PMM) alloc(1) falhou");
        return TestResult::Failed;
    };
    let Some(p4) = pa.alloc(4, AllocArea::Any) else {
        crate::kerror!("(PMM) alloc(4) falhou");
        return TestResult::Failed;
    };
    check!(p1 >= base, "(PMM) página abaixo da faixa: {}", p1);
    check!(p4 != p1, "(PMM) faixas sobrepostas");
    for i in 0..4 {
        check!(pa.is_used(p4 + i), "(PMM) página {} não marcada", p4 + i);
    }

    // Conjunto alocado e conjunto livre têm que ser disjuntos e cobrir tudo.
    let mut used = 0;
    for page in 0..pa.total_pages() {
        if pa.is_used(page) {
            used += 1;
        }
    }
    check!(
        used == pa.used_pages(),
        "(PMM) contador inconsistente: bitmap={} contador={}",
        used,
        pa.used_pages()
    );

    // Liberar exatamente o que foi alocado restaura o estado bit a bit.
    pa.free(p1);
    pa.free_range(p4, 4);
    check!(
        pa.digest() == digest_before,
        "(PMM) bitmap não voltou ao estado original"
    );
    TestResult::Passed
}

fn test_pmm_scratch_range() -> TestResult {
    let mut pa = scratch_allocator(64);
    let base = super::addr_to_page(0x100000);

    // Reserva explícita de faixa funciona...
    check!(
        pa.alloc_range(base + 8, 8).is_some(),
        "(PMM) alloc_range livre falhou"
    );
    // ...e é tudo-ou-nada quando qualquer página está ocupada.
    let digest = pa.digest();
    check!(
        pa.alloc_range(base + 4, 8).is_none(),
        "(PMM) alloc_range parcialmente ocupada devia falhar"
    );
    check!(
        pa.digest() == digest,
        "(PMM) alloc_range falhada mudou o bitmap"
    );

    pa.free_range(base + 8, 8);
    TestResult::Passed
}

fn test_pmm_scratch_high() -> TestResult {
    let mut pa = scratch_allocator(64);
    let base = super::addr_to_page(0x100000);
    let top = base + 64 - 1;

    // A dica "perto do topo" entrega as páginas mais altas livres.
    let Some(p2) = pa.alloc(2, AllocArea::High) else {
        crate::kerror!("(PMM) alloc High falhou");
        return TestResult::Failed;
    };
    check!(p2 + 1 == top, "(PMM) High devia terminar no topo: {}", p2);

    // Scan normal continua preferindo o fundo.
    let Some(p1) = pa.alloc(1, AllocArea::Any) else {
        crate::kerror!("(PMM) alloc Any falhou");
        return TestResult::Failed;
    };
    check!(p1 == base, "(PMM) Any devia começar no fundo: {}", p1);

    pa.free_range(p2, 2);
    pa.free(p1);
    TestResult::Passed
}

fn test_pmm_global_roundtrip() -> TestResult {
    // No alocador global de verdade: alocar e liberar devolve o bitmap ao
    // estado anterior, e nenhuma página entregue está marcada livre.
    let digest_before = pmm::PAGE_ALLOCATOR.lock().digest();

    let Some(pg) = pmm::alloc_pages(3) else {
        crate::kerror!("(PMM) alloc_pages(3) global falhou");
        return TestResult::Failed;
    };
    {
        let pa = pmm::PAGE_ALLOCATOR.lock();
        for i in 0..3 {
            check!(pa.is_used(pg + i), "(PMM) página global {} livre", pg + i);
        }
    }
    pmm::free_pages(pg, 3);

    check!(
        pmm::PAGE_ALLOCATOR.lock().digest() == digest_before,
        "(PMM) estado global não restaurado"
    );
    TestResult::Passed
}

fn test_heap_roundtrip() -> TestResult {
    let n = 100usize;
    let p = super::heap::kmalloc(n);
    check!(!p.is_null(), "(Heap) kmalloc({}) falhou", n);

    // SAFETY: bloco recém-alocado de n bytes.
    unsafe {
        for i in 0..n {
            *p.add(i) = (i % 251) as u8;
        }
        for i in 0..n {
            check!(
                *p.add(i) == (i % 251) as u8,
                "(Heap) byte {} corrompido",
                i
            );
        }
    }
    super::heap::kfree(p);
    TestResult::Passed
}

fn test_heap_no_overlap() -> TestResult {
    // Várias alocações vivas não podem se sobrepor.
    let sizes = [16usize, 64, 100, 500, 4096, 70000];
    let mut blocks: Vec<(usize, usize)> = Vec::new();
    let mut ptrs: Vec<*mut u8> = Vec::new();

    for &sz in &sizes {
        let p = super::heap::kmalloc(sz);
        check!(!p.is_null(), "(Heap) kmalloc({}) falhou", sz);
        blocks.push((p as usize, sz));
        ptrs.push(p);
    }

    for (i, &(a_start, a_len)) in blocks.iter().enumerate() {
        for &(b_start, b_len) in blocks.iter().skip(i + 1) {
            let disjoint = a_start + a_len <= b_start || b_start + b_len <= a_start;
            check!(disjoint, "(Heap) blocos sobrepostos");
        }
    }

    for p in ptrs {
        super::heap::kfree(p);
    }
    TestResult::Passed
}

fn test_heap_realloc_calloc() -> TestResult {
    // realloc preserva o conteúdo ao crescer.
    let p = super::heap::kmalloc(32);
    check!(!p.is_null(), "(Heap) kmalloc(32) falhou");
    // SAFETY: 32 bytes válidos.
    unsafe {
        for i in 0..32 {
            *p.add(i) = i as u8;
        }
    }
    let q = super::heap::krealloc(p, 4000);
    check!(!q.is_null(), "(Heap) krealloc falhou");
    // SAFETY: krealloc copiou os 32 bytes originais.
    unsafe {
        for i in 0..32 {
            check!(*q.add(i) == i as u8, "(Heap) realloc perdeu byte {}", i);
        }
    }
    super::heap::kfree(q);

    // calloc devolve memória zerada.
    let z = super::heap::kcalloc(16, 33);
    check!(!z.is_null(), "(Heap) kcalloc falhou");
    // SAFETY: 16*33 bytes válidos e zerados.
    unsafe {
        for i in 0..16 * 33 {
            check!(*z.add(i) == 0, "(Heap) calloc não zerou byte {}", i);
        }
    }
    super::heap::kfree(z);
    TestResult::Passed
}
