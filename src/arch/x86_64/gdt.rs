/// Arquivo: x86_64/gdt.rs
///
/// Propósito: Gerenciamento da Global Descriptor Table (GDT).
/// A GDT é usada para definir segmentos de memória (Código/Dados) para Kernel
/// e Usuário. Em modo longo a segmentação é essencialmente plana, mas a tabela
/// ainda precisa existir para os seletores usados pela IDT.
///
/// Detalhes de Implementação:
/// - Define seletores para Kernel Code/Data e User Code/Data.
/// - Inicializa a GDT estática uma única vez no boot.
/// - Implementa o carregamento da GDT (`lgdt`) e recarregamento dos
///   registradores de segmento.
use core::arch::asm;
use core::mem::size_of;

/// Seletor de segmento
#[derive(Debug, Clone, Copy)]
#[repr(transparent)]
pub struct SegmentSelector(pub u16);

impl SegmentSelector {
    pub const fn new(index: u16, rpl: u8) -> Self {
        Self((index << 3) | (rpl as u16))
    }
}

/// Constantes de seletores
// Index 0: Null
// Index 1: Kernel Code
// Index 2: Kernel Data
// Index 3: User Data
// Index 4: User Code
pub const KERNEL_CODE_SEL: SegmentSelector = SegmentSelector::new(1, 0);
pub const KERNEL_DATA_SEL: SegmentSelector = SegmentSelector::new(2, 0);
pub const USER_DATA_SEL: SegmentSelector = SegmentSelector::new(3, 3);
pub const USER_CODE_SEL: SegmentSelector = SegmentSelector::new(4, 3);

/// Entrada da GDT (64-bit)
#[derive(Debug, Clone, Copy)]
#[repr(C, packed)]
pub struct GdtEntry {
    limit_low: u16,
    base_low: u16,
    base_mid: u8,
    access: u8,
    flags_limit_high: u8,
    base_high: u8,
}

impl GdtEntry {
    pub const fn null() -> Self {
        Self {
            limit_low: 0,
            base_low: 0,
            base_mid: 0,
            access: 0,
            flags_limit_high: 0,
            base_high: 0,
        }
    }

    pub const fn kernel_code() -> Self {
        Self {
            limit_low: 0xFFFF,
            base_low: 0,
            base_mid: 0,
            access: 0x9A,           // Present, Ring 0, Code, Readable
            flags_limit_high: 0xAF, // Long mode, limit high
            base_high: 0,
        }
    }

    pub const fn kernel_data() -> Self {
        Self {
            limit_low: 0xFFFF,
            base_low: 0,
            base_mid: 0,
            access: 0x92, // Present, Ring 0, Data, Writable
            flags_limit_high: 0xCF,
            base_high: 0,
        }
    }

    pub const fn user_data() -> Self {
        Self {
            limit_low: 0xFFFF,
            base_low: 0,
            base_mid: 0,
            access: 0xF2, // Present, Ring 3, Data, Writable
            flags_limit_high: 0xCF,
            base_high: 0,
        }
    }

    pub const fn user_code() -> Self {
        Self {
            limit_low: 0xFFFF,
            base_low: 0,
            base_mid: 0,
            access: 0xFA,           // Present, Ring 3, Code, Readable
            flags_limit_high: 0xAF, // Long mode
            base_high: 0,
        }
    }
}

/// Ponteiro passado para a instrução `lgdt`
#[repr(C, packed)]
struct GdtPointer {
    limit: u16,
    base: u64,
}

/// A tabela propriamente dita. Construída uma vez no boot e nunca alterada.
static mut GDT: [GdtEntry; 5] = [
    GdtEntry::null(),
    GdtEntry::kernel_code(),
    GdtEntry::kernel_data(),
    GdtEntry::user_data(),
    GdtEntry::user_code(),
];

/// Carrega a GDT e recarrega os registradores de segmento.
///
/// # Safety
/// Deve ser chamada apenas uma vez, no boot, com interrupções desabilitadas.
pub unsafe fn init() {
    let ptr = GdtPointer {
        limit: (size_of::<[GdtEntry; 5]>() - 1) as u16,
        base: &raw const GDT as u64,
    };

    asm!("lgdt [{}]", in(reg) &ptr, options(nostack, preserves_flags));

    // Recarregar CS via far-return e os registradores de dados diretamente.
    asm!(
        "push {code_sel}",
        "lea rax, [rip + 2f]",
        "push rax",
        "retfq",
        "2:",
        "mov ax, {data_sel:x}",
        "mov ds, ax",
        "mov es, ax",
        "mov ss, ax",
        "xor eax, eax",
        "mov fs, ax",
        "mov gs, ax",
        code_sel = const 0x08u64,
        data_sel = in(reg) KERNEL_DATA_SEL.0,
        out("rax") _,
    );

    crate::kdebug!("(GDT) Carregada ({} entradas)", 5);
}
