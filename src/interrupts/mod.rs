//! Núcleo de Despacho de Interrupções.
//!
//! Dono dos 256 vetores da IDT, da programação do PIC 8259 e do protocolo de
//! EOI (End-Of-Interrupt). Todo stub de entrada em assembly converge para
//! `dispatch`, que roteia exceções da CPU, IRQs remapeadas e interrupções de
//! software para callbacks registrados numa tabela process-wide.
//!
//! # Semântica
//! - Exceção da CPU (vetor < 32) sem handler registrado: FATAL (panic com
//!   dump de registradores). Um kernel que não sabe tratar a própria falha
//!   não pode continuar.
//! - IRQ/vetor de software sem handler: loga "interrupção não tratada" e
//!   segue a vida — dispositivo espúrio ou não configurado não derruba o
//!   sistema.
//! - IRQs devem EOI: o despacho marca o débito num latch global de dois
//!   estados e quita ao final, a menos que o driver tenha quitado antes via
//!   `end_of_irq` (que é idempotente).
//! - IRQ 7/15 espúrias são verificadas no ISR do PIC antes do despacho
//!   normal; IRQ 15 espúria ainda quita o master (que viu a cascata).

pub mod pic;

#[cfg(feature = "self_test")]
pub mod test;

use crate::arch::platform::idt::{GateKind, Idt};
use crate::arch::platform::stubs;
use crate::arch::{Cpu, CpuOps};
use crate::sync::Spinlock;
use core::ptr;
use core::sync::atomic::{AtomicPtr, AtomicU8, Ordering};

/// Primeiro vetor das IRQs remapeadas.
pub const IRQ_OFFSET: u8 = 32;
/// Vetor da interrupção de software de syscall (DPL 3).
pub const SYSCALL_VECTOR: u8 = 128;
/// Vetor reportado pelo stub default (catch-all).
pub const DEFAULT_VECTOR: u8 = 255;

/// O vetor é uma IRQ de hardware remapeada?
#[inline]
pub fn is_irq(vector: u8) -> bool {
    (IRQ_OFFSET..IRQ_OFFSET + 16).contains(&vector)
}

/// Nomes das exceções da CPU (vetores 0-19), usados no diagnóstico fatal.
pub static EXCEPTION_NAMES: [&str; 20] = [
    "divide error",
    "debug",
    "non-maskable interrupt",
    "breakpoint",
    "overflow",
    "bound range exceeded",
    "invalid opcode",
    "device not available",
    "double fault",
    "coprocessor segment overrun",
    "invalid TSS",
    "segment not present",
    "stack-segment fault",
    "general protection fault",
    "page fault",
    "reserved",
    "x87 floating-point error",
    "alignment check",
    "machine check",
    "SIMD floating-point exception",
];

fn exception_name(vector: u8) -> &'static str {
    EXCEPTION_NAMES
        .get(vector as usize)
        .copied()
        .unwrap_or("reserved")
}

/// Snapshot transiente dos registradores no momento da interrupção.
///
/// Construído pelo stub de entrada na stack de interrupção; vive apenas
/// durante uma chamada de `dispatch`. O layout espelha exatamente a ordem
/// dos pushes do trampolim comum.
#[repr(C)]
#[derive(Debug, Default, Clone, Copy)]
pub struct IntrFrame {
    pub rax: u64,
    pub rbx: u64,
    pub rcx: u64,
    pub rdx: u64,
    pub rsi: u64,
    pub rdi: u64,
    pub r8: u64,
    pub r9: u64,
    pub r10: u64,
    pub r11: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub rbp: u64,
    /// Número do vetor (empilhado pelo stub).
    pub vector: u64,
    /// Código de erro de hardware, ou 0 falso para vetores sem código.
    pub error_code: u64,
    /// Empilhados pela CPU no momento da interrupção.
    pub rip: u64,
    pub cs: u64,
    pub rflags: u64,
    pub rsp: u64,
    pub ss: u64,
}

/// Callback de alto nível para um vetor. Recebe o número do vetor e o frame
/// (somente leitura) da interrupção corrente.
pub type IntrHandler = fn(u8, &IntrFrame);

/// Tabela process-wide de handlers, um slot por vetor.
/// Mutação apenas via `register`, sempre com interrupções desabilitadas.
static HANDLERS: Spinlock<[Option<IntrHandler>; 256]> = Spinlock::new([None; 256]);

/// Latch global de EOI devido: 0 = nenhum, senão o vetor devedor.
/// Escopo: a duração de um único dispatch.
static EOI_PENDING: AtomicU8 = AtomicU8::new(0);

/// Ponteiro de debug para o frame da interrupção corrente (nulo fora de
/// dispatch). Uso exclusivo do panic handler.
static CUR_FRAME: AtomicPtr<IntrFrame> = AtomicPtr::new(ptr::null_mut());

/// A IDT propriamente dita. Construída uma única vez em `init` e carregada
/// no IDTR; depois disso nunca é alterada.
static IDT: spin::Once<Idt> = spin::Once::new();

/// Inicializa o núcleo de interrupções.
///
/// 1. Todos os 256 vetores recebem o entry point default (nenhum vetor fica
///    sem entrada válida antes de interrupções serem habilitadas).
/// 2. Os stubs dedicados da tabela estática são instalados por cima:
///    exceções 0-19 e IRQs como interrupt gates, vetores de software como
///    trap gates, e o vetor de syscall com DPL 3 (chamável do ring 3).
/// 3. O PIC é reprogramado para colocar as IRQs 0-15 nos vetores 32-47.
/// 4. O latch de EOI é zerado.
///
/// # Safety
/// Deve ser chamada uma única vez no boot, com interrupções desabilitadas.
pub unsafe fn init() {
    let idt = IDT.call_once(|| {
        let mut idt = Idt::new();

        let default_entry = stubs::ENTRY_TABLE
            .iter()
            .find(|(v, _)| *v == DEFAULT_VECTOR)
            .map(|(_, f)| *f as usize as u64)
            .expect("tabela de stubs sem entry default");

        for vector in 0..=255u8 {
            let kind = gate_kind_for(vector);
            idt.set_entry(vector, default_entry, kind, 0);
        }

        for &(vector, entry) in stubs::ENTRY_TABLE {
            let kind = gate_kind_for(vector);
            let dpl = if vector == SYSCALL_VECTOR { 3 } else { 0 };
            idt.set_entry(vector, entry as usize as u64, kind, dpl);
        }

        idt
    });

    idt.load();

    // Remapear IRQs [0,15] para os vetores [32,47].
    pic::init();
    EOI_PENDING.store(0, Ordering::SeqCst);

    crate::kinfo!("(INTR) IDT carregada, PIC remapeado para 32-47");
}

/// Exceções e IRQs usam interrupt gates (IF limpo na entrada); interrupções
/// de software usam trap gates.
fn gate_kind_for(vector: u8) -> GateKind {
    if vector >= 32 && !is_irq(vector) {
        GateKind::Trap
    } else {
        GateKind::Interrupt
    }
}

/// Instala (ou limpa, com `None`) o handler de alto nível de um vetor.
///
/// A escrita na tabela acontece com interrupções desabilitadas (spinlock),
/// então um handler nunca observa o slot pela metade.
pub fn register(vector: u8, handler: Option<IntrHandler>) {
    HANDLERS.lock()[vector as usize] = handler;
}

/// Frame da interrupção corrente, se estivermos dentro de um dispatch.
/// Apenas para introspecção de diagnóstico (panic dump).
pub fn current_frame() -> Option<&'static IntrFrame> {
    let p = CUR_FRAME.load(Ordering::SeqCst);
    if p.is_null() {
        None
    } else {
        // SAFETY: o ponteiro só é não-nulo durante um dispatch, quando o
        // frame está vivo na stack de interrupção.
        Some(unsafe { &*p })
    }
}

/// Vetor atualmente devendo EOI (0 = nenhum). Exposição para self-tests.
pub fn eoi_pending() -> u8 {
    EOI_PENDING.load(Ordering::SeqCst)
}

/// Função chamada por todos os entry points de interrupção — nunca
/// diretamente. Roteia para o handler registrado e quita o EOI ao final.
pub fn dispatch(frame: &mut IntrFrame) {
    CUR_FRAME.store(frame as *mut IntrFrame, Ordering::SeqCst);

    let vector = frame.vector as u8;

    if is_irq(vector) {
        let irq = vector - IRQ_OFFSET;

        // IRQ 7/15 levantadas pelo controlador sem fonte real: verificar o
        // In-Service Register antes de prosseguir, senão mandaríamos EOI
        // para uma interrupção fantasma.
        if (irq == 7 || irq == 15) && pic::is_spurious(irq) {
            crate::kwarn!("(INTR) IRQ {} espúria ignorada", irq);
            if irq == 15 {
                // O master viu a cascata de verdade e precisa do ack.
                pic::eoi_master();
            }
            CUR_FRAME.store(ptr::null_mut(), Ordering::SeqCst);
            return;
        }

        EOI_PENDING.store(vector, Ordering::SeqCst);
    }

    // Copiar o handler para fora da tabela antes de chamar: o handler pode
    // legitimamente chamar `register` (inclusive para si mesmo).
    let handler = HANDLERS.lock()[vector as usize];

    match handler {
        Some(func) => func(vector, frame),
        None => {
            if vector < 32 {
                panic!(
                    "exceção não tratada {} ({}), código de erro: {:#x}",
                    vector,
                    exception_name(vector),
                    frame.error_code
                );
            }
            crate::kwarn!("(INTR) interrupção não tratada: {}", vector);
        }
    }

    // Quitar o EOI com interrupções desabilitadas, caso o handler as tenha
    // reabilitado (trap gates preservam o IF do contexto interrompido).
    Cpu::disable_interrupts();
    let pending = EOI_PENDING.load(Ordering::SeqCst);
    if pending != 0 {
        end_of_irq(pending - IRQ_OFFSET);
    }

    CUR_FRAME.store(ptr::null_mut(), Ordering::SeqCst);
}

/// Quita o EOI de uma IRQ. Drivers podem chamar no meio do handler para
/// reconhecer cedo; a segunda quitação (no final do dispatch) vira no-op.
///
/// Preserva o estado de interrupções do chamador.
pub fn end_of_irq(irq: u8) {
    let enabled = Cpu::interrupts_enabled();
    Cpu::disable_interrupts();

    if EOI_PENDING.swap(0, Ordering::SeqCst) == 0 {
        // Nada devido: idempotente por contrato.
        Cpu::restore_interrupts(enabled);
        return;
    }

    pic::notify_eoi(irq);
    Cpu::restore_interrupts(enabled);
}

/// Mascara uma IRQ individual no controlador.
pub fn mask_irq(irq: u8) {
    pic::mask_irq(irq);
}

/// Desmascara uma IRQ individual no controlador.
pub fn unmask_irq(irq: u8) {
    pic::unmask_irq(irq);
}
