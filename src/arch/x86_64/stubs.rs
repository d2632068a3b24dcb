//! Stubs de Entrada de Interrupção em Assembly.
//!
//! Um stub por vetor de interesse (exceções 0-19, IRQs 32-47, syscall 128 e
//! um catch-all). Cada stub empilha um código de erro falso quando a CPU não
//! empilhou um real, empilha o número do vetor e salta para o trampolim comum
//! que salva os registradores e chama o despachante de alto nível com um
//! ponteiro para o `IntrFrame` residente na stack.
//!
//! Implementação usando `naked_asm!` dentro de funções `#[unsafe(naked)]`.

use crate::interrupts::IntrFrame;
use core::arch::naked_asm;

/// Stub para vetores SEM código de erro (push 0 manual para alinhar o frame).
macro_rules! intr_stub {
    ($name:ident, $vec:expr) => {
        #[unsafe(naked)]
        pub extern "C" fn $name() {
            naked_asm!(
                "push 0",          // Fake error code para frame uniforme
                "push {vec}",
                "jmp {common}",
                vec = const $vec,
                common = sym intr_common,
            );
        }
    };
}

/// Stub para exceções que JÁ empilham código de erro (ex: Page Fault).
macro_rules! intr_stub_err {
    ($name:ident, $vec:expr) => {
        #[unsafe(naked)]
        pub extern "C" fn $name() {
            naked_asm!(
                // Error code já está na stack (empilhado pela CPU)
                "push {vec}",
                "jmp {common}",
                vec = const $vec,
                common = sym intr_common,
            );
        }
    };
}

/// Trampolim comum: salva registradores gerais, chama o despachante Rust com
/// RDI apontando para o frame, restaura tudo e retorna com `iretq`.
#[unsafe(naked)]
pub extern "C" fn intr_common() {
    naked_asm!(
        "push rbp",
        "push r15", "push r14", "push r13", "push r12",
        "push r11", "push r10", "push r9",  "push r8",
        "push rdi", "push rsi", "push rdx", "push rcx", "push rbx", "push rax",

        "mov rdi, rsp",   // Arg 1: ponteiro para o IntrFrame na stack
        "cld",            // System V ABI exige DF=0
        "call {dispatch}",

        "pop rax", "pop rbx", "pop rcx", "pop rdx", "pop rsi", "pop rdi",
        "pop r8",  "pop r9",  "pop r10", "pop r11",
        "pop r12", "pop r13", "pop r14", "pop r15",
        "pop rbp",
        "add rsp, 16",    // Remover vetor + código de erro
        "iretq",
        dispatch = sym dispatch_trampoline,
    );
}

/// Ponte com ABI C entre o assembly e o núcleo de despacho.
extern "C" fn dispatch_trampoline(frame: *mut IntrFrame) {
    // SAFETY: o trampolim comum sempre passa um ponteiro válido para o frame
    // construído na stack de interrupção; ele vive durante toda a chamada.
    unsafe {
        crate::interrupts::dispatch(&mut *frame);
    }
}

// --- Exceções da CPU (0-19) ---

intr_stub!(exc0_divide, 0);
intr_stub!(exc1_debug, 1);
intr_stub!(exc2_nmi, 2);
intr_stub!(exc3_breakpoint, 3);
intr_stub!(exc4_overflow, 4);
intr_stub!(exc5_bound, 5);
intr_stub!(exc6_invalid_opcode, 6);
intr_stub!(exc7_no_device, 7);
intr_stub_err!(exc8_double_fault, 8);
intr_stub!(exc9_coproc_overrun, 9);
intr_stub_err!(exc10_invalid_tss, 10);
intr_stub_err!(exc11_segment_missing, 11);
intr_stub_err!(exc12_stack_fault, 12);
intr_stub_err!(exc13_gpf, 13);
intr_stub_err!(exc14_page_fault, 14);
intr_stub!(exc15_reserved, 15);
intr_stub!(exc16_fpu, 16);
intr_stub_err!(exc17_alignment, 17);
intr_stub!(exc18_machine_check, 18);
intr_stub!(exc19_simd, 19);

// --- IRQs remapeadas (32-47) ---

intr_stub!(irq0_entry, 32);
intr_stub!(irq1_entry, 33);
intr_stub!(irq2_entry, 34);
intr_stub!(irq3_entry, 35);
intr_stub!(irq4_entry, 36);
intr_stub!(irq5_entry, 37);
intr_stub!(irq6_entry, 38);
intr_stub!(irq7_entry, 39);
intr_stub!(irq8_entry, 40);
intr_stub!(irq9_entry, 41);
intr_stub!(irq10_entry, 42);
intr_stub!(irq11_entry, 43);
intr_stub!(irq12_entry, 44);
intr_stub!(irq13_entry, 45);
intr_stub!(irq14_entry, 46);
intr_stub!(irq15_entry, 47);

// --- Interrupção de software (syscall) e catch-all ---

intr_stub!(syscall_entry, 128);

/// Entry point default: qualquer vetor sem stub dedicado reporta-se como 255.
intr_stub!(default_entry, 255);

/// Tabela estática (vetor, entry point) usada pelo núcleo de despacho para
/// popular a IDT no boot.
pub static ENTRY_TABLE: &[(u8, extern "C" fn())] = &[
    (0, exc0_divide),
    (1, exc1_debug),
    (2, exc2_nmi),
    (3, exc3_breakpoint),
    (4, exc4_overflow),
    (5, exc5_bound),
    (6, exc6_invalid_opcode),
    (7, exc7_no_device),
    (8, exc8_double_fault),
    (9, exc9_coproc_overrun),
    (10, exc10_invalid_tss),
    (11, exc11_segment_missing),
    (12, exc12_stack_fault),
    (13, exc13_gpf),
    (14, exc14_page_fault),
    (15, exc15_reserved),
    (16, exc16_fpu),
    (17, exc17_alignment),
    (18, exc18_machine_check),
    (19, exc19_simd),
    (32, irq0_entry),
    (33, irq1_entry),
    (34, irq2_entry),
    (35, irq3_entry),
    (36, irq4_entry),
    (37, irq5_entry),
    (38, irq6_entry),
    (39, irq7_entry),
    (40, irq8_entry),
    (41, irq9_entry),
    (42, irq10_entry),
    (43, irq11_entry),
    (44, irq12_entry),
    (45, irq13_entry),
    (46, irq14_entry),
    (47, irq15_entry),
    (128, syscall_entry),
    (255, default_entry),
];
