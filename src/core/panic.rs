//! Panic Handler.
//!
//! O "Airbag" do sistema. Quando o Rust detecta um estado irrecuperável,
//! esta função é chamada.
//!
//! # Comportamento
//! 1. Desabilita interrupções (evita loop de panics).
//! 2. Loga o erro na Serial com dump estruturado de registradores.
//! 3. Se houver um frame de interrupção ativo, também o imprime.
//! 4. Trava a CPU (hlt loop) para sempre. Nunca há recuperação.

use crate::arch::platform::cpu;
use crate::arch::{Cpu, CpuOps};
use core::panic::PanicInfo;

#[panic_handler]
fn panic(info: &PanicInfo) -> ! {
    // 1. Segurança imediata: parar interrupções
    Cpu::disable_interrupts();

    // 2. Log estruturado (Serial é o mais confiável aqui)
    crate::kerror!("================ KERNEL PANIC ================");

    if let Some(location) = info.location() {
        crate::kerror!("Location: {}:{}", location.file(), location.line());
    } else {
        crate::kerror!("Location: Unknown");
    }

    crate::kerror!("Reason:   {}", info.message());

    // 3. Dump de registradores
    let regs = cpu::snapshot_registers();
    crate::kerror!("Registers:");
    crate::kerror!("  rsp: {:#018x}  rbp: {:#018x}", regs.rsp, regs.rbp);
    crate::kerror!("  rflags: {:#x}", regs.rflags);
    crate::kerror!(
        "  cs: {:#x} ({}|{})  ss: {:#x} ({}|{})",
        regs.cs,
        regs.cs >> 3,
        regs.cs & 3,
        regs.ss,
        regs.ss >> 3,
        regs.ss & 3
    );
    crate::kerror!(
        "  cr0: {:#x}  cr2: {:#x}  cr3: {:#x}",
        regs.cr0,
        regs.cr2,
        regs.cr3
    );

    // 4. Se estávamos dentro de uma interrupção, o frame diz onde
    if let Some(frame) = crate::interrupts::current_frame() {
        crate::kerror!("Interrupt frame:");
        crate::kerror!(
            "  vector: {}  error: {:#x}  rip: {:#018x}",
            frame.vector,
            frame.error_code,
            frame.rip
        );
        crate::kerror!(
            "  rax: {:#018x}  rbx: {:#018x}  rcx: {:#018x}",
            frame.rax,
            frame.rbx,
            frame.rcx
        );
        crate::kerror!(
            "  rdx: {:#018x}  rsi: {:#018x}  rdi: {:#018x}",
            frame.rdx,
            frame.rsi,
            frame.rdi
        );
    }

    crate::kerror!("==============================================");

    // 5. Morrer com dignidade
    Cpu::hang();
}
