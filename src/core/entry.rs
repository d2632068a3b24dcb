//! Entry Point Lógico do Kernel.
//!
//! Este módulo contém a função `kernel_main`, o primeiro código Rust de alto
//! nível a ser executado após o trampolim em assembly (`_start`).
//!
//! # Responsabilidades
//! 1. **Validação**: Verifica se o Bootloader passou informações coerentes.
//! 2. **Orquestração**: Inicializa subsistemas na ordem estrita de dependência
//!    (Arch -> Interrupções -> Memória -> Dispositivos -> Filesystem).
//! 3. **Transição**: Habilita interrupções e entra no loop ocioso.

use crate::arch::{Cpu, CpuOps};
use crate::core::handoff::{BootInfo, BOOT_MAGIC};
use alloc::sync::Arc;

/// Função principal do Kernel (High-Level).
///
/// Chamada pelo `_start` (assembly) com a stack já configurada.
/// Esta função **não deve retornar** (o tipo de retorno é `!`).
pub extern "C" fn kernel_main(boot_info: &'static BootInfo) -> ! {
    // 1. Sanity Check (Validação de Sanidade)
    // Se a magia falhar, não podemos confiar em nada. Travamos imediatamente.
    if boot_info.magic != BOOT_MAGIC {
        Cpu::hang();
    }

    // 2. Inicializar Serial + Logs
    // A partir daqui, podemos usar kinfo!, kwarn!, kerror!.
    crate::drivers::serial::init();
    crate::kinfo!("Ember Kernel - Iniciando");
    crate::kinfo!("Protocolo de Boot v{}", boot_info.version);

    // 3. Inicializar Arquitetura (GDT) e o Núcleo de Interrupções (IDT + PIC)
    // Crítico fazer isso antes de qualquer operação que possa gerar falhas.
    crate::kinfo!("Inicializando Arquitetura (GDT/IDT/PIC)...");
    unsafe {
        crate::arch::platform::gdt::init();
        crate::interrupts::init();
    }

    // 4. Gerenciamento de Memória (PMM + Heap)
    // Valida o mapa de memória, constrói o bitmap de páginas e habilita o
    // uso de `Box`, `Vec`, `Arc` (o heap puxa páginas sob demanda).
    crate::kinfo!("Inicializando Memória (PMM/Heap)...");
    crate::mm::init(boot_info);

    // 5. Dispositivos de Bloco
    // Se o bootloader carregou uma imagem de disco, ela vira um ramdisk.
    if boot_info.boot_image_addr != 0 && boot_info.boot_image_size != 0 {
        // SAFETY: o bootloader garante que a imagem está em memória válida e
        // fora das faixas entregues ao PMM.
        let image = unsafe {
            core::slice::from_raw_parts(
                boot_info.boot_image_addr as *const u8,
                boot_info.boot_image_size as usize,
            )
        };
        let disk = Arc::new(crate::drivers::block::Ramdisk::from_image(image.to_vec()));
        crate::drivers::block::register_device(disk);
    }

    // 6. Sistema de Arquivos (VFS raiz + montagens)
    crate::fs::init();

    // 7. Self Tests (quando habilitados)
    #[cfg(feature = "self_test")]
    crate::core::test::run_all();

    // 8. O Grande Salto (Enable Interrupts)
    crate::kinfo!("Habilitando Interrupções - Sistema Ativo");
    // SAFETY: IDT carregada e PIC remapeado; habilitar interrupções é seguro.
    Cpu::enable_interrupts();

    // Loop ocioso: a CPU dorme até a próxima interrupção.
    loop {
        Cpu::halt();
    }
}
