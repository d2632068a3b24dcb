//! Interface Abstrata de CPU (HAL).
//! Define as operações que qualquer arquitetura deve implementar.

pub trait CpuOps {
    /// Para a execução da CPU até a próxima interrupção (instrução HLT).
    /// Economiza energia em loops ociosos.
    fn halt();

    /// Desabilita interrupções globalmente (CLI).
    /// Crítico para seções atômicas no kernel.
    fn disable_interrupts();

    /// Habilita interrupções globalmente (STI).
    fn enable_interrupts();

    /// Verifica se as interrupções estão habilitadas.
    fn interrupts_enabled() -> bool;

    /// Restaura o estado anterior de interrupções capturado com
    /// `interrupts_enabled()`. NÃO habilita incondicionalmente: isso permite
    /// aninhar seções críticas chamadas de contextos que já estavam com
    /// interrupções desabilitadas.
    fn restore_interrupts(enabled: bool) {
        if enabled {
            Self::enable_interrupts();
        }
    }

    /// Entra em loop infinito de halt com interrupções desabilitadas.
    /// Usado em pânicos irrecuperáveis.
    fn hang() -> ! {
        Self::disable_interrupts();
        loop {
            Self::halt();
        }
    }
}
