//! Framework de testes do kernel.
//!
//! O crate é compilado com `harness = false`: não existe runner hospedado.
//! Cada subsistema expõe uma suite executada no boot quando a feature
//! `self_test` está ativa; os resultados saem pela serial.

/// Resultado de teste
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TestResult {
    Passed,
    Failed,
    Skipped,
}

/// Um caso de teste
pub struct TestCase {
    pub name: &'static str,
    pub func: fn() -> TestResult,
}

/// Executa suite de testes. Retorna (passed, failed, skipped).
pub fn run_test_suite(name: &str, tests: &[TestCase]) -> (usize, usize, usize) {
    crate::kinfo!("=== Executando suite: {} ===", name);

    let mut passed = 0;
    let mut failed = 0;
    let mut skipped = 0;

    for test in tests {
        let result = (test.func)();
        match result {
            TestResult::Passed => {
                crate::kinfo!("[PASS] {}", test.name);
                passed += 1;
            }
            TestResult::Failed => {
                crate::kerror!("[FAIL] {}", test.name);
                failed += 1;
            }
            TestResult::Skipped => {
                crate::kwarn!("[SKIP] {}", test.name);
                skipped += 1;
            }
        }
    }

    crate::kinfo!(
        "=== {} : passed={} failed={} skipped={} ===",
        name,
        passed,
        failed,
        skipped
    );
    (passed, failed, skipped)
}

/// Executa todas as suites de self-test do kernel.
///
/// Qualquer falha derruba o boot com panic: um kernel que não passa nos
/// próprios testes de integridade não deve continuar.
pub fn run_all() {
    crate::kinfo!("╔════════════════════════════════════════╗");
    crate::kinfo!("║        SELF TESTS DO KERNEL            ║");
    crate::kinfo!("╚════════════════════════════════════════╝");

    let mut failed = 0;

    failed += crate::interrupts::test::run().1;
    failed += crate::mm::test::run().1;
    failed += crate::fs::test::run().1;

    if failed > 0 {
        panic!("self tests falharam: {}", failed);
    }

    crate::kinfo!("╔════════════════════════════════════════╗");
    crate::kinfo!("║     TODOS OS SELF TESTS PASSARAM       ║");
    crate::kinfo!("╚════════════════════════════════════════╝");
}
