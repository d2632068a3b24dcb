//! Testes do subsistema de arquivos.
//!
//! Cobrem o switch (montagem, cwd, validação de tipo), o backend em memória
//! (criação, escrita, remoção, renomeação) e o backend FAT de ponta a ponta,
//! usando uma imagem FAT12 sintética montada num ramdisk.

use super::vfs;
use super::{FsError, NodeKind, OpenFlags, Whence};
use crate::core::test::{run_test_suite, TestCase, TestResult};
use crate::drivers::block::Ramdisk;
use alloc::string::String;
use alloc::sync::Arc;
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

/// Executa a suite de filesystem. Retorna (passed, failed, skipped).
pub fn run() -> (usize, usize, usize) {
    run_test_suite(
        "fs",
        &[
            TestCase {
                name: "raiz_dupla_falha",
                func: test_double_root_mount,
            },
            TestCase {
                name: "roundtrip_escrita_leitura",
                func: test_write_read_roundtrip,
            },
            TestCase {
                name: "caminho_inexistente",
                func: test_missing_path,
            },
            TestCase {
                name: "chdir_semantica",
                func: test_chdir,
            },
            TestCase {
                name: "validacao_de_tipo",
                func: test_type_validation,
            },
            TestCase {
                name: "remocao_e_renomeacao",
                func: test_remove_rename,
            },
            TestCase {
                name: "seek_e_tell",
                func: test_seek_tell,
            },
            TestCase {
                name: "fat12_ponta_a_ponta",
                func: test_fat12_end_to_end,
            },
        ],
    )
}

fn test_double_root_mount() -> TestResult {
    // A raiz foi montada em fs::init; a segunda tentativa tem que falhar
    // sem mexer em nada.
    check!(vfs::has_root(), "(FS) raiz ausente");
    let before = vfs::getcwd();

    match vfs::mount(None, 0, 0, None) {
        Err(FsError::Busy) => {}
        other => {
            crate::kerror!("(FS) segunda montagem de raiz: ok={}", other.is_ok());
            return TestResult::Failed;
        }
    }
    check!(vfs::getcwd() == before, "(FS) cwd mudou após mount falhado");
    check!(
        vfs::open("/", OpenFlags::empty()).is_ok(),
        "(FS) raiz inacessível"
    );
    TestResult::Passed
}

fn test_write_read_roundtrip() -> TestResult {
    let payload: Vec<u8> = (0..100u8).collect();

    // Criar, escrever 100 bytes, fechar.
    let mut node = match vfs::open("/foo.txt", OpenFlags::CREATE) {
        Ok(n) => n,
        Err(e) => {
            crate::kerror!("(FS) create /foo.txt: {}", e);
            return TestResult::Failed;
        }
    };
    check!(
        node.write(&payload) == Ok(100),
        "(FS) escrita parcial em /foo.txt"
    );
    vfs::close(node);

    // Reabrir e ler de volta.
    let mut node = match vfs::open("/foo.txt", OpenFlags::empty()) {
        Ok(n) => n,
        Err(e) => {
            crate::kerror!("(FS) reabrir /foo.txt: {}", e);
            return TestResult::Failed;
        }
    };
    check!(node.filesize() == Ok(100), "(FS) filesize != 100");

    let mut back = [0u8; 128];
    let n = match node.read(&mut back) {
        Ok(n) => n,
        Err(e) => {
            crate::kerror!("(FS) leitura de /foo.txt: {}", e);
            return TestResult::Failed;
        }
    };
    check!(n == 100, "(FS) leu {} bytes em vez de 100", n);
    check!(back[..100] == payload[..], "(FS) conteúdo difere");

    // Leitura além do fim retorna 0.
    check!(node.read(&mut back) == Ok(0), "(FS) EOF não retornou 0");
    vfs::close(node);
    TestResult::Passed
}

fn test_missing_path() -> TestResult {
    // Componente intermediário inexistente falha com NotFound.
    match vfs::open("/a/b/c", OpenFlags::empty()) {
        Err(FsError::NotFound) => TestResult::Passed,
        other => {
            crate::kerror!("(FS) /a/b/c devia dar NotFound: ok={}", other.is_ok());
            TestResult::Failed
        }
    }
}

fn test_chdir() -> TestResult {
    // Preparar /dir/sub.
    let d = vfs::open("/dir", OpenFlags::CREATE | OpenFlags::DIR);
    check!(d.is_ok(), "(FS) criar /dir falhou");
    vfs::close(d.unwrap());
    let s = vfs::open("/dir/sub", OpenFlags::CREATE | OpenFlags::DIR);
    check!(s.is_ok(), "(FS) criar /dir/sub falhou");
    vfs::close(s.unwrap());

    check!(vfs::chdir("/dir").is_ok(), "(FS) chdir /dir falhou");
    check!(vfs::getcwd() == "/dir", "(FS) cwd = {}", vfs::getcwd());

    // Relativo anexa ao cwd.
    check!(vfs::chdir("sub").is_ok(), "(FS) chdir sub falhou");
    check!(vfs::getcwd() == "/dir/sub", "(FS) cwd = {}", vfs::getcwd());

    // "." é no-op.
    check!(vfs::chdir(".").is_ok(), "(FS) chdir . falhou");
    check!(vfs::getcwd() == "/dir/sub", "(FS) cwd mudou com .");

    // ".." recorta um componente.
    check!(vfs::chdir("..").is_ok(), "(FS) chdir .. falhou");
    check!(vfs::getcwd() == "/dir", "(FS) cwd = {}", vfs::getcwd());
    check!(vfs::chdir("..").is_ok(), "(FS) chdir .. para raiz falhou");
    check!(vfs::getcwd() == "/", "(FS) cwd = {}", vfs::getcwd());

    // ".." na raiz falha sem corromper o cwd.
    check!(vfs::chdir("..").is_err(), "(FS) chdir .. na raiz passou");
    check!(vfs::getcwd() == "/", "(FS) cwd corrompido: {}", vfs::getcwd());

    // chdir para algo que não é diretório deixa tudo intacto.
    check!(
        vfs::chdir("/foo.txt") == Err(FsError::NotDirectory),
        "(FS) chdir para arquivo devia falhar"
    );
    check!(vfs::getcwd() == "/", "(FS) cwd mudou em chdir falhado");
    TestResult::Passed
}

fn test_type_validation() -> TestResult {
    // Operações de arquivo num diretório (e vice-versa) falham no switch,
    // antes de chegar ao backend.
    let mut dir = match vfs::open("/dir", OpenFlags::empty()) {
        Ok(n) => n,
        Err(e) => {
            crate::kerror!("(FS) abrir /dir: {}", e);
            return TestResult::Failed;
        }
    };
    check!(dir.kind() == NodeKind::Dir, "(FS) /dir não é dir");
    let mut buf = [0u8; 8];
    check!(
        dir.read(&mut buf) == Err(FsError::NotFile),
        "(FS) read em dir devia falhar"
    );
    check!(
        dir.filesize() == Err(FsError::NotFile),
        "(FS) filesize em dir devia falhar"
    );
    vfs::close(dir);

    let mut file = match vfs::open("/foo.txt", OpenFlags::empty()) {
        Ok(n) => n,
        Err(e) => {
            crate::kerror!("(FS) abrir /foo.txt: {}", e);
            return TestResult::Failed;
        }
    };
    check!(
        matches!(file.readdir(), Err(FsError::NotDirectory)),
        "(FS) readdir em arquivo devia falhar"
    );
    vfs::close(file);

    // Criação exclusiva de algo que já existe.
    check!(
        matches!(
            vfs::open("/foo.txt", OpenFlags::CREATE | OpenFlags::EXCL),
            Err(FsError::Exists)
        ),
        "(FS) EXCL sobre existente devia falhar"
    );
    TestResult::Passed
}

fn test_remove_rename() -> TestResult {
    // Diretório com filho não pode ser removido.
    let mut dir = match vfs::open("/dir", OpenFlags::empty()) {
        Ok(n) => n,
        Err(e) => {
            crate::kerror!("(FS) abrir /dir: {}", e);
            return TestResult::Failed;
        }
    };
    check!(
        vfs::remove(&mut dir) == Err(FsError::NotEmpty),
        "(FS) remover dir não-vazio devia falhar"
    );
    vfs::close(dir);

    // Remover o filho, depois o diretório vazio.
    let mut sub = match vfs::open("/dir/sub", OpenFlags::empty()) {
        Ok(n) => n,
        Err(e) => {
            crate::kerror!("(FS) abrir /dir/sub: {}", e);
            return TestResult::Failed;
        }
    };
    check!(vfs::remove(&mut sub).is_ok(), "(FS) remover /dir/sub falhou");
    vfs::close(sub);

    let mut dir = match vfs::open("/dir", OpenFlags::empty()) {
        Ok(n) => n,
        Err(e) => {
            crate::kerror!("(FS) reabrir /dir: {}", e);
            return TestResult::Failed;
        }
    };
    check!(
        vfs::remove(&mut dir).is_ok(),
        "(FS) remover /dir vazio falhou"
    );
    vfs::close(dir);
    check!(
        matches!(vfs::open("/dir", OpenFlags::empty()), Err(FsError::NotFound)),
        "(FS) /dir ainda existe"
    );

    // Renomear um arquivo.
    let f = vfs::open("/old.txt", OpenFlags::CREATE);
    check!(f.is_ok(), "(FS) criar /old.txt falhou");
    let mut f = match f {
        Ok(n) => n,
        Err(_) => return TestResult::Failed,
    };
    check!(f.rename("new.txt").is_ok(), "(FS) rename falhou");
    vfs::close(f);
    check!(
        vfs::open("/new.txt", OpenFlags::empty()).is_ok(),
        "(FS) /new.txt não existe após rename"
    );
    check!(
        vfs::open("/old.txt", OpenFlags::empty()).is_err(),
        "(FS) /old.txt ainda existe após rename"
    );
    TestResult::Passed
}

fn test_seek_tell() -> TestResult {
    let mut f = match vfs::open("/foo.txt", OpenFlags::empty()) {
        Ok(n) => n,
        Err(e) => {
            crate::kerror!("(FS) abrir /foo.txt: {}", e);
            return TestResult::Failed;
        }
    };

    check!(f.seek(50, Whence::Set).is_ok(), "(FS) seek Set falhou");
    check!(f.tell() == Ok(50), "(FS) tell != 50");
    let mut buf = [0u8; 64];
    check!(f.read(&mut buf) == Ok(50), "(FS) leu além do fim");
    check!(buf[0] == 50, "(FS) seek caiu no byte errado");

    check!(f.seek(-10, Whence::End).is_ok(), "(FS) seek End falhou");
    check!(f.tell() == Ok(90), "(FS) tell != 90 após End-10");

    // Posição negativa é grampeada em zero.
    check!(f.seek(-1000, Whence::Cur).is_ok(), "(FS) seek Cur falhou");
    check!(f.tell() == Ok(0), "(FS) posição negativa não grampeada");

    vfs::close(f);
    TestResult::Passed
}

// =============================================================================
// FAT12 de ponta a ponta
// =============================================================================

const HELLO_CONTENT: &[u8] = b"Hello, world!";
const LFN_NAME: &str = "readme-long-name.txt";
const LFN_CONTENT: &[u8] = b"long filename in fat works";

fn test_fat12_end_to_end() -> TestResult {
    // Montar a imagem sintética num ramdisk, pendurada em /fat.
    let image = build_fat12_image();
    let disk: Arc<dyn crate::drivers::block::BlockDevice> = Arc::new(Ramdisk::from_image(image));

    let mountpoint = match vfs::open("/fat", OpenFlags::CREATE | OpenFlags::DIR) {
        Ok(n) => n,
        Err(e) => {
            crate::kerror!("(FS) criar /fat: {}", e);
            return TestResult::Failed;
        }
    };

    let mounts_before = vfs::mount_count();
    let mounted = vfs::mount(Some(disk), 0, IMG_SECTORS as u64, Some(&mountpoint));
    check!(mounted.is_ok(), "(FS) montar FAT12 falhou");
    check!(
        vfs::mount_count() == mounts_before + 1,
        "(FS) tabela de montagem não registrou a entrada"
    );
    vfs::close(mountpoint);

    // Abrir e ler HELLO.TXT através do mount point.
    let mut hello = match vfs::open("/fat/HELLO.TXT", OpenFlags::empty()) {
        Ok(n) => n,
        Err(e) => {
            crate::kerror!("(FS) abrir /fat/HELLO.TXT: {}", e);
            return TestResult::Failed;
        }
    };
    check!(
        hello.filesize() == Ok(HELLO_CONTENT.len() as u64),
        "(FS) HELLO.TXT filesize errado"
    );
    let mut buf = [0u8; 13];
    check!(
        hello.read(&mut buf) == Ok(13),
        "(FS) leitura de HELLO.TXT incompleta"
    );
    check!(&buf[..] == HELLO_CONTENT, "(FS) conteúdo de HELLO.TXT difere");
    // A 14ª leitura é EOF.
    let mut one = [0u8; 1];
    check!(hello.read(&mut one) == Ok(0), "(FS) EOF do FAT não retornou 0");
    vfs::close(hello);

    // Nomes longos: reconstrução de LFN + busca sem distinção de caixa.
    let mut lfn = match vfs::open("/fat/readme-long-name.txt", OpenFlags::empty()) {
        Ok(n) => n,
        Err(e) => {
            crate::kerror!("(FS) abrir LFN: {}", e);
            return TestResult::Failed;
        }
    };
    let mut lbuf = [0u8; 64];
    let n = lfn.read(&mut lbuf).unwrap_or(0);
    check!(&lbuf[..n] == LFN_CONTENT, "(FS) conteúdo do LFN difere");
    vfs::close(lfn);

    // readdir no diretório raiz do FAT lista as duas entradas.
    let mut dir = match vfs::open("/fat", OpenFlags::empty()) {
        Ok(n) => n,
        Err(e) => {
            crate::kerror!("(FS) abrir dir /fat: {}", e);
            return TestResult::Failed;
        }
    };
    check!(dir.kind() == NodeKind::Dir, "(FS) /fat não cruzou para o FAT");
    let mut names: Vec<String> = Vec::new();
    while let Ok(Some(ent)) = dir.readdir() {
        names.push(ent.name);
    }
    check!(
        names.iter().any(|n| n == "HELLO.TXT"),
        "(FS) readdir sem HELLO.TXT"
    );
    check!(
        names.iter().any(|n| n == LFN_NAME),
        "(FS) readdir sem o nome longo"
    );

    // rewinddir volta para a primeira entrada.
    check!(dir.rewinddir().is_ok(), "(FS) rewinddir falhou");
    check!(
        dir.readdir().ok().flatten().is_some(),
        "(FS) readdir vazio após rewind"
    );
    vfs::close(dir);

    // Escrita e remoção não são suportadas pelo backend FAT.
    let mut ro = match vfs::open("/fat/HELLO.TXT", OpenFlags::empty()) {
        Ok(n) => n,
        Err(_) => return TestResult::Failed,
    };
    check!(
        ro.write(b"x") == Err(FsError::Unsupported),
        "(FS) escrita no FAT devia falhar"
    );
    check!(
        vfs::remove(&mut ro) == Err(FsError::PermissionDenied),
        "(FS) remoção no FAT devia dar permissão negada"
    );
    vfs::close(ro);

    // cwd dentro do filho montado + abertura relativa.
    check!(vfs::chdir("/fat").is_ok(), "(FS) chdir /fat falhou");
    match vfs::open("HELLO.TXT", OpenFlags::empty()) {
        Ok(rel) => vfs::close(rel),
        Err(e) => {
            crate::kerror!("(FS) abertura relativa via mount: {}", e);
            return TestResult::Failed;
        }
    }
    check!(vfs::chdir("/").is_ok(), "(FS) voltar para / falhou");

    TestResult::Passed
}

// -----------------------------------------------------------------------------
// Construção da imagem FAT12 sintética
// -----------------------------------------------------------------------------
//
// Geometria: 512 bytes/setor, 1 setor/cluster, 1 setor reservado, 2 FATs de
// 1 setor, 64 entradas de root (4 setores), 64 setores no total.
// Área de dados começa no setor 7; cluster 2 -> setor 7.

const IMG_SECTORS: usize = 64;

fn build_fat12_image() -> Vec<u8> {
    let mut img = vec![0u8; IMG_SECTORS * 512];

    // --- Boot sector / BPB ---
    img[0] = 0xEB; // jmp short
    img[1] = 0x3C;
    img[2] = 0x90; // nop
    img[3..11].copy_from_slice(b"MSDOS5.0");
    img[11..13].copy_from_slice(&512u16.to_le_bytes()); // bytes/setor
    img[13] = 1; // setores/cluster
    img[14..16].copy_from_slice(&1u16.to_le_bytes()); // reservados
    img[16] = 2; // número de FATs
    img[17..19].copy_from_slice(&64u16.to_le_bytes()); // entradas de root
    img[19..21].copy_from_slice(&(IMG_SECTORS as u16).to_le_bytes()); // total
    img[21] = 0xF0; // media descriptor
    img[22..24].copy_from_slice(&1u16.to_le_bytes()); // setores/FAT
    img[510] = 0x55;
    img[511] = 0xAA;

    // --- FATs (setores 1 e 2) ---
    // Entradas 0/1 reservadas; clusters 2 e 3 são cadeias de um cluster só.
    for fat_sect in [1usize, 2] {
        let fat = &mut img[fat_sect * 512..(fat_sect + 1) * 512];
        set_fat12(fat, 0, 0xFF0);
        set_fat12(fat, 1, 0xFFF);
        set_fat12(fat, 2, 0xFFF); // HELLO.TXT: EOF
        set_fat12(fat, 3, 0xFFF); // arquivo LFN: EOF
    }

    // --- Diretório raiz (setores 3..6) ---
    let root = 3 * 512;

    // Entrada 0: HELLO.TXT, cluster 2.
    write_dirent(
        &mut img[root..root + 32],
        b"HELLO   TXT",
        0x20,
        2,
        HELLO_CONTENT.len() as u32,
    );

    // Entradas 1-3: nome longo (2 registros LFN) + entrada curta.
    let short_name = b"README~1TXT";
    let csum = lfn_checksum(short_name);
    write_lfn_record(
        &mut img[root + 32..root + 64],
        0x42, // seq 2 | flag de último registro
        "ame.txt",
        csum,
        true,
    );
    write_lfn_record(
        &mut img[root + 64..root + 96],
        0x01, // seq 1
        "readme-long-n",
        csum,
        false,
    );
    write_dirent(
        &mut img[root + 96..root + 128],
        short_name,
        0x20,
        3,
        LFN_CONTENT.len() as u32,
    );

    // --- Área de dados ---
    // Cluster 2 -> setor 7, cluster 3 -> setor 8.
    img[7 * 512..7 * 512 + HELLO_CONTENT.len()].copy_from_slice(HELLO_CONTENT);
    img[8 * 512..8 * 512 + LFN_CONTENT.len()].copy_from_slice(LFN_CONTENT);

    img
}

/// Grava uma entrada FAT12 de 12 bits no offset padrão (idx * 1.5).
fn set_fat12(fat: &mut [u8], idx: usize, val: u16) {
    let offs = idx + idx / 2;
    if idx % 2 == 0 {
        fat[offs] = (val & 0xFF) as u8;
        fat[offs + 1] = (fat[offs + 1] & 0xF0) | ((val >> 8) as u8 & 0x0F);
    } else {
        fat[offs] = (fat[offs] & 0x0F) | (((val & 0x0F) as u8) << 4);
        fat[offs + 1] = (val >> 4) as u8;
    }
}

/// Grava uma entrada 8.3 clássica.
fn write_dirent(rec: &mut [u8], name83: &[u8; 11], attr: u8, cluster: u16, size: u32) {
    rec[0..11].copy_from_slice(name83);
    rec[11] = attr;
    rec[26..28].copy_from_slice(&cluster.to_le_bytes());
    rec[28..32].copy_from_slice(&size.to_le_bytes());
}

/// Grava um registro LFN com até 13 caracteres ASCII.
/// `terminate` acrescenta o terminador 0x0000 e padding 0xFFFF.
fn write_lfn_record(rec: &mut [u8], seq: u8, chars: &str, csum: u8, terminate: bool) {
    rec[0] = seq;
    rec[11] = 0x0F; // attr LFN
    rec[12] = 0;
    rec[13] = csum;

    let offsets: [usize; 13] = [1, 3, 5, 7, 9, 14, 16, 18, 20, 22, 24, 28, 30];
    let bytes = chars.as_bytes();
    for (k, &offs) in offsets.iter().enumerate() {
        let unit: u16 = if k < bytes.len() {
            bytes[k] as u16
        } else if terminate && k == bytes.len() {
            0x0000
        } else {
            0xFFFF
        };
        rec[offs..offs + 2].copy_from_slice(&unit.to_le_bytes());
    }
}

/// Checksum padrão do nome curto, gravado em cada registro LFN.
fn lfn_checksum(short: &[u8; 11]) -> u8 {
    let mut sum: u8 = 0;
    for &b in short {
        sum = ((sum & 1) << 7).wrapping_add(sum >> 1).wrapping_add(b);
    }
    sum
}
