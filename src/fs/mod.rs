//! # Sistema de Arquivos Virtual (VFS)
//!
//! Uma API uniforme de arquivos/diretórios independente do backend, com
//! despacho polimórfico via traits:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │   vfs (switch): mount / open / chdir / close / ...   │
//! └──────────────────────────────────────────────────────┘
//!            ↓ trait FileSystem        ↓ trait NodeOps
//! ┌───────────────────────┐  ┌─────────────────────────┐
//! │  memfs (árvore no     │  │  fat (FAT12/16/32       │
//! │  heap, leitura e      │  │  somente leitura sobre  │
//! │  escrita)             │  │  BlockDevice)           │
//! └───────────────────────┘  └─────────────────────────┘
//! ```
//!
//! Montagens: exatamente um filesystem raiz process-wide; filesystems filhos
//! podem ser pendurados em nós de diretório do memfs, e a travessia de
//! caminhos cruza a fronteira de forma transparente.

pub mod fat;
pub mod memfs;
pub mod mount;
pub mod path;
pub mod vfs;

#[cfg(feature = "self_test")]
pub mod test;

pub use vfs::{FileSystem, FsNode, NodeOps};

use alloc::string::String;
use bitflags::bitflags;
use core::fmt;

/// Erro local/recuperável do subsistema de arquivos.
///
/// Nada aqui é fatal: falhas fatais (metadados obrigatórios que não carregam,
/// overflow do caminho do cwd) vão direto para o panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// Caminho ou componente não existe
    NotFound,
    /// Operação de diretório num nó que não é diretório
    NotDirectory,
    /// Operação de arquivo num nó que não é arquivo
    NotFile,
    /// Criação exclusiva de algo que já existe
    Exists,
    /// Remoção de diretório não vazio
    NotEmpty,
    /// Recurso em uso (raiz já montada, nó raiz sem pai)
    Busy,
    /// Operação proibida pelo backend
    PermissionDenied,
    /// Operação não implementada pelo backend
    Unsupported,
    /// Alocação não-obrigatória falhou
    OutOfMemory,
    /// Erro de I/O no dispositivo subjacente
    IoError,
    /// O driver não reconhece este dispositivo/formato (probe falhou)
    WrongDevice,
    /// Caminho vazio ou malformado
    InvalidPath,
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FsError::NotFound => "não encontrado",
            FsError::NotDirectory => "não é diretório",
            FsError::NotFile => "não é arquivo",
            FsError::Exists => "já existe",
            FsError::NotEmpty => "diretório não vazio",
            FsError::Busy => "recurso em uso",
            FsError::PermissionDenied => "permissão negada",
            FsError::Unsupported => "operação não suportada",
            FsError::OutOfMemory => "sem memória",
            FsError::IoError => "erro de I/O",
            FsError::WrongDevice => "formato não reconhecido",
            FsError::InvalidPath => "caminho inválido",
        };
        f.write_str(msg)
    }
}

/// Tipo de filesystem montado.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsType {
    /// Árvore em memória (ramdisk de arquivos)
    Mem,
    /// FAT12/16/32 sobre um dispositivo de bloco
    Fat,
}

/// Tipo de nó.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Dir,
}

/// Origem do deslocamento em `seek`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// A partir do início do arquivo
    Set,
    /// A partir da posição corrente
    Cur,
    /// A partir do fim do arquivo
    End,
}

bitflags! {
    /// Flags de abertura.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        /// Criar o último componente se não existir
        const CREATE = 1 << 0;
        /// Com CREATE: criar um diretório em vez de arquivo
        const DIR = 1 << 1;
        /// Com CREATE: falhar se o alvo já existir
        const EXCL = 1 << 2;
    }
}

/// Uma entrada devolvida por `readdir`.
#[derive(Debug, Clone)]
pub struct DirEntry {
    pub name: String,
    pub kind: NodeKind,
    pub size: u64,
}

/// Inicializa o subsistema de arquivos: monta o memfs como raiz e, se houver
/// um dispositivo de bloco registrado, tenta montar o que tiver dentro (FAT)
/// sob `/boot`.
pub fn init() {
    crate::kinfo!("(FS) Inicializando VFS...");

    if let Err(e) = vfs::mount(None, 0, 0, None) {
        panic!("FS: falha ao montar o filesystem raiz: {}", e);
    }
    crate::kinfo!("(FS) Raiz (memfs) montada");

    if let Some(dev) = crate::drivers::block::first_device() {
        let size = dev.block_count();
        match vfs::open("/boot", OpenFlags::CREATE | OpenFlags::DIR) {
            Ok(boot) => match vfs::mount(Some(dev), 0, size, Some(&boot)) {
                Ok(fs) => {
                    if let Some(label) = fs.label() {
                        crate::kinfo!("(FS) /boot montado (label: {})", label);
                    } else {
                        crate::kinfo!("(FS) /boot montado");
                    }
                    vfs::close(boot);
                }
                Err(e) => {
                    crate::kwarn!("(FS) dispositivo de boot sem filesystem: {}", e);
                    vfs::close(boot);
                }
            },
            Err(e) => crate::kwarn!("(FS) falha ao criar /boot: {}", e),
        }
    }
}
