//! Tabela de Montagem
//!
//! Lista de pares (nó mount-point, filesystem filho). Só existe para dar
//! suporte à semântica de "diretório com filesystem pendurado": entradas são
//! adicionadas quando um filesystem é montado sob um nó não-raiz e removidas
//! quando o nó dono é destruído.

use super::vfs::FileSystem;
use alloc::sync::Arc;
use alloc::vec::Vec;

/// Uma montagem ativa.
pub struct MountEntry {
    /// Identidade do filesystem pai (endereço do Arc).
    pub parent_fs: usize,
    /// Chave do nó de backend que serve de mount point.
    pub node_key: u64,
    /// O filesystem filho pendurado ali.
    pub fs: Arc<dyn FileSystem>,
}

/// A tabela process-wide (vive dentro do contexto do VFS).
pub struct MountTable {
    entries: Vec<MountEntry>,
}

impl MountTable {
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Registra uma montagem.
    pub fn add(&mut self, parent_fs: usize, node_key: u64, fs: Arc<dyn FileSystem>) {
        self.entries.push(MountEntry {
            parent_fs,
            node_key,
            fs,
        });
    }

    /// Remove a montagem pendurada no nó dado, se houver.
    /// Retorna `true` se alguma entrada saiu.
    pub fn remove_node(&mut self, parent_fs: usize, node_key: u64) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !(e.parent_fs == parent_fs && e.node_key == node_key));
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
