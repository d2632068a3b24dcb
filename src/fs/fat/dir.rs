//! Diretórios FAT: entradas 8.3, reconstrução de LFN e handles de leitura.
//!
//! Um `FatDir` carrega a região do diretório inteira (área fixa do root em
//! FAT12/16 ou a cadeia de clusters) e pré-resolve as entradas reais uma
//! vez. Diretórios são compartilhados entre handles por Arc, então reabrir
//! a raiz não relê a cadeia de clusters do disco.

use super::FatVolume;
use crate::fs::{DirEntry, FsError, NodeKind, Whence};
use crate::fs::vfs::NodeOps;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

/// Tamanho de uma entrada de diretório no disco.
const DIRENT_SIZE: usize = 32;

/// Marcador de entrada deletada.
const DIRENT_UNUSED: u8 = 0xE5;

const ATTR_VOLID: u8 = 0x08;
const ATTR_DIR: u8 = 0x10;
/// Entradas de Long File Name têm exatamente os quatro bits baixos setados.
const ATTR_LFN: u8 = 0x0F;

/// Uma entrada resolvida de diretório.
#[derive(Debug, Clone)]
pub struct FatDirEntry {
    pub name: String,
    pub kind: NodeKind,
    pub size: u32,
    pub first_cluster: u32,
}

/// Um diretório carregado e parseado.
pub struct FatDir {
    entries: Vec<FatDirEntry>,
}

impl FatDir {
    /// Constrói a partir da região crua já lida (área fixa do root).
    pub fn from_raw(_vol: &FatVolume, raw: Vec<u8>) -> Self {
        Self {
            entries: parse_entries(&raw),
        }
    }

    /// Carrega um diretório seguindo a cadeia de clusters a partir de
    /// `first_cluster`.
    pub fn load_chain(vol: &Arc<FatVolume>, first_cluster: u32) -> Result<Self, FsError> {
        let mut raw: Vec<u8> = Vec::new();
        let mut cluster = Some(first_cluster);
        while let Some(cur) = cluster {
            let prev_len = raw.len();
            raw.resize(prev_len + vol.cluster_bytes, 0);
            vol.read_cluster(cur, &mut raw[prev_len..])?;
            cluster = vol.next_cluster(cur);
        }
        Ok(Self {
            entries: parse_entries(&raw),
        })
    }

    /// Busca uma entrada pelo nome (sem distinguir caixa).
    pub fn find(&self, name: &str) -> Option<FatDirEntry> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn entries(&self) -> &[FatDirEntry] {
        &self.entries
    }
}

/// Varre a região crua e resolve uma `FatDirEntry` para cada entrada real
/// (descartando rótulos de volume, entradas deletadas e registros LFN, que
/// são absorvidos pelos nomes).
fn parse_entries(raw: &[u8]) -> Vec<FatDirEntry> {
    let nent = raw.len() / DIRENT_SIZE;
    let mut out = Vec::new();
    // Índice da última entrada não-LFN vista; os registros LFN de uma
    // entrada ficam imediatamente antes dela, nunca antes deste ponto.
    let mut prev_real: isize = -1;

    for i in 0..nent {
        let rec = &raw[i * DIRENT_SIZE..(i + 1) * DIRENT_SIZE];
        if rec[0] == 0 {
            // Entrada nula encerra o diretório.
            break;
        }
        let attr = rec[11];

        if rec[0] != DIRENT_UNUSED && attr != ATTR_VOLID && attr != ATTR_LFN {
            if let Some(name) = entry_filename(raw, i, prev_real) {
                let cluster_hi = u16::from_le_bytes([rec[20], rec[21]]) as u32;
                let cluster_lo = u16::from_le_bytes([rec[26], rec[27]]) as u32;
                out.push(FatDirEntry {
                    name,
                    kind: if attr & ATTR_DIR != 0 {
                        NodeKind::Dir
                    } else {
                        NodeKind::File
                    },
                    size: u32::from_le_bytes([rec[28], rec[29], rec[30], rec[31]]),
                    first_cluster: (cluster_hi << 16) | cluster_lo,
                });
            }
        }
        if attr != ATTR_LFN {
            prev_real = i as isize;
        }
    }
    out
}

/// Reconstrói o nome da entrada `i`.
///
/// Se houver registros LFN imediatamente antes, anda para TRÁS concatenando
/// os 13 code units UTF-16 de cada registro, truncados ao byte baixo — só
/// nomes ASCII sobrevivem intactos; o resto degrada, e é assim que o resto
/// do sistema espera os nomes. Senão, monta o clássico 8.3.
fn entry_filename(raw: &[u8], i: usize, prev_real: isize) -> Option<String> {
    let mut j = i as isize - 1;

    let has_lfn = j > prev_real && raw[j as usize * DIRENT_SIZE + 11] == ATTR_LFN;
    if has_lfn {
        let mut name = String::new();
        loop {
            let rec = &raw[j as usize * DIRENT_SIZE..(j as usize + 1) * DIRENT_SIZE];
            let seq = rec[0];

            // 13 code units por registro: 5 + 6 + 2.
            let mut units = [0u16; 13];
            for (k, unit) in units.iter_mut().enumerate() {
                let offs = match k {
                    0..=4 => 1 + k * 2,
                    5..=10 => 14 + (k - 5) * 2,
                    _ => 28 + (k - 11) * 2,
                };
                *unit = u16::from_le_bytes([rec[offs], rec[offs + 1]]);
            }

            let mut terminated = false;
            for &unit in &units {
                if unit == 0 {
                    terminated = true;
                    break;
                }
                // Truncagem deliberada para o byte baixo do code unit.
                name.push((unit & 0xFF) as u8 as char);
            }

            if terminated || (seq & 0xF0) == 0x40 {
                break;
            }
            j -= 1;
            if !(j > prev_real && raw[j as usize * DIRENT_SIZE + 11] == ATTR_LFN) {
                break;
            }
        }
        return Some(name);
    }

    // Nome 8.3 clássico.
    let rec = &raw[i * DIRENT_SIZE..(i + 1) * DIRENT_SIZE];
    let base: String = rec[0..8]
        .iter()
        .take_while(|&&b| b != b' ' && b != 0)
        .map(|&b| b as char)
        .collect();
    if base.is_empty() {
        return None;
    }
    let ext: String = rec[8..11]
        .iter()
        .take_while(|&&b| b != b' ' && b != 0)
        .map(|&b| b as char)
        .collect();

    Some(if ext.is_empty() {
        base
    } else {
        let mut name = base;
        name.push('.');
        name.push_str(&ext);
        name
    })
}

/// Handle de diretório aberto: o diretório compartilhado + cursor.
pub struct FatDirHandle {
    dir: Arc<FatDir>,
    cursor: usize,
}

impl FatDirHandle {
    pub fn new(dir: Arc<FatDir>) -> Self {
        Self { dir, cursor: 0 }
    }
}

impl NodeOps for FatDirHandle {
    fn filesize(&self) -> Result<u64, FsError> {
        Err(FsError::NotFile)
    }

    fn seek(&mut self, _offs: i64, _whence: Whence) -> Result<(), FsError> {
        Err(FsError::NotFile)
    }

    fn tell(&self) -> Result<u64, FsError> {
        Err(FsError::NotFile)
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, FsError> {
        Err(FsError::NotFile)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<usize, FsError> {
        Err(FsError::NotFile)
    }

    fn rewinddir(&mut self) -> Result<(), FsError> {
        self.cursor = 0;
        Ok(())
    }

    fn readdir(&mut self) -> Result<Option<DirEntry>, FsError> {
        let Some(ent) = self.dir.entries().get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        Ok(Some(DirEntry {
            name: ent.name.clone(),
            kind: ent.kind,
            size: ent.size as u64,
        }))
    }

    fn rename(&mut self, _name: &str) -> Result<(), FsError> {
        Err(FsError::Unsupported)
    }

    fn remove(&mut self) -> Result<(), FsError> {
        // Remoção de diretórios não é implementada neste backend.
        Err(FsError::PermissionDenied)
    }

    fn node_key(&self) -> u64 {
        // FAT não suporta mount points; a chave nunca é consultada.
        0
    }
}
