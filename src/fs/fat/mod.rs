//! # Driver de Sistema de Arquivos FAT (somente leitura)
//!
//! Suporta FAT12, FAT16 e FAT32 sobre um dispositivo de bloco.
//!
//! ## Arquitetura FAT
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │  Boot Sector (BPB) │  FAT Table  │  Root Dir │ Data  │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! ## Estrutura do Módulo
//!
//! - `bpb.rs`  - Parser do BIOS Parameter Block (boot sector)
//! - `dir.rs`  - Diretórios, entradas 8.3 e reconstrução de LFN
//! - `file.rs` - Leitura de arquivos seguindo a cadeia de clusters
//!
//! A tabela FAT inteira é carregada em memória na montagem; diretórios são
//! carregados sob demanda e compartilhados por Arc; arquivos leem um cluster
//! por vez, recarregando o buffer só quando a posição cruza a fronteira de
//! cluster. Escrita, renomeação e remoção não são implementadas.

pub mod bpb;
pub mod dir;
pub mod file;

use super::vfs::{FileSystem, FsNode, NodeOps};
use super::{FsError, FsType, NodeKind, OpenFlags};
use crate::drivers::block::{BlockDevice, SECTOR_SIZE};
use crate::fs::path::{next_component, skip_separators};
use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;
use dir::{FatDir, FatDirEntry};

/// Tipo de FAT, pelos thresholds de contagem de clusters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatKind {
    Fat12,
    Fat16,
    Fat32,
    /// Detectado mas não suportado.
    ExFat,
}

impl FatKind {
    pub fn name(&self) -> &'static str {
        match self {
            FatKind::Fat12 => "fat12",
            FatKind::Fat16 => "fat16",
            FatKind::Fat32 => "fat32",
            FatKind::ExFat => "exfat",
        }
    }
}

/// Estado imutável de um volume FAT montado, compartilhado entre todos os
/// handles via Arc. Como o backend é somente leitura, nada aqui muda depois
/// da montagem.
pub struct FatVolume {
    dev: Arc<dyn BlockDevice>,
    /// Setor inicial do volume no dispositivo (LBA absoluto).
    start_sect: u64,
    pub kind: FatKind,
    /// Setores por cluster.
    pub sectors_per_cluster: u32,
    /// Bytes por cluster.
    pub cluster_bytes: usize,
    /// log2(cluster_bytes), para converter posição <-> índice de cluster.
    pub clust_shift: u32,
    pub clust_mask: u64,
    /// Layout (setores relativos ao início do volume).
    root_sect: u32,
    root_size: u32,
    first_data_sect: u32,
    pub num_clusters: u32,
    /// A File Allocation Table inteira, residente em memória.
    fat: Vec<u8>,
}

impl FatVolume {
    /// Lê `count` setores (relativos ao início do volume) para `buf`.
    fn read_sectors(&self, sect: u32, count: u32, buf: &mut [u8]) -> Result<(), FsError> {
        self.dev
            .read_range(self.start_sect + sect as u64, count as u64, buf)
            .map_err(|_| FsError::IoError)
    }

    /// Lê um cluster inteiro da área de dados para `buf`.
    pub fn read_cluster(&self, cluster: u32, buf: &mut [u8]) -> Result<(), FsError> {
        if buf.len() < self.cluster_bytes {
            return Err(FsError::IoError);
        }
        let sect = (cluster as u64 - 2) * self.sectors_per_cluster as u64
            + self.first_data_sect as u64;
        self.dev
            .read_range(
                self.start_sect + sect,
                self.sectors_per_cluster as u64,
                buf,
            )
            .map_err(|_| FsError::IoError)
    }

    /// Valor cru da entrada `cluster` na FAT em memória.
    fn read_fat(&self, cluster: u32) -> u32 {
        match self.kind {
            FatKind::Fat12 => {
                // Entradas de 12 bits empacotadas: offset em bytes é
                // cluster * 1.5; pares ficam nos 12 bits baixos, ímpares
                // nos 12 bits altos.
                let offs = (cluster + cluster / 2) as usize;
                let lo = self.fat.get(offs).copied().unwrap_or(0xFF) as u16;
                let hi = self.fat.get(offs + 1).copied().unwrap_or(0xFF) as u16;
                let val = lo | (hi << 8);
                if cluster & 1 != 0 {
                    (val >> 4) as u32
                } else {
                    (val & 0x0FFF) as u32
                }
            }
            FatKind::Fat16 => {
                let offs = (cluster * 2) as usize;
                u16::from_le_bytes([self.fat[offs], self.fat[offs + 1]]) as u32
            }
            FatKind::Fat32 | FatKind::ExFat => {
                let offs = (cluster * 4) as usize;
                u32::from_le_bytes([
                    self.fat[offs],
                    self.fat[offs + 1],
                    self.fat[offs + 2],
                    self.fat[offs + 3],
                ]) & 0x0FFF_FFFF
            }
        }
    }

    /// Próximo cluster na cadeia, ou `None` no fim (end-of-chain ou entrada
    /// livre — cadeia quebrada também encerra).
    pub fn next_cluster(&self, cluster: u32) -> Option<u32> {
        let val = self.read_fat(cluster);
        if val == 0 {
            return None;
        }
        let eoc = match self.kind {
            FatKind::Fat12 => val >= 0x0FF8,
            FatKind::Fat16 => val >= 0xFFF8,
            FatKind::Fat32 | FatKind::ExFat => val >= 0x0FFF_FFF8,
        };
        if eoc || val < 2 {
            None
        } else {
            Some(val)
        }
    }

    /// Avança `count` clusters a partir de `cluster`.
    pub fn walk_chain(&self, mut cluster: Option<u32>, mut count: u64) -> Option<u32> {
        while count > 0 {
            cluster = self.next_cluster(cluster?);
            count -= 1;
        }
        cluster
    }
}

/// Um filesystem FAT montado: o volume compartilhado + o diretório raiz
/// residente (carregado na montagem e mantido vivo pelo Arc).
pub struct FatFs {
    vol: Arc<FatVolume>,
    root: Arc<FatDir>,
    label: Option<String>,
}

/// Sonda/monta um volume FAT no dispositivo dado.
///
/// Falhas de probe (boot sector não reconhecido) devolvem `WrongDevice` para
/// o switch tentar o próximo driver. Depois que o formato foi reconhecido,
/// falha ao carregar metadados obrigatórios (FAT, diretório raiz) é FATAL:
/// um filesystem que não carrega os próprios metadados não funciona.
pub fn create(
    dev: Option<Arc<dyn BlockDevice>>,
    start: u64,
    _size: u64,
) -> Result<Arc<dyn FileSystem>, FsError> {
    let Some(dev) = dev else {
        return Err(FsError::WrongDevice);
    };

    let mut boot_sector = [0u8; SECTOR_SIZE];
    dev.read_block(start, &mut boot_sector)
        .map_err(|_| FsError::IoError)?;

    let Some(bpb) = bpb::Bpb::parse(&boot_sector) else {
        return Err(FsError::WrongDevice);
    };

    let kind = bpb.fat_kind();
    if kind == FatKind::ExFat {
        crate::kwarn!("(FAT) volume exfat não suportado");
        return Err(FsError::Unsupported);
    }

    let sectors_per_cluster = bpb.sectors_per_cluster as u32;
    let cluster_bytes = sectors_per_cluster as usize * SECTOR_SIZE;
    let mut clust_shift = 0u32;
    while (1usize << clust_shift) < cluster_bytes {
        clust_shift += 1;
    }

    let fat_size = bpb.sectors_per_fat();
    let fat_sect = bpb.reserved_sectors as u32;

    // Carregar a FAT inteira em memória. Falha de leitura aqui é fatal:
    // sem a tabela de alocação não existe filesystem.
    let mut fat = vec![0u8; fat_size as usize * SECTOR_SIZE];
    if dev
        .read_range(start + fat_sect as u64, fat_size as u64, &mut fat)
        .is_err()
    {
        panic!("FAT: falha ao carregar a File Allocation Table");
    }

    let vol = Arc::new(FatVolume {
        dev,
        start_sect: start,
        kind,
        sectors_per_cluster,
        cluster_bytes,
        clust_shift,
        clust_mask: (cluster_bytes - 1) as u64,
        root_sect: fat_sect + bpb.num_fats as u32 * fat_size,
        root_size: bpb.root_dir_sectors(),
        first_data_sect: bpb.first_data_sector(),
        num_clusters: bpb.cluster_count(),
        fat,
    });

    // Carregar o diretório raiz: área fixa para FAT12/16, cadeia de
    // clusters para FAT32.
    let root = match kind {
        FatKind::Fat32 => match FatDir::load_chain(&vol, bpb.root_cluster) {
            Ok(dir) => Arc::new(dir),
            Err(_) => panic!("FAT: falha ao carregar o diretório raiz (fat32)"),
        },
        _ => {
            let mut raw = vec![0u8; vol.root_size as usize * SECTOR_SIZE];
            if vol.read_sectors(vol.root_sect, vol.root_size, &mut raw).is_err() {
                panic!("FAT: falha ao carregar o diretório raiz");
            }
            Arc::new(FatDir::from_raw(&vol, raw))
        }
    };

    let label = bpb.volume_label(kind);

    crate::kinfo!(
        "(FAT) volume {} montado: {} clusters de {} bytes",
        kind.name(),
        vol.num_clusters,
        vol.cluster_bytes
    );

    Ok(Arc::new(FatFs { vol, root, label }))
}

impl FileSystem for FatFs {
    fn fs_type(&self) -> FsType {
        FsType::Fat
    }

    fn label(&self) -> Option<String> {
        self.label.clone()
    }

    fn open(
        &self,
        self_arc: &Arc<dyn FileSystem>,
        path: &str,
        flags: OpenFlags,
    ) -> Result<FsNode, FsError> {
        let mut rest = skip_separators(path);
        let mut dir: Arc<FatDir> = self.root.clone();
        let mut file_ent: Option<FatDirEntry> = None;

        while !rest.is_empty() {
            if file_ent.is_some() {
                // Ainda há componentes, mas o último resolvido era arquivo.
                return Err(FsError::NotDirectory);
            }

            let (name, next) = next_component(rest);
            rest = next;

            if name == "." {
                continue;
            }

            let Some(ent) = dir.find(name) else {
                return Err(FsError::NotFound);
            };

            if ent.first_cluster == 0 {
                if ent.kind == NodeKind::Dir {
                    // Entradas ".." de volta para a raiz aparecem com
                    // endereço de cluster 0 como caso especial.
                    dir = self.root.clone();
                    continue;
                }
                // Arquivo com endereço 0 não existe de verdade.
                return Err(FsError::NotFound);
            }

            if ent.kind == NodeKind::Dir {
                dir = Arc::new(FatDir::load_chain(&self.vol, ent.first_cluster)?);
            } else {
                file_ent = Some(ent);
            }
        }

        match file_ent {
            Some(ent) => {
                let ops: Box<dyn NodeOps> =
                    Box::new(file::FatFileHandle::new(self.vol.clone(), ent));
                Ok(FsNode::new(self_arc.clone(), NodeKind::File, ops))
            }
            None => {
                if flags.contains(OpenFlags::EXCL) {
                    return Err(FsError::Exists);
                }
                let ops: Box<dyn NodeOps> = Box::new(dir::FatDirHandle::new(dir));
                Ok(FsNode::new(self_arc.clone(), NodeKind::Dir, ops))
            }
        }
    }

    fn attach_mount(
        &self,
        _node: &FsNode,
        _child: Option<Arc<dyn FileSystem>>,
    ) -> Result<(), FsError> {
        // Mount points só existem no backend em memória.
        Err(FsError::Unsupported)
    }
}
