//! # BIOS Parameter Block (BPB)
//!
//! Parser do boot sector para extrair metadados do filesystem FAT.
//!
//! ## Estrutura do Boot Sector
//!
//! | Offset | Tamanho | Descrição                    |
//! |--------|---------|------------------------------|
//! | 0x00   | 3       | Jump instruction             |
//! | 0x03   | 8       | OEM Name                     |
//! | 0x0B   | 2       | Bytes por setor              |
//! | 0x0D   | 1       | Setores por cluster          |
//! | 0x0E   | 2       | Setores reservados           |
//! | 0x10   | 1       | Número de FATs               |
//! | 0x11   | 2       | Entradas no root (FAT12/16)  |
//! | ...    | ...     | ...                          |

use super::FatKind;
use alloc::string::String;

/// BIOS Parameter Block
#[derive(Debug, Clone)]
pub struct Bpb {
    /// Bytes por setor (exigimos 512)
    pub bytes_per_sector: u16,
    /// Setores por cluster
    pub sectors_per_cluster: u8,
    /// Setores reservados antes da FAT
    pub reserved_sectors: u16,
    /// Número de FATs (geralmente 2)
    pub num_fats: u8,
    /// Entradas no diretório raiz (FAT12/16 apenas)
    pub root_entry_count: u16,
    /// Total de setores (16-bit, 0 se usar 32-bit)
    pub total_sectors_16: u16,
    /// Setores por FAT (FAT12/16)
    pub sectors_per_fat_16: u16,
    /// Total de setores (32-bit)
    pub total_sectors_32: u32,
    /// Setores por FAT (FAT32)
    pub sectors_per_fat_32: u32,
    /// Cluster do diretório raiz (FAT32)
    pub root_cluster: u32,
    /// Rótulo do volume (extensão FAT16, offset 43)
    pub label_16: [u8; 11],
    /// Rótulo do volume (extensão FAT32, offset 71)
    pub label_32: [u8; 11],
}

impl Bpb {
    /// Faz o parse do BPB a partir dos bytes do boot sector.
    ///
    /// Serve de probe: devolve `None` para qualquer coisa que não pareça um
    /// boot sector FAT (instrução de jump errada, setor != 512 bytes).
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 512 {
            return None;
        }

        // Probe: boot sectors FAT começam com jmp short (EB xx 90).
        if data[0] != 0xEB || data[2] != 0x90 {
            return None;
        }

        let bytes_per_sector = u16::from_le_bytes([data[11], data[12]]);
        if bytes_per_sector != 512 {
            return None;
        }

        let sectors_per_cluster = data[13];
        let reserved_sectors = u16::from_le_bytes([data[14], data[15]]);
        let num_fats = data[16];
        let root_entry_count = u16::from_le_bytes([data[17], data[18]]);
        let total_sectors_16 = u16::from_le_bytes([data[19], data[20]]);
        let sectors_per_fat_16 = u16::from_le_bytes([data[22], data[23]]);
        let total_sectors_32 = u32::from_le_bytes([data[32], data[33], data[34], data[35]]);

        // Campos específicos do FAT32
        let sectors_per_fat_32 = u32::from_le_bytes([data[36], data[37], data[38], data[39]]);
        let root_cluster = u32::from_le_bytes([data[44], data[45], data[46], data[47]]);

        let mut label_16 = [0u8; 11];
        label_16.copy_from_slice(&data[43..54]);
        let mut label_32 = [0u8; 11];
        label_32.copy_from_slice(&data[71..82]);

        if sectors_per_cluster == 0 {
            return None;
        }

        Some(Self {
            bytes_per_sector,
            sectors_per_cluster,
            reserved_sectors,
            num_fats,
            root_entry_count,
            total_sectors_16,
            sectors_per_fat_16,
            total_sectors_32,
            sectors_per_fat_32,
            root_cluster,
            label_16,
            label_32,
        })
    }

    /// Total de setores do volume.
    pub fn total_sectors(&self) -> u32 {
        if self.total_sectors_16 != 0 {
            self.total_sectors_16 as u32
        } else {
            self.total_sectors_32
        }
    }

    /// Setores por FAT.
    pub fn sectors_per_fat(&self) -> u32 {
        if self.sectors_per_fat_16 != 0 {
            self.sectors_per_fat_16 as u32
        } else {
            self.sectors_per_fat_32
        }
    }

    /// Setores ocupados pela área fixa do diretório raiz (FAT12/16).
    pub fn root_dir_sectors(&self) -> u32 {
        ((self.root_entry_count as u32 * 32) + 511) / 512
    }

    /// Primeiro setor da área de dados (relativo ao início do volume).
    pub fn first_data_sector(&self) -> u32 {
        self.reserved_sectors as u32
            + self.num_fats as u32 * self.sectors_per_fat()
            + self.root_dir_sectors()
    }

    /// Contagem de clusters da área de dados.
    pub fn cluster_count(&self) -> u32 {
        let data_sectors = self.total_sectors().saturating_sub(self.first_data_sector());
        data_sectors / self.sectors_per_cluster as u32
    }

    /// Determina o tipo de FAT pelos thresholds de contagem de clusters.
    pub fn fat_kind(&self) -> FatKind {
        let clusters = self.cluster_count();
        if clusters < 4085 {
            FatKind::Fat12
        } else if clusters < 65525 {
            FatKind::Fat16
        } else if clusters < 268435445 {
            FatKind::Fat32
        } else {
            FatKind::ExFat
        }
    }

    /// Rótulo do volume com espaços finais removidos, se presente.
    pub fn volume_label(&self, kind: FatKind) -> Option<String> {
        let raw = match kind {
            FatKind::Fat16 => &self.label_16,
            FatKind::Fat32 | FatKind::ExFat => &self.label_32,
            FatKind::Fat12 => &self.label_16,
        };
        let text: String = raw
            .iter()
            .map(|&b| b as char)
            .collect::<String>()
            .trim_end()
            .into();
        if text.is_empty() || !text.chars().all(|c| c.is_ascii_graphic() || c == ' ') {
            None
        } else {
            Some(text)
        }
    }
}
