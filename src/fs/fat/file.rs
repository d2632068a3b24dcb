//! Leitura de arquivos FAT seguindo a cadeia de clusters.
//!
//! O handle mantém um buffer de UM cluster, recarregado apenas quando a
//! posição de leitura cruza uma fronteira de cluster. Seeks dentro do mesmo
//! cluster não tocam o disco; seek para trás re-anda a cadeia desde o
//! primeiro cluster, seek para frente continua do cluster corrente.

use super::dir::FatDirEntry;
use super::FatVolume;
use crate::fs::vfs::NodeOps;
use crate::fs::{DirEntry, FsError, Whence};
use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

/// Handle de arquivo aberto.
pub struct FatFileHandle {
    vol: Arc<FatVolume>,
    ent: FatDirEntry,
    first_cluster: u32,
    /// Posição corrente em bytes.
    pos: u64,
    /// Cluster correspondente à posição corrente; `None` = EOF alcançado.
    cur_cluster: Option<u32>,
    /// Buffer de um cluster, preenchido preguiçosamente.
    buf: Vec<u8>,
    buf_valid: bool,
}

impl FatFileHandle {
    pub fn new(vol: Arc<FatVolume>, ent: FatDirEntry) -> Self {
        let first_cluster = ent.first_cluster;
        let cluster_bytes = vol.cluster_bytes;
        Self {
            vol,
            ent,
            first_cluster,
            pos: 0,
            cur_cluster: Some(first_cluster),
            buf: vec![0u8; cluster_bytes],
            buf_valid: false,
        }
    }
}

impl NodeOps for FatFileHandle {
    fn filesize(&self) -> Result<u64, FsError> {
        Ok(self.ent.size as u64)
    }

    fn seek(&mut self, offs: i64, whence: Whence) -> Result<(), FsError> {
        let new_pos = match whence {
            Whence::Set => offs,
            Whence::Cur => self.pos as i64 + offs,
            Whence::End => self.ent.size as i64 + offs,
        };
        let new_pos = new_pos.max(0) as u64;

        let cur_idx = self.pos >> self.vol.clust_shift;
        let new_idx = new_pos >> self.vol.clust_shift;

        // Só re-calcular o cluster corrente se a nova posição caiu fora do
        // cluster atual.
        if new_idx != cur_idx {
            self.cur_cluster = if new_idx < cur_idx {
                self.vol.walk_chain(Some(self.first_cluster), new_idx)
            } else {
                self.vol.walk_chain(self.cur_cluster, new_idx - cur_idx)
            };
            self.buf_valid = false;
        }
        self.pos = new_pos;
        Ok(())
    }

    fn tell(&self) -> Result<u64, FsError> {
        Ok(self.pos)
    }

    fn read(&mut self, out: &mut [u8]) -> Result<usize, FsError> {
        let size = self.ent.size as u64;
        let Some(mut cluster) = self.cur_cluster else {
            return Ok(0); // EOF
        };

        let mut num_read = 0usize;
        let mut cur_idx = self.pos >> self.vol.clust_shift;

        while num_read < out.len() {
            if !self.buf_valid {
                self.vol.read_cluster(cluster, &mut self.buf)?;
                self.buf_valid = true;
            }

            let offs = (self.pos & self.vol.clust_mask) as usize;
            let buf_left = self.vol.cluster_bytes - offs;
            let rd_left = out.len() - num_read;
            let mut len = buf_left.min(rd_left);

            // Nunca ler além do fim lógico do arquivo.
            if self.pos + len as u64 > size {
                len = (size - self.pos) as usize;
            }

            out[num_read..num_read + len].copy_from_slice(&self.buf[offs..offs + len]);
            num_read += len;
            self.pos += len as u64;

            if self.pos >= size {
                self.cur_cluster = None;
                self.buf_valid = false;
                break; // EOF
            }

            let new_idx = self.pos >> self.vol.clust_shift;
            if new_idx != cur_idx {
                self.buf_valid = false;
                match self.vol.next_cluster(cluster) {
                    Some(next) => {
                        cluster = next;
                        self.cur_cluster = Some(next);
                        cur_idx = new_idx;
                    }
                    None => {
                        self.cur_cluster = None;
                        break; // cadeia terminou antes do tamanho declarado
                    }
                }
            }
        }
        Ok(num_read)
    }

    fn write(&mut self, _buf: &[u8]) -> Result<usize, FsError> {
        // Escrita não é implementada neste backend.
        Err(FsError::Unsupported)
    }

    fn rewinddir(&mut self) -> Result<(), FsError> {
        Err(FsError::NotDirectory)
    }

    fn readdir(&mut self) -> Result<Option<DirEntry>, FsError> {
        Err(FsError::NotDirectory)
    }

    fn rename(&mut self, _name: &str) -> Result<(), FsError> {
        Err(FsError::Unsupported)
    }

    fn remove(&mut self) -> Result<(), FsError> {
        Err(FsError::PermissionDenied)
    }

    fn node_key(&self) -> u64 {
        0
    }
}
