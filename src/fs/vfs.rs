//! O switch do VFS.
//!
//! Roteia cada operação de arquivo/diretório para o backend dono do nó via
//! traits (`FileSystem` para montagem/abertura, `NodeOps` para operações
//! sobre handles abertos), e mantém o contexto process-wide: filesystem
//! raiz, diretório de trabalho corrente e a tabela de montagem.
//!
//! O switch valida o TIPO do nó antes de encaminhar qualquer operação:
//! read/write/seek exigem arquivo, readdir exige diretório; a validação
//! falha imediatamente sem chamar o backend.

use super::mount::MountTable;
use super::path::{is_absolute, join};
use super::{DirEntry, FsError, FsType, NodeKind, OpenFlags, Whence};
use crate::drivers::block::BlockDevice;
use crate::sync::Spinlock;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;

/// Limite fixo do caminho do diretório corrente. Estourar isto em `chdir` é
/// violação de contrato fatal.
pub const MAX_CWD_PATH: usize = 1024;

/// Um filesystem montado.
///
/// O backend resolve caminhos ABSOLUTOS dentro de si mesmo; travessia que
/// cruza um mount point é re-despachada pelo próprio backend para o
/// filesystem filho.
pub trait FileSystem: Send + Sync {
    /// Tag de tipo do backend.
    fn fs_type(&self) -> FsType;

    /// Rótulo/nome de exibição do volume, se houver.
    fn label(&self) -> Option<String> {
        None
    }

    /// Abre `path` (absoluto) dentro deste filesystem.
    ///
    /// `self_arc` é o Arc deste próprio filesystem, para os handles criados
    /// guardarem a referência de dono.
    fn open(
        &self,
        self_arc: &Arc<dyn FileSystem>,
        path: &str,
        flags: OpenFlags,
    ) -> Result<FsNode, FsError>;

    /// Pendura (ou solta, com `None`) um filesystem filho no nó de diretório
    /// dado. Backends sem suporte a mount points devolvem `Unsupported`.
    fn attach_mount(
        &self,
        node: &FsNode,
        child: Option<Arc<dyn FileSystem>>,
    ) -> Result<(), FsError>;
}

/// Operações sobre um handle aberto. Uma implementação por (backend, tipo).
pub trait NodeOps: Send + Sync {
    fn filesize(&self) -> Result<u64, FsError>;
    fn seek(&mut self, offs: i64, whence: Whence) -> Result<(), FsError>;
    fn tell(&self) -> Result<u64, FsError>;
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, FsError>;
    fn write(&mut self, buf: &[u8]) -> Result<usize, FsError>;
    fn rewinddir(&mut self) -> Result<(), FsError>;
    fn readdir(&mut self) -> Result<Option<DirEntry>, FsError>;
    fn rename(&mut self, name: &str) -> Result<(), FsError>;
    fn remove(&mut self) -> Result<(), FsError>;

    /// Identidade do nó de backend por trás deste handle (chave da tabela
    /// de montagem).
    fn node_key(&self) -> u64;
}

/// Um handle aberto de arquivo ou diretório.
///
/// Criado por `open`, destruído por `close` (ou drop). Carrega o filesystem
/// dono, a tag de tipo e o estado específico do backend (posição de leitura,
/// cursor de diretório).
pub struct FsNode {
    pub(crate) fs: Arc<dyn FileSystem>,
    pub(crate) kind: NodeKind,
    pub(crate) ops: Box<dyn NodeOps>,
}

impl FsNode {
    /// Constrói um nó; uso exclusivo dos backends.
    pub(crate) fn new(fs: Arc<dyn FileSystem>, kind: NodeKind, ops: Box<dyn NodeOps>) -> Self {
        Self { fs, kind, ops }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn fs_type(&self) -> FsType {
        self.fs.fs_type()
    }

    fn require(&self, kind: NodeKind, err: FsError) -> Result<(), FsError> {
        if self.kind != kind {
            return Err(err);
        }
        Ok(())
    }

    /// Tamanho do arquivo em bytes.
    pub fn filesize(&self) -> Result<u64, FsError> {
        self.require(NodeKind::File, FsError::NotFile)?;
        self.ops.filesize()
    }

    /// Reposiciona o cursor de leitura/escrita.
    pub fn seek(&mut self, offs: i64, whence: Whence) -> Result<(), FsError> {
        self.require(NodeKind::File, FsError::NotFile)?;
        self.ops.seek(offs, whence)
    }

    /// Posição corrente do cursor.
    pub fn tell(&self) -> Result<u64, FsError> {
        self.require(NodeKind::File, FsError::NotFile)?;
        self.ops.tell()
    }

    /// Lê até `buf.len()` bytes. Retorna 0 no fim do arquivo.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, FsError> {
        self.require(NodeKind::File, FsError::NotFile)?;
        self.ops.read(buf)
    }

    /// Escreve `buf` na posição corrente.
    pub fn write(&mut self, buf: &[u8]) -> Result<usize, FsError> {
        self.require(NodeKind::File, FsError::NotFile)?;
        self.ops.write(buf)
    }

    /// Volta o cursor de diretório para a primeira entrada.
    pub fn rewinddir(&mut self) -> Result<(), FsError> {
        self.require(NodeKind::Dir, FsError::NotDirectory)?;
        self.ops.rewinddir()
    }

    /// Próxima entrada do diretório, ou `None` no fim.
    pub fn readdir(&mut self) -> Result<Option<DirEntry>, FsError> {
        self.require(NodeKind::Dir, FsError::NotDirectory)?;
        self.ops.readdir()
    }

    /// Renomeia o nó por trás deste handle.
    pub fn rename(&mut self, name: &str) -> Result<(), FsError> {
        self.ops.rename(name)
    }
}

/// Contexto process-wide do VFS: raiz, cwd e tabela de montagem.
struct Vfs {
    root: Option<Arc<dyn FileSystem>>,
    cwd_node: Option<FsNode>,
    cwd_path: String,
    mounts: MountTable,
}

impl Vfs {
    const fn new() -> Self {
        Self {
            root: None,
            cwd_node: None,
            cwd_path: String::new(),
            mounts: MountTable::new(),
        }
    }
}

static VFS: Spinlock<Vfs> = Spinlock::new(Vfs::new());

/// Identidade estável de um filesystem (para a tabela de montagem).
fn fs_id(fs: &Arc<dyn FileSystem>) -> usize {
    Arc::as_ptr(fs) as *const () as usize
}

/// Monta um filesystem.
///
/// Cada driver conhecido é sondado em ordem — memfs primeiro, FAT depois —
/// e o primeiro que reconhecer o dispositivo/formato vence.
///
/// Com `parent == None` o novo filesystem vira a raiz process-wide (falha
/// com `Busy`, sem mudança de estado, se já houver raiz) e o diretório de
/// trabalho é resetado para `/`. Senão, o filho é pendurado no nó de
/// diretório dado e registrado na tabela de montagem.
pub fn mount(
    dev: Option<Arc<dyn BlockDevice>>,
    start: u64,
    size: u64,
    parent: Option<&FsNode>,
) -> Result<Arc<dyn FileSystem>, FsError> {
    if parent.is_none() && VFS.lock().root.is_some() {
        crate::kwarn!("(VFS) mount: raiz já montada");
        return Err(FsError::Busy);
    }

    let fs = probe_filesystems(dev, start, size)?;

    match parent {
        None => {
            {
                let mut vfs = VFS.lock();
                if vfs.root.is_some() {
                    // Corrida perdida entre o check inicial e o probe.
                    return Err(FsError::Busy);
                }
                vfs.root = Some(fs.clone());
            }
            chdir("/")?;
            Ok(fs)
        }
        Some(parent_node) => {
            if parent_node.kind() != NodeKind::Dir {
                return Err(FsError::NotDirectory);
            }
            parent_node.fs.attach_mount(parent_node, Some(fs.clone()))?;
            VFS.lock().mounts.add(
                fs_id(&parent_node.fs),
                parent_node.ops.node_key(),
                fs.clone(),
            );
            Ok(fs)
        }
    }
}

/// Sonda os drivers conhecidos em ordem fixa: memfs, depois FAT.
fn probe_filesystems(
    dev: Option<Arc<dyn BlockDevice>>,
    start: u64,
    size: u64,
) -> Result<Arc<dyn FileSystem>, FsError> {
    match super::memfs::create(dev.clone(), start, size) {
        Ok(fs) => return Ok(fs),
        Err(FsError::WrongDevice) => {}
        Err(e) => return Err(e),
    }
    match super::fat::create(dev, start, size) {
        Ok(fs) => Ok(fs),
        Err(e) => {
            crate::kwarn!("(VFS) nenhum driver reconheceu o dispositivo: {}", e);
            Err(e)
        }
    }
}

/// Abre um caminho.
///
/// Caminhos absolutos resolvem a partir da raiz; relativos, a partir do
/// diretório de trabalho corrente. A travessia em si é delegada ao `open`
/// do filesystem dono (que cruza mount points sozinho).
pub fn open(path: &str, flags: OpenFlags) -> Result<FsNode, FsError> {
    if path.is_empty() {
        return Err(FsError::InvalidPath);
    }

    let (fs, abs_path) = {
        let vfs = VFS.lock();
        let root = vfs.root.clone().ok_or(FsError::NotFound)?;
        if is_absolute(path) {
            (root, String::from(path))
        } else {
            if vfs.cwd_node.is_none() {
                return Err(FsError::NotFound);
            }
            (root, join(&vfs.cwd_path, path))
        }
    };

    fs.open(&fs, &abs_path, flags)
}

/// Fecha um handle. O backend libera o estado associado no drop.
pub fn close(node: FsNode) {
    drop(node);
}

/// Remove o arquivo/diretório por trás do handle.
///
/// Diretórios precisam estar vazios; um nó raiz (sem pai) não pode ser
/// removido. Remover um nó que era mount point também solta a entrada
/// correspondente da tabela de montagem.
pub fn remove(node: &mut FsNode) -> Result<(), FsError> {
    let key = node.ops.node_key();
    let id = fs_id(&node.fs);
    node.ops.remove()?;
    VFS.lock().mounts.remove_node(id, key);
    Ok(())
}

/// Muda o diretório de trabalho corrente.
///
/// - `.` é no-op;
/// - `..` recorta o último componente do caminho em cache (e falha na raiz);
/// - caminhos absolutos substituem o cwd, relativos são anexados a ele.
///
/// Em caso de falha o cwd anterior (caminho E nó) fica intacto. Estourar o
/// buffer fixo do caminho é fatal.
pub fn chdir(path: &str) -> Result<(), FsError> {
    if path.is_empty() {
        return Err(FsError::InvalidPath);
    }
    if path == "." {
        return Ok(());
    }

    let target: String = {
        let vfs = VFS.lock();
        if path == ".." {
            let cur = vfs.cwd_path.as_str();
            if cur.len() <= 1 {
                // Já estamos na raiz; não há para onde subir.
                return Err(FsError::NotFound);
            }
            let pos = cur.rfind('/').unwrap_or(0);
            let end = if pos == 0 { 1 } else { pos };
            String::from(&cur[..end])
        } else if is_absolute(path) {
            String::from(path)
        } else {
            join(&vfs.cwd_path, path)
        }
    };

    if target.len() > MAX_CWD_PATH {
        panic!("fs_chdir: caminho longo demais ({} bytes)", target.len());
    }

    let node = open(&target, OpenFlags::empty())?;
    if node.kind() != NodeKind::Dir {
        return Err(FsError::NotDirectory);
    }

    let mut vfs = VFS.lock();
    vfs.cwd_path = target;
    // O nó anterior é fechado (dropado) na substituição.
    vfs.cwd_node = Some(node);
    Ok(())
}

/// Caminho do diretório de trabalho corrente.
pub fn getcwd() -> String {
    VFS.lock().cwd_path.clone()
}

/// Há um filesystem raiz montado?
pub fn has_root() -> bool {
    VFS.lock().root.is_some()
}

/// Quantidade de montagens não-raiz ativas.
pub fn mount_count() -> usize {
    VFS.lock().mounts.len()
}
