//! Backend em memória do VFS.
//!
//! Uma árvore pura de nós no heap do kernel, indexada por arena (IDs de nó
//! em vez de ponteiros pai/filho crus). Suporta criação, escrita com
//! crescimento geométrico do buffer, renomeação e remoção.
//!
//! É também o único backend que aceita mount points: um nó de diretório com
//! um filesystem filho pendurado re-despacha o resto do caminho para o
//! `open` do filho, re-prefixado com separador — inclusive quando o mount
//! point é o último componente do caminho.

use super::path::{next_component, skip_separators};
use super::vfs::{FileSystem, FsNode, NodeOps};
use super::{DirEntry, FsError, FsType, NodeKind, OpenFlags, Whence};
use crate::drivers::block::BlockDevice;
use crate::sync::Spinlock;
use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;

/// Tamanho máximo de um nome de nó; nomes maiores são truncados.
const MAX_NAME: usize = 120;

type NodeId = usize;

/// Um nó da árvore.
struct MemNode {
    name: String,
    kind: NodeKind,
    parent: Option<NodeId>,
    /// Filhos em ordem de inserção (diretórios).
    children: Vec<NodeId>,
    /// Conteúdo (arquivos). O comprimento é o tamanho lógico do arquivo.
    data: Vec<u8>,
    /// Filesystem filho pendurado neste diretório, se houver.
    mount: Option<Arc<dyn FileSystem>>,
}

impl MemNode {
    fn new(name: &str, kind: NodeKind, parent: Option<NodeId>) -> Self {
        let mut name = String::from(name);
        name.truncate(MAX_NAME);
        Self {
            name,
            kind,
            parent,
            children: Vec::new(),
            data: Vec::new(),
            mount: None,
        }
    }
}

/// A arena de nós: slots reutilizáveis indexados por NodeId.
struct MemArena {
    nodes: Vec<Option<MemNode>>,
    free: Vec<NodeId>,
    root: NodeId,
}

impl MemArena {
    fn new() -> Self {
        let mut arena = Self {
            nodes: Vec::new(),
            free: Vec::new(),
            root: 0,
        };
        arena.root = arena.alloc(MemNode::new("", NodeKind::Dir, None));
        arena
    }

    fn alloc(&mut self, node: MemNode) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.nodes[id] = Some(node);
            id
        } else {
            self.nodes.push(Some(node));
            self.nodes.len() - 1
        }
    }

    /// Nó vivo por trás do id, ou NotFound para handles de nós já removidos.
    fn node(&self, id: NodeId) -> Result<&MemNode, FsError> {
        self.nodes
            .get(id)
            .and_then(|slot| slot.as_ref())
            .ok_or(FsError::NotFound)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut MemNode, FsError> {
        self.nodes
            .get_mut(id)
            .and_then(|slot| slot.as_mut())
            .ok_or(FsError::NotFound)
    }

    /// Procura `name` dentro do diretório `dir`. `.` é o próprio diretório,
    /// `..` o pai; a comparação de nomes ignora caixa (ASCII).
    fn find_entry(&self, dir: NodeId, name: &str) -> Option<NodeId> {
        let dnode = self.node(dir).ok()?;
        if name == "." {
            return Some(dir);
        }
        if name == ".." {
            return dnode.parent;
        }
        dnode
            .children
            .iter()
            .copied()
            .find(|&child| match self.node(child) {
                Ok(n) => n.name.eq_ignore_ascii_case(name),
                Err(_) => false,
            })
    }

    /// Cria um filho novo dentro de `parent`.
    fn create_child(&mut self, parent: NodeId, name: &str, kind: NodeKind) -> Result<NodeId, FsError> {
        if name.is_empty() || name == "." || name == ".." {
            return Err(FsError::InvalidPath);
        }
        let id = self.alloc(MemNode::new(name, kind, Some(parent)));
        self.node_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Libera um nó e toda a sua subárvore (iterativo, sem recursão).
    fn free_subtree(&mut self, id: NodeId) {
        let mut stack = alloc::vec![id];
        while let Some(cur) = stack.pop() {
            if let Some(Some(node)) = self.nodes.get_mut(cur).map(|s| s.take()) {
                stack.extend(node.children.iter().copied());
                self.free.push(cur);
            }
        }
    }

    /// Desliga `id` da lista de filhos do seu pai.
    fn unlink(&mut self, id: NodeId) -> Result<(), FsError> {
        let parent = self.node(id)?.parent.ok_or(FsError::Busy)?;
        let children = &mut self.node_mut(parent)?.children;
        if let Some(pos) = children.iter().position(|&c| c == id) {
            children.remove(pos);
        }
        Ok(())
    }
}

/// O filesystem em memória.
pub struct MemFs {
    arena: Arc<Spinlock<MemArena>>,
}

/// Sonda/cria: o memfs "reconhece" exatamente a ausência de dispositivo.
pub fn create(
    dev: Option<Arc<dyn BlockDevice>>,
    _start: u64,
    _size: u64,
) -> Result<Arc<dyn FileSystem>, FsError> {
    if dev.is_some() {
        return Err(FsError::WrongDevice);
    }
    Ok(Arc::new(MemFs {
        arena: Arc::new(Spinlock::new(MemArena::new())),
    }))
}

impl MemFs {
    fn make_node(&self, self_arc: &Arc<dyn FileSystem>, id: NodeId, kind: NodeKind) -> FsNode {
        let ops: Box<dyn NodeOps> = match kind {
            NodeKind::File => Box::new(MemFileHandle {
                arena: self.arena.clone(),
                node: id,
                pos: 0,
            }),
            NodeKind::Dir => Box::new(MemDirHandle {
                arena: self.arena.clone(),
                node: id,
                cursor: 0,
            }),
        };
        FsNode::new(self_arc.clone(), kind, ops)
    }
}

/// Re-despacha o resto do caminho para o filesystem filho montado,
/// re-prefixado com separador.
fn open_mount(
    child: &Arc<dyn FileSystem>,
    rest: &str,
    flags: OpenFlags,
) -> Result<FsNode, FsError> {
    let mut path = String::with_capacity(rest.len() + 1);
    path.push('/');
    path.push_str(rest);
    child.open(child, &path, flags)
}

impl FileSystem for MemFs {
    fn fs_type(&self) -> FsType {
        FsType::Mem
    }

    fn open(
        &self,
        self_arc: &Arc<dyn FileSystem>,
        path: &str,
        flags: OpenFlags,
    ) -> Result<FsNode, FsError> {
        let mut rest = skip_separators(path);

        let mut guard = self.arena.lock();
        let mut cur = guard.root;

        loop {
            // Outro filesystem pendurado neste diretório? Completar a
            // operação recursivamente no filho. A checagem fica no topo do
            // loop para cobrir também o caso do mount point ser o último
            // componente do caminho (ex: opendir("/mnt/foo")).
            if let Some(child) = guard.node(cur)?.mount.clone() {
                drop(guard);
                return open_mount(&child, rest, flags);
            }

            if rest.is_empty() {
                break;
            }

            if guard.node(cur)?.kind != NodeKind::Dir {
                // Ainda há componentes, mas o último resolvido não é dir.
                return Err(FsError::NotDirectory);
            }

            let (name, next) = next_component(rest);
            let parent = cur;

            match guard.find_entry(cur, name) {
                Some(found) => {
                    cur = found;
                    rest = next;
                }
                None => {
                    if !next.is_empty() || !flags.contains(OpenFlags::CREATE) {
                        return Err(FsError::NotFound);
                    }
                    // Criar e pendurar no pai.
                    let kind = if flags.contains(OpenFlags::DIR) {
                        NodeKind::Dir
                    } else {
                        NodeKind::File
                    };
                    let id = guard.create_child(parent, name, kind)?;
                    drop(guard);
                    return Ok(self.make_node(self_arc, id, kind));
                }
            }
        }

        if flags.contains(OpenFlags::EXCL) {
            return Err(FsError::Exists);
        }
        let kind = guard.node(cur)?.kind;
        drop(guard);
        Ok(self.make_node(self_arc, cur, kind))
    }

    fn attach_mount(
        &self,
        node: &FsNode,
        child: Option<Arc<dyn FileSystem>>,
    ) -> Result<(), FsError> {
        if node.kind() != NodeKind::Dir {
            return Err(FsError::NotDirectory);
        }
        let id = node.ops.node_key() as NodeId;
        let mut arena = self.arena.lock();
        arena.node_mut(id)?.mount = child;
        Ok(())
    }
}

// =============================================================================
// Handles abertos
// =============================================================================

/// Handle de arquivo aberto: id do nó + posição corrente.
struct MemFileHandle {
    arena: Arc<Spinlock<MemArena>>,
    node: NodeId,
    pos: u64,
}

impl NodeOps for MemFileHandle {
    fn filesize(&self) -> Result<u64, FsError> {
        let arena = self.arena.lock();
        Ok(arena.node(self.node)?.data.len() as u64)
    }

    fn seek(&mut self, offs: i64, whence: Whence) -> Result<(), FsError> {
        let size = self.filesize()? as i64;
        let new_pos = match whence {
            Whence::Set => offs,
            Whence::Cur => self.pos as i64 + offs,
            Whence::End => size + offs,
        };
        // Posições negativas são grampeadas em zero.
        self.pos = new_pos.max(0) as u64;
        Ok(())
    }

    fn tell(&self) -> Result<u64, FsError> {
        Ok(self.pos)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize, FsError> {
        let arena = self.arena.lock();
        let data = &arena.node(self.node)?.data;
        let pos = self.pos as usize;
        if pos >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - pos);
        buf[..n].copy_from_slice(&data[pos..pos + n]);
        drop(arena);
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, FsError> {
        let mut arena = self.arena.lock();
        let pos = self.pos as usize;
        let need = pos + buf.len();
        let data = &mut arena.node_mut(self.node)?.data;

        // Crescimento geométrico: dobrar a capacidade até o total caber.
        if need > data.capacity() {
            let doubled = data.capacity().max(1) * 2;
            let new_cap = if need < doubled { doubled } else { need };
            data.reserve_exact(new_cap - data.len());
        }
        if need > data.len() {
            data.resize(need, 0);
        }
        data[pos..need].copy_from_slice(buf);
        drop(arena);
        self.pos += buf.len() as u64;
        Ok(buf.len())
    }

    fn rewinddir(&mut self) -> Result<(), FsError> {
        Err(FsError::NotDirectory)
    }

    fn readdir(&mut self) -> Result<Option<DirEntry>, FsError> {
        Err(FsError::NotDirectory)
    }

    fn rename(&mut self, name: &str) -> Result<(), FsError> {
        let mut arena = self.arena.lock();
        let node = arena.node_mut(self.node)?;
        let mut name = String::from(name);
        name.truncate(MAX_NAME);
        node.name = name;
        Ok(())
    }

    fn remove(&mut self) -> Result<(), FsError> {
        let mut arena = self.arena.lock();
        arena.node(self.node)?;
        arena.unlink(self.node)?;
        arena.free_subtree(self.node);
        Ok(())
    }

    fn node_key(&self) -> u64 {
        self.node as u64
    }
}

/// Handle de diretório aberto: id do nó + cursor de leitura.
struct MemDirHandle {
    arena: Arc<Spinlock<MemArena>>,
    node: NodeId,
    cursor: usize,
}

impl NodeOps for MemDirHandle {
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
        let arena = self.arena.lock();
        let node = arena.node(self.node)?;
        let Some(&child_id) = node.children.get(self.cursor) else {
            return Ok(None);
        };
        let child = arena.node(child_id)?;
        let entry = DirEntry {
            name: child.name.clone(),
            kind: child.kind,
            size: child.data.len() as u64,
        };
        drop(arena);
        self.cursor += 1;
        Ok(Some(entry))
    }

    fn rename(&mut self, name: &str) -> Result<(), FsError> {
        let mut arena = self.arena.lock();
        let node = arena.node_mut(self.node)?;
        let mut name = String::from(name);
        name.truncate(MAX_NAME);
        node.name = name;
        Ok(())
    }

    fn remove(&mut self) -> Result<(), FsError> {
        let mut arena = self.arena.lock();
        let node = arena.node(self.node)?;
        if !node.children.is_empty() {
            return Err(FsError::NotEmpty);
        }
        arena.unlink(self.node)?;
        arena.free_subtree(self.node);
        Ok(())
    }

    fn node_key(&self) -> u64 {
        self.node as u64
    }
}
