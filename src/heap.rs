// ABOUTME: Heap blocks, the stack block, slot load/store and mark-and-sweep collection

use crate::scope::{ClassDef, FnDef};
use crate::value::{Data, Origin, Spec, Type, Value};

/// Handle to a heap block. The wire encoding is the raw non-zero u32 stored
/// in reference slots; 0 in a slot means null.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(u32);

impl BlockId {
    fn from_index(index: usize) -> Self {
        BlockId(index as u32 + 1)
    }

    fn index(self) -> usize {
        self.0 as usize - 1
    }

    fn encode(id: Option<BlockId>) -> u32 {
        id.map(|b| b.0).unwrap_or(0)
    }

    fn decode(raw: u32) -> Option<BlockId> {
        if raw == 0 {
            None
        } else {
            Some(BlockId(raw))
        }
    }
}

/// A raw byte buffer plus its mark bit.
#[derive(Debug)]
pub struct Block {
    pub data: Vec<u8>,
    pub used: bool,
}

/// Point-in-time heap statistics for the debug report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
    pub live_blocks: usize,
    pub live_bytes: usize,
}

/// The block store: a slab with a free list. Allocation zero-fills; sweeping
/// releases every block whose mark bit stayed clear.
#[derive(Debug, Default)]
pub struct Heap {
    blocks: Vec<Option<Block>>,
    free: Vec<usize>,
}

impl Heap {
    pub fn new() -> Self {
        Heap::default()
    }

    pub fn alloc(&mut self, size: usize) -> BlockId {
        let block = Block {
            data: vec![0; size],
            used: true,
        };
        match self.free.pop() {
            Some(index) => {
                self.blocks[index] = Some(block);
                BlockId::from_index(index)
            }
            None => {
                self.blocks.push(Some(block));
                BlockId::from_index(self.blocks.len() - 1)
            }
        }
    }

    /// Allocate a block holding exactly the given bytes.
    pub fn alloc_bytes(&mut self, bytes: &[u8]) -> BlockId {
        let id = self.alloc(bytes.len());
        self.block_mut(id).data.copy_from_slice(bytes);
        id
    }

    /// Allocate a string block; a string's byte length is its block size.
    pub fn alloc_string(&mut self, s: &str) -> BlockId {
        self.alloc_bytes(s.as_bytes())
    }

    fn block(&self, id: BlockId) -> &Block {
        self.blocks[id.index()]
            .as_ref()
            .unwrap_or_else(|| panic!("dangling heap handle"))
    }

    fn block_mut(&mut self, id: BlockId) -> &mut Block {
        self.blocks[id.index()]
            .as_mut()
            .unwrap_or_else(|| panic!("dangling heap handle"))
    }

    pub fn size(&self, id: BlockId) -> usize {
        self.block(id).data.len()
    }

    pub fn bytes(&self, id: BlockId) -> &[u8] {
        &self.block(id).data
    }

    // ===== Slot access =====

    pub fn read_i32(&self, id: BlockId, off: usize) -> i32 {
        let d = &self.block(id).data[off..off + 4];
        i32::from_le_bytes([d[0], d[1], d[2], d[3]])
    }

    pub fn write_i32(&mut self, id: BlockId, off: usize, v: i32) {
        self.block_mut(id).data[off..off + 4].copy_from_slice(&v.to_le_bytes());
    }

    pub fn read_f32(&self, id: BlockId, off: usize) -> f32 {
        f32::from_bits(self.read_i32(id, off) as u32)
    }

    pub fn write_f32(&mut self, id: BlockId, off: usize, v: f32) {
        self.write_i32(id, off, v.to_bits() as i32);
    }

    pub fn read_handle(&self, id: BlockId, off: usize) -> Option<BlockId> {
        BlockId::decode(self.read_i32(id, off) as u32)
    }

    pub fn write_handle(&mut self, id: BlockId, off: usize, v: Option<BlockId>) {
        self.write_i32(id, off, BlockId::encode(v) as i32);
    }

    /// Read a typed value out of a block, recording its origin so the result
    /// is an lvalue.
    pub fn load(&self, base: BlockId, off: usize, ty: Type) -> Value {
        let data = if ty.is_ref() {
            Data::Block(self.read_handle(base, off))
        } else {
            match ty.spec {
                Spec::F32 => Data::F32(self.read_f32(base, off)),
                _ => Data::I32(self.read_i32(base, off)),
            }
        };
        Value {
            ty,
            data,
            origin: Some(Origin { base, offset: off }),
        }
    }

    /// Write a value's payload into a block slot, interpreted per the slot's
    /// declared type.
    pub fn store(&mut self, base: BlockId, off: usize, ty: Type, value: &Value) {
        if ty.is_ref() {
            self.write_handle(base, off, value.handle());
        } else {
            match (ty.spec, value.data) {
                (Spec::F32, Data::F32(v)) => self.write_f32(base, off, v),
                (_, Data::I32(v)) => self.write_i32(base, off, v),
                (_, Data::F32(v)) => self.write_f32(base, off, v),
                _ => self.write_i32(base, off, 0),
            }
        }
    }

    // ===== Collection =====

    pub fn clear_marks(&mut self) {
        for block in self.blocks.iter_mut().flatten() {
            block.used = false;
        }
    }

    pub fn mark(&mut self, id: BlockId) {
        self.block_mut(id).used = true;
    }

    pub fn is_marked(&self, id: BlockId) -> bool {
        self.block(id).used
    }

    /// Release every unmarked block. Returns how many were freed.
    pub fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for index in 0..self.blocks.len() {
            let dead = matches!(&self.blocks[index], Some(block) if !block.used);
            if dead {
                self.blocks[index] = None;
                self.free.push(index);
                freed += 1;
            }
        }
        freed
    }

    pub fn stats(&self) -> HeapStats {
        let mut stats = HeapStats {
            live_blocks: 0,
            live_bytes: 0,
        };
        for block in self.blocks.iter().flatten() {
            stats.live_blocks += 1;
            stats.live_bytes += block.data.len();
        }
        stats
    }
}

// ============================================================================
// Marking
// ============================================================================

/// Mark the block a reference-typed value points at, then everything
/// reachable from it: class instances walk their field table against the
/// instance block, arrays walk their element slots. Already-marked blocks
/// stop the walk so reference cycles terminate.
pub fn mark_value(heap: &mut Heap, classes: &[ClassDef], ty: &Type, handle: Option<BlockId>) {
    let Some(id) = handle else {
        return;
    };
    if heap.is_marked(id) {
        return;
    }
    heap.mark(id);

    if ty.array {
        let elem = ty.elem();
        if elem.is_ref() {
            let count = heap.size(id) / elem.slot_size();
            for i in 0..count {
                let child = heap.read_handle(id, i * elem.slot_size());
                mark_value(heap, classes, &elem, child);
            }
        }
    } else if let Spec::Class(cid) = ty.spec {
        for i in 0..classes[cid].fields.len() {
            let field = classes[cid].fields[i];
            if field.ty.is_ref() {
                let child = heap.read_handle(id, field.off);
                mark_value(heap, classes, &field.ty, child);
            }
        }
    }
}

/// Mark the roots a value holds: its block for reference types, and for
/// function values carrying a receiver, the receiver's instance block.
pub fn mark_root(heap: &mut Heap, classes: &[ClassDef], fns: &[FnDef], value: &Value) {
    match value.data {
        Data::Block(handle) => mark_value(heap, classes, &value.ty, handle),
        Data::Fn(fid) => {
            if let Some(origin) = &value.origin {
                match fns[fid].class {
                    Some(cid) => {
                        mark_value(heap, classes, &Type::class(cid), Some(origin.base));
                    }
                    None => heap.mark(origin.base),
                }
            }
        }
        _ => {}
    }
}
