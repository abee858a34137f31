//! Owned draw data produced by a finished immediate-mode frame
//!
//! A runtime copies its engine-side draw lists into these types at the end of
//! the frame, so painting never needs the engine's frame-scoped pointers.

use std::fmt;
use std::rc::Rc;

/// Index type of immediate-mode meshes
pub type DrawIdx = u16;

/// Texture identifier carried by draw commands
///
/// Ids are derived from resource names, so the same name yields the same id in
/// every context.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(u64);

impl TextureId {
    /// Id of the resource called `name` (FNV-1a, never zero)
    pub fn from_name(name: &str) -> Self {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0100_0000_01b3;
        let hash = name
            .bytes()
            .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME));
        Self(hash.max(1))
    }

    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub const fn id(self) -> u64 {
        self.0
    }

    /// Zero means "no texture bound"
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Vertex format used by immediate-mode draw lists
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct DrawVert {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
    /// Packed RGBA, red in the low byte
    pub col: u32,
}

/// Parameters of an `Elements` command
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DrawCmdParams {
    /// `[x1, y1, x2, y2]` in frame space
    pub clip_rect: [f32; 4],
    pub texture_id: TextureId,
    pub vtx_offset: usize,
    pub idx_offset: usize,
}

/// Callback recorded into a draw list
pub type DrawCallback = Rc<dyn Fn()>;

/// A single draw command
#[derive(Clone)]
pub enum DrawCmd {
    Elements { count: usize, cmd_params: DrawCmdParams },
    ResetRenderState,
    Callback(DrawCallback),
}

impl fmt::Debug for DrawCmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DrawCmd::Elements { count, cmd_params } => f
                .debug_struct("Elements")
                .field("count", count)
                .field("cmd_params", cmd_params)
                .finish(),
            DrawCmd::ResetRenderState => f.write_str("ResetRenderState"),
            DrawCmd::Callback(_) => f.write_str("Callback"),
        }
    }
}

/// Vertex buffer, index buffer and commands of one draw list
#[derive(Clone, Debug, Default)]
pub struct DrawList {
    pub vertices: Vec<DrawVert>,
    pub indices: Vec<DrawIdx>,
    pub commands: Vec<DrawCmd>,
}

impl DrawList {
    /// Index slice of an `Elements` command, `None` if it is out of range
    pub fn indices_for(&self, count: usize, idx_offset: usize) -> Option<&[DrawIdx]> {
        self.indices.get(idx_offset..idx_offset.checked_add(count)?)
    }
}

/// Every draw list of a finished frame
#[derive(Clone, Debug, Default)]
pub struct DrawFrame {
    pub display_size: [f32; 2],
    pub lists: Vec<DrawList>,
}

impl DrawFrame {
    pub fn draw_lists(&self) -> impl Iterator<Item = &DrawList> {
        self.lists.iter()
    }

    pub fn total_vtx_count(&self) -> usize {
        self.lists.iter().map(|list| list.vertices.len()).sum()
    }

    pub fn total_idx_count(&self) -> usize {
        self.lists.iter().map(|list| list.indices.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.iter().all(|list| list.commands.is_empty())
    }
}

/// Vertex in the host's custom-mesh format
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct HostVertex {
    pub position: [f32; 2],
    /// UV in `[0..2]`, the secondary pair is fixed at `1.0`
    pub tex_coords: [f32; 4],
    pub color: [u8; 4],
}

impl HostVertex {
    /// Translate an immediate-mode vertex into paint space
    pub fn from_draw_vert(vert: &DrawVert, origin: [f32; 2]) -> Self {
        Self {
            position: [vert.pos[0] + origin[0], vert.pos[1] + origin[1]],
            tex_coords: [vert.uv[0], vert.uv[1], 1.0, 1.0],
            color: vert.col.to_le_bytes(),
        }
    }
}
