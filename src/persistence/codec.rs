//! Full-index save/load codec.
//!
//! # File layout
//!
//! ```text
//! [ 64B header ]                        see header.rs
//! [ key table  ]  size x (i64 key, u8 top_layer, u8 deleted, 2B pad)
//! [ arena      ]  size x D x element_size, keys in table order
//! [ edges      ]  per key, per layer 0..=top: u16 count, count x i64 keys
//! [ crc32_body ]  over everything between header and this trailer
//! ```
//!
//! Tombstoned slots are compacted away on save: they appear in neither the
//! key table nor any neighbor list. Load rebuilds storage and graph from
//! scratch and re-derives the entry point from the key table (highest top
//! layer, ties broken by smallest key).

use crate::error::{IndexError, Result};
use crate::hnsw::graph::{EntryPoint, GraphNode, SlotId};
use crate::hnsw::{HnswGraph, HnswParams};
use crate::metric::{Kernel, MetricKind};
use crate::persistence::header::{FileHeader, FORMAT_VERSION, HEADER_LEN};
use crate::storage::{ScalarKind, VectorStore};

/// Bytes per key-table entry.
const KEY_ENTRY_LEN: usize = 12;

/// Configuration of the index receiving a load.
///
/// The file must agree on dimensions, scalar kind, and metric; the graph
/// parameters travel in the file itself.
pub struct ExpectedConfig {
    /// Configured dimensionality.
    pub dimensions: u32,
    /// Configured scalar representation.
    pub scalar: ScalarKind,
    /// Configured metric.
    pub metric: MetricKind,
    /// Kernel for the rebuilt graph.
    pub kernel: Kernel,
    /// RNG seed for the rebuilt graph.
    pub seed: u64,
}

/// Serializes the live contents of an index.
///
/// # Errors
///
/// [`IndexError::Internal`] if graph and storage have drifted apart.
pub fn encode_index(store: &VectorStore, graph: &HnswGraph) -> Result<Vec<u8>> {
    let dims = store.dimensions() as usize;
    let live: Vec<SlotId> = store.live_slots().collect();
    let size = live.len() as u64;

    let (entry_key_lo, entry_top_layer) = match graph.entry() {
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        Some(entry) => (
            store.key_at(entry.slot) as u32,
            u32::from(entry.layer),
        ),
        None => (0, 0),
    };

    let params = graph.params();
    let header = FileHeader {
        version: FORMAT_VERSION,
        scalar_kind: store.kind().code(),
        metric_kind: graph.kernel().kind().code(),
        dimensions: store.dimensions(),
        size,
        capacity: store.capacity() as u64,
        m: params.m,
        ef_construction: params.ef_construction,
        ef_search: params.ef_search,
        entry_key_lo,
        entry_top_layer,
        scale: store.scale(),
    };

    let mut buf = Vec::with_capacity(
        HEADER_LEN + live.len() * (KEY_ENTRY_LEN + dims * store.kind().element_size()) + 4,
    );
    buf.extend_from_slice(&header.encode());

    // Key table.
    for &slot in &live {
        let node = graph
            .node(slot)
            .ok_or_else(|| IndexError::Internal(format!("slot {slot} missing graph node")))?;
        buf.extend_from_slice(&store.key_at(slot).to_le_bytes());
        buf.push(node.top_layer());
        buf.push(0); // deleted flag: live by construction
        buf.extend_from_slice(&[0, 0]); // pad
    }

    // Arena, keys in table order.
    match store.kind() {
        ScalarKind::F32 => {
            for &slot in &live {
                let elements = store.raw_f32(slot);
                if cfg!(target_endian = "little") {
                    buf.extend_from_slice(bytemuck::cast_slice(elements));
                } else {
                    for v in elements {
                        buf.extend_from_slice(&v.to_le_bytes());
                    }
                }
            }
        }
        ScalarKind::I8 => {
            for &slot in &live {
                buf.extend_from_slice(bytemuck::cast_slice(store.codes(slot)));
            }
        }
    }

    // Edges: live neighbors only, written as external keys.
    for &slot in &live {
        let node = graph
            .node(slot)
            .ok_or_else(|| IndexError::Internal(format!("slot {slot} missing graph node")))?;
        for layer in 0..=node.top_layer() {
            let live_neighbors: Vec<i64> = node
                .neighbors(layer)
                .iter()
                .copied()
                .filter(|&n| !store_is_deleted(store, n))
                .map(|n| store.key_at(n))
                .collect();
            let count = u16::try_from(live_neighbors.len()).map_err(|_| {
                IndexError::Internal(format!("layer list too long on slot {slot}"))
            })?;
            buf.extend_from_slice(&count.to_le_bytes());
            for key in live_neighbors {
                buf.extend_from_slice(&key.to_le_bytes());
            }
        }
    }

    let body_crc = crc32fast::hash(&buf[HEADER_LEN..]);
    buf.extend_from_slice(&body_crc.to_le_bytes());
    Ok(buf)
}

fn store_is_deleted(store: &VectorStore, slot: SlotId) -> bool {
    use crate::hnsw::graph::VectorSource;
    VectorSource::is_deleted(store, slot)
}

/// Sequential little-endian reader with truncation-typed errors.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or_else(truncated)?;
        if end > self.buf.len() {
            return Err(truncated());
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(
            self.take(2)?.try_into().expect("2 bytes"),
        ))
    }

    fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(
            self.take(8)?.try_into().expect("8 bytes"),
        ))
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }
}

fn truncated() -> IndexError {
    IndexError::Format("file truncated".into())
}

/// Deserializes an index image.
///
/// # Errors
///
/// - [`IndexError::Format`] on magic/version/section-size problems or a
///   scalar/metric kind that does not match `expect`.
/// - [`IndexError::Dimension`] when file and index dimensions differ.
/// - [`IndexError::Corrupted`] on a CRC mismatch.
pub fn decode_index(bytes: &[u8], expect: &ExpectedConfig) -> Result<(VectorStore, HnswGraph)> {
    let header = FileHeader::decode(bytes)?;

    if header.dimensions != expect.dimensions {
        return Err(IndexError::Dimension {
            expected: expect.dimensions as usize,
            actual: header.dimensions as usize,
        });
    }

    let scalar = ScalarKind::from_code(header.scalar_kind)
        .ok_or_else(|| IndexError::Format(format!("unknown scalar kind {}", header.scalar_kind)))?;
    if scalar != expect.scalar {
        return Err(IndexError::Format(format!(
            "scalar kind mismatch: file has {}, index is {}",
            scalar.name(),
            expect.scalar.name()
        )));
    }

    let metric = MetricKind::from_code(header.metric_kind)
        .ok_or_else(|| IndexError::Format(format!("unknown metric kind {}", header.metric_kind)))?;
    if metric != expect.metric {
        return Err(IndexError::Format(format!(
            "metric mismatch: file has {}, index is {}",
            metric.name(),
            expect.metric.name()
        )));
    }

    // Body CRC covers everything between header and trailer.
    if bytes.len() < HEADER_LEN + 4 {
        return Err(truncated());
    }
    let trailer_at = bytes.len() - 4;
    let stored_crc = u32::from_le_bytes(bytes[trailer_at..].try_into().expect("4 bytes"));
    let actual_crc = crc32fast::hash(&bytes[HEADER_LEN..trailer_at]);
    if stored_crc != actual_crc {
        return Err(IndexError::Corrupted(format!(
            "body crc mismatch: stored {stored_crc:#x}, computed {actual_crc:#x}"
        )));
    }

    let size = usize::try_from(header.size)
        .map_err(|_| IndexError::Format("size exceeds address space".into()))?;
    let dims = header.dimensions as usize;

    let params = HnswParams::new(header.m, header.ef_construction, header.ef_search);
    params
        .validate()
        .map_err(|e| IndexError::Format(format!("bad graph parameters in file: {e}")))?;

    let mut reader = Reader::new(&bytes[HEADER_LEN..trailer_at]);

    // Key table.
    let mut table: Vec<(i64, u8)> = Vec::with_capacity(size);
    for _ in 0..size {
        let key = reader.read_i64()?;
        let top_layer = reader.read_u8()?;
        let _deleted = reader.read_u8()?; // always 0: save compacts
        let _pad = reader.take(2)?;
        table.push((key, top_layer));
    }

    // Arena.
    let mut store = VectorStore::new(header.dimensions, scalar, None);
    store.set_scale(header.scale);
    let capacity = usize::try_from(header.capacity).unwrap_or(size).max(size);
    store.reserve(capacity)?;

    match scalar {
        ScalarKind::F32 => {
            let mut elements = vec![0f32; dims];
            for &(key, _) in &table {
                let raw = reader.take(dims * 4)?;
                for (out, chunk) in elements.iter_mut().zip(raw.chunks_exact(4)) {
                    *out = f32::from_le_bytes(chunk.try_into().expect("4 bytes"));
                }
                store
                    .put(key, &elements)
                    .map_err(|e| IndexError::Format(format!("bad key table: {e}")))?;
            }
        }
        ScalarKind::I8 => {
            for &(key, _) in &table {
                let raw = reader.take(dims)?;
                let codes: &[i8] = bytemuck::cast_slice(raw);
                store
                    .put_codes(key, codes)
                    .map_err(|e| IndexError::Format(format!("bad key table: {e}")))?;
            }
        }
    }

    // Edges.
    let mut nodes: Vec<GraphNode> = Vec::with_capacity(size);
    for &(key, top_layer) in &table {
        let mut layers: Vec<Vec<SlotId>> = Vec::with_capacity(top_layer as usize + 1);
        for _ in 0..=top_layer {
            let count = reader.read_u16()?;
            let mut list = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let neighbor_key = reader.read_i64()?;
                let slot = store.slot_of(neighbor_key).ok_or_else(|| {
                    IndexError::Format(format!(
                        "edge from key {key} references unknown key {neighbor_key}"
                    ))
                })?;
                list.push(slot);
            }
            layers.push(list);
        }
        nodes.push(GraphNode::from_layers(layers));
    }

    if reader.pos != reader.buf.len() {
        return Err(IndexError::Format(format!(
            "{} trailing bytes after edge section",
            reader.buf.len() - reader.pos
        )));
    }

    // Entry point: highest top layer, ties to the smallest key.
    let entry = table
        .iter()
        .enumerate()
        .max_by(|(_, (ka, la)), (_, (kb, lb))| la.cmp(lb).then_with(|| kb.cmp(ka)))
        .map(|(slot, &(_, layer))| EntryPoint {
            #[allow(clippy::cast_possible_truncation)]
            slot: slot as SlotId,
            layer,
        });

    let graph = HnswGraph::from_parts(params, expect.kernel, nodes, entry, expect.seed);
    Ok((store, graph))
}

/// Saves an index image to `path` (write-to-temp then rename).
///
/// # Errors
///
/// [`IndexError::Io`] on file-system failure; encoding errors as in
/// [`encode_index`].
pub fn save_index(store: &VectorStore, graph: &HnswGraph, path: &str) -> Result<()> {
    let bytes = encode_index(store, graph)?;
    let tmp = format!("{path}.tmp");
    std::fs::write(&tmp, &bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Loads an index image from `path`.
///
/// # Errors
///
/// [`IndexError::Io`] on read failure; decoding errors as in
/// [`decode_index`].
pub fn load_index(path: &str, expect: &ExpectedConfig) -> Result<(VectorStore, HnswGraph)> {
    let bytes = std::fs::read(path)?;
    decode_index(&bytes, expect)
}
