//! Bag of Cells (BoC) serialization and deserialization
//!
//! BoC is a serialization format that encodes cells into byte arrays.
//! Cells are laid out breadth-first from the roots, with cells moved towards
//! the end until every reference points to a strictly larger index. A reader
//! can then rebuild the graph from the last cell backwards.

use crate::crc::CRC32C;
use crate::tvm::bitstring::BitString;
use crate::tvm::cell::{ArcCell, Cell, CellHash, LevelMask, MAX_CELL_BITS, MAX_CELL_REFS};
use crate::tvm::error::{BocError, CellError, Result};
use base64::Engine;
use byteorder::{BigEndian, ByteOrder, LittleEndian};
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// BoC magic number for standard format
const BOC_GENERIC_MAGIC: u32 = 0xb5ee9c72;

/// BoC magic number for the legacy indexed format
const BOC_INDEXED_MAGIC: u32 = 0x68ff65f3;

/// BoC magic number for the legacy indexed format with CRC32C
const BOC_INDEXED_CRC32C_MAGIC: u32 = 0xacc3a728;

/// Serialization flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BocOptions {
    /// Write the per-cell offset index
    pub has_index: bool,
    /// Append a CRC32C checksum of the whole buffer
    pub has_crc32c: bool,
    /// Mark cells referenced more than once in the index (requires `has_index`)
    pub has_cache_bits: bool,
}

impl Default for BocOptions {
    fn default() -> Self {
        Self {
            has_index: false,
            has_crc32c: true,
            has_cache_bits: false,
        }
    }
}

/// Limits applied while decoding untrusted buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    pub min_roots: usize,
    pub max_roots: usize,
    pub max_cells: usize,
    /// Verify the trailing checksum when the header announces one
    pub verify_crc: bool,
}

impl DecodeOptions {
    /// Accepts exactly `roots` roots
    pub fn exact(roots: usize) -> Self {
        Self {
            min_roots: roots,
            max_roots: roots,
            ..Self::default()
        }
    }
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            min_roots: 1,
            max_roots: usize::MAX,
            max_cells: 1 << 24,
            verify_crc: true,
        }
    }
}

/// Serializes a cell and its references into a Bag of Cells (BoC) format
pub fn serialize_boc(root: &ArcCell, has_crc32c: bool) -> Result<Vec<u8>> {
    let options = BocOptions {
        has_crc32c,
        ..BocOptions::default()
    };
    serialize_boc_ext(std::slice::from_ref(root), &options)
}

/// Serializes several roots into one bag, sharing common subtrees
pub fn serialize_boc_ext(roots: &[ArcCell], options: &BocOptions) -> Result<Vec<u8>> {
    if roots.is_empty() {
        return Err(BocError::NoRoots.into());
    }

    let (cells, index) = collect_cells(roots);
    let ref_size = bytes_needed(cells.len());

    let mut parents = vec![0usize; cells.len()];
    let mut serialized_cells = Vec::with_capacity(cells.len());
    for cell in &cells {
        let mut raw = Vec::with_capacity(2 + 128 + ref_size * MAX_CELL_REFS);
        raw.extend_from_slice(&cell.descriptors());
        raw.extend_from_slice(&cell.serialize_data());
        for child in cell.references() {
            let child_index = index[&child.repr_hash()];
            parents[child_index] += 1;
            write_be(&mut raw, child_index, ref_size);
        }
        serialized_cells.push(raw);
    }

    let cells_size: usize = serialized_cells.iter().map(Vec::len).sum();
    let offset_size = bytes_needed(cells_size);
    let has_cache_bits = options.has_index && options.has_cache_bits;

    let mut result = Vec::with_capacity(
        16 + roots.len() * ref_size + cells.len() * offset_size + cells_size + 4,
    );
    let mut magic = [0u8; 4];
    BigEndian::write_u32(&mut magic, BOC_GENERIC_MAGIC);
    result.extend_from_slice(&magic);

    let flags = ((options.has_index as u8) << 7)
        | ((options.has_crc32c as u8) << 6)
        | ((has_cache_bits as u8) << 5);
    result.push(flags | ref_size as u8);
    result.push(offset_size as u8);

    write_be(&mut result, cells.len(), ref_size);
    write_be(&mut result, roots.len(), ref_size);
    write_be(&mut result, 0, ref_size);
    write_be(&mut result, cells_size, offset_size);
    for root in roots {
        write_be(&mut result, index[&root.repr_hash()], ref_size);
    }

    if options.has_index {
        let mut offset = 0;
        for (i, raw) in serialized_cells.iter().enumerate() {
            offset += raw.len();
            let entry = if has_cache_bits {
                offset * 2 + (parents[i] > 1) as usize
            } else {
                offset
            };
            write_be(&mut result, entry, offset_size);
        }
    }

    for raw in &serialized_cells {
        result.extend_from_slice(raw);
    }

    if options.has_crc32c {
        let mut crc = [0u8; 4];
        LittleEndian::write_u32(&mut crc, CRC32C.checksum(&result));
        result.extend_from_slice(&crc);
    }

    trace!(
        "serialized {} cells ({} roots) into {} bytes",
        cells.len(),
        roots.len(),
        result.len()
    );
    Ok(result)
}

/// Orders unique cells so that parents always precede their children.
///
/// Cells are numbered breadth-first from the roots. Any child that ended up
/// before one of its parents is moved to the end, repeating until every
/// reference points forward.
fn collect_cells(roots: &[ArcCell]) -> (Vec<ArcCell>, HashMap<CellHash, usize>) {
    let mut cells: Vec<ArcCell> = Vec::new();
    let mut order: HashMap<CellHash, usize> = HashMap::new();

    let mut level: Vec<ArcCell> = roots.to_vec();
    while !level.is_empty() {
        let mut next = Vec::new();
        for cell in level {
            let hash = cell.repr_hash();
            if order.contains_key(&hash) {
                continue;
            }
            order.insert(hash, cells.len());
            next.extend(cell.references().iter().cloned());
            cells.push(cell);
        }
        level = next;
    }

    let mut next_index = cells.len();
    let mut changed = true;
    while changed {
        changed = false;
        for cell in &cells {
            let parent = order[&cell.repr_hash()];
            for child in cell.references() {
                let child_order = order.entry(child.repr_hash()).or_default();
                if *child_order < parent {
                    *child_order = next_index;
                    next_index += 1;
                    changed = true;
                }
            }
        }
    }

    cells.sort_by_key(|cell| order[&cell.repr_hash()]);
    let index = cells
        .iter()
        .enumerate()
        .map(|(i, cell)| (cell.repr_hash(), i))
        .collect();
    (cells, index)
}

/// Deserializes a Bag of Cells (BoC) with exactly one root
pub fn deserialize_boc(data: &[u8]) -> Result<ArcCell> {
    let mut roots = deserialize_boc_ext(data, &DecodeOptions::exact(1))?;
    roots.pop().ok_or_else(|| BocError::NoRoots.into())
}

/// Deserializes a Bag of Cells (BoC) with any number of roots
pub fn deserialize_boc_multi(data: &[u8]) -> Result<Vec<ArcCell>> {
    deserialize_boc_ext(data, &DecodeOptions::default())
}

struct BocHeader {
    ref_size: usize,
    offset_size: usize,
    has_index: bool,
    has_crc32c: bool,
    has_cache_bits: bool,
    cell_count: usize,
    roots: Vec<usize>,
    cells_size: usize,
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> std::result::Result<&'a [u8], BocError> {
        let end = self.pos.checked_add(len).ok_or(BocError::UnexpectedEof)?;
        let bytes = self
            .data
            .get(self.pos..end)
            .ok_or(BocError::UnexpectedEof)?;
        self.pos = end;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> std::result::Result<u8, BocError> {
        Ok(self.take(1)?[0])
    }

    fn read_be(&mut self, size: usize) -> std::result::Result<usize, BocError> {
        let bytes = self.take(size)?;
        let value = BigEndian::read_uint(bytes, size);
        usize::try_from(value).map_err(|_| BocError::UnexpectedEof)
    }
}

/// Deserializes a Bag of Cells (BoC) with the given limits
pub fn deserialize_boc_ext(data: &[u8], options: &DecodeOptions) -> Result<Vec<ArcCell>> {
    let mut reader = Reader { data, pos: 0 };
    let header = read_header(&mut reader, options)?;

    let index = if header.has_index {
        let mut index = Vec::with_capacity(header.cell_count);
        for _ in 0..header.cell_count {
            let entry = reader.read_be(header.offset_size)?;
            index.push(if header.has_cache_bits { entry >> 1 } else { entry });
        }
        Some(index)
    } else {
        None
    };

    let cells_start = reader.pos;
    let cells_data = reader.take(header.cells_size)?;

    if header.has_crc32c {
        let crc_end = reader.pos;
        let stored = LittleEndian::read_u32(reader.take(4)?);
        if options.verify_crc {
            let computed = CRC32C.checksum(&data[..crc_end]);
            if stored != computed {
                return Err(BocError::ChecksumMismatch {
                    expected: stored,
                    actual: computed,
                }
                .into());
            }
        }
    }
    if reader.pos != data.len() {
        return Err(BocError::TrailingData(data.len() - reader.pos).into());
    }

    let raw_cells = parse_cells(cells_data, &header, index.as_deref())?;
    let cells = build_cells(raw_cells)?;

    debug!(
        "decoded bag of {} cells ({} roots, {} bytes of cells at offset {})",
        header.cell_count,
        header.roots.len(),
        header.cells_size,
        cells_start
    );

    Ok(header.roots.iter().map(|&i| cells[i].clone()).collect())
}

fn read_header(
    reader: &mut Reader<'_>,
    options: &DecodeOptions,
) -> std::result::Result<BocHeader, BocError> {
    let magic = BigEndian::read_u32(reader.take(4)?);
    let flags = reader.read_u8()?;

    let (ref_size, has_index, has_crc32c, has_cache_bits, has_roots) = match magic {
        BOC_GENERIC_MAGIC => (
            (flags & 0x07) as usize,
            flags & 0x80 != 0,
            flags & 0x40 != 0,
            flags & 0x20 != 0,
            true,
        ),
        BOC_INDEXED_MAGIC => (flags as usize, true, false, false, false),
        BOC_INDEXED_CRC32C_MAGIC => (flags as usize, true, true, false, false),
        other => return Err(BocError::UnknownMagic(other)),
    };

    if ref_size == 0 || ref_size > 4 {
        return Err(BocError::InvalidRefSize(ref_size));
    }
    if has_cache_bits && !has_index {
        return Err(BocError::InvalidIndex(0));
    }

    let offset_size = reader.read_u8()? as usize;
    if offset_size == 0 || offset_size > 8 {
        return Err(BocError::InvalidOffsetSize(offset_size));
    }

    let cell_count = reader.read_be(ref_size)?;
    let root_count = reader.read_be(ref_size)?;
    let absent_count = reader.read_be(ref_size)?;
    let cells_size = reader.read_be(offset_size)?;

    if root_count == 0 {
        return Err(BocError::NoRoots);
    }
    if root_count < options.min_roots || root_count > options.max_roots {
        return Err(BocError::UnexpectedRootCount(root_count));
    }
    if !has_roots && root_count != 1 {
        return Err(BocError::UnexpectedRootCount(root_count));
    }
    if absent_count != 0 {
        return Err(BocError::AbsentCellsUnsupported);
    }
    if cell_count < root_count
        || cell_count > options.max_cells
        || cell_count.saturating_mul(2) > cells_size
    {
        return Err(BocError::TooManyCells(cell_count));
    }

    let roots = if has_roots {
        let mut roots = Vec::with_capacity(root_count);
        for _ in 0..root_count {
            let root = reader.read_be(ref_size)?;
            if root >= cell_count {
                return Err(BocError::RootOutOfBounds(root));
            }
            roots.push(root);
        }
        roots
    } else {
        vec![0]
    };

    debug!(
        "boc header: magic={magic:#010x} cells={cell_count} roots={root_count} \
         ref_size={ref_size} offset_size={offset_size} index={has_index} crc32c={has_crc32c}"
    );

    Ok(BocHeader {
        ref_size,
        offset_size,
        has_index,
        has_crc32c,
        has_cache_bits,
        cell_count,
        roots,
        cells_size,
    })
}

struct RawCell {
    bits: BitString,
    references: Vec<usize>,
    is_exotic: bool,
    level_mask: LevelMask,
    stored_hashes: Vec<CellHash>,
}

fn parse_cells(
    data: &[u8],
    header: &BocHeader,
    index: Option<&[usize]>,
) -> std::result::Result<Vec<RawCell>, BocError> {
    let mut reader = Reader { data, pos: 0 };
    let mut cells = Vec::with_capacity(header.cell_count);

    for i in 0..header.cell_count {
        let d1 = reader.read_u8()?;
        let d2 = reader.read_u8()?;

        let ref_count = (d1 & 0x07) as usize;
        let is_exotic = d1 & 0x08 != 0;
        let with_hashes = d1 & 0x10 != 0;
        let level_mask = LevelMask::new(d1 >> 5);

        if ref_count > MAX_CELL_REFS {
            return Err(BocError::TooManyReferences(i));
        }

        let mut stored_hashes = Vec::new();
        if with_hashes {
            // a pruned branch already carries its hashes in the data
            if is_exotic && ref_count == 0 && level_mask.level() > 0 {
                return Err(BocError::PrunedBranchWithHashes(i));
            }
            let count = level_mask.hash_count();
            for _ in 0..count {
                let mut hash = [0u8; 32];
                hash.copy_from_slice(reader.take(32)?);
                stored_hashes.push(hash);
            }
            // depths follow the hashes; they are recomputed
            reader.take(count * 2)?;
        }

        let data_len = (d2 as usize).div_ceil(2);
        let is_aligned = d2 % 2 == 0;
        let raw = reader.take(data_len)?;
        let bits =
            BitString::from_padded_bytes(raw, is_aligned).map_err(|_| BocError::InvalidPadding(i))?;
        if bits.len() > MAX_CELL_BITS {
            return Err(BocError::BitLenTooLarge(i));
        }

        let mut references = Vec::with_capacity(ref_count);
        for _ in 0..ref_count {
            let reference = reader.read_be(header.ref_size)?;
            if reference <= i || reference >= header.cell_count {
                return Err(BocError::InvalidReference { cell: i, reference });
            }
            references.push(reference);
        }

        if let Some(index) = index {
            if index[i] != reader.pos {
                return Err(BocError::InvalidIndex(i));
            }
        }

        cells.push(RawCell {
            bits,
            references,
            is_exotic,
            level_mask,
            stored_hashes,
        });
    }

    if reader.pos != data.len() {
        return Err(BocError::TrailingData(data.len() - reader.pos));
    }
    Ok(cells)
}

/// Builds cells from the last one backwards; children always have larger indices
fn build_cells(raw_cells: Vec<RawCell>) -> std::result::Result<Vec<ArcCell>, BocError> {
    let count = raw_cells.len();
    let mut built: Vec<Option<ArcCell>> = vec![None; count];

    for (i, raw) in raw_cells.into_iter().enumerate().rev() {
        let mut references = Vec::with_capacity(raw.references.len());
        for &r in &raw.references {
            let child = built[r]
                .clone()
                .ok_or(BocError::InvalidReference { cell: i, reference: r })?;
            references.push(child);
        }

        let cell = Cell::new(raw.bits, references, raw.is_exotic).map_err(|e| match e {
            CellError::InvalidCell(reason) => BocError::InvalidCell { cell: i, reason },
            _ => BocError::InvalidCell {
                cell: i,
                reason: "cell layout",
            },
        })?;

        if cell.level_mask() != raw.level_mask {
            return Err(BocError::InvalidCell {
                cell: i,
                reason: "level mask mismatch",
            });
        }
        if !raw.stored_hashes.is_empty() {
            let computed = (0..=3u8)
                .filter(|&level| cell.level_mask().is_significant(level))
                .map(|level| cell.hash(level));
            if !computed.eq(raw.stored_hashes.iter().copied()) {
                return Err(BocError::HashMismatch(i));
            }
        }

        built[i] = Some(Arc::new(cell));
    }

    Ok(built.into_iter().flatten().collect())
}

fn bytes_needed(value: usize) -> usize {
    let bits = (usize::BITS - value.leading_zeros()) as usize;
    bits.div_ceil(8).max(1)
}

fn write_be(out: &mut Vec<u8>, value: usize, size: usize) {
    let mut buf = [0u8; 8];
    BigEndian::write_uint(&mut buf, value as u64, size);
    out.extend_from_slice(&buf[..size]);
}

/// Converts a hex string to a BoC
pub fn hex_to_boc(hex: &str) -> Result<ArcCell> {
    let cleaned: String = hex.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes =
        hex::decode(&cleaned).map_err(|e| BocError::InvalidText(format!("hex: {e}")))?;
    deserialize_boc(&bytes)
}

/// Converts a BoC to a hex string
pub fn boc_to_hex(cell: &ArcCell, has_crc32c: bool) -> Result<String> {
    Ok(hex::encode(serialize_boc(cell, has_crc32c)?))
}

/// Converts a BoC to base64
pub fn boc_to_base64(cell: &ArcCell, has_crc32c: bool) -> Result<String> {
    let bytes = serialize_boc(cell, has_crc32c)?;
    Ok(base64::engine::general_purpose::STANDARD.encode(bytes))
}

/// Converts a base64 string (standard or URL-safe alphabet) to a BoC
pub fn base64_to_boc(b64: &str) -> Result<ArcCell> {
    deserialize_boc(&decode_base64(b64)?)
}

pub(crate) fn decode_base64(b64: &str) -> Result<Vec<u8>> {
    let trimmed = b64.trim();
    base64::engine::general_purpose::STANDARD
        .decode(trimmed)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE.decode(trimmed))
        .map_err(|e| BocError::InvalidText(format!("base64: {e}")).into())
}
