// Copyright The OpenTelemetry Authors
// SPDX-License-Identifier: Apache-2.0

//! High-level abstractions for working with large object files.
//!
//! This is the container side of the house: mapping executables into
//! memory, loading (possibly compressed) sections and collecting the
//! function symbol table that the DWARF correlator annotates. The DWARF
//! reader itself only ever sees byte slices handed out from here.

use crate::{range_overlap, AnyError, VirtAddr};

use std::collections::BTreeMap;
use std::io::Read as _;
use std::{fmt, fs, io, ops, path};

use flate2::read::ZlibDecoder;
use intervaltree::{Element, IntervalTree};
use memmap2::{Mmap, MmapMut};
use object::{CompressionFormat, Object as _, ObjectSection as _, ObjectSymbol as _};
use zstd::stream::read::Decoder as ZstdDecoder;

/// Maximum size of an individual object section to keep in memory.
///
/// All sections where the decompressed representation is larger than this
/// constant are instead read into anonymous temporary files and `mmap`ed.
const SWAP_THRESH: usize = 16 * 1024 * 1024;

/// Result type shorthand.
pub type Result<T = (), E = Error> = std::result::Result<T, E>;

/// Errors that can occur during object file parsing.
#[non_exhaustive]
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Sections are compressed in an unsupported format")]
    UnsupportedCompressionFormat,

    #[error("Object file is too big to be loaded")]
    FileTooBig,

    #[error("IO error")]
    IO(#[from] io::Error),

    #[error(transparent)]
    Other(AnyError),
}

/// Conversion of [`object`] errors into ours, with type erasure.
///
/// We erase the type here to prevent leaking [`object`] library types into our
/// public interface. If code needs to special-case based on particular [`object`]
/// errors, we should instead lift them into custom error variants.
impl From<object::Error> for Error {
    fn from(e: object::Error) -> Self {
        Self::Other(Box::new(e))
    }
}

/// Maps an object file or executable into memory.
///
/// The backing file is `mmap`ed to make reading more efficient. This
/// currently uses the [`object`] library to perform the actual heavy
/// lifting, however this should be considered an implementation detail.
pub struct File {
    mmap: Mmap,
    path: path::PathBuf,
}

impl File {
    /// Map the file at the given path into memory.
    pub fn load(path: &path::Path) -> Result<Self> {
        let file = fs::File::open(path)?;

        Ok(Self {
            mmap: unsafe { Mmap::map(&file)? },
            path: path.to_owned(),
        })
    }

    /// Path the file was loaded from.
    pub fn path(&self) -> &path::Path {
        &self.path
    }

    /// Parse the header and create a reader.
    pub fn parse(&self) -> Result<Reader<'_>> {
        Ok(Reader {
            obj: object::File::parse(&self.mmap[..])?,
            path: self.path.as_path(),
        })
    }
}

/// Provides read access to the data in an object file.
///
/// Created via [`File::parse`].
pub struct Reader<'obj> {
    obj: object::File<'obj>,
    path: &'obj path::Path,
}

impl<'obj> Reader<'obj> {
    /// Loads the section with the given name into memory.
    ///
    /// Depending on whether the section is compressed in the input file or
    /// not, this can be an expensive operation. Callers should store and
    /// retrieve the returned instance if it is needed more than once.
    pub fn load_section(&self, name: &[u8]) -> Result<Option<Section<'obj>>> {
        let Some(obj_sec) = self.obj.section_by_name_bytes(name) else {
            return Ok(None);
        };

        Section::load_from_obj_section(&obj_sec).map(Some)
    }

    /// Checks whether this file has little-endian byte-order.
    pub fn is_little_endian(&self) -> bool {
        self.obj.is_little_endian()
    }

    /// Returns the architecture, or [`None`] if unknown.
    ///
    /// Purely diagnostic: decoding itself is steered by the address sizes
    /// recorded in the debug info.
    pub fn arch(&self) -> Option<Arch> {
        match self.obj.architecture() {
            object::Architecture::Aarch64 => Some(Arch::Aarch64),
            object::Architecture::X86_64 => Some(Arch::X86_64),
            _ => None,
        }
    }

    /// Path of the underlying file, for diagnostics.
    pub fn path(&self) -> &path::Path {
        self.path
    }

    /// Iterate over function symbols in this executable.
    pub fn function_symbols(&self, source: SymbolSource) -> impl Iterator<Item = Symbol<'_>> {
        let iter = match source {
            SymbolSource::Debug => self.obj.symbols(),
            SymbolSource::Dynamic => self.obj.dynamic_symbols(),
        };

        iter.filter(|x| x.kind() == object::SymbolKind::Text)
            // Dynamic symbols with addr = 0 are imports. Also, compilers
            // often generate bogus debug symbol records at 0.
            .filter(|x| x.address() != 0)
            .filter(|x| x.size() != 0)
            .filter_map(|x| {
                Some(Symbol {
                    name: x.name().ok()?, // just skip non-utf8 symbols
                    virt_addr: x.address(),
                    length: x.size(),
                })
            })
    }
}

/// Information and raw data of an object file section.
#[derive(Debug)]
pub struct Section<'obj> {
    virt_addr: VirtAddr,
    data: SectionData<'obj>,
}

impl<'obj> Section<'obj> {
    /// Construction from an [`object::Section`].
    fn load_from_obj_section(obj_sec: &object::Section<'obj, '_>) -> Result<Self> {
        Ok(Section {
            virt_addr: obj_sec.address(),
            data: SectionData::load_from_obj_sec(obj_sec)?,
        })
    }

    /// Wraps a raw slice, for consumers that bring their own container
    /// parsing.
    pub(crate) fn from_bytes(data: &'obj [u8]) -> Self {
        Section {
            virt_addr: 0,
            data: SectionData::Borrowed(data),
        }
    }

    /// Returns the virtual address of the first byte of this section.
    pub fn virt_addr(&self) -> VirtAddr {
        self.virt_addr
    }
}

/// Allow using section objects where slices are expected.
impl<'obj> ops::Deref for Section<'obj> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        match &self.data {
            SectionData::Borrowed(x) => x,
            SectionData::InMemory(x) => &x[..],
            SectionData::Swapped(x) => &x[..],
        }
    }
}

/// Storage for object file sections.
pub enum SectionData<'obj> {
    /// Section was uncompressed in the input file and we simply kept a ref.
    Borrowed(&'obj [u8]),

    /// Section was originally compressed and we decompressed it into memory.
    InMemory(Vec<u8>),

    /// Section was originally compressed and we decompressed it into a
    /// memory-mapped temporary file.
    Swapped(MmapMut),
}

impl<'obj> SectionData<'obj> {
    /// Create [`Self::InMemory`] variant from a reader.
    fn read_into_memory(final_size: usize, mut reader: impl io::Read) -> Result<Self> {
        let mut mem_buf = Vec::with_capacity(final_size);
        reader.read_to_end(&mut mem_buf)?;
        Ok(SectionData::InMemory(mem_buf))
    }

    /// Create [`Self::Swapped`] variant from a reader.
    fn read_into_swap(mut reader: impl io::Read) -> Result<Self> {
        let mut file = tempfile::tempfile()?;
        io::copy(&mut reader, &mut file)?;
        let mmap = unsafe { MmapMut::map_mut(&file)? };
        Ok(SectionData::Swapped(mmap))
    }

    /// Creates a variant of the [`SectionData`] enum most appropriate for the
    /// given size.
    ///
    /// Uncompressed sections are handed out as a reference whereas compressed
    /// ones are either decoded into memory or into `mmap`ed temporary files
    /// based on their size.
    fn read_smart(final_size: usize, reader: impl io::Read) -> Result<Self> {
        if final_size >= SWAP_THRESH {
            Self::read_into_swap(reader)
        } else {
            Self::read_into_memory(final_size, reader)
        }
    }

    /// Load the data from the given [`object::Section`].
    fn load_from_obj_sec(sec: &object::Section<'obj, '_>) -> Result<Self> {
        let data = sec.compressed_data()?;

        // Ensure that the file fits into memory.
        let final_size: usize = data
            .uncompressed_size
            .try_into()
            .map_err(|_| Error::FileTooBig)?;

        let decoder: Box<dyn io::Read> = match data.format {
            CompressionFormat::Zlib => Box::new(ZlibDecoder::new(data.data)),
            CompressionFormat::Zstandard => Box::new(ZstdDecoder::new(data.data)?),
            CompressionFormat::None => return Ok(SectionData::Borrowed(data.data)),
            _ => return Err(Error::UnsupportedCompressionFormat),
        };

        // Still here? Compressed section: unpack it.
        let decoder = decoder.take(final_size as u64);
        Self::read_smart(final_size, decoder)
    }
}

impl<'obj> fmt::Debug for SectionData<'obj> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (storage, len) = match self {
            Self::Borrowed(x) => ("borrowed", x.len()),
            Self::InMemory(x) => ("in-memory", x.len()),
            Self::Swapped(x) => ("mmapped", x.len()),
        };

        write!(f, "SectionData([{} bytes, {}])", len, storage)
    }
}

/// CPU architecture.
#[non_exhaustive]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Arch {
    /// `aarch64` aka `arm64`.
    Aarch64,
    /// `x86_64` aka `amd64`.
    X86_64,
}

/// Specifies an object symbol source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolSource {
    /// Debug symbol table (`.symtab`).
    Debug,

    /// Dynamic symbol table (`.dynsym`).
    Dynamic,
}

/// Basic executable function symbol.
#[derive(Debug, Clone)]
pub struct Symbol<'a> {
    /// Function name. Might be mangled.
    pub name: &'a str,
    /// Start address of the function.
    pub virt_addr: VirtAddr,
    /// Length of the function.
    pub length: u64,
}

impl Symbol<'_> {
    /// Constructs the address range for the symbol.
    pub fn range(&self) -> ops::Range<VirtAddr> {
        self.virt_addr..self.virt_addr.saturating_add(self.length)
    }
}

/// One function of the target binary, annotated with source provenance.
///
/// Records start out as bare symbol-table entries; the DWARF correlator
/// fills in the source location, language and line map afterwards.
#[derive(Debug, Clone, Default)]
pub struct FuncRecord {
    /// Function name as recorded in the symbol table. Might be mangled.
    pub name: String,

    /// Start address of the function.
    pub virt_addr: VirtAddr,

    /// Length of the function's machine code in bytes.
    pub length: u64,

    /// Directory of the source file, from the line-table directory list or
    /// the unit's compilation directory.
    pub source_dir: Option<String>,

    /// Name of the source file this function was compiled from.
    pub source_file: Option<String>,

    /// Source language name, or the decimal language code if unknown.
    pub language: Option<String>,

    /// Statement rows observed for this function: source line to the
    /// address of the statement's first instruction.
    pub lines: BTreeMap<u64, VirtAddr>,
}

impl FuncRecord {
    /// The address range covered by this function.
    pub fn range(&self) -> ops::Range<VirtAddr> {
        self.virt_addr..self.virt_addr.saturating_add(self.length)
    }
}

/// Lookup table of the functions in one object file.
///
/// Keeps records in address order and resolves addresses to the containing
/// function via an interval tree.
#[derive(Debug)]
pub struct FuncTable {
    records: Vec<FuncRecord>,
    index: IntervalTree<VirtAddr, usize>,
}

impl FuncTable {
    /// Collects function records from the object's symbol table.
    pub fn collect(obj: &Reader<'_>, source: SymbolSource) -> Self {
        let mut records: Vec<FuncRecord> = obj
            .function_symbols(source)
            .map(|sym| FuncRecord {
                name: sym.name.to_owned(),
                virt_addr: sym.virt_addr,
                length: sym.length,
                ..FuncRecord::default()
            })
            .collect();

        records.sort_unstable_by(|a, b| (a.virt_addr, &a.name).cmp(&(b.virt_addr, &b.name)));
        records.dedup_by(|a, b| a.virt_addr == b.virt_addr);

        Self::new(records)
    }

    /// Builds a table from caller-supplied records.
    ///
    /// This is the seam for embedders that parse their container format
    /// themselves: anything that can produce named address ranges can be
    /// annotated.
    pub fn new(records: Vec<FuncRecord>) -> Self {
        let index = records
            .iter()
            .enumerate()
            .filter(|(_, rec)| rec.length > 0)
            .map(|(i, rec)| Element {
                range: rec.range(),
                value: i,
            })
            .collect();

        Self { records, index }
    }

    /// Finds the function containing the given address.
    ///
    /// The start address is inclusive, the end exclusive. Should functions
    /// overlap, the one starting earliest wins so that lookups stay
    /// deterministic.
    pub fn index_for_addr(&self, addr: VirtAddr) -> Option<usize> {
        self.index
            .query_point(addr)
            .min_by_key(|elem| (elem.range.start, elem.value))
            .map(|elem| elem.value)
    }

    /// Indices of all functions overlapping the given address range.
    pub fn indices_overlapping(&self, rng: &ops::Range<VirtAddr>) -> Vec<usize> {
        let mut out: Vec<usize> = self.index.query(rng.clone()).map(|e| e.value).collect();
        out.sort_unstable();

        // Compare with the result of a dumb linear scan when compiled in
        // debug mode. Both variants must be equivalent in all cases.
        debug_assert_eq!(out, {
            self.records
                .iter()
                .enumerate()
                .filter(|(_, rec)| range_overlap(&rec.range(), rng).is_some())
                .map(|(i, _)| i)
                .collect::<Vec<_>>()
        });

        out
    }

    /// Borrows the record at the given index.
    pub fn record(&self, index: usize) -> &FuncRecord {
        &self.records[index]
    }

    /// Mutably borrows the record at the given index.
    pub fn record_mut(&mut self, index: usize) -> &mut FuncRecord {
        &mut self.records[index]
    }

    /// All records, in address order.
    pub fn records(&self) -> &[FuncRecord] {
        &self.records
    }

    /// Number of functions in the table.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the table holds no functions.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn record(name: &str, virt_addr: VirtAddr, length: u64) -> FuncRecord {
        FuncRecord {
            name: name.to_owned(),
            virt_addr,
            length,
            ..FuncRecord::default()
        }
    }

    #[test]
    fn address_lookup_bounds() {
        let table = FuncTable::new(vec![
            record("main", 0x1000, 0x10),
            record("helper", 0x1010, 0x20),
            record("tail", 0x2000, 0x4),
        ]);

        assert_eq!(table.index_for_addr(0x0fff), None);
        assert_eq!(table.index_for_addr(0x1000), Some(0));
        assert_eq!(table.index_for_addr(0x100f), Some(0));
        assert_eq!(table.index_for_addr(0x1010), Some(1), "end is exclusive");
        assert_eq!(table.index_for_addr(0x102f), Some(1));
        assert_eq!(table.index_for_addr(0x1030), None);
        assert_eq!(table.index_for_addr(0x2003), Some(2));
        assert_eq!(table.record(2).name, "tail");
    }

    #[test]
    fn overlapping_functions_resolve_deterministically() {
        let table = FuncTable::new(vec![
            record("outer", 0x1000, 0x100),
            record("inner", 0x1040, 0x10),
        ]);

        for _ in 0..16 {
            assert_eq!(table.index_for_addr(0x1048), Some(0));
        }
    }

    #[test]
    fn zero_length_functions_are_unreachable() {
        let table = FuncTable::new(vec![record("ghost", 0x1000, 0)]);
        assert_eq!(table.index_for_addr(0x1000), None);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn range_queries() {
        let table = FuncTable::new(vec![
            record("a", 0x100, 0x10),
            record("b", 0x200, 0x10),
            record("c", 0x300, 0x10),
        ]);

        assert_eq!(table.indices_overlapping(&(0x000..0x090)), Vec::<usize>::new());
        assert_eq!(table.indices_overlapping(&(0x108..0x208)), vec![0, 1]);
        assert_eq!(table.indices_overlapping(&(0x000..0x400)), vec![0, 1, 2]);
        assert_eq!(table.indices_overlapping(&(0x210..0x300)), Vec::<usize>::new());
    }

    #[test]
    fn record_mutation() {
        let mut table = FuncTable::new(vec![record("f", 0x100, 0x10)]);

        let idx = table.index_for_addr(0x105).unwrap();
        let rec = table.record_mut(idx);
        rec.source_file = Some("f.c".into());
        rec.lines.insert(3, 0x100);
        rec.lines.insert(4, 0x108);

        assert_eq!(table.record(idx).lines.len(), 2);
        assert!(!table.is_empty());
    }

    #[test]
    fn section_from_bytes() {
        let section = Section::from_bytes(b"\x01\x02\x03");
        assert_eq!(section.virt_addr(), 0);
        assert_eq!(&section[..], b"\x01\x02\x03");
    }
}
