//! Indexed token datasets: a `.bin` file of concatenated token ids and an
//! `.idx` file describing item sizes and document boundaries.
//!
//! Two on-disk layouts are supported:
//! * `mmap`: index magic `MMIDIDX\0\0`, read back through a memory map.
//! * `lazy` / `cached`: the older `TNTIDX\0\0` layout. Both share one
//!   file format; `cached` loads the data file into memory on open.

use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::ValueEnum;
use memmap2::Mmap;
use serde::{Deserialize, Serialize};

use crate::error::{Error, IoContext, Result};

const MMAP_MAGIC: &[u8; 9] = b"MMIDIDX\x00\x00";
const LEGACY_MAGIC: &[u8; 8] = b"TNTIDX\x00\x00";
const INDEX_VERSION: u64 = 1;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetImpl {
    #[default]
    Mmap,
    Lazy,
    Cached,
}

/// Element type of the data file, with its index type code.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DType {
    U8,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    U16,
}

impl DType {
    pub fn code(self) -> u8 {
        match self {
            DType::U8 => 1,
            DType::I8 => 2,
            DType::I16 => 3,
            DType::I32 => 4,
            DType::I64 => 5,
            DType::F32 => 6,
            DType::F64 => 7,
            DType::U16 => 8,
        }
    }

    pub fn from_code(code: u64) -> Option<Self> {
        Some(match code {
            1 => DType::U8,
            2 => DType::I8,
            3 => DType::I16,
            4 => DType::I32,
            5 => DType::I64,
            6 => DType::F32,
            7 => DType::F64,
            8 => DType::U16,
            _ => return None,
        })
    }

    pub fn size(self) -> usize {
        match self {
            DType::U8 | DType::I8 => 1,
            DType::I16 | DType::U16 => 2,
            DType::I32 | DType::F32 => 4,
            DType::I64 | DType::F64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            DType::U8 => "uint8",
            DType::I8 => "int8",
            DType::I16 => "int16",
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::F32 => "float32",
            DType::F64 => "float64",
            DType::U16 => "uint16",
        }
    }

    fn is_integer(self) -> bool {
        !matches!(self, DType::F32 | DType::F64)
    }

    fn write_token(self, id: u32, out: &mut Vec<u8>) -> Result<()> {
        let overflow = || Error::TokenOutOfRange {
            id,
            dtype: self.name(),
        };
        match self {
            DType::U8 => out.push(u8::try_from(id).map_err(|_| overflow())?),
            DType::I8 => {
                out.extend_from_slice(&i8::try_from(id).map_err(|_| overflow())?.to_le_bytes())
            }
            DType::I16 => {
                out.extend_from_slice(&i16::try_from(id).map_err(|_| overflow())?.to_le_bytes())
            }
            DType::U16 => {
                out.extend_from_slice(&u16::try_from(id).map_err(|_| overflow())?.to_le_bytes())
            }
            DType::I32 => {
                out.extend_from_slice(&i32::try_from(id).map_err(|_| overflow())?.to_le_bytes())
            }
            DType::I64 => out.extend_from_slice(&i64::from(id).to_le_bytes()),
            DType::F32 | DType::F64 => return Err(overflow()),
        }
        Ok(())
    }

    /// Decodes one element; `bytes` is exactly `self.size()` long.
    fn read_token(self, bytes: &[u8]) -> Result<u32> {
        let value = match self {
            DType::U8 => i64::from(bytes[0]),
            DType::I8 => i64::from(i8::from_le_bytes(array(bytes))),
            DType::I16 => i64::from(i16::from_le_bytes(array(bytes))),
            DType::U16 => i64::from(u16::from_le_bytes(array(bytes))),
            DType::I32 => i64::from(i32::from_le_bytes(array(bytes))),
            DType::I64 => i64::from_le_bytes(array(bytes)),
            DType::F32 | DType::F64 => {
                return Err(Error::TokenOutOfRange {
                    id: 0,
                    dtype: self.name(),
                })
            }
        };
        u32::try_from(value).map_err(|_| Error::InvalidTokenId(value))
    }
}

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[..N]);
    out
}

/// Smallest dtype able to hold every id of a vocabulary.
pub fn best_fitting_dtype(vocab_size: usize) -> DType {
    if vocab_size < 65500 {
        DType::U16
    } else {
        DType::I32
    }
}

pub fn data_file_path(prefix: &Path) -> PathBuf {
    with_suffix(prefix, ".bin")
}

pub fn index_file_path(prefix: &Path) -> PathBuf {
    with_suffix(prefix, ".idx")
}

// Prefixes routinely contain dots, so never use `with_extension` here.
fn with_suffix(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

pub fn dataset_exists(prefix: &Path) -> bool {
    data_file_path(prefix).is_file() && index_file_path(prefix).is_file()
}

// ── Builders ────────────────────────────────────────────────────────────────

pub trait DatasetBuilder {
    /// Appends one item (a sentence, or a whole document).
    fn add_item(&mut self, tokens: &[u32]) -> Result<()>;

    /// Marks the items added since the previous call as one document.
    fn end_document(&mut self);

    /// Flushes the data file and writes the index.
    fn finalize(self: Box<Self>) -> Result<()>;
}

/// Builder for `impl_` at `prefix`. Legacy layouts always store `int32`.
pub fn make_builder(
    impl_: DatasetImpl,
    prefix: &Path,
    dtype: DType,
) -> Result<Box<dyn DatasetBuilder>> {
    let builder: Box<dyn DatasetBuilder> = match impl_ {
        DatasetImpl::Mmap => Box::new(MMapIndexedDatasetBuilder::create(prefix, dtype)?),
        DatasetImpl::Lazy | DatasetImpl::Cached => Box::new(IndexedDatasetBuilder::create(prefix)?),
    };
    Ok(builder)
}

fn create_data_file(prefix: &Path) -> Result<(BufWriter<File>, PathBuf)> {
    let path = data_file_path(prefix);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_path(parent)?;
    }
    let file = File::create(&path).with_path(&path)?;
    Ok((BufWriter::new(file), path))
}

fn put_u64(out: &mut impl Write, v: u64) -> io::Result<()> {
    out.write_all(&v.to_le_bytes())
}

fn put_i64s(out: &mut impl Write, values: &[i64]) -> io::Result<()> {
    values.iter().try_for_each(|v| out.write_all(&v.to_le_bytes()))
}

pub struct MMapIndexedDatasetBuilder {
    data: BufWriter<File>,
    data_path: PathBuf,
    index_path: PathBuf,
    dtype: DType,
    sizes: Vec<i32>,
    doc_idx: Vec<i64>,
    buf: Vec<u8>,
}

impl MMapIndexedDatasetBuilder {
    pub fn create(prefix: &Path, dtype: DType) -> Result<Self> {
        if !dtype.is_integer() {
            return Err(Error::Config(format!(
                "{} cannot store token ids",
                dtype.name()
            )));
        }
        let (data, data_path) = create_data_file(prefix)?;
        Ok(Self {
            data,
            data_path,
            index_path: index_file_path(prefix),
            dtype,
            sizes: Vec::new(),
            doc_idx: vec![0],
            buf: Vec::new(),
        })
    }

    /// Appends every item of the mmap dataset at `prefix`, keeping its
    /// document boundaries.
    pub fn merge_file(&mut self, prefix: &Path) -> Result<()> {
        let other = MMapIndexedDataset::open(prefix)?;
        if other.dtype() != self.dtype {
            return Err(Error::invalid_index(
                index_file_path(prefix),
                format!(
                    "dtype {} does not match {}",
                    other.dtype().name(),
                    self.dtype.name()
                ),
            ));
        }

        let offset = self.sizes.len() as i64;
        self.sizes.extend_from_slice(&other.sizes);
        self.doc_idx
            .extend(other.doc_idx.iter().skip(1).map(|d| d + offset));

        let path = data_file_path(prefix);
        let mut src = File::open(&path).with_path(&path)?;
        io::copy(&mut src, &mut self.data).with_path(&self.data_path)?;
        Ok(())
    }

    fn write_index(&self) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(&self.index_path)?);
        out.write_all(MMAP_MAGIC)?;
        put_u64(&mut out, INDEX_VERSION)?;
        out.write_all(&[self.dtype.code()])?;
        put_u64(&mut out, self.sizes.len() as u64)?;
        put_u64(&mut out, self.doc_idx.len() as u64)?;

        for size in &self.sizes {
            out.write_all(&size.to_le_bytes())?;
        }
        let mut pointer = 0i64;
        for size in &self.sizes {
            out.write_all(&pointer.to_le_bytes())?;
            pointer += i64::from(*size) * self.dtype.size() as i64;
        }
        put_i64s(&mut out, &self.doc_idx)?;
        out.flush()
    }
}

impl DatasetBuilder for MMapIndexedDatasetBuilder {
    fn add_item(&mut self, tokens: &[u32]) -> Result<()> {
        let size = i32::try_from(tokens.len())
            .map_err(|_| Error::Config(format!("item of {} tokens is too long", tokens.len())))?;
        self.buf.clear();
        for &id in tokens {
            self.dtype.write_token(id, &mut self.buf)?;
        }
        self.data.write_all(&self.buf).with_path(&self.data_path)?;
        self.sizes.push(size);
        Ok(())
    }

    fn end_document(&mut self) {
        self.doc_idx.push(self.sizes.len() as i64);
    }

    fn finalize(mut self: Box<Self>) -> Result<()> {
        self.data.flush().with_path(&self.data_path)?;
        self.write_index().with_path(&self.index_path)
    }
}

pub struct IndexedDatasetBuilder {
    data: BufWriter<File>,
    data_path: PathBuf,
    index_path: PathBuf,
    dtype: DType,
    data_offsets: Vec<i64>,
    dim_offsets: Vec<i64>,
    sizes: Vec<i64>,
    doc_idx: Vec<i64>,
    buf: Vec<u8>,
}

impl IndexedDatasetBuilder {
    pub fn create(prefix: &Path) -> Result<Self> {
        let (data, data_path) = create_data_file(prefix)?;
        Ok(Self {
            data,
            data_path,
            index_path: index_file_path(prefix),
            dtype: DType::I32,
            data_offsets: vec![0],
            dim_offsets: vec![0],
            sizes: Vec::new(),
            doc_idx: vec![0],
            buf: Vec::new(),
        })
    }

    fn write_index(&self) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(&self.index_path)?);
        out.write_all(LEGACY_MAGIC)?;
        put_u64(&mut out, INDEX_VERSION)?;
        put_u64(&mut out, u64::from(self.dtype.code()))?;
        put_u64(&mut out, self.dtype.size() as u64)?;
        put_u64(&mut out, (self.data_offsets.len() - 1) as u64)?;
        put_u64(&mut out, self.sizes.len() as u64)?;
        put_u64(&mut out, self.doc_idx.len() as u64)?;
        put_i64s(&mut out, &self.dim_offsets)?;
        put_i64s(&mut out, &self.data_offsets)?;
        put_i64s(&mut out, &self.sizes)?;
        put_i64s(&mut out, &self.doc_idx)?;
        out.flush()
    }
}

impl DatasetBuilder for IndexedDatasetBuilder {
    fn add_item(&mut self, tokens: &[u32]) -> Result<()> {
        self.buf.clear();
        for &id in tokens {
            self.dtype.write_token(id, &mut self.buf)?;
        }
        self.data.write_all(&self.buf).with_path(&self.data_path)?;

        let len = tokens.len() as i64;
        let last_data = self.data_offsets.last().copied().unwrap_or(0);
        let last_dim = self.dim_offsets.last().copied().unwrap_or(0);
        self.data_offsets.push(last_data + len);
        self.sizes.push(len);
        self.dim_offsets.push(last_dim + 1);
        Ok(())
    }

    fn end_document(&mut self) {
        self.doc_idx.push(self.sizes.len() as i64);
    }

    fn finalize(mut self: Box<Self>) -> Result<()> {
        self.data.flush().with_path(&self.data_path)?;
        self.write_index().with_path(&self.index_path)
    }
}

/// Concatenates mmap datasets into `output`, in the given order. Every input
/// must share the dtype of the first one.
pub fn merge_datasets(output: &Path, inputs: &[PathBuf]) -> Result<MMapIndexedDataset> {
    let first = inputs
        .first()
        .ok_or_else(|| Error::Config("nothing to merge".into()))?;
    let dtype = MMapIndexedDataset::open(first)?.dtype();

    let mut builder = MMapIndexedDatasetBuilder::create(output, dtype)?;
    for prefix in inputs {
        builder.merge_file(prefix)?;
    }
    Box::new(builder).finalize()?;
    MMapIndexedDataset::open(output)
}

// ── Readers ─────────────────────────────────────────────────────────────────

/// Read access shared by every dataset layout.
pub trait TokenDataset {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn dtype(&self) -> DType;

    fn item_size(&self, index: usize) -> Option<usize>;

    /// Item boundaries of documents: starts at 0, one entry per document end.
    fn doc_idx(&self) -> &[i64];

    fn get(&self, index: usize) -> Result<Vec<u32>>;

    fn num_tokens(&self) -> usize {
        (0..self.len()).filter_map(|i| self.item_size(i)).sum()
    }
}

pub fn open_dataset(impl_: DatasetImpl, prefix: &Path) -> Result<Box<dyn TokenDataset>> {
    let dataset: Box<dyn TokenDataset> = match impl_ {
        DatasetImpl::Mmap => Box::new(MMapIndexedDataset::open(prefix)?),
        DatasetImpl::Lazy => Box::new(IndexedDataset::open(prefix, false)?),
        DatasetImpl::Cached => Box::new(IndexedDataset::open(prefix, true)?),
    };
    Ok(dataset)
}

struct IndexReader<'a> {
    bytes: &'a [u8],
    pos: usize,
    path: &'a Path,
}

impl<'a> IndexReader<'a> {
    fn new(bytes: &'a [u8], path: &'a Path) -> Self {
        Self {
            bytes,
            pos: 0,
            path,
        }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| Error::invalid_index(self.path, "index file is truncated"))?;
        let bytes: &'a [u8] = self.bytes;
        let out = &bytes[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    fn magic(&mut self, magic: &[u8]) -> Result<()> {
        if self.take(magic.len())? != magic {
            return Err(Error::invalid_index(
                self.path,
                "index file does not match the expected format",
            ));
        }
        Ok(())
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(array(self.take(8)?)))
    }

    fn count(&mut self) -> Result<usize> {
        let n = self.u64()?;
        usize::try_from(n).map_err(|_| Error::invalid_index(self.path, format!("bad count {n}")))
    }

    fn i32s(&mut self, n: usize) -> Result<Vec<i32>> {
        let bytes = self.take(n.checked_mul(4).unwrap_or(usize::MAX))?;
        Ok(bytes
            .chunks_exact(4)
            .map(|c| i32::from_le_bytes(array(c)))
            .collect())
    }

    fn i64s(&mut self, n: usize) -> Result<Vec<i64>> {
        let bytes = self.take(n.checked_mul(8).unwrap_or(usize::MAX))?;
        Ok(bytes
            .chunks_exact(8)
            .map(|c| i64::from_le_bytes(array(c)))
            .collect())
    }

    fn dtype(&mut self, code: u64) -> Result<DType> {
        DType::from_code(code)
            .filter(|d| d.is_integer())
            .ok_or_else(|| Error::invalid_index(self.path, format!("unsupported dtype code {code}")))
    }
}

fn check_doc_idx(path: &Path, doc_idx: &[i64], len: usize) -> Result<()> {
    let sorted = doc_idx.windows(2).all(|w| w[0] <= w[1]);
    let in_range = doc_idx.iter().all(|d| *d >= 0 && *d as usize <= len);
    if doc_idx.first() != Some(&0) || !sorted || !in_range {
        return Err(Error::invalid_index(path, "corrupt document index"));
    }
    Ok(())
}

/// Zero-copy reader over an `mmap` dataset.
pub struct MMapIndexedDataset {
    dtype: DType,
    sizes: Vec<i32>,
    pointers: Vec<i64>,
    doc_idx: Vec<i64>,
    data: Option<Mmap>,
}

impl MMapIndexedDataset {
    pub fn open(prefix: &Path) -> Result<Self> {
        let index_path = index_file_path(prefix);
        let bytes = fs::read(&index_path).with_path(&index_path)?;
        let mut r = IndexReader::new(&bytes, &index_path);

        r.magic(MMAP_MAGIC)?;
        let version = r.u64()?;
        if version != INDEX_VERSION {
            return Err(Error::invalid_index(
                &index_path,
                format!("unsupported version {version}"),
            ));
        }
        let code = r.u8()?;
        let dtype = r.dtype(u64::from(code))?;
        let len = r.count()?;
        let doc_count = r.count()?;
        let sizes = r.i32s(len)?;
        let pointers = r.i64s(len)?;
        let doc_idx = r.i64s(doc_count)?;
        check_doc_idx(&index_path, &doc_idx, len)?;

        let data_path = data_file_path(prefix);
        let file = File::open(&data_path).with_path(&data_path)?;
        let data_len = file.metadata().with_path(&data_path)?.len();
        let data = if data_len == 0 {
            None
        } else {
            // The file is opened read-only and never written through this map.
            Some(unsafe { Mmap::map(&file) }.with_path(&data_path)?)
        };

        let item_size = dtype.size() as u64;
        let fits = sizes.iter().zip(&pointers).all(|(size, ptr)| {
            *size >= 0 && *ptr >= 0 && *ptr as u64 + *size as u64 * item_size <= data_len
        });
        if !fits {
            return Err(Error::invalid_index(
                &index_path,
                format!("items exceed data file of {data_len} bytes"),
            ));
        }

        Ok(Self {
            dtype,
            sizes,
            pointers,
            doc_idx,
            data,
        })
    }
}

impl TokenDataset for MMapIndexedDataset {
    fn len(&self) -> usize {
        self.sizes.len()
    }

    fn dtype(&self) -> DType {
        self.dtype
    }

    fn item_size(&self, index: usize) -> Option<usize> {
        self.sizes.get(index).map(|s| *s as usize)
    }

    fn doc_idx(&self) -> &[i64] {
        &self.doc_idx
    }

    fn get(&self, index: usize) -> Result<Vec<u32>> {
        let size = self.item_size(index).ok_or(Error::ItemOutOfRange {
            index,
            len: self.len(),
        })?;
        if size == 0 {
            return Ok(Vec::new());
        }
        let start = self.pointers[index] as usize;
        let end = start + size * self.dtype.size();
        let data = self.data.as_deref().unwrap_or(&[]);
        data[start..end]
            .chunks_exact(self.dtype.size())
            .map(|c| self.dtype.read_token(c))
            .collect()
    }
}

enum Storage {
    Cached(Vec<u8>),
    Lazy(Mutex<File>),
}

/// Reader over the `lazy` / `cached` layout.
pub struct IndexedDataset {
    dtype: DType,
    data_offsets: Vec<i64>,
    sizes: Vec<i64>,
    doc_idx: Vec<i64>,
    data_path: PathBuf,
    storage: Storage,
}

impl IndexedDataset {
    pub fn open(prefix: &Path, cached: bool) -> Result<Self> {
        let index_path = index_file_path(prefix);
        let bytes = fs::read(&index_path).with_path(&index_path)?;
        let mut r = IndexReader::new(&bytes, &index_path);

        r.magic(LEGACY_MAGIC)?;
        let version = r.u64()?;
        if version != INDEX_VERSION {
            return Err(Error::invalid_index(
                &index_path,
                format!("unsupported version {version}"),
            ));
        }
        let code = r.u64()?;
        let dtype = r.dtype(code)?;
        let element_size = r.u64()?;
        if element_size != dtype.size() as u64 {
            return Err(Error::invalid_index(
                &index_path,
                format!("element size {element_size} does not match {}", dtype.name()),
            ));
        }
        let len = r.count()?;
        let offsets_len = len
            .checked_add(1)
            .ok_or_else(|| Error::invalid_index(&index_path, format!("bad count {len}")))?;
        let sizes_len = r.count()?;
        let doc_count = r.count()?;
        let dim_offsets = r.i64s(offsets_len)?;
        let data_offsets = r.i64s(offsets_len)?;
        let sizes = r.i64s(sizes_len)?;
        let doc_idx = r.i64s(doc_count)?;
        check_doc_idx(&index_path, &doc_idx, len)?;

        // Token items are one-dimensional: one size entry per item, and each
        // item starts where the previous one ends.
        let flat = sizes_len == len
            && dim_offsets.iter().enumerate().all(|(i, d)| *d == i as i64)
            && data_offsets.first() == Some(&0)
            && sizes
                .iter()
                .zip(data_offsets.windows(2))
                .all(|(size, w)| *size >= 0 && w[1].checked_sub(w[0]) == Some(*size));
        if !flat {
            return Err(Error::invalid_index(&index_path, "items are not flat token lists"));
        }

        let data_path = data_file_path(prefix);
        let storage = if cached {
            Storage::Cached(fs::read(&data_path).with_path(&data_path)?)
        } else {
            Storage::Lazy(Mutex::new(File::open(&data_path).with_path(&data_path)?))
        };
        let data_len = match &storage {
            Storage::Cached(data) => data.len() as u64,
            Storage::Lazy(file) => {
                let file = file.lock().unwrap_or_else(|e| e.into_inner());
                file.metadata().with_path(&data_path)?.len()
            }
        };
        let needed = data_offsets
            .last()
            .and_then(|end| u64::try_from(*end).ok())
            .and_then(|end| end.checked_mul(dtype.size() as u64));
        if !matches!(needed, Some(n) if n <= data_len) {
            return Err(Error::invalid_index(
                &index_path,
                format!("items exceed data file of {data_len} bytes"),
            ));
        }

        Ok(Self {
            dtype,
            data_offsets,
            sizes,
            doc_idx,
            data_path,
            storage,
        })
    }

    fn read_bytes(&self, start: u64, len: usize) -> Result<Vec<u8>> {
        match &self.storage {
            Storage::Cached(data) => usize::try_from(start)
                .ok()
                .and_then(|start| data.get(start..start.checked_add(len)?))
                .map(<[u8]>::to_vec)
                .ok_or_else(|| Error::invalid_index(&self.data_path, "item exceeds data file")),
            Storage::Lazy(file) => {
                let mut buf = vec![0u8; len];
                let mut file = file.lock().unwrap_or_else(|e| e.into_inner());
                file.seek(SeekFrom::Start(start)).with_path(&self.data_path)?;
                file.read_exact(&mut buf).with_path(&self.data_path)?;
                Ok(buf)
            }
        }
    }
}

impl TokenDataset for IndexedDataset {
    fn len(&self) -> usize {
        self.sizes.len()
    }

    fn dtype(&self) -> DType {
        self.dtype
    }

    fn item_size(&self, index: usize) -> Option<usize> {
        self.sizes.get(index).map(|s| *s as usize)
    }

    fn doc_idx(&self) -> &[i64] {
        &self.doc_idx
    }

    fn get(&self, index: usize) -> Result<Vec<u32>> {
        let size = self.item_size(index).ok_or(Error::ItemOutOfRange {
            index,
            len: self.len(),
        })?;
        // Offsets and sizes were checked against the data file on open.
        let start = self.data_offsets[index] as u64 * self.dtype.size() as u64;
        let bytes = self.read_bytes(start, size * self.dtype.size())?;
        bytes
            .chunks_exact(self.dtype.size())
            .map(|c| self.dtype.read_token(c))
            .collect()
    }
}
