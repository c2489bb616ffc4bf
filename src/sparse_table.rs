//! Block-indexed sparse map from terminal id to content offsets.
//!
//! ```text
//! lookup:  [block index | NOT_EXIST] per block of `block_size` ids
//! address: [offset | NOT_EXIST] * block_size per allocated block, one
//!          table per content kind, all allocated in lockstep
//! ```
//!
//! Tables are persisted as big-endian `i32` arrays: `<name>.lookup` and one
//! `<name><suffix>.addr` per address table.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{DictError, Result};
use crate::format::{ADDRESS_TABLE_EXTENSION, LOOKUP_TABLE_EXTENSION, NOT_EXIST};
use crate::io_utils::io_error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparseTable {
    block_size: usize,
    lookup: Vec<i32>,
    address_tables: Vec<Vec<i32>>,
}

impl SparseTable {
    pub fn new(block_size: usize, address_table_count: usize) -> Result<Self> {
        check_block_size(block_size)?;
        Ok(Self {
            block_size,
            lookup: Vec::new(),
            address_tables: vec![Vec::new(); address_table_count],
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    fn block_of(&self, index: u32) -> Option<usize> {
        let block = *self.lookup.get(index as usize / self.block_size)?;
        (block != NOT_EXIST).then_some(block as usize)
    }

    pub fn contains(&self, index: u32) -> bool {
        self.block_of(index).is_some()
    }

    /// Value stored for `index` in `table`, or [`NOT_EXIST`].
    pub fn get(&self, table: usize, index: u32) -> i32 {
        let Some(block) = self.block_of(index) else {
            return NOT_EXIST;
        };
        self.address_tables
            .get(table)
            .and_then(|t| t.get(block * self.block_size + index as usize % self.block_size))
            .copied()
            .unwrap_or(NOT_EXIST)
    }

    /// Store `value`, allocating the id's block in every address table the
    /// first time it is touched.
    pub fn set(&mut self, table: usize, index: u32, value: i32) -> Result<()> {
        if table >= self.address_tables.len() {
            return Err(DictError::InvalidInput(format!(
                "address table {table} of {}",
                self.address_tables.len()
            )));
        }
        let block = match self.block_of(index) {
            Some(block) => block,
            None => {
                let slot = index as usize / self.block_size;
                if self.lookup.len() <= slot {
                    self.lookup.resize(slot + 1, NOT_EXIST);
                }
                let block = self.address_tables[0].len() / self.block_size;
                self.lookup[slot] = block as i32;
                for t in &mut self.address_tables {
                    t.resize(t.len() + self.block_size, NOT_EXIST);
                }
                block
            }
        };
        self.address_tables[table][block * self.block_size + index as usize % self.block_size] = value;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Persistence

    fn lookup_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{name}{LOOKUP_TABLE_EXTENSION}"))
    }

    fn address_path(dir: &Path, name: &str, suffix: &str) -> PathBuf {
        dir.join(format!("{name}{suffix}{ADDRESS_TABLE_EXTENSION}"))
    }

    /// Write `<name>.lookup` and one `<name><suffix>.addr` per table.
    pub fn write(&self, dir: &Path, name: &str, suffixes: &[&str]) -> Result<()> {
        if suffixes.len() != self.address_tables.len() {
            return Err(DictError::InvalidInput(format!(
                "{} suffixes for {} address tables",
                suffixes.len(),
                self.address_tables.len()
            )));
        }
        write_ints(&Self::lookup_path(dir, name), &self.lookup)?;
        for (table, suffix) in self.address_tables.iter().zip(suffixes) {
            write_ints(&Self::address_path(dir, name, suffix), table)?;
        }
        Ok(())
    }

    /// Read a table written by [`SparseTable::write`]. The directory must hold
    /// exactly one address file per suffix.
    pub fn read(dir: &Path, name: &str, suffixes: &[&str], block_size: usize) -> Result<Self> {
        check_block_size(block_size)?;
        let found = count_address_files(dir, name)?;
        if found != suffixes.len() {
            return Err(DictError::UnsupportedFormat(format!(
                "{name} has {found} address tables, expected {}",
                suffixes.len()
            )));
        }
        let lookup = read_ints(&Self::lookup_path(dir, name))?;
        let mut address_tables = Vec::with_capacity(suffixes.len());
        for suffix in suffixes {
            address_tables.push(read_ints(&Self::address_path(dir, name, suffix))?);
        }

        let len = address_tables.first().map_or(0, Vec::len);
        if len % block_size != 0 || address_tables.iter().any(|t| t.len() != len) {
            return Err(DictError::Malformed(format!(
                "{name} address tables are not whole blocks of {block_size}"
            )));
        }
        let blocks = (len / block_size) as i32;
        if let Some(bad) = lookup.iter().find(|&&b| b != NOT_EXIST && !(0..blocks).contains(&b)) {
            return Err(DictError::Malformed(format!(
                "{name} lookup names block {bad} of {blocks}"
            )));
        }
        Ok(Self {
            block_size,
            lookup,
            address_tables,
        })
    }
}

fn count_address_files(dir: &Path, name: &str) -> Result<usize> {
    let entries = fs::read_dir(dir).map_err(|e| io_error("listing", dir, e))?;
    let mut count = 0;
    for entry in entries {
        let file_name = entry?.file_name();
        let file_name = file_name.to_string_lossy();
        if file_name.starts_with(name) && file_name.ends_with(ADDRESS_TABLE_EXTENSION) {
            count += 1;
        }
    }
    Ok(count)
}

pub(crate) fn write_ints(path: &Path, values: &[i32]) -> Result<()> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for v in values {
        bytes.extend_from_slice(&v.to_be_bytes());
    }
    fs::write(path, bytes).map_err(|e| io_error("writing", path, e).into())
}

pub(crate) fn read_ints(path: &Path) -> Result<Vec<i32>> {
    let bytes = fs::read(path).map_err(|e| io_error("reading", path, e))?;
    if bytes.len() % 4 != 0 {
        return Err(DictError::Malformed(format!(
            "{} is not a whole number of 4 byte entries",
            path.display()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn check_block_size(block_size: usize) -> Result<()> {
    if block_size == 0 {
        return Err(DictError::InvalidInput("sparse table block size must be positive".into()));
    }
    Ok(())
}
