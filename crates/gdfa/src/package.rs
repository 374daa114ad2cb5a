//! GDFA package format
//!
//! ```text
//! header   40 bytes  magic "GDFA", version, kappa, ssp, outmax, cmax,
//!                    cell_len, key_len, reserved (u16 each after magic),
//!                    start_label, row_count, row_len, entry_len (u32),
//!                    header CRC32
//! rows     row_count x row_len bytes, in label order
//! trailer  32 bytes  SHA-256 over header and rows
//! ```
//!
//! All integers are little-endian. Writer and reader work row by row so
//! neither side needs the whole table in memory.

use std::io::{Cursor, Read, Write};
use std::sync::Arc;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use sha2::{Digest, Sha256};
use tracing::debug;

use oblivids_ot::crypto::{KAPPA, SSP};
use oblivids_ot::PackageInfo;
use oblivids_protocol::DIGEST_LEN;

use crate::error::{GdfaError, Result};
use crate::params::{Sparsity, CELL_LEN, GDFA_VERSION, KEY_LEN, MAX_ROWS};

/// Package magic
pub const PACKAGE_MAGIC: [u8; 4] = *b"GDFA";

/// Encoded header size
pub const PACKAGE_HEADER_LEN: usize = 40;

/// Public parameters of a garbled table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackageHeader {
    pub version: u16,
    pub kappa: u16,
    pub ssp: u16,
    pub outmax: u16,
    pub cmax: u16,
    pub cell_len: u16,
    pub key_len: u16,
    /// Row label of the start state
    pub start_label: u32,
    pub row_count: u32,
    pub row_len: u32,
    /// Bytes of one 1-of-256 entry served by the server
    pub entry_len: u32,
}

impl PackageHeader {
    pub fn new(sparsity: Sparsity, start_label: u32, row_count: u32) -> Self {
        Self {
            version: GDFA_VERSION,
            kappa: KAPPA as u16,
            ssp: SSP as u16,
            outmax: sparsity.outmax,
            cmax: sparsity.cmax,
            cell_len: CELL_LEN as u16,
            key_len: KEY_LEN as u16,
            start_label,
            row_count,
            row_len: sparsity.row_len() as u32,
            entry_len: sparsity.entry_len() as u32,
        }
    }

    pub fn sparsity(&self) -> Sparsity {
        Sparsity {
            outmax: self.outmax,
            cmax: self.cmax,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(PACKAGE_HEADER_LEN);
        buf.extend_from_slice(&PACKAGE_MAGIC);
        buf.write_u16::<LittleEndian>(self.version).unwrap();
        buf.write_u16::<LittleEndian>(self.kappa).unwrap();
        buf.write_u16::<LittleEndian>(self.ssp).unwrap();
        buf.write_u16::<LittleEndian>(self.outmax).unwrap();
        buf.write_u16::<LittleEndian>(self.cmax).unwrap();
        buf.write_u16::<LittleEndian>(self.cell_len).unwrap();
        buf.write_u16::<LittleEndian>(self.key_len).unwrap();
        buf.write_u16::<LittleEndian>(0).unwrap();
        buf.write_u32::<LittleEndian>(self.start_label).unwrap();
        buf.write_u32::<LittleEndian>(self.row_count).unwrap();
        buf.write_u32::<LittleEndian>(self.row_len).unwrap();
        buf.write_u32::<LittleEndian>(self.entry_len).unwrap();

        let crc = crc32fast::hash(&buf);
        buf.write_u32::<LittleEndian>(crc).unwrap();
        buf
    }

    /// Decode and validate a header
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < PACKAGE_HEADER_LEN {
            return Err(GdfaError::InvalidPackage(format!(
                "header of {} bytes",
                data.len()
            )));
        }
        if data[..4] != PACKAGE_MAGIC {
            return Err(GdfaError::InvalidPackage("bad magic".into()));
        }

        let mut cursor = Cursor::new(&data[4..PACKAGE_HEADER_LEN]);
        let version = cursor.read_u16::<LittleEndian>()?;
        if version != GDFA_VERSION {
            return Err(GdfaError::InvalidPackage(format!(
                "unsupported version {}",
                version
            )));
        }

        let kappa = cursor.read_u16::<LittleEndian>()?;
        let ssp = cursor.read_u16::<LittleEndian>()?;
        let outmax = cursor.read_u16::<LittleEndian>()?;
        let cmax = cursor.read_u16::<LittleEndian>()?;
        let cell_len = cursor.read_u16::<LittleEndian>()?;
        let key_len = cursor.read_u16::<LittleEndian>()?;
        let _reserved = cursor.read_u16::<LittleEndian>()?;
        let header = Self {
            version,
            kappa,
            ssp,
            outmax,
            cmax,
            cell_len,
            key_len,
            start_label: cursor.read_u32::<LittleEndian>()?,
            row_count: cursor.read_u32::<LittleEndian>()?,
            row_len: cursor.read_u32::<LittleEndian>()?,
            entry_len: cursor.read_u32::<LittleEndian>()?,
        };

        let expected = cursor.read_u32::<LittleEndian>()?;
        let got = crc32fast::hash(&data[..PACKAGE_HEADER_LEN - 4]);
        if expected != got {
            return Err(GdfaError::HeaderCrcMismatch { expected, got });
        }

        header.validate()?;
        Ok(header)
    }

    /// Check the header describes a table this build can evaluate
    pub fn validate(&self) -> Result<()> {
        if self.kappa as usize != KAPPA || self.ssp as usize != SSP {
            return Err(GdfaError::InvalidPackage(format!(
                "security parameters kappa={} ssp={}",
                self.kappa, self.ssp
            )));
        }
        if self.cell_len as usize != CELL_LEN || self.key_len as usize != KEY_LEN {
            return Err(GdfaError::InvalidPackage(format!(
                "cell_len={} key_len={}",
                self.cell_len, self.key_len
            )));
        }

        let sparsity = self.sparsity();
        sparsity.validate()?;
        if self.row_len as usize != sparsity.row_len() {
            return Err(GdfaError::RowLengthMismatch {
                expected: sparsity.row_len(),
                got: self.row_len as usize,
            });
        }
        if self.entry_len as usize != sparsity.entry_len() {
            return Err(GdfaError::InvalidPackage(format!(
                "entry_len {} for cmax {}",
                self.entry_len, self.cmax
            )));
        }
        if self.row_count > MAX_ROWS {
            return Err(GdfaError::InvalidPackage(format!(
                "{} rows, at most {} supported",
                self.row_count, MAX_ROWS
            )));
        }
        if self.row_count == 0 || self.start_label >= self.row_count {
            return Err(GdfaError::LabelOutOfRange {
                label: self.start_label,
                rows: self.row_count,
            });
        }
        Ok(())
    }
}

/// Streams a package: header on creation, then rows, then the trailer
pub struct PackageWriter<W: Write> {
    inner: W,
    hasher: Sha256,
    header: PackageHeader,
    written: u32,
}

impl<W: Write> PackageWriter<W> {
    pub fn new(mut inner: W, header: PackageHeader) -> Result<Self> {
        header.validate()?;
        let bytes = header.encode();
        inner.write_all(&bytes)?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(Self {
            inner,
            hasher,
            header,
            written: 0,
        })
    }

    pub fn write_row(&mut self, row: &[u8]) -> Result<()> {
        if row.len() != self.header.row_len as usize {
            return Err(GdfaError::RowLengthMismatch {
                expected: self.header.row_len as usize,
                got: row.len(),
            });
        }
        if self.written >= self.header.row_count {
            return Err(GdfaError::RowCountMismatch {
                expected: self.header.row_count,
                got: self.written + 1,
            });
        }
        self.inner.write_all(row)?;
        self.hasher.update(row);
        self.written += 1;
        Ok(())
    }

    /// Write the trailer and return the package digest
    pub fn finish(mut self) -> Result<[u8; DIGEST_LEN]> {
        if self.written != self.header.row_count {
            return Err(GdfaError::RowCountMismatch {
                expected: self.header.row_count,
                got: self.written,
            });
        }
        let digest = finalize(self.hasher);
        self.inner.write_all(&digest)?;
        self.inner.flush()?;
        debug!(rows = self.written, "package written");
        Ok(digest)
    }
}

/// Streams a package back, verifying the trailer after the last row
pub struct PackageReader<R: Read> {
    inner: R,
    hasher: Sha256,
    header: PackageHeader,
    read: u32,
    digest: Option<[u8; DIGEST_LEN]>,
}

impl<R: Read> PackageReader<R> {
    pub fn new(mut inner: R) -> Result<Self> {
        let mut bytes = [0u8; PACKAGE_HEADER_LEN];
        inner.read_exact(&mut bytes)?;
        let header = PackageHeader::decode(&bytes)?;

        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Ok(Self {
            inner,
            hasher,
            header,
            read: 0,
            digest: None,
        })
    }

    pub fn header(&self) -> &PackageHeader {
        &self.header
    }

    /// Next row, or `None` once all rows were read and the trailer matched
    pub fn next_row(&mut self) -> Result<Option<Vec<u8>>> {
        if self.read == self.header.row_count {
            self.verify_trailer()?;
            return Ok(None);
        }

        let mut row = vec![0u8; self.header.row_len as usize];
        self.inner.read_exact(&mut row).map_err(|err| {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                GdfaError::RowCountMismatch {
                    expected: self.header.row_count,
                    got: self.read,
                }
            } else {
                GdfaError::Io(err)
            }
        })?;
        self.hasher.update(&row);
        self.read += 1;
        Ok(Some(row))
    }

    /// Digest, available once the trailer was verified
    pub fn digest(&self) -> Option<[u8; DIGEST_LEN]> {
        self.digest
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn verify_trailer(&mut self) -> Result<()> {
        if self.digest.is_some() {
            return Ok(());
        }
        let mut trailer = [0u8; DIGEST_LEN];
        self.inner.read_exact(&mut trailer)?;

        let digest = finalize(self.hasher.clone());
        if trailer != digest {
            return Err(GdfaError::DigestMismatch);
        }
        self.digest = Some(digest);
        Ok(())
    }
}

fn finalize(hasher: Sha256) -> [u8; DIGEST_LEN] {
    let mut out = [0u8; DIGEST_LEN];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// An immutable garbled table, shared read-only by every session
#[derive(Debug, Clone)]
pub struct GdfaPackage {
    header: PackageHeader,
    rows: Arc<[u8]>,
    digest: [u8; DIGEST_LEN],
}

impl GdfaPackage {
    /// Assemble a package from rows in label order
    pub fn from_rows<I>(header: PackageHeader, rows: I) -> Result<Self>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let mut writer = PackageWriter::new(std::io::sink(), header)?;
        let mut data = Vec::new();
        for row in rows {
            writer.write_row(&row)?;
            data.extend_from_slice(&row);
        }
        let digest = writer.finish()?;

        Ok(Self {
            header,
            rows: data.into(),
            digest,
        })
    }

    pub fn header(&self) -> &PackageHeader {
        &self.header
    }

    pub fn sparsity(&self) -> Sparsity {
        self.header.sparsity()
    }

    pub fn row_count(&self) -> u32 {
        self.header.row_count
    }

    pub fn start_label(&self) -> u32 {
        self.header.start_label
    }

    /// SHA-256 of the serialized package
    pub fn digest(&self) -> [u8; DIGEST_LEN] {
        self.digest
    }

    /// What the OT sender advertises for this package
    pub fn info(&self) -> PackageInfo {
        PackageInfo {
            digest: self.digest,
            outmax: self.header.outmax,
            cmax: self.header.cmax,
        }
    }

    pub fn row(&self, label: u32) -> Result<&[u8]> {
        if label >= self.header.row_count {
            return Err(GdfaError::LabelOutOfRange {
                label,
                rows: self.header.row_count,
            });
        }
        let len = self.header.row_len as usize;
        let start = label as usize * len;
        Ok(&self.rows[start..start + len])
    }

    /// Ciphertext of one cell, `None` for a column past `outmax`
    pub fn cell(&self, label: u32, column: u16) -> Result<Option<&[u8]>> {
        let row = self.row(label)?;
        if column >= self.header.outmax {
            return Ok(None);
        }
        let start = column as usize * CELL_LEN;
        Ok(Some(&row[start..start + CELL_LEN]))
    }

    /// Stream the package into `writer`
    pub fn write_to<W: Write>(&self, writer: W) -> Result<[u8; DIGEST_LEN]> {
        let mut out = PackageWriter::new(writer, self.header)?;
        for row in self.rows.chunks_exact(self.header.row_len as usize) {
            out.write_row(row)?;
        }
        out.finish()
    }

    /// Read a whole package, verifying the digest
    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        let mut reader = PackageReader::new(reader)?;
        let header = *reader.header();

        // Grows with the rows actually present; row_count is untrusted
        let mut data = Vec::new();
        while let Some(row) = reader.next_row()? {
            data.extend_from_slice(&row);
        }
        let digest = reader.digest().ok_or(GdfaError::DigestMismatch)?;

        Ok(Self {
            header,
            rows: data.into(),
            digest,
        })
    }

    /// Serialize the whole package
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let len = PACKAGE_HEADER_LEN + self.rows.len() + DIGEST_LEN;
        let mut out = Vec::with_capacity(len);
        self.write_to(&mut out)?;
        Ok(out)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let mut cursor = Cursor::new(data);
        let package = Self::read_from(&mut cursor)?;
        if (cursor.position() as usize) != data.len() {
            return Err(GdfaError::InvalidPackage(format!(
                "{} trailing bytes",
                data.len() - cursor.position() as usize
            )));
        }
        Ok(package)
    }
}
