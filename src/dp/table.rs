//! The distinguished-point hash table.
//!
//! 2^22 buckets indexed by the top 22 bits of x limb2; the remaining 42 bits
//! of limb2 plus limbs 0 and 1 form the in-bucket fingerprint. Buckets keep
//! insertion order and grow geometrically. A fingerprint match with the same
//! herd kind is a duplicate; with the opposite kind it is a collision and the
//! stored distance is handed back for resolution.
//!
//! The fingerprint ignores x limb3 entirely, so distinct points can collide
//! in it. That is negligible below ~2^125 range widths and the resolver's
//! verification rejects impostors, but the ceiling is real: above it the
//! false-collision rate starts to climb.

use std::io::{Read, Write};

use crate::math::U256;
use crate::types::DpDist;

/// Number of buckets.
pub const HASH_SIZE: usize = 1 << 22;

const MID_BITS: u32 = 42;
const MID_MASK: u64 = (1u64 << MID_BITS) - 1;
const INITIAL_BUCKET_CAP: u32 = 16;

/// One stored DP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DpEntry {
    /// x limbs 0 and 1.
    pub fp_lo: u128,
    /// x limb2 low 42 bits.
    pub fp_mid: u64,
    pub dist: DpDist,
}

impl DpEntry {
    /// Reconstruct the fingerprinted x limbs (limb3 is not stored).
    pub fn x_limbs(&self, bucket: u32) -> U256 {
        U256::new([
            self.fp_lo as u64,
            (self.fp_lo >> 64) as u64,
            ((bucket as u64) << MID_BITS) | self.fp_mid,
            0,
        ])
    }
}

/// Outcome of an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddResult {
    /// New entry stored.
    Ok,
    /// Same fingerprint and same herd already present; table unchanged.
    Dup,
    /// Same fingerprint, opposite herd: the stored distance for resolution.
    Collision(DpDist),
}

#[derive(Debug, Default, Clone)]
struct Bucket {
    items: Vec<DpEntry>,
    max_item: u32,
}

/// The DP table. Ingestion is serialised by the engine's hash mutex; this
/// type itself is single-threaded.
pub struct HashTable {
    buckets: Box<[Bucket]>,
    n_items: u64,
}

impl Default for HashTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HashTable {
    pub fn new() -> Self {
        HashTable {
            buckets: vec![Bucket::default(); HASH_SIZE].into_boxed_slice(),
            n_items: 0,
        }
    }

    #[inline]
    pub fn bucket_of(x: &U256) -> u32 {
        (x.limbs[2] >> MID_BITS) as u32
    }

    fn fingerprint(x: &U256) -> (u128, u64) {
        (
            x.limbs[0] as u128 | ((x.limbs[1] as u128) << 64),
            x.limbs[2] & MID_MASK,
        )
    }

    /// Insert the DP at x with the given distance.
    pub fn add(&mut self, x: &U256, dist: DpDist) -> AddResult {
        let h = Self::bucket_of(x) as usize;
        let (fp_lo, fp_mid) = Self::fingerprint(x);
        let bucket = &mut self.buckets[h];

        for e in &bucket.items {
            if e.fp_lo == fp_lo && e.fp_mid == fp_mid {
                return if e.dist.kind == dist.kind {
                    AddResult::Dup
                } else {
                    AddResult::Collision(e.dist)
                };
            }
        }

        if bucket.items.len() as u32 == bucket.max_item {
            let new_cap = if bucket.max_item == 0 {
                INITIAL_BUCKET_CAP
            } else {
                bucket.max_item * 2
            };
            bucket.items.reserve_exact((new_cap - bucket.max_item) as usize);
            bucket.max_item = new_cap;
        }
        bucket.items.push(DpEntry { fp_lo, fp_mid, dist });
        self.n_items += 1;
        AddResult::Ok
    }

    /// Insert an already-fingerprinted entry into a known bucket (merge path).
    pub fn add_entry(&mut self, h: u32, entry: DpEntry) -> AddResult {
        let bucket = &mut self.buckets[h as usize];
        for e in &bucket.items {
            if e.fp_lo == entry.fp_lo && e.fp_mid == entry.fp_mid {
                return if e.dist.kind == entry.dist.kind {
                    AddResult::Dup
                } else {
                    AddResult::Collision(e.dist)
                };
            }
        }
        if bucket.items.len() as u32 == bucket.max_item {
            let new_cap = if bucket.max_item == 0 {
                INITIAL_BUCKET_CAP
            } else {
                bucket.max_item * 2
            };
            bucket.items.reserve_exact((new_cap - bucket.max_item) as usize);
            bucket.max_item = new_cap;
        }
        bucket.items.push(entry);
        self.n_items += 1;
        AddResult::Ok
    }

    /// Lookup for validation paths only.
    pub fn seek(&self, x: &U256) -> Option<&DpEntry> {
        let h = Self::bucket_of(x) as usize;
        let (fp_lo, fp_mid) = Self::fingerprint(x);
        self.buckets[h]
            .items
            .iter()
            .find(|e| e.fp_lo == fp_lo && e.fp_mid == fp_mid)
    }

    /// Drop every entry.
    pub fn reset(&mut self) {
        for b in self.buckets.iter_mut() {
            b.items = Vec::new();
            b.max_item = 0;
        }
        self.n_items = 0;
    }

    #[inline]
    pub fn n_items(&self) -> u64 {
        self.n_items
    }

    pub fn bucket_len(&self, h: u32) -> u32 {
        self.buckets[h as usize].items.len() as u32
    }

    pub fn bucket_capacity(&self, h: u32) -> u32 {
        self.buckets[h as usize].max_item
    }

    pub fn bucket_entries(&self, h: u32) -> &[DpEntry] {
        &self.buckets[h as usize].items
    }

    /// Approximate heap footprint, formatted for the progress line.
    pub fn size_info(&self) -> String {
        let entry_bytes = self.buckets.iter().map(|b| b.max_item as u64).sum::<u64>()
            * std::mem::size_of::<DpEntry>() as u64;
        let total = entry_bytes + (HASH_SIZE * std::mem::size_of::<Bucket>()) as u64;
        if total < 1024 * 1024 {
            format!("{:.1}KB", total as f64 / 1024.0)
        } else if total < 1024 * 1024 * 1024 {
            format!("{:.1}MB", total as f64 / (1024.0 * 1024.0))
        } else {
            format!("{:.1}GB", total as f64 / (1024.0 * 1024.0 * 1024.0))
        }
    }

    /// Serialise buckets [start, end) as per-bucket {nbItem, maxItem, entries}.
    pub fn save_range<W: Write>(&self, w: &mut W, start: usize, end: usize) -> std::io::Result<()> {
        for b in &self.buckets[start..end] {
            w.write_all(&(b.items.len() as u32).to_le_bytes())?;
            w.write_all(&b.max_item.to_le_bytes())?;
            for e in &b.items {
                write_entry(w, e)?;
            }
        }
        Ok(())
    }

    /// Serialise the whole table.
    pub fn save<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        self.save_range(w, 0, HASH_SIZE)
    }

    /// Load buckets [start, end), replacing their current contents.
    pub fn load_range<R: Read>(&mut self, r: &mut R, start: usize, end: usize) -> std::io::Result<()> {
        for h in start..end {
            let nb = read_u32(r)?;
            let max_item = read_u32(r)?.max(nb);
            let mut items = Vec::with_capacity(max_item as usize);
            for _ in 0..nb {
                items.push(read_entry(r)?);
            }
            let old = self.buckets[h].items.len() as u64;
            self.buckets[h] = Bucket { items, max_item };
            self.n_items = self.n_items - old + nb as u64;
        }
        Ok(())
    }

    pub fn load<R: Read>(&mut self, r: &mut R) -> std::io::Result<()> {
        self.load_range(r, 0, HASH_SIZE)
    }

    /// Skip over serialised buckets [start, end) counting entries, without
    /// storing them. Used by the work-file info display.
    pub fn count_serialized<R: Read + std::io::Seek>(
        r: &mut R,
        start: usize,
        end: usize,
    ) -> std::io::Result<u64> {
        let mut total = 0u64;
        for _ in start..end {
            let nb = read_u32(r)?;
            let _max = read_u32(r)?;
            r.seek(std::io::SeekFrom::Current(nb as i64 * ENTRY_BYTES as i64))?;
            total += nb as u64;
        }
        Ok(total)
    }
}

/// On-disk entry size: 32-byte x fingerprint, 32-byte tagged distance, u32 kind.
pub const ENTRY_BYTES: usize = 68;

pub(crate) fn write_entry<W: Write>(w: &mut W, e: &DpEntry) -> std::io::Result<()> {
    w.write_all(&(e.fp_lo as u64).to_le_bytes())?;
    w.write_all(&((e.fp_lo >> 64) as u64).to_le_bytes())?;
    w.write_all(&e.fp_mid.to_le_bytes())?;
    w.write_all(&0u64.to_le_bytes())?;
    let packed = e.dist.pack();
    w.write_all(&(packed as u64).to_le_bytes())?;
    w.write_all(&((packed >> 64) as u64).to_le_bytes())?;
    w.write_all(&0u64.to_le_bytes())?;
    w.write_all(&0u64.to_le_bytes())?;
    w.write_all(&(e.dist.kind as u32).to_le_bytes())?;
    Ok(())
}

fn read_entry<R: Read>(r: &mut R) -> std::io::Result<DpEntry> {
    let fp0 = read_u64(r)?;
    let fp1 = read_u64(r)?;
    let fp_mid = read_u64(r)? & MID_MASK;
    let _ = read_u64(r)?;
    let d0 = read_u64(r)?;
    let d1 = read_u64(r)?;
    let _ = read_u64(r)?;
    let _ = read_u64(r)?;
    let _kind = read_u32(r)?;
    let dist = DpDist::unpack(d0 as u128 | ((d1 as u128) << 64));
    Ok(DpEntry {
        fp_lo: fp0 as u128 | ((fp1 as u128) << 64),
        fp_mid,
        dist,
    })
}

pub(crate) fn read_u32<R: Read>(r: &mut R) -> std::io::Result<u32> {
    let mut b = [0u8; 4];
    r.read_exact(&mut b)?;
    Ok(u32::from_le_bytes(b))
}

pub(crate) fn read_u64<R: Read>(r: &mut R) -> std::io::Result<u64> {
    let mut b = [0u8; 8];
    r.read_exact(&mut b)?;
    Ok(u64::from_le_bytes(b))
}
