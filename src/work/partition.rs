//! Offline work-file operations: merge, integrity check, info display and
//! the partitioned directory layout.
//!
//! A partitioned work directory holds a `header` file (HEADW header only, no
//! table body) and `partNNN` files, each covering a contiguous range of
//! H_PER_PART bucket indices. Freshly created parts are empty files.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{info, warn};
use rayon::prelude::*;

use super::snapshot::{read_header_body, read_magic, write_header, LoadedWork, WorkHeader};
use super::{HEADK, HEADW};
use crate::dp::table::read_u64;
use crate::dp::{AddResult, HashTable, HASH_SIZE};
use crate::error::SolverError;
use crate::kangaroo::collision::{self, ResolveCtx};
use crate::math::{curve::Point, Secp256k1, U256};

/// Number of part files in a partitioned work directory.
pub const MERGE_PART: usize = 256;
/// Buckets covered by one part file.
pub const H_PER_PART: usize = HASH_SIZE / MERGE_PART;

fn part_path(dir: &Path, i: usize) -> PathBuf {
    dir.join(format!("part{:03}", i))
}

/// Create an empty partitioned work directory: a zeroed header plus
/// MERGE_PART empty part files.
pub fn create_partition(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir).map_err(|e| SolverError::io(dir, e))?;

    let header_path = dir.join("header");
    let f = File::create(&header_path).map_err(|e| SolverError::io(&header_path, e))?;
    let mut w = BufWriter::new(f);
    let header = WorkHeader {
        dp_bits: 0,
        range_start: U256::ZERO,
        range_end: U256::ZERO,
        key: Point::INFINITY,
        total_count: 0,
        total_time: 0.0,
    };
    write_header(&mut w, HEADW, &header).map_err(|e| SolverError::io(&header_path, e))?;
    w.flush().map_err(|e| SolverError::io(&header_path, e))?;

    for i in 0..MERGE_PART {
        let p = part_path(dir, i);
        File::create(&p).map_err(|e| SolverError::io(&p, e))?;
    }

    info!("CreateEmptyPartWork: {} created", dir.display());
    Ok(())
}

/// The rebased target the stored wild distances refer to.
fn rebased_key(secp: &Secp256k1, header_key: &Point, range_start: &U256) -> Point {
    if range_start.is_zero() {
        *header_key
    } else {
        let shift = secp.compute_public_key(range_start).negate();
        secp.add(header_key, &shift)
    }
}

/// Merge two work files into `dest`. A cross-herd fingerprint match found
/// during the merge is resolved like a live collision; when that solves the
/// key the merge stops and reports it instead of writing `dest`.
/// Returns true when the key was solved.
pub fn merge_work(secp: &Secp256k1, f1: &Path, f2: &Path, dest: &Path) -> Result<bool> {
    let mut w1 = super::snapshot::load_work(secp, f1)?;
    let w2 = super::snapshot::load_work(secp, f2)?;

    if w1.range_start != w2.range_start || w1.range_end != w2.range_end || w1.key != w2.key {
        return Err(SolverError::ConfigInvalid(format!(
            "{} and {} are not compatible work files",
            f1.display(),
            f2.display()
        ))
        .into());
    }

    // The weaker filter keeps every entry a valid DP under the merged header.
    let dp_bits = w1.dp_bits.min(w2.dp_bits);

    let key_to_search = rebased_key(secp, &w1.key, &w1.range_start);
    let key_to_search_neg = key_to_search.negate();
    let width_div2 = w1.range_end.wrapping_sub(&w1.range_start).shr1();
    let rctx = ResolveCtx {
        secp,
        key_to_search: &key_to_search,
        key_to_search_neg: &key_to_search_neg,
        range_start: &w1.range_start,
        width_div2: &width_div2,
        use_symmetry: false,
    };

    let mut duplicates = 0u64;
    for h in 0..HASH_SIZE as u32 {
        for e in w2.table.bucket_entries(h).to_vec() {
            match w1.table.add_entry(h, e) {
                AddResult::Ok => {}
                AddResult::Dup => duplicates += 1,
                AddResult::Collision(stored) => {
                    let (d_tame, d_wild) = if stored.kind == crate::types::HerdKind::Tame {
                        (stored.to_scalar(), e.dist.to_scalar())
                    } else {
                        (e.dist.to_scalar(), stored.to_scalar())
                    };
                    if let Some(res) = collision::resolve(&rctx, &d_tame, &d_wild) {
                        if collision::output_solution(secp, &w1.key, &res, 0, None) {
                            return Ok(true);
                        }
                    }
                }
            }
        }
    }

    info!(
        "MergeWork: {} DPs, {} duplicates dropped",
        w1.table.n_items(),
        duplicates
    );

    write_merged(&w1, dp_bits, w2.total_count, w2.total_time, dest)?;
    Ok(false)
}

fn write_merged(
    w1: &LoadedWork,
    dp_bits: u32,
    extra_count: u64,
    extra_time: f64,
    dest: &Path,
) -> Result<()> {
    let f = File::create(dest).map_err(|e| SolverError::io(dest, e))?;
    let mut w = BufWriter::new(f);
    let header = WorkHeader {
        dp_bits,
        range_start: w1.range_start,
        range_end: w1.range_end,
        key: w1.key,
        total_count: w1.total_count + extra_count,
        total_time: w1.total_time + extra_time,
    };
    let res: std::io::Result<()> = (|| {
        write_header(&mut w, HEADW, &header)?;
        w1.table.save(&mut w)?;
        w.write_all(&0u64.to_le_bytes())?;
        w.flush()
    })();
    if let Err(e) = res {
        let _ = std::fs::remove_file(dest);
        return Err(SolverError::io(dest, e).into());
    }
    info!("MergeWork: {} written", dest.display());
    Ok(())
}

/// Merge every regular file in `dir` into `dest`, pairwise.
pub fn merge_dir(secp: &Secp256k1, dir: &Path, dest: &Path) -> Result<bool> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .map_err(|e| SolverError::io(dir, e))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    files.sort();

    if files.len() < 2 {
        return Err(SolverError::ConfigInvalid(format!(
            "{}: need at least two work files to merge",
            dir.display()
        ))
        .into());
    }

    // Fold into a scratch file, then rename onto dest.
    let scratch = dest.with_extension("merging");
    std::fs::copy(&files[0], &scratch).map_err(|e| SolverError::io(&scratch, e))?;
    for f in &files[1..] {
        if merge_work(secp, &scratch, f, &scratch)? {
            let _ = std::fs::remove_file(&scratch);
            return Ok(true);
        }
    }
    std::fs::rename(&scratch, dest).map_err(|e| SolverError::io(dest, e))?;
    info!("MergeDir: {} files merged into {}", files.len(), dest.display());
    Ok(false)
}

/// Verify every stored DP of a work file: recompute the walker position from
/// the tagged distance and compare its fingerprint with the stored one.
/// Returns the number of corrupt entries.
pub fn check_work_file(secp: &Secp256k1, path: &Path) -> Result<u64> {
    let loaded = super::snapshot::load_work(secp, path)?;
    let key_to_search = rebased_key(secp, &loaded.key, &loaded.range_start);
    let key_neg = key_to_search.negate();

    info!(
        "CheckWorkFile: {} DPs to check [dp={}]",
        loaded.table.n_items(),
        loaded.dp_bits
    );

    let per_part: Vec<u64> = (0..MERGE_PART)
        .into_par_iter()
        .map(|part| {
            let mut bad = 0u64;
            for h in (part * H_PER_PART) as u32..((part + 1) * H_PER_PART) as u32 {
                for e in loaded.table.bucket_entries(h) {
                    let d = e.dist.to_scalar();
                    let dg = secp.compute_public_key(&d);
                    let expected = match e.dist.kind {
                        crate::types::HerdKind::Tame => dg,
                        crate::types::HerdKind::Wild => secp.add(&key_to_search, &dg),
                    };
                    let stored = e.x_limbs(h);
                    if fingerprint_matches(&stored, &expected.x) {
                        continue;
                    }
                    // Symmetry class may have flipped the wild start.
                    if e.dist.kind == crate::types::HerdKind::Wild {
                        let alt = secp.add(&key_neg, &dg);
                        if fingerprint_matches(&stored, &alt.x) {
                            continue;
                        }
                    }
                    bad += 1;
                }
            }
            bad
        })
        .collect();

    let bad: u64 = per_part.iter().sum();
    if bad == 0 {
        info!("CheckWorkFile: {} ok", path.display());
    } else {
        warn!("CheckWorkFile: {} corrupt entries in {}", bad, path.display());
    }
    Ok(bad)
}

fn fingerprint_matches(stored: &U256, computed_x: &U256) -> bool {
    const MID_MASK: u64 = (1u64 << 42) - 1;
    stored.limbs[0] == computed_x.limbs[0]
        && stored.limbs[1] == computed_x.limbs[1]
        && stored.limbs[2] & MID_MASK == computed_x.limbs[2] & MID_MASK
        && stored.limbs[2] >> 42 == computed_x.limbs[2] >> 42
}

/// Print header and table statistics for a work file or a partitioned
/// work directory.
pub fn work_info(secp: &Secp256k1, path: &Path) -> Result<()> {
    let is_dir = path.is_dir();
    let header_path = if is_dir { path.join("header") } else { path.to_path_buf() };

    info!("Loading: {}", header_path.display());
    let f = File::open(&header_path).map_err(|e| SolverError::io(&header_path, e))?;
    let mut r = BufReader::new(f);

    let magic = read_magic(&mut r, &header_path)?;
    if magic == HEADK {
        let nb = read_u64(&mut r).map_err(|e| SolverError::io(&header_path, e))?;
        println!("Kangaroo only file");
        println!("Kangaroos : {} 2^{:.3}", nb, (nb.max(1) as f64).log2());
        return Ok(());
    }

    let header = read_header_body(&mut r, &header_path)?;
    if !secp.is_on_curve(&header.key) {
        return Err(SolverError::CurveMismatch(format!(
            "{}: stored key does not lie on secp256k1",
            header_path.display()
        ))
        .into());
    }

    let n_items = if is_dir {
        let mut total = 0u64;
        for i in 0..MERGE_PART {
            let p = part_path(path, i);
            let meta = std::fs::metadata(&p).map_err(|e| SolverError::io(&p, e))?;
            if meta.len() == 0 {
                continue;
            }
            let mut pr = BufReader::new(File::open(&p).map_err(|e| SolverError::io(&p, e))?);
            total += HashTable::count_serialized(&mut pr, i * H_PER_PART, (i + 1) * H_PER_PART)
                .map_err(|e| SolverError::io(&p, e))?;
        }
        total
    } else {
        HashTable::count_serialized(&mut r, 0, HASH_SIZE)
            .map_err(|e| SolverError::io(&header_path, e))?
    };

    println!("Version   : {}", super::WORK_VERSION);
    println!("DP bits   : {}", header.dp_bits);
    println!("Start     : {}", header.range_start.to_hex());
    println!("Stop      : {}", header.range_end.to_hex());
    println!("Key       : 0x{}", secp.format_public_key(true, &header.key));
    println!(
        "Count     : {} 2^{:.3}",
        header.total_count,
        (header.total_count.max(1) as f64).log2()
    );
    println!(
        "Time      : {}",
        crate::utils::format::time_str(header.total_time)
    );
    println!("DP        : {} 2^{:.3}", n_items, (n_items.max(1) as f64).log2());

    if !is_dir {
        let nb_walk = read_u64(&mut r).unwrap_or(0);
        println!(
            "Kangaroos : {} 2^{:.3}",
            nb_walk,
            (nb_walk.max(1) as f64).log2()
        );
    }

    Ok(())
}

/// Save the table of a loaded work file into a partitioned directory,
/// splitting buckets across the part files. The directory must have been
/// created with `create_partition`.
pub fn save_to_partition(loaded: &LoadedWork, dir: &Path) -> Result<()> {
    let header_path = dir.join("header");
    let f = File::create(&header_path).map_err(|e| SolverError::io(&header_path, e))?;
    let mut w = BufWriter::new(f);
    let header = WorkHeader {
        dp_bits: loaded.dp_bits,
        range_start: loaded.range_start,
        range_end: loaded.range_end,
        key: loaded.key,
        total_count: loaded.total_count,
        total_time: loaded.total_time,
    };
    write_header(&mut w, HEADW, &header).map_err(|e| SolverError::io(&header_path, e))?;
    w.flush().map_err(|e| SolverError::io(&header_path, e))?;

    for i in 0..MERGE_PART {
        let p = part_path(dir, i);
        let f = File::create(&p).map_err(|e| SolverError::io(&p, e))?;
        let mut w = BufWriter::new(f);
        loaded
            .table
            .save_range(&mut w, i * H_PER_PART, (i + 1) * H_PER_PART)
            .and_then(|_| w.flush())
            .map_err(|e| SolverError::io(&p, e))?;
    }
    Ok(())
}

/// Load a partitioned directory back into a single table.
pub fn load_partition(secp: &Secp256k1, dir: &Path) -> Result<LoadedWork> {
    let header_path = dir.join("header");
    let f = File::open(&header_path).map_err(|e| SolverError::io(&header_path, e))?;
    let mut r = BufReader::new(f);
    let magic = read_magic(&mut r, &header_path)?;
    if magic != HEADW {
        return Err(SolverError::FormatMismatch {
            path: header_path,
            detail: "partition header must be a work header".into(),
        }
        .into());
    }
    let header = read_header_body(&mut r, &header_path)?;
    if !secp.is_on_curve(&header.key) && !header.key.is_infinity() {
        return Err(SolverError::CurveMismatch(format!(
            "{}: stored key does not lie on secp256k1",
            header_path.display()
        ))
        .into());
    }

    let mut table = HashTable::new();
    for i in 0..MERGE_PART {
        let p = part_path(dir, i);
        let meta = std::fs::metadata(&p).map_err(|e| SolverError::io(&p, e))?;
        if meta.len() == 0 {
            continue;
        }
        let mut pr = BufReader::new(File::open(&p).map_err(|e| SolverError::io(&p, e))?);
        table
            .load_range(&mut pr, i * H_PER_PART, (i + 1) * H_PER_PART)
            .map_err(|e| SolverError::io(&p, e))?;
    }

    Ok(LoadedWork {
        dp_bits: header.dp_bits,
        range_start: header.range_start,
        range_end: header.range_end,
        key: header.key,
        total_count: header.total_count,
        total_time: header.total_time,
        table,
        walks: Vec::new(),
    })
}

/// Quick structural validation used by `-wcheck` on a partition directory.
pub fn check_partition(secp: &Secp256k1, dir: &Path) -> Result<u64> {
    // Loading validates framing; then run the same DP verification.
    let loaded = load_partition(secp, dir)?;
    if loaded.key.is_infinity() {
        // Empty partition: nothing to verify.
        info!("CheckPartition: {} is empty", dir.display());
        return Ok(0);
    }
    let tmp = tempfile_path(dir)?;
    // Reuse the single-file checker by round-tripping through a scratch file.
    {
        let f = File::create(&tmp).map_err(|e| SolverError::io(&tmp, e))?;
        let mut w = BufWriter::new(f);
        let header = WorkHeader {
            dp_bits: loaded.dp_bits,
            range_start: loaded.range_start,
            range_end: loaded.range_end,
            key: loaded.key,
            total_count: loaded.total_count,
            total_time: loaded.total_time,
        };
        write_header(&mut w, HEADW, &header).map_err(|e| SolverError::io(&tmp, e))?;
        loaded.table.save(&mut w).map_err(|e| SolverError::io(&tmp, e))?;
        w.write_all(&0u64.to_le_bytes()).map_err(|e| SolverError::io(&tmp, e))?;
        w.flush().map_err(|e| SolverError::io(&tmp, e))?;
    }
    let bad = check_work_file(secp, &tmp);
    let _ = std::fs::remove_file(&tmp);
    bad
}

fn tempfile_path(dir: &Path) -> Result<PathBuf> {
    Ok(dir.join(".check_scratch"))
}
