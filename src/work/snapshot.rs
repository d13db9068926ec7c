//! Snapshot capture and asynchronous persistence.
//!
//! A save first parks every walker at a step boundary (saveRequest /
//! isWaiting barrier), then copies bucket sizes and entries into a flat
//! payload under the hash mutex, releases the walkers and hands the payload
//! to a background flusher. Exactly one flush runs at a time; an interval
//! that fires while one is running is skipped with a log line. A failed
//! write never touches the live table; the partial file is unlinked.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{info, warn};

use super::{HEADK, HEADW, WORK_VERSION};
use crate::dp::table::{read_u32, read_u64};
use crate::dp::{DpEntry, HashTable, HASH_SIZE};
use crate::error::SolverError;
use crate::kangaroo::engine::{EngineConfig, SearchCtx};
use crate::math::{curve::Point, Secp256k1, U256};
use crate::types::KangarooState;

pub(crate) fn write_u256<W: Write>(w: &mut W, v: &U256) -> std::io::Result<()> {
    for limb in v.limbs {
        w.write_all(&limb.to_le_bytes())?;
    }
    Ok(())
}

pub(crate) fn read_u256<R: Read>(r: &mut R) -> std::io::Result<U256> {
    let mut limbs = [0u64; 4];
    for l in limbs.iter_mut() {
        *l = read_u64(r)?;
    }
    Ok(U256::new(limbs))
}

/// Header of a full work file.
pub struct WorkHeader {
    pub dp_bits: u32,
    pub range_start: U256,
    pub range_end: U256,
    pub key: Point,
    pub total_count: u64,
    pub total_time: f64,
}

pub fn write_header<W: Write>(w: &mut W, head_type: u32, h: &WorkHeader) -> std::io::Result<()> {
    w.write_all(&head_type.to_le_bytes())?;
    w.write_all(&WORK_VERSION.to_le_bytes())?;
    if head_type == HEADW {
        w.write_all(&h.dp_bits.to_le_bytes())?;
        write_u256(w, &h.range_start)?;
        write_u256(w, &h.range_end)?;
        write_u256(w, &h.key.x)?;
        write_u256(w, &h.key.y)?;
        w.write_all(&h.total_count.to_le_bytes())?;
        w.write_all(&h.total_time.to_le_bytes())?;
    }
    Ok(())
}

/// Read and validate the magic/version pair; returns the magic found.
pub fn read_magic<R: Read>(r: &mut R, path: &Path) -> Result<u32> {
    let magic = read_u32(r).map_err(|e| SolverError::io(path, e))?;
    let version = read_u32(r).map_err(|e| SolverError::io(path, e))?;
    if magic != HEADW && magic != HEADK {
        return Err(SolverError::FormatMismatch {
            path: path.to_path_buf(),
            detail: format!("unknown magic 0x{:08X}", magic),
        }
        .into());
    }
    if version != WORK_VERSION {
        return Err(SolverError::FormatMismatch {
            path: path.to_path_buf(),
            detail: format!("unsupported version {}", version),
        }
        .into());
    }
    Ok(magic)
}

/// Read the HEADW header body (after magic/version).
pub fn read_header_body<R: Read>(r: &mut R, path: &Path) -> Result<WorkHeader> {
    let dp_bits = read_u32(r).map_err(|e| SolverError::io(path, e))?;
    let range_start = read_u256(r).map_err(|e| SolverError::io(path, e))?;
    let range_end = read_u256(r).map_err(|e| SolverError::io(path, e))?;
    let kx = read_u256(r).map_err(|e| SolverError::io(path, e))?;
    let ky = read_u256(r).map_err(|e| SolverError::io(path, e))?;
    let total_count = read_u64(r).map_err(|e| SolverError::io(path, e))?;
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf).map_err(|e| SolverError::io(path, e))?;
    let total_time = f64::from_le_bytes(buf);
    Ok(WorkHeader {
        dp_bits,
        range_start,
        range_end,
        key: Point { x: kx, y: ky },
        total_count,
        total_time,
    })
}

/// Everything restored from a work file.
pub struct LoadedWork {
    pub dp_bits: u32,
    pub range_start: U256,
    pub range_end: U256,
    pub key: Point,
    pub total_count: u64,
    pub total_time: f64,
    pub table: HashTable,
    pub walks: Vec<KangarooState>,
}

/// Load a full work file, including the hash table and any saved herd.
pub fn load_work(secp: &Secp256k1, path: &Path) -> Result<LoadedWork> {
    info!("Loading: {}", path.display());
    let f = File::open(path).map_err(|e| SolverError::io(path, e))?;
    let mut r = BufReader::new(f);

    let magic = read_magic(&mut r, path)?;
    if magic != HEADW {
        return Err(SolverError::FormatMismatch {
            path: path.to_path_buf(),
            detail: "kangaroos-only file, full work file expected".into(),
        }
        .into());
    }
    let header = read_header_body(&mut r, path)?;

    if !secp.is_on_curve(&header.key) {
        return Err(SolverError::CurveMismatch(format!(
            "{}: stored key does not lie on secp256k1",
            path.display()
        ))
        .into());
    }

    let mut table = HashTable::new();
    table.load(&mut r).map_err(|e| SolverError::io(path, e))?;

    let nb_walk = read_u64(&mut r).map_err(|e| SolverError::io(path, e))?;
    let mut walks = Vec::with_capacity(nb_walk.min(1 << 24) as usize);
    for _ in 0..nb_walk {
        let x = read_u256(&mut r).map_err(|e| SolverError::io(path, e))?;
        let y = read_u256(&mut r).map_err(|e| SolverError::io(path, e))?;
        let d = read_u256(&mut r).map_err(|e| SolverError::io(path, e))?;
        walks.push(KangarooState { x, y, d, sym_class: 0 });
    }

    info!("LoadWork: [{} DPs] [{}]", table.n_items(), table.size_info());

    Ok(LoadedWork {
        dp_bits: header.dp_bits,
        range_start: header.range_start,
        range_end: header.range_end,
        key: header.key,
        total_count: header.total_count,
        total_time: header.total_time,
        table,
        walks,
    })
}

/// Write a complete work file from in-memory state. Offline tooling and
/// tests use this to materialise fixtures without a running engine.
pub fn write_work_file(
    path: &Path,
    header: &WorkHeader,
    table: &HashTable,
    walks: &[KangarooState],
) -> Result<()> {
    let f = File::create(path).map_err(|e| SolverError::io(path, e))?;
    let mut w = BufWriter::new(f);
    let res: std::io::Result<()> = (|| {
        write_header(&mut w, HEADW, header)?;
        table.save(&mut w)?;
        w.write_all(&(walks.len() as u64).to_le_bytes())?;
        for k in walks {
            write_u256(&mut w, &k.x)?;
            write_u256(&mut w, &k.y)?;
            write_u256(&mut w, &k.d)?;
        }
        w.flush()
    })();
    if let Err(e) = res {
        let _ = std::fs::remove_file(path);
        return Err(SolverError::io(path, e).into());
    }
    Ok(())
}

/// Captured state waiting for the background flusher.
struct SavePayload {
    file_name: Option<PathBuf>,
    text_file_name: Option<PathBuf>,
    save_kangaroo: bool,
    header: WorkHeader,
    bucket_sizes: Vec<u32>,
    bucket_max: Vec<u32>,
    bucket_offsets: Vec<u64>,
    entries: Vec<DpEntry>,
    herd: Vec<KangarooState>,
    total_walk: u64,
    started: Instant,
}

/// Block until any in-flight flush has finished.
pub fn wait_for_async_save(ctx: &Arc<SearchCtx>) {
    let handle = ctx.async_save_thread.lock().unwrap().take();
    if let Some(h) = handle {
        let _ = h.join();
    }
    ctx.async_save_running.store(false, Ordering::Release);
}

/// Capture a consistent snapshot and enqueue it for asynchronous flush.
///
/// Split mode resets the table right after capture, before walkers resume;
/// these are best-effort semantics: if the flush later fails, that epoch's
/// table is lost but the live engine is unharmed.
pub fn save_work(cfg: &EngineConfig, ctx: &Arc<SearchCtx>, total_count: u64, total_time: f64) {
    if ctx.async_save_running.load(Ordering::Acquire) {
        info!("SaveWork: async flush still running, skipping new snapshot");
        return;
    }
    wait_for_async_save(ctx);

    let save_guard = ctx.save_mutex.lock().unwrap();
    let started = Instant::now();

    ctx.save_request.store(true, Ordering::Release);
    while !ctx.all_waiting()
        && ctx.any_running()
        && !ctx.end_of_search.load(Ordering::Acquire)
    {
        thread::sleep(Duration::from_millis(10));
    }

    let ts = if cfg.split_workfile {
        format!("_{}", crate::utils::format::timestamp())
    } else {
        String::new()
    };
    let file_name = cfg.work_file.as_ref().map(|p| suffixed(p, &ts));
    let text_file_name = cfg.work_text_file.as_ref().map(|p| suffixed(p, &ts));

    let mut payload = SavePayload {
        file_name,
        text_file_name,
        save_kangaroo: cfg.save_kangaroo,
        header: WorkHeader {
            dp_bits: ctx.dp_bits,
            range_start: ctx.range.start,
            range_end: ctx.range.end,
            key: ctx.pub_key,
            total_count,
            total_time,
        },
        bucket_sizes: Vec::with_capacity(HASH_SIZE),
        bucket_max: Vec::with_capacity(HASH_SIZE),
        bucket_offsets: Vec::with_capacity(HASH_SIZE),
        entries: Vec::new(),
        herd: Vec::new(),
        total_walk: 0,
        started,
    };

    {
        let mut table = ctx.hash.lock().unwrap();
        payload.entries.reserve(table.n_items() as usize);
        let mut offset = 0u64;
        for h in 0..HASH_SIZE as u32 {
            let entries = table.bucket_entries(h);
            payload.bucket_offsets.push(offset);
            payload.bucket_sizes.push(entries.len() as u32);
            payload.bucket_max.push(table.bucket_capacity(h));
            payload.entries.extend_from_slice(entries);
            offset += entries.len() as u64;
        }

        if cfg.save_kangaroo {
            for slot in &ctx.slots {
                let herd = slot.saved_herd.lock().unwrap();
                payload.herd.extend_from_slice(&herd);
            }
            payload.total_walk = payload.herd.len() as u64;
        }

        ctx.save_request.store(false, Ordering::Release);

        if cfg.split_workfile && (payload.file_name.is_some() || payload.text_file_name.is_some())
        {
            table.reset();
        }
    }

    drop(save_guard);

    if payload.file_name.is_none() && payload.text_file_name.is_none() {
        return;
    }

    info!("SaveWork: captured snapshot for async flush");

    ctx.async_save_running.store(true, Ordering::Release);
    let flag_ctx = Arc::clone(ctx);
    let handle = thread::spawn(move || {
        run_async_save(payload);
        flag_ctx.async_save_running.store(false, Ordering::Release);
    });
    *ctx.async_save_thread.lock().unwrap() = Some(handle);
}

fn suffixed(path: &Path, ts: &str) -> PathBuf {
    if ts.is_empty() {
        path.to_path_buf()
    } else {
        let mut s = path.as_os_str().to_os_string();
        s.push(ts);
        PathBuf::from(s)
    }
}

fn run_async_save(payload: SavePayload) {
    let mut size = 0u64;

    if let Some(path) = &payload.file_name {
        match write_binary(&payload, path) {
            Ok(n) => size = n,
            Err(e) => {
                warn!("SaveWork: cannot write {}: {}", path.display(), e);
                let _ = std::fs::remove_file(path);
            }
        }
    }

    if let Some(path) = &payload.text_file_name {
        match super::text::write_text(&payload_view(&payload), path) {
            Ok(n) => {
                if size == 0 {
                    size = n;
                }
            }
            Err(e) => {
                warn!("SaveWorkTxt: cannot write {}: {}", path.display(), e);
                let _ = std::fs::remove_file(path);
            }
        }
    }

    info!(
        "SaveWork: done [{:.1} MB] [{}]",
        size as f64 / (1024.0 * 1024.0),
        crate::utils::format::time_str(payload.started.elapsed().as_secs_f64())
    );
}

fn write_binary(payload: &SavePayload, path: &Path) -> std::io::Result<u64> {
    let f = File::create(path)?;
    let mut w = BufWriter::new(f);

    write_header(&mut w, HEADW, &payload.header)?;

    for h in 0..HASH_SIZE {
        w.write_all(&payload.bucket_sizes[h].to_le_bytes())?;
        w.write_all(&payload.bucket_max[h].to_le_bytes())?;
        let start = payload.bucket_offsets[h] as usize;
        let end = start + payload.bucket_sizes[h] as usize;
        for e in &payload.entries[start..end] {
            crate::dp::table::write_entry(&mut w, e)?;
        }
    }

    w.write_all(&payload.total_walk.to_le_bytes())?;
    if payload.save_kangaroo {
        for k in &payload.herd {
            write_u256(&mut w, &k.x)?;
            write_u256(&mut w, &k.y)?;
            write_u256(&mut w, &k.d)?;
        }
    }

    w.flush()?;
    Ok(w.get_ref().metadata()?.len())
}

/// Read-only view handed to the text writer.
pub(crate) struct PayloadView<'a> {
    pub header: &'a WorkHeader,
    pub bucket_sizes: &'a [u32],
    pub bucket_max: &'a [u32],
    pub bucket_offsets: &'a [u64],
    pub entries: &'a [DpEntry],
    pub herd: &'a [KangarooState],
    pub total_walk: u64,
}

fn payload_view(p: &SavePayload) -> PayloadView<'_> {
    PayloadView {
        header: &p.header,
        bucket_sizes: &p.bucket_sizes,
        bucket_max: &p.bucket_max,
        bucket_offsets: &p.bucket_offsets,
        entries: &p.entries,
        herd: &p.herd,
        total_walk: p.total_walk,
    }
}
