//! The orchestrator: owns the worker pool, the shared search context, the
//! progress ticker, the periodic save scheduler and the abort logic.

use std::f64::consts::PI;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{info, warn};

use super::collision::{self, ResolveCtx};
use super::jump::JumpTable;
use super::walker;
use crate::dp::{AddResult, HashTable, HASH_SIZE};
use crate::gpu::{self, BackendKind};
use crate::math::{curve::Point, Secp256k1, U256};
use crate::types::{DpDist, HerdKind, KangarooState, Solution};
use crate::work;

/// The search interval and its derived widths.
#[derive(Debug, Clone)]
pub struct RangeInfo {
    pub start: U256,
    pub end: U256,
    pub width: U256,
    pub width_div2: U256,
    pub width_div4: U256,
    /// Bit length of the width.
    pub power: u32,
}

impl RangeInfo {
    pub fn new(start: &U256, end: &U256) -> RangeInfo {
        let width = end.wrapping_sub(start);
        let width_div2 = width.shr1();
        let width_div4 = width_div2.shr1();
        RangeInfo {
            start: *start,
            end: *end,
            width,
            width_div2,
            width_div4,
            power: width.bit_length(),
        }
    }
}

/// Engine knobs, assembled by the CLI layer (or directly by tests).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub nb_thread: usize,
    /// DP bits override; None lets the engine pick the suggested value.
    pub dp_bits: Option<u32>,
    pub use_gpu: bool,
    pub backend_kind: BackendKind,
    pub gpu_grid: (u32, u32),
    pub work_file: Option<PathBuf>,
    pub work_text_file: Option<PathBuf>,
    pub save_period: Duration,
    pub save_kangaroo: bool,
    pub split_workfile: bool,
    /// Abort after max_step * expected operations; 0 disables.
    pub max_step: f64,
    pub output_file: Option<PathBuf>,
    pub use_symmetry: bool,
    pub grp_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            nb_thread: num_cpus::get(),
            dp_bits: None,
            use_gpu: false,
            backend_kind: BackendKind::Reference,
            gpu_grid: (64, 32),
            work_file: None,
            work_text_file: None,
            save_period: Duration::from_secs(60),
            save_kangaroo: false,
            split_workfile: false,
            max_step: 0.0,
            output_file: None,
            use_symmetry: false,
            grp_size: super::CPU_GRP_SIZE,
        }
    }
}

/// Per-worker shared flags and herd hand-off slots.
pub(crate) struct WorkerSlot {
    pub has_started: AtomicBool,
    pub is_running: AtomicBool,
    pub is_waiting: AtomicBool,
    pub nb_kangaroo: u64,
    /// Herd handed to the worker at start (rehydrated walks).
    pub seed_herd: Mutex<Vec<KangarooState>>,
    /// Herd published by the worker at the save barrier.
    pub saved_herd: Mutex<Vec<KangarooState>>,
}

impl WorkerSlot {
    fn new(nb_kangaroo: u64) -> WorkerSlot {
        WorkerSlot {
            has_started: AtomicBool::new(false),
            is_running: AtomicBool::new(true),
            is_waiting: AtomicBool::new(false),
            nb_kangaroo,
            seed_herd: Mutex::new(Vec::new()),
            saved_herd: Mutex::new(Vec::new()),
        }
    }
}

/// Tame/wild distance gap statistics maintained by the background scanner.
#[derive(Debug, Clone)]
pub struct GapStats {
    pub last: u128,
    pub lowest: u128,
}

impl Default for GapStats {
    fn default() -> Self {
        GapStats { last: 0, lowest: u128::MAX }
    }
}

/// Everything shared between the orchestrator, the walkers, the accelerator
/// adapter and the snapshot engine for one key search.
pub struct SearchCtx {
    pub secp: Secp256k1,
    pub jumps: JumpTable,
    pub range: RangeInfo,
    pub use_symmetry: bool,
    pub grp_size: usize,
    pub dp_bits: u32,
    pub dp_mask: u64,
    pub key_idx: usize,
    /// The target public key as configured.
    pub pub_key: Point,
    /// Rebased target the wild herd walks from.
    pub key_to_search: Point,
    pub key_to_search_neg: Point,
    pub output_file: Option<PathBuf>,
    pub save_kangaroo: bool,
    pub end_of_search: AtomicBool,
    pub save_request: AtomicBool,
    pub save_mutex: Mutex<()>,
    pub hash: Mutex<HashTable>,
    pub counters: Vec<AtomicU64>,
    pub dead_kangaroos: AtomicU64,
    pub tame_dps: AtomicU64,
    pub wild_dps: AtomicU64,
    pub gap: Mutex<GapStats>,
    pub solution: Mutex<Option<Solution>>,
    pub(crate) slots: Vec<WorkerSlot>,
    pub async_save_running: AtomicBool,
    pub(crate) async_save_thread: Mutex<Option<JoinHandle<()>>>,
}

impl SearchCtx {
    /// DP filter on the designated x limb.
    #[inline]
    pub fn is_dp(&self, x_limb3: u64) -> bool {
        x_limb3 & self.dp_mask == 0
    }

    /// The single DP ingestion path, shared by CPU walkers, the accelerator
    /// adapter and any distribution layer. Returns false when the walker that
    /// produced the DP must be reset (recorded track or spurious collision).
    pub fn ingest_dp(&self, x: &U256, d: &U256, kind: HerdKind) -> bool {
        let mut table = self.hash.lock().unwrap();
        if self.end_of_search.load(Ordering::Acquire) {
            return true;
        }
        match table.add(x, DpDist::from_scalar(d, kind)) {
            AddResult::Ok => {
                match kind {
                    HerdKind::Tame => self.tame_dps.fetch_add(1, Ordering::Relaxed),
                    HerdKind::Wild => self.wild_dps.fetch_add(1, Ordering::Relaxed),
                };
                true
            }
            AddResult::Dup => false,
            AddResult::Collision(stored) => {
                let (d_tame, d_wild) = if stored.kind == HerdKind::Tame {
                    (stored.to_scalar(), *d)
                } else {
                    (*d, stored.to_scalar())
                };
                let rctx = ResolveCtx {
                    secp: &self.secp,
                    key_to_search: &self.key_to_search,
                    key_to_search_neg: &self.key_to_search_neg,
                    range_start: &self.range.start,
                    width_div2: &self.range.width_div2,
                    use_symmetry: self.use_symmetry,
                };
                match collision::resolve(&rctx, &d_tame, &d_wild) {
                    Some(res)
                        if collision::output_solution(
                            &self.secp,
                            &self.pub_key,
                            &res,
                            self.key_idx,
                            self.output_file.as_deref(),
                        ) =>
                    {
                        *self.solution.lock().unwrap() = Some(Solution {
                            private_key: res.private_key,
                            key_index: self.key_idx,
                        });
                        self.end_of_search.store(true, Ordering::Release);
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    pub(crate) fn all_started(&self) -> bool {
        self.slots.iter().all(|s| s.has_started.load(Ordering::SeqCst))
    }

    pub(crate) fn any_running(&self) -> bool {
        self.slots.iter().any(|s| s.is_running.load(Ordering::SeqCst))
    }

    pub(crate) fn all_waiting(&self) -> bool {
        self.slots.iter().all(|s| s.is_waiting.load(Ordering::SeqCst))
    }

    pub fn total_count(&self) -> u64 {
        self.counters.iter().map(|c| c.load(Ordering::Relaxed)).sum()
    }

    pub fn gpu_count(&self) -> u64 {
        // The adapter counter is always the last slot.
        self.counters.last().map(|c| c.load(Ordering::Relaxed)).unwrap_or(0)
    }
}

/// Derived mask: the high dpBits of the limb must be zero.
pub fn dp_mask_for(dp_bits: u32) -> u64 {
    if dp_bits == 0 {
        0
    } else {
        let dp = dp_bits.min(64);
        (!0u64) << (64 - dp)
    }
}

/// Expected operations, memory (MB) and DP overhead for a dp-bits choice.
pub fn compute_expected(
    dp_bits: f64,
    total_rw: u64,
    range_power: u32,
    use_symmetry: bool,
) -> (f64, f64, f64) {
    let gain_s = if use_symmetry { 1.0 / 2f64.sqrt() } else { 1.0 };
    let k = total_rw as f64;
    let n = 2f64.powi(range_power as i32);
    let theta = 2f64.powf(dp_bits);
    let z0 = 2.0 * (2.0 - 2f64.sqrt()) * gain_s * PI.sqrt();
    let avg_dp0 = z0 * n.sqrt();
    let op = z0 * (n * (k * theta + n.sqrt())).powf(1.0 / 3.0);
    let entry_bytes = 48.0; // stored entry + growth slack
    let bucket_bytes = 32.0;
    let ram = (bucket_bytes * HASH_SIZE as f64 + entry_bytes * (op / theta)) / (1024.0 * 1024.0);
    (op, ram, op / avg_dp0)
}

/// The top-level solver.
pub struct Engine {
    pub cfg: EngineConfig,
    secp: Secp256k1,
    range_start: U256,
    range_end: U256,
    keys: Vec<Point>,
    dp_bits: Option<u32>,
    loaded_table: Option<HashTable>,
    loaded_walks: Vec<KangarooState>,
    offset_count: u64,
    offset_time: f64,
    pub expected_ops: f64,
    pub expected_mem: f64,
    total_rw: u64,
}

impl Engine {
    pub fn new(cfg: EngineConfig, range_start: U256, range_end: U256, keys: Vec<Point>) -> Engine {
        let dp_bits = cfg.dp_bits;
        Engine {
            cfg,
            secp: Secp256k1::new(),
            range_start,
            range_end,
            keys,
            dp_bits,
            loaded_table: None,
            loaded_walks: Vec::new(),
            offset_count: 0,
            offset_time: 0.0,
            expected_ops: 0.0,
            expected_mem: 0.0,
            total_rw: 0,
        }
    }

    /// Resume from a previously saved work file; replaces the configured
    /// range and key list with the persisted ones.
    pub fn load_work(&mut self, path: &std::path::Path) -> Result<()> {
        let loaded = work::snapshot::load_work(&self.secp, path)?;
        if self.dp_bits.is_none() {
            self.dp_bits = Some(loaded.dp_bits);
        }
        self.range_start = loaded.range_start;
        self.range_end = loaded.range_end;
        self.keys = vec![loaded.key];
        self.offset_count = loaded.total_count;
        self.offset_time = loaded.total_time;
        info!(
            "LoadWork: [{} DPs] [2^{:.2} kangaroos]",
            loaded.table.n_items(),
            (loaded.walks.len().max(1) as f64).log2()
        );
        self.loaded_table = Some(loaded.table);
        self.loaded_walks = loaded.walks;
        Ok(())
    }

    /// Shifted key the herds actually chase: Q' = Q - (start [+ width/2])*G.
    fn init_search_key(&self, range: &RangeInfo, key: &Point) -> (Point, Point) {
        let mut sp = range.start;
        if self.cfg.use_symmetry {
            sp = crate::math::scalar::add(&sp, &range.width_div2);
        }
        let key_to_search = if sp.is_zero() {
            *key
        } else {
            let shift = self.secp.compute_public_key(&sp).negate();
            self.secp.add(key, &shift)
        };
        (key_to_search, key_to_search.negate())
    }

    /// Run the search across every configured key. Returns the last solution
    /// found, or None when aborted.
    pub fn run(&mut self) -> Result<Option<Solution>> {
        if self.range_start > self.range_end {
            return Err(crate::error::SolverError::ConfigInvalid(
                "range start above range end".into(),
            )
            .into());
        }

        let nb_cpu = self.cfg.nb_thread;
        let range = RangeInfo::new(&self.range_start, &self.range_end);
        info!("Range width: 2^{}", range.power);

        let jumps = JumpTable::build(&self.secp, range.power, self.cfg.use_symmetry)?;

        let gpu_kangaroos = if self.cfg.use_gpu {
            gpu::GPU_GRP_SIZE as u64 * self.cfg.gpu_grid.0 as u64 * self.cfg.gpu_grid.1 as u64
        } else {
            0
        };
        self.total_rw = nb_cpu as u64 * self.cfg.grp_size as u64 + gpu_kangaroos;
        info!("Number of CPU thread: {}", nb_cpu);
        info!("Number of kangaroos: 2^{:.2}", (self.total_rw as f64).log2());

        // Suggested DP bits keep the DP overhead under 5%.
        let mut suggested =
            (range.power as f64 / 2.0 - (self.total_rw as f64).log2()).max(0.0) as u32;
        loop {
            let (_, _, overhead) = compute_expected(
                suggested as f64,
                self.total_rw,
                range.power,
                self.cfg.use_symmetry,
            );
            if overhead <= 1.05 || suggested == 0 {
                break;
            }
            suggested -= 1;
        }

        let dp_bits = self.dp_bits.unwrap_or(suggested).min(64);
        let dp_mask = dp_mask_for(dp_bits);
        let (ops, mem, _) = compute_expected(
            dp_bits as f64,
            self.total_rw,
            range.power,
            self.cfg.use_symmetry,
        );
        self.expected_ops = ops;
        self.expected_mem = mem;
        if self.loaded_walks.is_empty() {
            info!("Suggested DP: {}", suggested);
        }
        info!("DP size: {} [0x{:016X}]", dp_bits, dp_mask);
        info!("Expected operations: 2^{:.2}", ops.log2());
        info!("Expected RAM: {:.1}MB", mem);

        let mut last_solution = None;

        for key_idx in 0..self.keys.len() {
            let key = self.keys[key_idx];
            let (key_to_search, key_to_search_neg) = self.init_search_key(&range, &key);

            let nb_slots = nb_cpu + 1; // last slot belongs to the adapter
            let mut slots: Vec<WorkerSlot> = (0..nb_cpu)
                .map(|_| WorkerSlot::new(self.cfg.grp_size as u64))
                .collect();
            slots.push(WorkerSlot::new(gpu_kangaroos));
            if !self.cfg.use_gpu {
                // The adapter slot never runs; mark it finished from the start.
                slots[nb_cpu].has_started.store(true, Ordering::SeqCst);
                slots[nb_cpu].is_running.store(false, Ordering::SeqCst);
                slots[nb_cpu].is_waiting.store(true, Ordering::SeqCst);
            }

            // Rehydrate saved kangaroos across the CPU slots, then the adapter.
            if key_idx == 0 && !self.loaded_walks.is_empty() {
                let mut rng = rand::thread_rng();
                info!("Restoring 2^{:.2} kangaroos", (self.loaded_walks.len() as f64).log2());
                for slot in slots.iter().take(if self.cfg.use_gpu { nb_slots } else { nb_cpu }) {
                    let n = slot.nb_kangaroo as usize;
                    let herd = super::herd::rehydrate(
                        &self.secp,
                        &range,
                        &key_to_search,
                        self.cfg.use_symmetry,
                        n,
                        &mut self.loaded_walks,
                        &mut rng,
                    );
                    *slot.seed_herd.lock().unwrap() = herd;
                }
                if !self.loaded_walks.is_empty() {
                    warn!("{} unhandled kangaroos in work file", self.loaded_walks.len());
                    self.loaded_walks.clear();
                }
            }

            let ctx = Arc::new(SearchCtx {
                secp: self.secp.clone(),
                jumps: jumps.clone(),
                range: range.clone(),
                use_symmetry: self.cfg.use_symmetry,
                grp_size: self.cfg.grp_size,
                dp_bits,
                dp_mask,
                key_idx,
                pub_key: key,
                key_to_search,
                key_to_search_neg,
                output_file: self.cfg.output_file.clone(),
                save_kangaroo: self.cfg.save_kangaroo,
                end_of_search: AtomicBool::new(false),
                save_request: AtomicBool::new(false),
                save_mutex: Mutex::new(()),
                hash: Mutex::new(if key_idx == 0 {
                    self.loaded_table.take().unwrap_or_default()
                } else {
                    HashTable::new()
                }),
                counters: (0..nb_slots).map(|_| AtomicU64::new(0)).collect(),
                dead_kangaroos: AtomicU64::new(0),
                tame_dps: AtomicU64::new(0),
                wild_dps: AtomicU64::new(0),
                gap: Mutex::new(GapStats::default()),
                solution: Mutex::new(None),
                slots,
                async_save_running: AtomicBool::new(false),
                async_save_thread: Mutex::new(None),
            });

            // A missing accelerator is fatal before any worker starts.
            let backend = if self.cfg.use_gpu {
                Some(gpu::create_backend(self.cfg.backend_kind)?)
            } else {
                None
            };

            let mut handles: Vec<JoinHandle<()>> = Vec::new();
            for i in 0..nb_cpu {
                let ctx = Arc::clone(&ctx);
                handles.push(thread::spawn(move || walker::solve_key_cpu(ctx, i)));
            }
            if let Some(backend) = backend {
                let ctx = Arc::clone(&ctx);
                let grid = self.cfg.gpu_grid;
                handles.push(thread::spawn(move || {
                    gpu::adapter::solve_key_gpu(ctx, backend, grid, nb_cpu)
                }));
            }

            // Background gap scanner; exits with end_of_search.
            let scanner = {
                let ctx = Arc::clone(&ctx);
                thread::spawn(move || scan_gaps(ctx))
            };

            self.process(&ctx);

            for h in handles {
                let _ = h.join();
            }
            let _ = scanner.join();
            work::snapshot::wait_for_async_save(&ctx);

            let sol = ctx.solution.lock().unwrap().clone();
            if let Some(sol) = sol {
                last_solution = Some(sol);
            } else {
                // Aborted search: report and stop iterating keys.
                return Ok(None);
            }
        }

        Ok(last_solution)
    }

    /// Progress ticker and save scheduler; returns when all workers stopped.
    fn process(&self, ctx: &Arc<SearchCtx>) {
        while !ctx.all_started() {
            thread::sleep(Duration::from_millis(5));
        }

        let start_time = Instant::now();
        let mut t0 = start_time;
        let mut last_save = start_time;
        let mut last_count = 0u64;
        let mut last_gpu_count = 0u64;

        const FILTER_SIZE: usize = 8;
        let mut rate_filter = [0f64; FILTER_SIZE];
        let mut gpu_rate_filter = [0f64; FILTER_SIZE];
        let mut filter_pos = 0usize;

        while ctx.any_running() {
            let mut delay = 2000i64;
            while ctx.any_running() && delay > 0 {
                thread::sleep(Duration::from_millis(50));
                delay -= 50;
            }

            let gpu_count = ctx.gpu_count();
            let count = ctx.total_count();
            let t1 = Instant::now();
            let dt = (t1 - t0).as_secs_f64().max(1e-9);

            rate_filter[filter_pos % FILTER_SIZE] = (count - last_count) as f64 / dt;
            gpu_rate_filter[filter_pos % FILTER_SIZE] = (gpu_count - last_gpu_count) as f64 / dt;
            filter_pos += 1;
            let n_samples = filter_pos.min(FILTER_SIZE);
            let avg_rate: f64 = rate_filter.iter().take(n_samples).sum::<f64>() / n_samples as f64;
            let avg_gpu_rate: f64 =
                gpu_rate_filter.iter().take(n_samples).sum::<f64>() / n_samples as f64;

            if ctx.any_running() && !ctx.end_of_search.load(Ordering::Acquire) {
                let tame = ctx.tame_dps.load(Ordering::Relaxed);
                let wild = ctx.wild_dps.load(Ordering::Relaxed);
                let tw = if wild > 0 { tame as f64 / wild as f64 } else { 0.0 };
                let gap = ctx.gap.lock().unwrap().clone();
                let (gap_g, low_g) = (
                    gap.last as f64 / 1e9,
                    if gap.lowest == u128::MAX { 0.0 } else { gap.lowest as f64 / 1e9 },
                );
                let elapsed = (t1 - start_time).as_secs_f64() + self.offset_time;
                let expected_t = if avg_rate > 0.0 { self.expected_ops / avg_rate } else { 0.0 };
                let size_info = ctx.hash.lock().unwrap().size_info();
                print!(
                    "\r[{:.2} MK/s][GPU {:.2} MK/s][Count 2^{:.2}][Dead {}][T/W:{:.3}][Gap:{:.1}][L.Gap:{:.1}][{} (Avg {})][{}]  ",
                    avg_rate / 1e6,
                    avg_gpu_rate / 1e6,
                    ((count + self.offset_count) as f64).max(1.0).log2(),
                    ctx.dead_kangaroos.load(Ordering::Relaxed),
                    tw,
                    gap_g,
                    low_g,
                    crate::utils::format::time_str(elapsed),
                    crate::utils::format::time_str(expected_t),
                    size_info,
                );
                let _ = std::io::stdout().flush();
            }

            // Periodic snapshot.
            let want_save =
                self.cfg.work_file.is_some() || self.cfg.work_text_file.is_some();
            if want_save
                && !ctx.end_of_search.load(Ordering::Acquire)
                && (t1 - last_save) > self.cfg.save_period
            {
                if ctx.async_save_running.load(Ordering::Acquire) {
                    info!("SaveWork: previous async save still in progress, skipping interval");
                } else {
                    work::snapshot::save_work(
                        &self.cfg,
                        ctx,
                        count + self.offset_count,
                        (t1 - start_time).as_secs_f64() + self.offset_time,
                    );
                }
                last_save = t1;
            }

            // Give up past maxStep * expected operations.
            if self.cfg.max_step > 0.0
                && (count as f64) > self.expected_ops * self.cfg.max_step
                && !ctx.end_of_search.load(Ordering::Acquire)
            {
                println!(
                    "\nKey#{:2} [XX]Pub:  0x{}",
                    ctx.key_idx,
                    self.secp.format_public_key(true, &ctx.pub_key)
                );
                println!("       Aborted !");
                ctx.end_of_search.store(true, Ordering::Release);
            }

            last_count = count;
            last_gpu_count = gpu_count;
            t0 = t1;
        }
    }
}

/// Background scanner: tracks the smallest tame/wild distance gap seen in
/// the table. Purely informational; distances are copied bucket by bucket
/// under the hash mutex so walkers are barely disturbed.
fn scan_gaps(ctx: Arc<SearchCtx>) {
    while !ctx.end_of_search.load(Ordering::Acquire) {
        let mut delay = 3000i64;
        while !ctx.end_of_search.load(Ordering::Acquire) && delay > 0 {
            thread::sleep(Duration::from_millis(50));
            delay -= 50;
        }
        if ctx.end_of_search.load(Ordering::Acquire) {
            break;
        }

        let mut local_min = u128::MAX;
        let mut local_last = None;

        for h in 0..HASH_SIZE as u32 {
            if ctx.end_of_search.load(Ordering::Acquire) {
                break;
            }
            let dists: Vec<DpDist> = {
                let table = ctx.hash.lock().unwrap();
                let entries = table.bucket_entries(h);
                if entries.len() < 2 {
                    continue;
                }
                entries.iter().map(|e| e.dist).collect()
            };

            for i in 0..dists.len() {
                for j in i + 1..dists.len() {
                    if dists[i].kind != dists[j].kind {
                        let a = signed(&dists[i]);
                        let b = signed(&dists[j]);
                        let gap = a.abs_diff(b);
                        local_last = Some(gap);
                        if gap < local_min {
                            local_min = gap;
                        }
                    }
                }
            }
        }

        if let Some(last) = local_last {
            let mut gap = ctx.gap.lock().unwrap();
            gap.last = last;
            if local_min < gap.lowest {
                gap.lowest = local_min;
            }
        }
    }
}

#[inline]
fn signed(d: &DpDist) -> i128 {
    // Magnitudes stay below 2^125, so the cast is lossless.
    if d.neg {
        -(d.d_abs as i128)
    } else {
        d.d_abs as i128
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dp_mask_boundaries() {
        assert_eq!(dp_mask_for(0), 0);
        assert_eq!(dp_mask_for(1), 0x8000000000000000);
        assert_eq!(dp_mask_for(8), 0xFF00000000000000);
        assert_eq!(dp_mask_for(64), u64::MAX);
        assert_eq!(dp_mask_for(65), u64::MAX);
    }

    #[test]
    fn range_info_widths() {
        let r = RangeInfo::new(&U256::from_u64(0x100), &U256::from_u64(0x1FF));
        assert_eq!(r.width, U256::from_u64(0xFF));
        assert_eq!(r.power, 8);
        assert_eq!(r.width_div2, U256::from_u64(0x7F));
        assert_eq!(r.width_div4, U256::from_u64(0x3F));
    }

    #[test]
    fn single_bit_range() {
        let r = RangeInfo::new(&U256::from_u64(1), &U256::from_u64(2));
        assert_eq!(r.power, 1);
        assert_eq!(r.width, U256::ONE);
    }

    #[test]
    fn expected_ops_scales_with_range() {
        let (op_small, _, _) = compute_expected(0.0, 1024, 32, false);
        let (op_big, _, _) = compute_expected(0.0, 1024, 64, false);
        assert!(op_big > op_small);
        let (_, _, overhead) = compute_expected(0.0, 1024, 64, false);
        assert!(overhead > 0.0);
    }

    #[test]
    fn symmetry_lowers_expected_ops() {
        let (plain, _, _) = compute_expected(4.0, 1024, 64, false);
        let (sym, _, _) = compute_expected(4.0, 1024, 64, true);
        assert!(sym < plain);
    }
}
