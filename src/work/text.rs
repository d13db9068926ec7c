//! Line-oriented textual work files, for external inspection and
//! reproducibility. Same semantic content as the binary format, wide
//! integers in hex.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;

use super::snapshot::PayloadView;
use crate::dp::HASH_SIZE;
use crate::math::U256;

pub(crate) fn write_text(p: &PayloadView<'_>, path: &Path) -> std::io::Result<u64> {
    info!("SaveWorkTxt: {}", path.display());
    let f = File::create(path)?;
    let mut w = BufWriter::new(f);

    writeln!(w, "VERSION {}", super::WORK_VERSION)?;
    writeln!(w, "DP_BITS {}", p.header.dp_bits)?;
    writeln!(w, "START {}", p.header.range_start.to_hex())?;
    writeln!(w, "STOP {}", p.header.range_end.to_hex())?;
    writeln!(w, "KEYX {}", p.header.key.x.to_hex())?;
    writeln!(w, "KEYY {}", p.header.key.y.to_hex())?;
    writeln!(w, "COUNT {}", p.header.total_count)?;
    writeln!(w, "TIME {:.17}", p.header.total_time)?;
    writeln!(w, "HASH_SIZE {}", HASH_SIZE)?;

    for h in 0..HASH_SIZE {
        writeln!(w, "BUCKET {} {} {}", h, p.bucket_sizes[h], p.bucket_max[h])?;
        let start = p.bucket_offsets[h] as usize;
        let end = start + p.bucket_sizes[h] as usize;
        for e in &p.entries[start..end] {
            writeln!(
                w,
                "ITEM {} {} {}",
                e.x_limbs(h as u32).to_hex(),
                U256::from_u128(e.dist.pack()).to_hex(),
                e.dist.kind as u32
            )?;
        }
    }

    writeln!(w, "KANGAROOS {}", p.total_walk)?;
    for k in p.herd {
        writeln!(w, "K {} {} {}", k.x.to_hex(), k.y.to_hex(), k.d.to_hex())?;
    }

    w.flush()?;
    Ok(w.get_ref().metadata()?.len())
}
