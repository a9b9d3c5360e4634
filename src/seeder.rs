//! Master seeder (C3): reads the input CSV, host-interleaves it, and pushes
//! it to the queue in pipeline-sized sub-batches.

use std::io::Read;
use std::sync::Arc;

use crate::config::Config;
use crate::entry::encode;
use crate::entry::Entry;
use crate::error::{CrawlError, CrawlResult};
use crate::interleave::interleave;
use crate::queue::QueueBackend;

const ENQUEUE_COMPLETE_SUFFIX: &str = ":enqueue_complete";

fn complete_flag_key(task_list: &str) -> String {
    format!("{task_list}{ENQUEUE_COMPLETE_SUFFIX}")
}

/// Read `csv_file`, skipping the header, and return one URL per row with
/// its zero-based row index as `base_id`. A row is either a single URL
/// column or two columns where the URL is the second.
fn read_urls(reader: impl Read, test_limit: usize) -> CrawlResult<Vec<(u64, String)>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut out = Vec::new();
    for (index, record) in rdr.records().enumerate() {
        if test_limit > 0 && out.len() >= test_limit {
            break;
        }
        let record = record.map_err(|e| CrawlError::Input(e.to_string()))?;
        let url = match record.len() {
            0 => continue,
            1 => record.get(0),
            _ => record.get(1),
        };
        let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
            continue;
        };
        out.push((index as u64, url.to_string()));
    }
    Ok(out)
}

/// Run the seeding pass: delete any prior queue contents, push everything
/// interleaved and chunked, then set the completion marker.
///
/// Any queue-server error aborts immediately — the seeder does not retry
/// locally. Re-running is the recovery path, since it deletes before it
/// writes.
pub async fn run<Q: QueueBackend>(config: &Config, queue: Arc<Q>) -> CrawlResult<()> {
    let file = std::fs::File::open(&config.csv_file)
        .map_err(|e| CrawlError::Input(format!("cannot open {}: {e}", config.csv_file)))?;
    let rows = read_urls(file, config.test_limit)?;

    let flag_key = complete_flag_key(&config.task_list);
    queue.delete(&config.task_list).await?;
    queue.delete(&flag_key).await?;

    let total = rows.len();
    let mut seeded = 0usize;

    for chunk in rows.chunks(config.chunk_size.max(1)) {
        let entries: Vec<Entry> = chunk
            .iter()
            .map(|(id, url)| Entry::new(*id, 1, url.clone()))
            .collect();
        let interleaved = interleave(entries, config.host_take_per_round);

        for sub_batch in interleaved.chunks(config.pipeline_batch.max(1)) {
            let items: Vec<Vec<u8>> = sub_batch
                .iter()
                .map(|e| encode(e.base_id, e.attempt, &e.url))
                .collect();
            queue.push_many(&config.task_list, items).await?;
            seeded += sub_batch.len();
            println!("ENQUEUE_PROGRESS {seeded}/{total}");
        }
    }

    queue.set_flag(&flag_key).await?;
    println!("ENQUEUE_COMPLETE {seeded}");
    Ok(())
}
