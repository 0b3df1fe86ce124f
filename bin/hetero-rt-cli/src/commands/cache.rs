// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! The `cache` subcommand: dump the offline tuning cache.

use kernel_select::TuningCache;
use std::path::PathBuf;

pub fn execute(file: PathBuf) -> anyhow::Result<()> {
    let cache = TuningCache::open(&file)?;
    if cache.is_empty() {
        println!("cache '{}' is empty", file.display());
        return Ok(());
    }

    println!(
        "{:<16} {:<18} {:<20} {:>6} {:>10}",
        "device", "hash", "implementation", "index", "micros"
    );
    for (device, hash, record) in cache.iter_sorted() {
        println!(
            "{:<16} {:<18x} {:<20} {:>6} {:>10}",
            device, hash, record.impl_name, record.tune_index, record.micros,
        );
    }
    println!("{} record(s)", cache.len());

    Ok(())
}
