//! Detector check against a saved snapshot.

use std::path::Path;

use reviewharvest::detect::detect_block;

use crate::cli::helpers::read_snapshot;
use crate::cli::icons::{error, success};

pub fn cmd_check(snapshot: &Path) -> anyhow::Result<()> {
    let html = read_snapshot(snapshot)?;
    match detect_block(&html) {
        Some(phrase) => {
            println!("{} Blocked: matched \"{}\"", error(), phrase);
            std::process::exit(2);
        }
        None => println!("{} No interstitial detected", success()),
    }
    Ok(())
}
