use std::fs;
use std::path::Path;

use anyhow::{bail, Context};
use bitcoin::key::rand::{thread_rng, RngCore};

const SEED_FILE: &str = "seed.sibyl";
const SEED_LEN: usize = 64;

/// Load the oracle seed from `seed.sibyl` in the given directory, generating
/// and persisting a fresh one when no file exists yet. A file of the wrong
/// length is refused rather than padded or truncated.
pub fn seed_from_path(dir: &Path) -> anyhow::Result<[u8; SEED_LEN]> {
    let seed_path = dir.join(SEED_FILE);
    let mut seed = [0u8; SEED_LEN];

    if seed_path.exists() {
        let bytes = fs::read(&seed_path)
            .with_context(|| format!("reading seed file {}", seed_path.display()))?;
        if bytes.len() != SEED_LEN {
            bail!(
                "seed file {} must be {SEED_LEN} bytes, found {}",
                seed_path.display(),
                bytes.len()
            );
        }
        seed.copy_from_slice(&bytes);
    } else {
        thread_rng().fill_bytes(&mut seed);
        fs::write(&seed_path, seed)
            .with_context(|| format!("writing seed file {}", seed_path.display()))?;
    }

    Ok(seed)
}
