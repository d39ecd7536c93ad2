// digest.rs — Print the SRI string for a file.

use std::path::Path;

use anyhow::Context;
use mp_integrity::{digest_sri, Algorithm};

pub fn execute(file: &Path, algorithm: Algorithm) -> anyhow::Result<()> {
    let content = std::fs::read(file).with_context(|| format!("cannot read {}", file.display()))?;
    println!("{}", digest_sri(algorithm, &content));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = execute(&dir.path().join("absent.js"), Algorithm::Sha256).unwrap_err();
        assert!(err.to_string().starts_with("cannot read"));
    }

    #[test]
    fn default_algorithm_name_parses() {
        assert_eq!("sha384".parse::<Algorithm>().unwrap(), Algorithm::Sha384);
    }
}
