use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;

use crate::error::StatsError;

/// Opens a line-oriented input file, looking through a trailing `.gz`.
pub(crate) fn open_text(path: &Path) -> Result<Box<dyn BufRead>, StatsError> {
    let file = File::open(path).map_err(|e| StatsError::io(path, e))?;
    if path.extension().is_some_and(|ext| ext == "gz") {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// File extension with a trailing `.gz` stripped, lowercased.
pub(crate) fn logical_extension(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let name = name.strip_suffix(".gz").unwrap_or(&name);
    name.rsplit('.').next().unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logical_extension_sees_through_gz() {
        assert_eq!(logical_extension(Path::new("go-plus.owl")), "owl");
        assert_eq!(logical_extension(Path::new("go.obo.gz")), "obo");
        assert_eq!(logical_extension(Path::new("goa_wo_parents.gaf")), "gaf");
    }
}
