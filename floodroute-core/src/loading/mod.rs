//! Readers for the on-disk inputs of the analysis: hazard records,
//! precomputed centrality artifacts and GTFS stops.

mod centrality;
mod hazards;
mod stops;

use std::{fs::File, path::Path};

pub use centrality::{load_centrality_store, read_centrality_csv};
pub use hazards::read_hazard_csv;
pub use stops::read_stops_csv;

use crate::Error;

fn open_csv(path: &Path) -> Result<csv::Reader<File>, Error> {
    let file = File::open(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Error::ArtifactNotFound(path.to_path_buf()),
        _ => Error::IoError(std::io::Error::new(
            e.kind(),
            format!("Failed to open file '{}': {}", path.display(), e),
        )),
    })?;
    Ok(csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file))
}
