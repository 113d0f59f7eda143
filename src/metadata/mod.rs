mod sidecar;

pub use sidecar::{EpisodeSidecar, SIDECAR_FILENAME, read_sidecar};
