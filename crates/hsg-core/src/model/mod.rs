//! Data model : `Memory`, `SectorVector`, `Waypoint`, `Segment`,
//! `EmbedLog`, and the `Sector` enumeration.

mod embed_log;
mod memory;
mod sector;
mod segment;
mod vector;
mod waypoint;

pub use embed_log::{EmbedLog, EmbedLogStatusWire};
pub use memory::{EmbedLogStatus, Memory};
pub use sector::Sector;
pub use segment::SegmentAllocator;
pub use vector::{
    cosine_similarity, dot_product, euclidean_distance, from_bytes, is_normalized, l2_normalize,
    mean_pool, pool_to_dim, resize, to_bytes, SectorVector,
};
pub use waypoint::{
    Waypoint, ANCHOR_WEIGHT, CONTEXTUAL_BASE_WEIGHT, CONTEXTUAL_INCREMENT, CROSS_SECTOR_WEIGHT,
    LINK_SIMILARITY_THRESHOLD, PRUNE_THRESHOLD, SELF_LOOP_WEIGHT,
};
