pub mod dataset_builder;
pub mod pair_builder;

pub use self::dataset_builder::{DatasetBuilder, DEFAULT_BLOCK_BIN_COUNT};
pub use self::pair_builder::{PairsReader, PairStats};
