pub mod assemble;
pub mod atlas;
pub mod cell_matcher;
pub mod config;
pub mod error;
pub mod geometry;
pub mod patterns;
pub mod scan;
pub mod segment;
pub mod template;

pub use assemble::{MatchRecord, ResultAssembler, RowMatch};
pub use atlas::{slot, Atlas, AtlasBuilder};
pub use cell_matcher::{CellMatch, CellMatcher};
pub use config::{SizePolicy, VisionConfig};
pub use error::VisionError;
pub use geometry::{PixelRange, PixelRect, Point};
pub use patterns::{BadgePattern, CardPattern, CardPatternTable, GroupKey, RarityPatternBuilder};
pub use scan::{PatternSet, Scanner};
pub use segment::{RowSplit, ScreenGeometrySegmenter};
pub use template::{match_template, PreparedTemplate, ScoreMap};
