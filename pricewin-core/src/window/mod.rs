//! Rolling-window selection, pivoting, and artifact materialization

pub mod materialize;
pub mod pivot;
pub mod select;

pub use materialize::{
    filter_by_range, latest_alias_path, list_window_artifacts, materialize, materialize_range,
    window_path, MaterializeReport, WindowArtifact, WindowOutcome,
};
pub use pivot::{pivot, WindowMatrix};
pub use select::{select_window, WindowSelection, WindowSelector};
