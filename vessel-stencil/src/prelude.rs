//! 🩸常用功能一览🫀
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::Idx3d;

pub use crate::{BinaryMask, DistanceField, Grid, LabelVolume, NiftiHeaderAttr, Volume};
pub use crate::{write_mask, NiftiWrite};
pub use crate::{StencilError, StencilResult};

pub use crate::consts::binary::{BACKGROUND, FOREGROUND};
pub use crate::consts::{DEFAULT_DISTANCES, FULL_KEY};

pub use crate::config::{home_dataset_dir_with, PipelineConfig};
pub use crate::label::{separate, separate_named, RoleTable};
pub use crate::observe::{Event, EventSink, LogSink, NullSink};
pub use crate::patient::{assemble, assemble_entry, discover, NamedMaskSet, Patient, PatientEntry};
pub use crate::pipeline::{BatchReport, Pipeline};
pub use crate::schedule::{JobScheduler, PatientReport, RemovalPolicy, UnitReport};
pub use crate::shell::{compute_shell, signed_distance};

#[cfg(feature = "serde")]
pub use crate::patient::Manifest;
