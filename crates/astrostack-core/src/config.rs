use serde::{Deserialize, Serialize};

use crate::align::AlignConfig;
use crate::stack::StackConfig;

/// Alignment and stacking parameters of one processing run, as stored in
/// a configuration file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    pub align: AlignConfig,
    pub stack: StackConfig,
}
