use thiserror::Error;

use crate::overlay::LayerId;

#[derive(Debug, Error, PartialEq)]
pub enum ViewError {
    #[error("mount point '{0}' already has a root view")]
    AlreadyMounted(String),
    #[error("no layer with id {0:?}")]
    UnknownLayer(LayerId),
}
