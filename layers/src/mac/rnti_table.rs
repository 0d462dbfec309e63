//! DU-wide RNTI to UE index table

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use common::types::{DuUeIndex, Rnti};
use tracing::debug;

/// Maps C-RNTIs to DU UE indexes.
///
/// Written by UE creation and removal, read by the UCI decoders of all cells.
#[derive(Debug, Default)]
pub struct DuRntiTable {
    ues: RwLock<HashMap<Rnti, DuUeIndex>>,
}

impl DuRntiTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a UE. Returns `false` if the RNTI is already in use.
    pub fn add_ue(&self, rnti: Rnti, ue_index: DuUeIndex) -> bool {
        let mut ues = self.ues.write().unwrap_or_else(PoisonError::into_inner);
        if ues.contains_key(&rnti) {
            return false;
        }
        ues.insert(rnti, ue_index);
        debug!("rnti={} ue={}: added to RNTI table", rnti, ue_index);
        true
    }

    /// Remove a UE, returning its index
    pub fn rem_ue(&self, rnti: Rnti) -> Option<DuUeIndex> {
        let removed = self
            .ues
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&rnti);
        if let Some(ue_index) = removed {
            debug!("rnti={} ue={}: removed from RNTI table", rnti, ue_index);
        }
        removed
    }

    pub fn get(&self, rnti: Rnti) -> Option<DuUeIndex> {
        self.ues
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&rnti)
            .copied()
    }

    pub fn len(&self) -> usize {
        self.ues.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
