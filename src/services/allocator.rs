//! Greedy first-fit placement of work units into output plugins.

use crate::models::{ModKey, OutputContainer, PluginDraft};
use crate::services::error::ConfigError;
use indexmap::IndexSet;

/// Per-plugin capacity ceilings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_new_records: usize,
    pub max_origins: usize,
    /// When off, `max_new_records` is not enforced
    pub small_file_mode: bool,
}

impl Limits {
    fn fits_new_records(&self, fill: usize, new_records: usize) -> bool {
        !self.small_file_mode || fill + new_records <= self.max_new_records
    }
}

/// Owns every output container of a run and decides where each unit goes.
#[derive(Debug)]
pub struct OutputAllocator {
    limits: Limits,
    output_name: String,
    containers: Vec<OutputContainer>,
}

impl OutputAllocator {
    pub fn new(limits: Limits, output_name: impl Into<String>) -> Self {
        Self {
            limits,
            output_name: output_name.into(),
            containers: Vec::new(),
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// File name of the container created at position `index`
    pub fn container_name(&self, index: usize) -> String {
        if index == 0 {
            format!("{}.esp", self.output_name)
        } else {
            format!("{}_{}.esp", self.output_name, index + 1)
        }
    }

    /// Place a unit needing `new_records` new records and `origins` masters.
    ///
    /// Returns the index of the chosen container. A unit that exceeds a
    /// ceiling on its own can never be placed and fails with [`ConfigError`].
    pub fn allocate(
        &mut self,
        unit: &str,
        new_records: usize,
        origins: &IndexSet<ModKey>,
    ) -> Result<usize, ConfigError> {
        if self.limits.small_file_mode && new_records > self.limits.max_new_records {
            return Err(ConfigError::NewRecordsExceeded {
                unit: unit.to_string(),
                count: new_records,
                limit: self.limits.max_new_records,
            });
        }
        if origins.len() > self.limits.max_origins {
            return Err(ConfigError::OriginsExceeded {
                unit: unit.to_string(),
                count: origins.len(),
                limit: self.limits.max_origins,
            });
        }

        let mut order: Vec<usize> = (0..self.containers.len()).collect();
        order.sort_by_key(|&i| (self.containers[i].new_records(), self.containers[i].index()));

        let found = order.into_iter().find(|&i| {
            let container = &self.containers[i];
            self.limits.fits_new_records(container.new_records(), new_records)
                && container.origins_with(origins) <= self.limits.max_origins
        });

        let index = match found {
            Some(index) => index,
            None => self.open_container(),
        };
        self.containers[index].absorb(new_records, origins);
        tracing::trace!("{} -> {}", unit, self.containers[index].mod_key());
        Ok(index)
    }

    fn open_container(&mut self) -> usize {
        let index = self.containers.len();
        let mod_key = ModKey::new(self.container_name(index));
        tracing::debug!("Opening output plugin {}", mod_key);
        self.containers
            .push(OutputContainer::new(index, PluginDraft::new(mod_key, self.limits.small_file_mode)));
        index
    }

    pub fn containers(&self) -> &[OutputContainer] {
        &self.containers
    }

    pub fn container_mut(&mut self, index: usize) -> Option<&mut OutputContainer> {
        self.containers.get_mut(index)
    }

    pub fn into_containers(self) -> Vec<OutputContainer> {
        self.containers
    }
}
