//! Product-level driver: band maps for every source band, then tile transfer
//!
//! Stage B (the reference grid) is shared by every band, so failing to build
//! it aborts the run. Stage A and orphan failures only take out their own band.

use crate::config::CoregistrationConfig;
use crate::core::bands::BandTable;
use crate::core::coordinate_map::CoordinateMapBuilder;
use crate::core::orphan::{build_orphan_map, OrphanRecovery};
use crate::core::resolver::GridResolver;
use crate::core::transfer::{BandOutput, PixelTransferEngine, TransferStats};
use crate::io::array::CalibrationStore;
use crate::io::raster::RasterProvider;
use crate::types::{BandIdentity, CancelFlag, CoordinateMap, CoregError, CoregResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Maps for one source band
#[derive(Debug, Clone)]
pub struct BandMaps {
    pub band: String,
    pub identity: BandIdentity,
    pub map: Arc<CoordinateMap>,
    pub orphans: OrphanRecovery,
}

/// A band whose maps could not be built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandFailure {
    pub band: String,
    pub error: String,
}

/// Everything built before tile processing starts
#[derive(Debug, Clone, Default)]
pub struct BandMapSet {
    pub bands: Vec<BandMaps>,
    pub failures: Vec<BandFailure>,
    /// Target-instrument bands, which need no transfer
    pub skipped: Vec<String>,
    pub reference_entries: usize,
}

impl BandMapSet {
    pub fn get(&self, band: &str) -> Option<&BandMaps> {
        self.bands.iter().find(|b| b.band == band)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandReport {
    pub band: String,
    pub calibration_file: String,
    pub mapped_pixels: usize,
    pub orphan_recovery: bool,
    pub orphan_pixels: usize,
    pub stats: TransferStats,
}

/// Summary of one co-registration run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoregistrationReport {
    pub source_dims: (usize, usize),
    pub target_dims: (usize, usize),
    pub reference_entries: usize,
    pub bands: Vec<BandReport>,
    pub failures: Vec<BandFailure>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CoregistrationOutput {
    pub bands: Vec<BandOutput>,
    pub report: CoregistrationReport,
}

impl CoregistrationOutput {
    pub fn band(&self, name: &str) -> Option<&BandOutput> {
        self.bands.iter().find(|b| b.band == name)
    }
}

/// Co-registration of one source/target product pair
pub struct Coregistration<'a> {
    config: CoregistrationConfig,
    calibration: &'a dyn CalibrationStore,
    orphan_store: Option<&'a dyn CalibrationStore>,
    table: BandTable,
    resolver: GridResolver,
    cancel: CancelFlag,
}

impl<'a> Coregistration<'a> {
    pub fn new(config: CoregistrationConfig, calibration: &'a dyn CalibrationStore) -> CoregResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            calibration,
            orphan_store: None,
            table: BandTable::standard()?,
            resolver: GridResolver::standard(),
            cancel: CancelFlag::new(),
        })
    }

    /// Store holding the `{band}_orphan.nc` companions of the target product
    pub fn with_orphan_store(mut self, store: &'a dyn CalibrationStore) -> Self {
        self.orphan_store = Some(store);
        self
    }

    pub fn with_resolver(mut self, resolver: GridResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &CoregistrationConfig {
        &self.config
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Build the coordinate and orphan maps for every band in `band_names`
    pub fn build_band_maps(
        &self,
        band_names: &[&str],
        source_dims: (usize, usize),
        target_dims: (usize, usize),
    ) -> CoregResult<BandMapSet> {
        let identities = self.table.identify_all(band_names)?;
        let builder = CoordinateMapBuilder::new(self.calibration, &self.config)
            .with_resolver(self.resolver.clone())
            .with_cancel(self.cancel.clone());

        let target_map = builder.build_target_map(target_dims).map_err(|e| {
            log::error!(
                "Reference grid {} unusable, no band can be co-registered: {}",
                BandIdentity::Olci {
                    band: self.config.reference_band
                }
                .calibration_file_name(),
                e
            );
            e
        })?;

        let mut set = BandMapSet {
            reference_entries: target_map.len(),
            ..BandMapSet::default()
        };

        for (name, identity) in identities {
            if let BandIdentity::Olci { .. } = identity {
                log::debug!("{} is on the target grid already, skipping", name);
                set.skipped.push(name.to_string());
                continue;
            }

            match self.build_one(&builder, name, identity, source_dims, target_dims, &target_map) {
                Ok(maps) => set.bands.push(maps),
                Err(CoregError::Cancelled) => return Err(CoregError::Cancelled),
                Err(e) => {
                    log::warn!("Band {} dropped: {}", name, e);
                    set.failures.push(BandFailure {
                        band: name.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        log::info!(
            "Band maps ready: {} built, {} failed, {} skipped",
            set.bands.len(),
            set.failures.len(),
            set.skipped.len()
        );
        Ok(set)
    }

    fn build_one(
        &self,
        builder: &CoordinateMapBuilder<'_>,
        name: &str,
        identity: BandIdentity,
        source_dims: (usize, usize),
        target_dims: (usize, usize),
        target_map: &CoordinateMap,
    ) -> CoregResult<BandMaps> {
        let map = builder.build_band_map(identity, source_dims, target_map)?;
        let orphans = match self.orphan_store {
            Some(store) => build_orphan_map(store, name, target_dims, &self.config, &self.cancel)?,
            None => OrphanRecovery::Unavailable,
        };

        Ok(BandMaps {
            band: name.to_string(),
            identity,
            map: Arc::new(map),
            orphans,
        })
    }

    /// Transfer one band whose maps are already built
    pub fn transfer_band(
        &self,
        maps: &BandMaps,
        source: &dyn RasterProvider,
        target: &dyn RasterProvider,
    ) -> CoregResult<BandOutput> {
        PixelTransferEngine::new(&maps.band, maps.map.clone(), &maps.orphans, source, target, &self.config)
            .with_cancel(self.cancel.clone())
            .transfer_all()
    }

    /// Build every band map, then transfer every band that has one
    pub fn run(
        &self,
        band_names: &[&str],
        source: &dyn RasterProvider,
        target: &dyn RasterProvider,
    ) -> CoregResult<CoregistrationOutput> {
        let source_dims = source.dimensions();
        let target_dims = target.dimensions();
        log::info!(
            "Co-registering {} bands from {}x{} source onto {}x{} target",
            band_names.len(),
            source_dims.0,
            source_dims.1,
            target_dims.0,
            target_dims.1
        );

        let set = self.build_band_maps(band_names, source_dims, target_dims)?;

        let mut bands = Vec::with_capacity(set.bands.len());
        let mut reports = Vec::with_capacity(set.bands.len());
        for maps in &set.bands {
            let output = self.transfer_band(maps, source, target)?;
            reports.push(BandReport {
                band: maps.band.clone(),
                calibration_file: maps.identity.calibration_file_name(),
                mapped_pixels: maps.map.len(),
                orphan_recovery: maps.orphans.is_available(),
                orphan_pixels: maps.orphans.len(),
                stats: output.stats,
            });
            bands.push(output);
        }

        Ok(CoregistrationOutput {
            bands,
            report: CoregistrationReport {
                source_dims,
                target_dims,
                reference_entries: set.reference_entries,
                bands: reports,
                failures: set.failures,
                skipped: set.skipped,
            },
        })
    }
}
