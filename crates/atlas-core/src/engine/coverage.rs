//! Coverage grid over the simulation parameter space and gap targeting.
//!
//! The grid is the product of three independent axes (size scale, temperature,
//! density). Each observation is assigned to the nearest bin center on every axis
//! separately; there is no distance metric across axes, since the axes carry unrelated
//! units. Per-cell energy statistics are maintained online (Welford), so memory stays
//! proportional to the number of cells.

use super::config::GridConfig;
use super::storage;
use itertools::iproduct;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

pub const COVERAGE_REPORT_FILE: &str = "coverage_report.json";

/// Successful runs a cell and its neighbor both need before they are compared.
const MIN_SUCCESS_FOR_MISMATCH: u32 = 2;

#[derive(Debug, Error)]
pub enum CoverageError {
    #[error("Non-finite value {value} on axis '{axis}'")]
    NonFiniteParameter { axis: String, value: f64 },
    #[error("Non-finite energy {0} cannot be recorded")]
    NonFiniteEnergy(f64),
    #[error("Coverage report is inconsistent: {0}")]
    InvalidReport(String),
    #[error("Coverage report I/O failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    pub name: String,
    pub unit: String,
    pub centers: Vec<f64>,
}

impl Axis {
    pub fn new(name: &str, unit: &str, centers: Vec<f64>) -> Self {
        Self {
            name: name.to_string(),
            unit: unit.to_string(),
            centers,
        }
    }

    pub fn len(&self) -> usize {
        self.centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.centers.is_empty()
    }

    /// Index of the nearest bin center. Equidistant values go to the lower index.
    pub fn nearest(&self, value: f64) -> Result<usize, CoverageError> {
        if !value.is_finite() {
            return Err(CoverageError::NonFiniteParameter {
                axis: self.name.clone(),
                value,
            });
        }
        let mut best = 0;
        let mut best_distance = f64::INFINITY;
        for (idx, center) in self.centers.iter().enumerate() {
            let distance = (center - value).abs();
            if distance < best_distance {
                best = idx;
                best_distance = distance;
            }
        }
        Ok(best)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridPoint {
    pub scale: f64,
    pub temperature: f64,
    pub density: f64,
}

pub type CellKey = (usize, usize, usize);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoverageCell {
    pub n_runs: u32,
    pub n_success: u32,
    pub n_failures: u32,
    pub mean_energy: f64,
    m2: f64,
    pub max_mismatch: f64,
}

impl CoverageCell {
    pub fn success_rate(&self) -> f64 {
        if self.n_runs == 0 {
            0.0
        } else {
            f64::from(self.n_success) / f64::from(self.n_runs)
        }
    }

    /// Population variance of the successful energies.
    pub fn variance(&self) -> f64 {
        if self.n_success == 0 {
            0.0
        } else {
            self.m2 / f64::from(self.n_success)
        }
    }

    pub fn std_energy(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn is_sparse(&self, threshold: u32) -> bool {
        self.n_runs < threshold
    }

    pub fn is_high_mismatch(&self, threshold: f64) -> bool {
        self.max_mismatch > threshold
    }

    fn record_success(&mut self, energy: f64) {
        self.n_runs += 1;
        self.n_success += 1;
        let delta = energy - self.mean_energy;
        self.mean_energy += delta / f64::from(self.n_success);
        self.m2 += delta * (energy - self.mean_energy);
    }

    fn record_failure(&mut self) {
        self.n_runs += 1;
        self.n_failures += 1;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Gap {
    pub key: CellKey,
    pub center: GridPoint,
    pub n_runs: u32,
    pub max_mismatch: f64,
    pub sparse: bool,
    pub high_mismatch: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfiguration {
    pub cell: CellKey,
    pub scale: f64,
    pub temperature: f64,
    pub density: f64,
    pub formula: String,
    pub seed: u64,
    pub steps: u32,
}

impl RunConfiguration {
    pub fn point(&self) -> GridPoint {
        GridPoint {
            scale: self.scale,
            temperature: self.temperature,
            density: self.density,
        }
    }
}

pub fn formula_for_scale(scale: f64) -> &'static str {
    if scale <= 5.0 {
        "H2O"
    } else if scale <= 20.0 {
        "CH4"
    } else if scale <= 50.0 {
        "C6H6"
    } else {
        "C10H22"
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellReport {
    pub indices: [usize; 3],
    pub scale: f64,
    pub temperature: f64,
    pub density: f64,
    pub n_runs: u32,
    pub n_success: u32,
    pub n_failures: u32,
    pub success_rate: f64,
    pub mean_energy: f64,
    pub std_energy: f64,
    pub max_mismatch: f64,
}

/// Serialized coverage state; also the form the grid is reloaded from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub axes: Vec<Axis>,
    pub dimensions: [usize; 3],
    pub grid_size: usize,
    pub total_runs: u64,
    pub cells_with_data: usize,
    pub sparse_cells: usize,
    pub high_mismatch_cells: usize,
    pub coverage_percentage: f64,
    pub sparse_threshold: u32,
    pub mismatch_threshold: f64,
    pub cells: Vec<CellReport>,
}

#[derive(Debug, Clone)]
pub struct CoverageGrid {
    axes: [Axis; 3],
    cells: BTreeMap<CellKey, CoverageCell>,
    sparse_threshold: u32,
    mismatch_threshold: f64,
}

impl CoverageGrid {
    pub fn new(config: &GridConfig) -> Self {
        let axes = [
            Axis::new("scale", "atoms", config.scale_centers.clone()),
            Axis::new("temperature", "K", config.temperature_centers.clone()),
            Axis::new("density", "g/cm^3", config.density_centers.clone()),
        ];
        Self::with_axes(axes, config.sparse_threshold, config.mismatch_threshold)
    }

    fn with_axes(axes: [Axis; 3], sparse_threshold: u32, mismatch_threshold: f64) -> Self {
        let cells = iproduct!(0..axes[0].len(), 0..axes[1].len(), 0..axes[2].len())
            .map(|key| (key, CoverageCell::default()))
            .collect();
        Self {
            axes,
            cells,
            sparse_threshold,
            mismatch_threshold,
        }
    }

    pub fn axes(&self) -> &[Axis; 3] {
        &self.axes
    }

    pub fn dimensions(&self) -> [usize; 3] {
        [self.axes[0].len(), self.axes[1].len(), self.axes[2].len()]
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cell(&self, key: CellKey) -> Option<&CoverageCell> {
        self.cells.get(&key)
    }

    pub fn cells(&self) -> impl Iterator<Item = (&CellKey, &CoverageCell)> {
        self.cells.iter()
    }

    pub fn total_runs(&self) -> u64 {
        self.cells.values().map(|c| u64::from(c.n_runs)).sum()
    }

    pub fn center(&self, key: CellKey) -> GridPoint {
        GridPoint {
            scale: self.axes[0].centers[key.0],
            temperature: self.axes[1].centers[key.1],
            density: self.axes[2].centers[key.2],
        }
    }

    pub fn key_for(&self, point: GridPoint) -> Result<CellKey, CoverageError> {
        Ok((
            self.axes[0].nearest(point.scale)?,
            self.axes[1].nearest(point.temperature)?,
            self.axes[2].nearest(point.density)?,
        ))
    }

    /// Records a successful run. Only successes feed the energy statistics.
    pub fn record_success(&mut self, point: GridPoint, energy: f64) -> Result<CellKey, CoverageError> {
        if !energy.is_finite() {
            return Err(CoverageError::NonFiniteEnergy(energy));
        }
        let key = self.key_for(point)?;
        if let Some(cell) = self.cells.get_mut(&key) {
            cell.record_success(energy);
            debug!(?key, energy, n_success = cell.n_success, "Recorded successful run");
        }
        Ok(key)
    }

    pub fn record_failure(&mut self, point: GridPoint) -> Result<CellKey, CoverageError> {
        let key = self.key_for(point)?;
        if let Some(cell) = self.cells.get_mut(&key) {
            cell.record_failure();
            debug!(?key, n_failures = cell.n_failures, "Recorded failed run");
        }
        Ok(key)
    }

    fn neighbors(&self, (i, j, k): CellKey) -> impl Iterator<Item = CellKey> + '_ {
        let deltas: [(isize, isize, isize); 6] = [
            (-1, 0, 0),
            (1, 0, 0),
            (0, -1, 0),
            (0, 1, 0),
            (0, 0, -1),
            (0, 0, 1),
        ];
        let dims = self.dimensions();
        deltas.into_iter().filter_map(move |(di, dj, dk)| {
            let ni = i.checked_add_signed(di).filter(|v| *v < dims[0])?;
            let nj = j.checked_add_signed(dj).filter(|v| *v < dims[1])?;
            let nk = k.checked_add_signed(dk).filter(|v| *v < dims[2])?;
            Some((ni, nj, nk))
        })
    }

    fn mismatch_of(&self, key: CellKey, cell: &CoverageCell) -> f64 {
        if cell.n_success < MIN_SUCCESS_FOR_MISMATCH {
            return 0.0;
        }
        self.neighbors(key)
            .filter_map(|nk| self.cells.get(&nk))
            .filter(|n| n.n_success >= MIN_SUCCESS_FOR_MISMATCH)
            .filter_map(|n| {
                let combined = (cell.variance() + n.variance()).sqrt();
                (combined > 0.0).then(|| (cell.mean_energy - n.mean_energy).abs() / combined)
            })
            .fold(0.0, f64::max)
    }

    pub fn compute_mismatches(&mut self) {
        let updated: Vec<(CellKey, f64)> = self
            .cells
            .par_iter()
            .map(|(key, cell)| (*key, self.mismatch_of(*key, cell)))
            .collect();
        for (key, mismatch) in updated {
            if let Some(cell) = self.cells.get_mut(&key) {
                cell.max_mismatch = mismatch;
            }
        }
    }

    /// Gap list from the current mismatch values, least sampled first, then most
    /// disagreeing.
    pub fn gaps(&self) -> Vec<Gap> {
        let mut gaps: Vec<Gap> = self
            .cells
            .iter()
            .filter_map(|(key, cell)| {
                let sparse = cell.is_sparse(self.sparse_threshold);
                let high_mismatch = cell.is_high_mismatch(self.mismatch_threshold);
                (sparse || high_mismatch).then(|| Gap {
                    key: *key,
                    center: self.center(*key),
                    n_runs: cell.n_runs,
                    max_mismatch: cell.max_mismatch,
                    sparse,
                    high_mismatch,
                })
            })
            .collect();
        gaps.sort_by(|a, b| {
            a.n_runs
                .cmp(&b.n_runs)
                .then_with(|| b.max_mismatch.total_cmp(&a.max_mismatch))
        });
        gaps
    }

    pub fn identify_gaps(&mut self) -> Vec<Gap> {
        self.compute_mismatches();
        let gaps = self.gaps();
        info!(gaps = gaps.len(), cells = self.len(), "Identified coverage gaps");
        gaps
    }

    pub fn to_report(&self) -> CoverageReport {
        let cells: Vec<CellReport> = self
            .cells
            .iter()
            .filter(|(_, cell)| cell.n_runs > 0)
            .map(|(key, cell)| {
                let center = self.center(*key);
                CellReport {
                    indices: [key.0, key.1, key.2],
                    scale: center.scale,
                    temperature: center.temperature,
                    density: center.density,
                    n_runs: cell.n_runs,
                    n_success: cell.n_success,
                    n_failures: cell.n_failures,
                    success_rate: cell.success_rate(),
                    mean_energy: cell.mean_energy,
                    std_energy: cell.std_energy(),
                    max_mismatch: cell.max_mismatch,
                }
            })
            .collect();

        let grid_size = self.len();
        let cells_with_data = cells.len();
        CoverageReport {
            axes: self.axes.to_vec(),
            dimensions: self.dimensions(),
            grid_size,
            total_runs: self.total_runs(),
            cells_with_data,
            sparse_cells: self
                .cells
                .values()
                .filter(|c| c.is_sparse(self.sparse_threshold))
                .count(),
            high_mismatch_cells: self
                .cells
                .values()
                .filter(|c| c.is_high_mismatch(self.mismatch_threshold))
                .count(),
            coverage_percentage: if grid_size == 0 {
                0.0
            } else {
                cells_with_data as f64 / grid_size as f64 * 100.0
            },
            sparse_threshold: self.sparse_threshold,
            mismatch_threshold: self.mismatch_threshold,
            cells,
        }
    }

    /// Rebuilds a grid from a report. Axes come from the report, thresholds from
    /// `config`.
    pub fn from_report(report: &CoverageReport, config: &GridConfig) -> Result<Self, CoverageError> {
        let axes: [Axis; 3] = report.axes.clone().try_into().map_err(|axes: Vec<Axis>| {
            CoverageError::InvalidReport(format!("expected 3 axes, found {}", axes.len()))
        })?;
        let mut grid = Self::with_axes(axes, config.sparse_threshold, config.mismatch_threshold);

        for entry in &report.cells {
            let key = (entry.indices[0], entry.indices[1], entry.indices[2]);
            let cell = grid.cells.get_mut(&key).ok_or_else(|| {
                CoverageError::InvalidReport(format!("cell {:?} is outside the grid", entry.indices))
            })?;
            if entry.n_success + entry.n_failures != entry.n_runs {
                return Err(CoverageError::InvalidReport(format!(
                    "cell {:?}: {} successes + {} failures != {} runs",
                    entry.indices, entry.n_success, entry.n_failures, entry.n_runs
                )));
            }
            cell.n_runs = entry.n_runs;
            cell.n_success = entry.n_success;
            cell.n_failures = entry.n_failures;
            cell.mean_energy = entry.mean_energy;
            cell.m2 = entry.std_energy.powi(2) * f64::from(entry.n_success);
            cell.max_mismatch = entry.max_mismatch;
        }
        Ok(grid)
    }

    pub fn save(&self, dir: &Path) -> Result<(), CoverageError> {
        let path = dir.join(COVERAGE_REPORT_FILE);
        storage::write_json_atomic(&path, &self.to_report())?;
        info!(path = %path.display(), "Saved coverage report");
        Ok(())
    }

    pub fn load_or_new(dir: &Path, config: &GridConfig) -> Result<Self, CoverageError> {
        let path = dir.join(COVERAGE_REPORT_FILE);
        match storage::read_json::<CoverageReport>(&path)? {
            Some(report) => {
                let grid = Self::from_report(&report, config)?;
                info!(runs = grid.total_runs(), "Loaded coverage grid");
                Ok(grid)
            }
            None => Ok(Self::new(config)),
        }
    }
}

/// Distributes `n_runs` configurations over `gaps` round-robin. Seeds are unique
/// within the schedule.
pub fn schedule_runs<R: Rng>(
    gaps: &[Gap],
    n_runs: usize,
    steps: u32,
    rng: &mut R,
) -> Vec<RunConfiguration> {
    if gaps.is_empty() {
        return Vec::new();
    }
    let mut seeds = HashSet::with_capacity(n_runs);
    gaps.iter()
        .cycle()
        .take(n_runs)
        .map(|gap| {
            let seed = loop {
                let candidate: u64 = rng.r#gen();
                if seeds.insert(candidate) {
                    break candidate;
                }
            };
            RunConfiguration {
                cell: gap.key,
                scale: gap.center.scale,
                temperature: gap.center.temperature,
                density: gap.center.density,
                formula: formula_for_scale(gap.center.scale).to_string(),
                seed,
                steps,
            }
        })
        .collect()
}
