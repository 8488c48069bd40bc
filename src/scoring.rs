use std::collections::BTreeMap;
use std::path::PathBuf;

use pyo3::prelude::*;
#[cfg(feature = "stubgen")]
use pyo3_stub_gen::derive::gen_stub_pyfunction;
use reach_metrics_core::prelude::*;

use crate::network::PyNetworkContainer;
use crate::to_py_err;

/// Reach ratio of one street edge per scored pedestrian profile
///
/// Parameters
/// ----------
/// networks : NetworkContainer
///     Networks to score against
/// edge : int
///     Index of the street edge
/// interpolate : float, default=0.5
///     Fraction along the street where it is scored
///
/// Returns
/// -------
/// dict[str, float]
///     Ratio keyed by profile id; 0 when the street has no sidewalks or
///     nothing is reachable along it
///
/// Raises
/// ------
/// ValueError
///     If the edge index is out of range or the configuration is invalid
/// RuntimeError
///     If no street candidate exists for the edge
#[cfg_attr(feature = "stubgen", gen_stub_pyfunction)]
#[pyfunction]
#[pyo3(signature = (networks, edge, interpolate = 0.5))]
pub fn reach_score(
    py: Python<'_>,
    networks: &PyNetworkContainer,
    edge: usize,
    interpolate: f64,
) -> PyResult<BTreeMap<String, f64>> {
    let config = ScoringConfig {
        interpolate,
        ..Default::default()
    };
    py.detach(|| {
        let scorer = ReachScorer::new(&networks.inner, config, DijkstraOracle::default())
            .map_err(|e| to_py_err("Invalid scoring configuration", e))?;
        scorer
            .score(EdgeIndex::new(edge))
            .map(BTreeMap::from)
            .map_err(|e| to_py_err("Failed to score street edge", e))
    })
}

/// Score every street edge and write the scored streets as GeoJSON
///
/// Scores are also stored on the street network as ``nsr_<profile>``
/// attributes, so they are included when the street network is saved.
///
/// Parameters
/// ----------
/// networks : NetworkContainer
///     Networks to score, modified in place
/// output : str
///     Path of the GeoJSON file to write
/// skip_failures : bool, default=False
///     Log and skip street edges that cannot be scored instead of failing
/// batch_size : int, default=1000
///     Number of street edges scored and committed at once
///
/// Returns
/// -------
/// dict[str, int]
///     Counts of ``scored``, ``skipped`` and ``exported`` edges
///
/// Notes
/// -----
/// The function releases the GIL and scores each batch on all cores.
#[cfg_attr(feature = "stubgen", gen_stub_pyfunction)]
#[pyfunction]
#[pyo3(signature = (networks, output, skip_failures = false, batch_size = 1000))]
pub fn run_batch(
    py: Python<'_>,
    mut networks: PyRefMut<'_, PyNetworkContainer>,
    output: PathBuf,
    skip_failures: bool,
    batch_size: usize,
) -> PyResult<BTreeMap<String, usize>> {
    let config = BatchConfig {
        batch_size,
        failure_policy: if skip_failures {
            FailurePolicy::Skip
        } else {
            FailurePolicy::Abort
        },
        ..Default::default()
    };
    let inner = &mut networks.inner;

    py.detach(|| {
        let mut sink =
            GeoJsonSink::create(&output).map_err(|e| to_py_err("Failed to create output", e))?;
        let summary = BatchRunner::new(config)
            .run(inner, &mut sink, &mut |_| {})
            .map_err(|e| to_py_err("Failed to score street network", e))?;

        Ok(BTreeMap::from([
            ("scored".to_string(), summary.scored),
            ("skipped".to_string(), summary.skipped),
            ("exported".to_string(), summary.exported),
        ]))
    })
}
