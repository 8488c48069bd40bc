use std::path::PathBuf;

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
#[cfg(feature = "stubgen")]
use pyo3_stub_gen::derive::{gen_stub_pyclass, gen_stub_pymethods};
use reach_metrics_core::prelude::*;

use crate::to_py_err;

/// NetworkContainer
///
/// The pedestrian and street networks of one area together with their
/// walking-cost profiles.
///
/// Each directory holds either a built ``graph.geojson`` or a ``layers/``
/// directory of GeoJSON files, plus ``profile-*.json`` files.
///
/// Example:
///
/// .. code-block:: python
///
///     networks = NetworkContainer.from_directories("data/pedestrian", "data/street")
///     networks.precalculate_weights("pedestrian")
///     summary = run_batch(networks, "reach_metrics.geojson")
#[cfg_attr(feature = "stubgen", gen_stub_pyclass)]
#[pyclass(name = "NetworkContainer")]
pub struct PyNetworkContainer {
    pub(crate) inner: NetworkContainer,
}

fn unknown_network(name: &str) -> PyErr {
    PyValueError::new_err(format!(
        "Unknown network '{name}', expected 'pedestrian' or 'street'"
    ))
}

impl PyNetworkContainer {
    fn context(&self, network: &str) -> PyResult<&RoutingContext> {
        match network {
            "pedestrian" => Ok(&self.inner.pedestrian),
            "street" => Ok(&self.inner.street),
            other => Err(unknown_network(other)),
        }
    }

    fn context_mut(&mut self, network: &str) -> PyResult<&mut RoutingContext> {
        match network {
            "pedestrian" => Ok(&mut self.inner.pedestrian),
            "street" => Ok(&mut self.inner.street),
            other => Err(unknown_network(other)),
        }
    }
}

#[cfg_attr(feature = "stubgen", gen_stub_pymethods)]
#[pymethods]
impl PyNetworkContainer {
    /// Load both networks and their profiles
    ///
    /// Parameters
    /// ----------
    /// pedestrian_directory : str
    ///     Directory of the pedestrian network
    /// street_directory : str
    ///     Directory of the street network
    /// projected : bool, default=False
    ///     Treat coordinates as projected units instead of longitude/latitude
    /// changes_sign : list[str], optional
    ///     Attributes negated on the reverse direction of each segment,
    ///     ``["incline"]`` when not given
    ///
    /// Raises
    /// ------
    /// ValueError
    ///     If a profile is malformed or the street network has no profile
    /// RuntimeError
    ///     If the network data cannot be read
    #[staticmethod]
    #[pyo3(signature = (pedestrian_directory, street_directory, projected = false, changes_sign = None))]
    pub fn from_directories(
        py: Python<'_>,
        pedestrian_directory: PathBuf,
        street_directory: PathBuf,
        projected: bool,
        changes_sign: Option<Vec<String>>,
    ) -> PyResult<Self> {
        let mut options = LoadOptions::default();
        if projected {
            options.space = CoordinateSpace::Projected;
        }
        if let Some(changes_sign) = changes_sign {
            options.changes_sign = changes_sign;
        }

        py.detach(|| {
            NetworkContainer::from_directories(&pedestrian_directory, &street_directory, &options)
                .map(|inner| Self { inner })
                .map_err(|e| to_py_err("Failed to load networks", e))
        })
    }

    /// Store ``_weight_<profile>`` on every edge of one network for each
    /// profile flagged ``precalculate``
    ///
    /// Parameters
    /// ----------
    /// network : str
    ///     ``"pedestrian"`` or ``"street"``
    /// batch_size : int, default=1000
    ///     Number of edges committed at once
    ///
    /// Returns
    /// -------
    /// int
    ///     Number of weights written
    #[pyo3(signature = (network, batch_size = 1000))]
    pub fn precalculate_weights(
        &mut self,
        py: Python<'_>,
        network: &str,
        batch_size: usize,
    ) -> PyResult<usize> {
        let context = self.context_mut(network)?;
        py.detach(|| {
            precalculate_weights(&mut context.graph, &context.profiles, batch_size, &mut |_| {})
                .map_err(|e| to_py_err("Failed to precalculate weights", e))
        })
    }

    /// Write one network as ``graph.geojson`` into ``directory``
    pub fn save(&self, py: Python<'_>, network: &str, directory: PathBuf) -> PyResult<String> {
        let graph = &self.context(network)?.graph;
        py.detach(|| {
            save_network(graph, &directory)
                .map(|path| path.display().to_string())
                .map_err(|e| to_py_err("Failed to save network", e))
        })
    }

    pub fn street_edge_count(&self) -> usize {
        self.inner.street.graph.edge_count()
    }

    pub fn pedestrian_edge_count(&self) -> usize {
        self.inner.pedestrian.graph.edge_count()
    }

    /// Ids of the pedestrian profiles that receive a score
    pub fn scored_profiles(&self) -> Vec<String> {
        self.inner
            .scored_profiles()
            .map(|p| p.id.clone())
            .collect()
    }

    fn __repr__(&self) -> String {
        format!(
            "NetworkContainer with {} pedestrian edges, {} street edges and {} scored profiles",
            self.inner.pedestrian.graph.edge_count(),
            self.inner.street.graph.edge_count(),
            self.inner.scored_profiles().count()
        )
    }

    fn __str__(&self) -> String {
        self.__repr__()
    }
}
