use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use reach_metrics_core::Error;

use network::PyNetworkContainer;
use scoring::{reach_score, run_batch};

pub mod network;
pub mod scoring;

/// Configuration problems surface as `ValueError`, everything else as
/// `RuntimeError`
pub(crate) fn to_py_err(context: &str, error: Error) -> PyErr {
    match error {
        Error::UnknownLayer(_)
        | Error::InvalidProfile(_)
        | Error::DuplicateProfile(_)
        | Error::MissingProfiles(_)
        | Error::InvalidConfig(_)
        | Error::InvalidEdgeIndex(_) => PyValueError::new_err(format!("{context}: {error}")),
        _ => PyRuntimeError::new_err(format!("{context}: {error}")),
    }
}

/// A Python module implemented in Rust.
#[pymodule]
fn reach_metrics(m: &Bound<'_, PyModule>) -> PyResult<()> {
    pyo3_log::init();

    m.add_class::<PyNetworkContainer>()?;
    m.add_function(wrap_pyfunction!(reach_score, m)?)?;
    m.add_function(wrap_pyfunction!(run_batch, m)?)?;
    Ok(())
}

#[cfg(feature = "stubgen")]
pyo3_stub_gen::define_stub_info_gatherer!(stub_info);
